//! # Statement Import Core
//!
//! Imports parsed bank statements into a personal finance ledger.
//!
//! ## Features
//!
//! - **Idempotent imports**: SHA-256 file fingerprints reject re-imports of the same file
//! - **Duplicate detection**: tolerant matching of statement transactions against the ledger
//! - **Period overlap detection**: finds previously imported statements covering the same dates
//! - **Account resolution**: finds or creates the ledger account a statement belongs to
//! - **Balance reconciliation**: aligns balances with the bank's closing balance and reports discrepancies
//! - **Storage abstraction**: database-agnostic design with trait-based storage
//!
//! ## Quick Start
//!
//! ```rust
//! use statement_import_core::{FileImportInput, ImportOptions, StatementFileType, StatementImporter};
//! use statement_import_core::utils::{FixtureParser, MemoryStorage};
//!
//! # async fn run() {
//! // Swap in a real parser and a LedgerStorage implementation
//! let importer = StatementImporter::new(FixtureParser::new(), MemoryStorage::new());
//! let input = FileImportInput::new(b"...".to_vec(), "statement.pdf", StatementFileType::Pdf);
//! let result = importer.import_statement(&input, ImportOptions::default(), None).await;
//! println!("{:?}", result.status());
//! # }
//! ```

pub mod config;
pub mod import;
pub mod ledger;
pub mod reconciliation;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::*;
pub use import::*;
pub use ledger::*;
pub use reconciliation::{
    validate_running_balances, BalanceCheckpoint, BalanceReconciler, BalanceSource,
    CheckpointSource, ReconciliationError, ReconciliationResult, ReconciliationSummary,
    ReconciliationWarning, RunningBalanceCheck,
};
pub use traits::*;
pub use types::*;
