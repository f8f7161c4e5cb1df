//! Traits for storage and parser abstraction
//!
//! The import core never talks to a database or a file decoder directly.
//! Backends implement these traits; [`crate::utils::MemoryStorage`] and
//! [`crate::utils::FixtureParser`] are the in-memory implementations.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};

use crate::types::*;

/// Decoder that turns raw statement bytes into structured records
#[async_trait]
pub trait StatementParser: Send + Sync {
    /// Parse a statement file. Failures are reported as [`LedgerError::Parse`].
    async fn parse(&self, data: &[u8], metadata: &StatementMetadata)
        -> LedgerResult<ParsedStatement>;
}

/// Account persistence
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Find an account by exact account number. When several accounts share
    /// a number the first one created is returned.
    async fn find_account_by_number(&self, account_number: &str) -> LedgerResult<Option<Account>>;

    /// Get an account by ID
    async fn find_account_by_id(&self, account_id: &str) -> LedgerResult<Option<Account>>;

    /// Create and persist a new account
    async fn create_account(&self, account: NewAccount) -> LedgerResult<Account>;

    /// Set the balance and last-synced timestamp in a single write
    async fn update_balance(
        &self,
        account_id: &str,
        balance: &BigDecimal,
        synced_at: DateTime<Utc>,
    ) -> LedgerResult<()>;

    /// Refresh the last-synced timestamp only
    async fn update_last_synced(&self, account_id: &str, synced_at: DateTime<Utc>)
        -> LedgerResult<()>;
}

/// Ledger transaction persistence
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Transactions for an account with `start <= date <= end`, ordered by date
    async fn find_transactions(
        &self,
        account_id: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> LedgerResult<Vec<LedgerTransaction>>;

    /// Insert a batch of transactions, returning them in input order
    async fn create_transactions(
        &self,
        transactions: Vec<NewLedgerTransaction>,
    ) -> LedgerResult<Vec<LedgerTransaction>>;

    /// Most recent transaction carrying a running balance, optionally at or before `as_of`
    async fn latest_with_balance(
        &self,
        account_id: &str,
        as_of: Option<DateTime<Utc>>,
    ) -> LedgerResult<Option<LedgerTransaction>>;
}

/// Statement import record persistence
#[async_trait]
pub trait ImportRecordStore: Send + Sync {
    async fn find_import_by_fingerprint(
        &self,
        fingerprint: &str,
    ) -> LedgerResult<Option<StatementImportRecord>>;

    /// Records whose period intersects `[start, end]`, newest period first
    async fn find_imports_by_period(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> LedgerResult<Vec<StatementImportRecord>>;

    /// Create a record; fails with [`LedgerError::DuplicateFingerprint`] if the
    /// fingerprint is already recorded
    async fn create_import(&self, record: NewStatementImport) -> LedgerResult<StatementImportRecord>;

    /// All records, optionally for one bank, most recently imported first
    async fn list_imports(&self, bank_code: Option<BankCode>)
        -> LedgerResult<Vec<StatementImportRecord>>;
}

/// Result of an atomic import commit
#[derive(Debug, Clone, PartialEq)]
pub struct CommittedImport {
    pub record: StatementImportRecord,
    pub transactions: Vec<LedgerTransaction>,
}

/// Full storage backend used by the import workflow
#[async_trait]
pub trait LedgerStorage: AccountStore + TransactionStore + ImportRecordStore {
    /// Create the import record and its transactions as one unit.
    ///
    /// Each transaction's `statement_import_id` is set to the new record's id.
    /// Either everything is persisted or nothing is.
    async fn commit_import(
        &self,
        record: NewStatementImport,
        transactions: Vec<NewLedgerTransaction>,
    ) -> LedgerResult<CommittedImport>;
}
