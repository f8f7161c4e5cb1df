//! Inputs, progress events and results of a statement import

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::duplicates::DuplicateInfo;
use super::overlap::OverlapInfo;
use crate::reconciliation::ReconciliationSummary;
use crate::types::*;

/// A statement file handed to the importer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileImportInput {
    pub data: Vec<u8>,
    pub file_name: String,
    pub file_type: StatementFileType,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// Expected bank, when the caller already knows it
    pub bank_code: Option<BankCode>,
}

impl FileImportInput {
    pub fn new(data: impl Into<Vec<u8>>, file_name: impl Into<String>, file_type: StatementFileType) -> Self {
        Self {
            data: data.into(),
            file_name: file_name.into(),
            file_type,
            password: None,
            bank_code: None,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_bank(mut self, bank_code: BankCode) -> Self {
        self.bank_code = Some(bank_code);
        self
    }

    pub(crate) fn metadata(&self) -> StatementMetadata {
        StatementMetadata {
            file_name: self.file_name.clone(),
            file_type: self.file_type,
            bank_code: self.bank_code,
            password: self.password.clone(),
        }
    }
}

/// Workflow phases, reported in this order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportPhase {
    Reading,
    DetectingDuplicates,
    Importing,
    UpdatingBalances,
    Complete,
}

impl ImportPhase {
    pub const TOTAL_STEPS: u8 = 5;

    pub fn step(&self) -> u8 {
        match self {
            ImportPhase::Reading => 1,
            ImportPhase::DetectingDuplicates => 2,
            ImportPhase::Importing => 3,
            ImportPhase::UpdatingBalances => 4,
            ImportPhase::Complete => 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportProgress {
    pub phase: ImportPhase,
    pub current_step: u8,
    pub total_steps: u8,
    pub message: String,
    pub file_name: String,
}

impl ImportProgress {
    pub fn new(phase: ImportPhase, message: impl Into<String>, file_name: &str) -> Self {
        Self {
            phase,
            current_step: phase.step(),
            total_steps: ImportPhase::TOTAL_STEPS,
            message: message.into(),
            file_name: file_name.to_string(),
        }
    }
}

/// Synchronous progress observer, invoked once per phase
pub type ProgressCallback = dyn Fn(&ImportProgress) + Send + Sync;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportErrorKind {
    /// The file could not be decoded into a valid statement
    Parse,
    /// A file with the same fingerprint was already committed
    AlreadyImported,
    AccountResolution,
    /// Rejected because overlaps were disallowed
    PeriodOverlap,
    /// The import record and its transactions could not be committed
    Persistence,
    Reconciliation,
    Unexpected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportError {
    pub kind: ImportErrorKind,
    pub message: String,
}

impl ImportError {
    pub fn new(kind: ImportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionCounts {
    /// Transactions in the parsed statement
    pub total: usize,
    /// Committed, or that would be committed in a dry run
    pub imported: usize,
    /// Neither committed nor counted as duplicates
    pub skipped: usize,
    pub duplicates: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub id: String,
    pub account_number: String,
    /// Balance before reconciliation, when the balance phase ran
    pub previous_balance: Option<BigDecimal>,
    pub new_balance: BigDecimal,
}

/// How a caller should present an import outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    Complete,
    CompleteWithWarnings,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportResult {
    /// True iff `errors` is empty
    pub success: bool,
    pub statement_import_id: Option<String>,
    pub transactions: TransactionCounts,
    pub account: Option<AccountSummary>,
    pub bank_code: Option<BankCode>,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
    pub errors: Vec<ImportError>,
    pub duplicates: Vec<DuplicateInfo>,
    pub period_overlaps: Vec<OverlapInfo>,
    pub reconciliation: Option<ReconciliationSummary>,
}

impl ImportResult {
    /// Result of an import that stopped before reaching an account
    pub fn failure(error: ImportError) -> Self {
        Self {
            success: false,
            statement_import_id: None,
            transactions: TransactionCounts::default(),
            account: None,
            bank_code: None,
            period_start: None,
            period_end: None,
            errors: vec![error],
            duplicates: Vec::new(),
            period_overlaps: Vec::new(),
            reconciliation: None,
        }
    }

    pub fn status(&self) -> ImportStatus {
        if !self.success {
            return ImportStatus::Failed;
        }
        let has_warnings = !self.duplicates.is_empty()
            || !self.period_overlaps.is_empty()
            || self
                .reconciliation
                .as_ref()
                .is_some_and(|summary| !summary.warnings.is_empty());
        if has_warnings {
            ImportStatus::CompleteWithWarnings
        } else {
            ImportStatus::Complete
        }
    }

    pub fn first_error(&self) -> Option<&ImportError> {
        self.errors.first()
    }
}
