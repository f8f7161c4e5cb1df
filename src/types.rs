//! Core types and data structures for statement import

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Banks known to the static registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BankCode {
    Bancolombia,
    Davivienda,
    Bbva,
    Nequi,
    Daviplata,
    Bancoomeva,
}

/// Static registry entry for a bank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BankInfo {
    pub code: BankCode,
    pub name: &'static str,
}

const BANK_REGISTRY: [BankInfo; 6] = [
    BankInfo {
        code: BankCode::Bancolombia,
        name: "Bancolombia",
    },
    BankInfo {
        code: BankCode::Davivienda,
        name: "Davivienda",
    },
    BankInfo {
        code: BankCode::Bbva,
        name: "BBVA",
    },
    BankInfo {
        code: BankCode::Nequi,
        name: "Nequi",
    },
    BankInfo {
        code: BankCode::Daviplata,
        name: "Daviplata",
    },
    BankInfo {
        code: BankCode::Bancoomeva,
        name: "Bancoomeva",
    },
];

impl BankCode {
    /// All registered banks
    pub fn all() -> impl Iterator<Item = BankCode> {
        BANK_REGISTRY.iter().map(|info| info.code)
    }

    /// Registry entry for this bank
    pub fn info(&self) -> BankInfo {
        BANK_REGISTRY
            .iter()
            .copied()
            .find(|info| info.code == *self)
            .unwrap_or(BankInfo {
                code: *self,
                name: self.as_str(),
            })
    }

    /// Display name from the registry
    pub fn display_name(&self) -> &'static str {
        self.info().name
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BankCode::Bancolombia => "bancolombia",
            BankCode::Davivienda => "davivienda",
            BankCode::Bbva => "bbva",
            BankCode::Nequi => "nequi",
            BankCode::Daviplata => "daviplata",
            BankCode::Bancoomeva => "bancoomeva",
        }
    }

    /// Mobile-first banks whose accounts are wallets rather than bank accounts
    pub fn is_digital_wallet(&self) -> bool {
        matches!(self, BankCode::Nequi | BankCode::Daviplata)
    }
}

impl fmt::Display for BankCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BankCode {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        BankCode::all()
            .find(|code| code.as_str() == normalized)
            .ok_or_else(|| LedgerError::Validation(format!("Unknown bank code: {}", s)))
    }
}

/// Direction of money movement for a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Income,
    Expense,
    TransferIn,
    TransferOut,
}

impl TransactionType {
    /// Whether this type adds money to the account
    pub fn is_inflow(&self) -> bool {
        matches!(self, TransactionType::Income | TransactionType::TransferIn)
    }

    /// Apply the direction of this type to a positive amount
    pub fn signed(&self, amount: &BigDecimal) -> BigDecimal {
        if self.is_inflow() {
            amount.clone()
        } else {
            -amount.clone()
        }
    }
}

/// Ledger account types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Savings,
    Checking,
    Credit,
    DigitalWallet,
}

/// Account type as reported on a statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementAccountType {
    Savings,
    Checking,
    CreditCard,
    #[serde(other)]
    Unknown,
}

/// File formats the external parser understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementFileType {
    Pdf,
    Xlsx,
}

/// Ledger account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub bank_code: BankCode,
    pub bank_name: String,
    /// Opaque account number as printed on the statement
    pub account_number: String,
    pub account_type: AccountType,
    pub balance: BigDecimal,
    pub is_active: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data required to create an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAccount {
    pub bank_code: BankCode,
    pub bank_name: String,
    pub account_number: String,
    pub account_type: AccountType,
    pub balance: BigDecimal,
    pub is_active: bool,
}

impl Account {
    /// Materialize a new account record with a fresh id
    pub fn from_new(data: NewAccount) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            bank_code: data.bank_code,
            bank_name: data.bank_name,
            account_number: data.account_number,
            account_type: data.account_type,
            balance: data.balance,
            is_active: data.is_active,
            last_synced_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A single transaction as decoded from a statement file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementTransaction {
    pub transaction_type: TransactionType,
    /// Always positive; direction comes from `transaction_type`
    pub amount: BigDecimal,
    pub transaction_date: DateTime<Utc>,
    pub balance_before: Option<BigDecimal>,
    pub balance_after: Option<BigDecimal>,
    pub merchant: Option<String>,
    pub description: Option<String>,
    pub reference: Option<String>,
}

impl StatementTransaction {
    pub fn new(
        transaction_type: TransactionType,
        amount: BigDecimal,
        transaction_date: DateTime<Utc>,
    ) -> Self {
        Self {
            transaction_type,
            amount,
            transaction_date,
            balance_before: None,
            balance_after: None,
            merchant: None,
            description: None,
            reference: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_balances(
        mut self,
        balance_before: Option<BigDecimal>,
        balance_after: Option<BigDecimal>,
    ) -> Self {
        self.balance_before = balance_before;
        self.balance_after = balance_after;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Account section of a parsed statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementAccountInfo {
    pub account_number: String,
    pub account_type: StatementAccountType,
    pub holder_name: Option<String>,
    /// Inclusive start of the statement period
    pub period_start: DateTime<Utc>,
    /// Inclusive end of the statement period
    pub period_end: DateTime<Utc>,
    pub opening_balance: BigDecimal,
    /// Bank-stated, authoritative
    pub closing_balance: BigDecimal,
}

/// Output of the external statement parser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedStatement {
    pub bank_code: BankCode,
    pub account: StatementAccountInfo,
    pub transactions: Vec<StatementTransaction>,
}

/// Metadata handed to the parser alongside the raw bytes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementMetadata {
    pub file_name: String,
    pub file_type: StatementFileType,
    pub bank_code: Option<BankCode>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

/// Transaction stored in the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub id: String,
    pub account_id: String,
    pub transaction_type: TransactionType,
    pub amount: BigDecimal,
    pub transaction_date: DateTime<Utc>,
    pub balance_before: Option<BigDecimal>,
    pub balance_after: Option<BigDecimal>,
    pub merchant: Option<String>,
    pub description: Option<String>,
    pub reference: Option<String>,
    pub category_id: Option<String>,
    /// Set when the transaction was created by a statement import
    pub statement_import_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Data required to create a ledger transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLedgerTransaction {
    pub account_id: String,
    pub transaction_type: TransactionType,
    pub amount: BigDecimal,
    pub transaction_date: DateTime<Utc>,
    pub balance_before: Option<BigDecimal>,
    pub balance_after: Option<BigDecimal>,
    pub merchant: Option<String>,
    pub description: Option<String>,
    pub reference: Option<String>,
    pub category_id: Option<String>,
    pub statement_import_id: Option<String>,
}

impl LedgerTransaction {
    pub fn from_new(data: NewLedgerTransaction) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            account_id: data.account_id,
            transaction_type: data.transaction_type,
            amount: data.amount,
            transaction_date: data.transaction_date,
            balance_before: data.balance_before,
            balance_after: data.balance_after,
            merchant: data.merchant,
            description: data.description,
            reference: data.reference,
            category_id: data.category_id,
            statement_import_id: data.statement_import_id,
            created_at: Utc::now(),
        }
    }
}

/// Record of a committed statement import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementImportRecord {
    pub id: String,
    pub file_name: String,
    /// Unique across all records
    pub file_fingerprint: String,
    pub bank_code: BankCode,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub transactions_imported: usize,
    pub imported_at: DateTime<Utc>,
}

/// Data required to create an import record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewStatementImport {
    pub file_name: String,
    pub file_fingerprint: String,
    pub bank_code: BankCode,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub transactions_imported: usize,
}

impl StatementImportRecord {
    pub fn from_new(data: NewStatementImport) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            file_name: data.file_name,
            file_fingerprint: data.file_fingerprint,
            bank_code: data.bank_code,
            period_start: data.period_start,
            period_end: data.period_end,
            transactions_imported: data.transactions_imported,
            imported_at: Utc::now(),
        }
    }

    /// Whether this record's period intersects `[start, end]`
    pub fn intersects(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.period_start <= end && self.period_end >= start
    }
}

/// Errors that can occur in the storage and parsing layers
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Account not found: {0}")]
    AccountNotFound(String),
    #[error("Import with fingerprint {0} already exists")]
    DuplicateFingerprint(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
