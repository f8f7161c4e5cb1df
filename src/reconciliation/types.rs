//! Reconciliation results, errors and warnings

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a reported balance came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceSource {
    /// Bank-stated closing balance of a statement
    StatementClosing,
    /// Running balance of the most recent ledger entry that carries one
    LatestTransaction,
    /// Sum of inflows minus outflows over the whole ledger
    Calculated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    pub account_id: String,
    pub previous_balance: BigDecimal,
    pub new_balance: BigDecimal,
    pub balance_source: BalanceSource,
    /// Absolute difference between the previous and new balance
    pub discrepancy: BigDecimal,
    pub reconciled_at: DateTime<Utc>,
    pub statement_period_end: DateTime<Utc>,
}

/// Fatal reconciliation outcomes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ReconciliationError {
    #[error("Account with ID {account_id} not found")]
    AccountNotFound { account_id: String },
    #[error("Statement closing balance {balance} is not a valid balance")]
    InvalidBalance { balance: BigDecimal },
    #[error("Failed to update account balance: {reason}")]
    BalanceUpdateFailed { reason: String },
}

impl ReconciliationError {
    pub fn code(&self) -> &'static str {
        match self {
            ReconciliationError::AccountNotFound { .. } => "account_not_found",
            ReconciliationError::InvalidBalance { .. } => "invalid_balance",
            ReconciliationError::BalanceUpdateFailed { .. } => "balance_update_failed",
        }
    }
}

/// Non-fatal findings that deserve the user's attention
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ReconciliationWarning {
    BalanceDiscrepancy {
        previous_balance: BigDecimal,
        statement_closing_balance: BigDecimal,
        /// `statement_closing_balance - previous_balance`
        difference: BigDecimal,
    },
    /// The ledger already holds entries newer than the statement
    FutureTransactionsExist {
        count: usize,
        statement_period_end: DateTime<Utc>,
    },
    StaleReconciliation {
        last_reconciliation_date: DateTime<Utc>,
        days_since_reconciliation: i64,
    },
}

impl ReconciliationWarning {
    pub fn code(&self) -> &'static str {
        match self {
            ReconciliationWarning::BalanceDiscrepancy { .. } => "balance_discrepancy",
            ReconciliationWarning::FutureTransactionsExist { .. } => "future_transactions_exist",
            ReconciliationWarning::StaleReconciliation { .. } => "stale_reconciliation",
        }
    }

    pub fn message(&self) -> String {
        match self {
            ReconciliationWarning::BalanceDiscrepancy { difference, .. } => format!(
                "Balance differs by {} from statement",
                difference.abs().round(2)
            ),
            ReconciliationWarning::FutureTransactionsExist { count, .. } => {
                format!("{} transactions exist after statement period end", count)
            }
            ReconciliationWarning::StaleReconciliation {
                days_since_reconciliation,
                ..
            } => format!(
                "Last reconciliation was {} days before statement period end",
                days_since_reconciliation
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationSummary {
    pub success: bool,
    pub result: Option<ReconciliationResult>,
    pub errors: Vec<ReconciliationError>,
    pub warnings: Vec<ReconciliationWarning>,
}

impl ReconciliationSummary {
    pub(crate) fn failed(error: ReconciliationError, warnings: Vec<ReconciliationWarning>) -> Self {
        Self {
            success: false,
            result: None,
            errors: vec![error],
            warnings,
        }
    }
}

/// Read-only half of a reconciliation, computed before anything is written
#[derive(Debug, Clone, PartialEq)]
pub enum PendingReconciliation {
    Ready {
        account_id: String,
        previous_balance: BigDecimal,
        new_balance: BigDecimal,
        discrepancy: BigDecimal,
        statement_period_end: DateTime<Utc>,
        warnings: Vec<ReconciliationWarning>,
    },
    /// The balance must not be applied
    Rejected(ReconciliationSummary),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointSource {
    Transaction,
    Statement,
}

/// A known balance at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceCheckpoint {
    pub date: DateTime<Utc>,
    pub balance: BigDecimal,
    pub source: CheckpointSource,
    pub transaction_id: String,
    pub statement_import_id: Option<String>,
}

/// Break in the running-balance chain between two adjacent transactions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunningBalanceDiscrepancy {
    /// Position of the later transaction in date order
    pub index: usize,
    /// Balance after the earlier transaction
    pub expected: BigDecimal,
    /// Balance before the later transaction
    pub actual: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunningBalanceCheck {
    pub valid: bool,
    pub discrepancies: Vec<RunningBalanceDiscrepancy>,
}
