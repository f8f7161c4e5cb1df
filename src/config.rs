//! Import options and tuning knobs

use bigdecimal::BigDecimal;
use chrono::Duration;
use serde::{Deserialize, Serialize};

/// One hundredth, the smallest meaningful difference between two amounts
pub fn cent() -> BigDecimal {
    BigDecimal::new(1.into(), 2)
}

/// Per-call options for [`crate::StatementImporter::import_statement`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    /// Commit only transactions not already present in the ledger
    pub skip_duplicates: bool,
    /// Reconcile the account balance against the statement's closing balance
    pub update_account_balance: bool,
    /// Compute the full result without persisting anything
    pub dry_run: bool,
    /// When false, any overlap with a previously imported period rejects the import
    pub allow_period_overlap: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            skip_duplicates: true,
            update_account_balance: true,
            dry_run: false,
            allow_period_overlap: true,
        }
    }
}

impl ImportOptions {
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            ..Self::default()
        }
    }
}

/// Duplicate matching tolerances
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub amount_tolerance: BigDecimal,
    pub time_tolerance_secs: i64,
    /// Days added on each side of the statement period when loading existing entries
    pub search_padding_days: i64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            amount_tolerance: cent(),
            time_tolerance_secs: 60,
            search_padding_days: 1,
        }
    }
}

impl MatchingConfig {
    pub fn time_tolerance(&self) -> Duration {
        Duration::seconds(self.time_tolerance_secs)
    }

    pub fn search_padding(&self) -> Duration {
        Duration::days(self.search_padding_days)
    }
}

/// Reconciliation thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconciliationConfig {
    pub discrepancy_threshold: BigDecimal,
    pub stale_after_days: i64,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            discrepancy_threshold: cent(),
            stale_after_days: 30,
        }
    }
}

/// Engine-wide configuration, injected once at construction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub matching: MatchingConfig,
    pub reconciliation: ReconciliationConfig,
}
