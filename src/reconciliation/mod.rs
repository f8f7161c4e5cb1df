//! Balance reconciliation against bank statements
//!
//! [`BalanceReconciler`] aligns a ledger account's balance with the
//! authoritative closing balance of a statement and reports anything that
//! suggests the ledger and the bank disagree.

pub mod types;

pub use types::*;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::config::ReconciliationConfig;
use crate::ledger::transaction::net_amount;
use crate::traits::{AccountStore, TransactionStore};
use crate::types::*;
use crate::utils::validation::validate_balance;

/// Reconciliation engine over an account and transaction store
pub struct BalanceReconciler<S: AccountStore + TransactionStore> {
    storage: S,
    config: ReconciliationConfig,
}

impl<S: AccountStore + TransactionStore> BalanceReconciler<S> {
    pub fn new(storage: S) -> Self {
        Self::with_config(storage, ReconciliationConfig::default())
    }

    pub fn with_config(storage: S, config: ReconciliationConfig) -> Self {
        Self { storage, config }
    }

    /// Reconcile `account_id` against a statement's closing balance.
    ///
    /// Expected failures are reported in the summary. `Err` is reserved for
    /// storage reads that fail outright. A dry run performs the same reads
    /// and warning checks but never writes; a missing account is then
    /// treated as a new one with a zero balance.
    pub async fn reconcile(
        &self,
        account_id: &str,
        statement: &StatementAccountInfo,
        transactions: &[StatementTransaction],
        dry_run: bool,
    ) -> LedgerResult<ReconciliationSummary> {
        let pending = self.assess(account_id, statement, transactions, dry_run).await?;
        Ok(self.apply(pending, dry_run).await)
    }

    /// Run every read-only check of [`reconcile`](Self::reconcile) without writing.
    ///
    /// Importers call this before committing a statement's transactions, so
    /// the checks see the ledger as it was before the import.
    pub async fn assess(
        &self,
        account_id: &str,
        statement: &StatementAccountInfo,
        transactions: &[StatementTransaction],
        dry_run: bool,
    ) -> LedgerResult<PendingReconciliation> {
        let account = self.storage.find_account_by_id(account_id).await?;
        let previous_balance = match (&account, dry_run) {
            (Some(account), _) => account.balance.clone(),
            (None, true) => BigDecimal::from(0),
            (None, false) => {
                return Ok(PendingReconciliation::Rejected(ReconciliationSummary::failed(
                    ReconciliationError::AccountNotFound {
                        account_id: account_id.to_string(),
                    },
                    Vec::new(),
                )));
            }
        };

        let closing_balance = &statement.closing_balance;
        if validate_balance(closing_balance).is_err() {
            return Ok(PendingReconciliation::Rejected(ReconciliationSummary::failed(
                ReconciliationError::InvalidBalance {
                    balance: closing_balance.clone(),
                },
                Vec::new(),
            )));
        }

        let mut warnings = Vec::new();

        let difference = closing_balance - &previous_balance;
        let discrepancy = difference.abs();
        if discrepancy > self.config.discrepancy_threshold {
            warnings.push(ReconciliationWarning::BalanceDiscrepancy {
                previous_balance: previous_balance.clone(),
                statement_closing_balance: closing_balance.clone(),
                difference,
            });
        }

        let future_count = self
            .storage
            .find_transactions(account_id, Some(statement.period_end), None)
            .await?
            .iter()
            .filter(|txn| txn.transaction_date > statement.period_end)
            .count();
        if future_count > 0 {
            warnings.push(ReconciliationWarning::FutureTransactionsExist {
                count: future_count,
                statement_period_end: statement.period_end,
            });
        }

        if let Some(latest) = self.storage.latest_with_balance(account_id, None).await? {
            let last = latest.transaction_date;
            if last < statement.period_end {
                let days = (statement.period_end - last).num_days();
                if days > self.config.stale_after_days {
                    warnings.push(ReconciliationWarning::StaleReconciliation {
                        last_reconciliation_date: last,
                        days_since_reconciliation: days,
                    });
                }
            }
        }

        let continuity = validate_running_balances(transactions, &self.config.discrepancy_threshold);
        if !continuity.valid {
            warn!(
                account_id,
                breaks = continuity.discrepancies.len(),
                "Statement running balances are not continuous"
            );
        }

        for warning in &warnings {
            warn!(account_id, code = warning.code(), "{}", warning.message());
        }

        Ok(PendingReconciliation::Ready {
            account_id: account_id.to_string(),
            previous_balance,
            new_balance: closing_balance.clone(),
            discrepancy,
            statement_period_end: statement.period_end,
            warnings,
        })
    }

    /// Write the balance of an assessed reconciliation. Dry runs only build the summary.
    pub async fn apply(&self, pending: PendingReconciliation, dry_run: bool) -> ReconciliationSummary {
        let (account_id, previous_balance, new_balance, discrepancy, statement_period_end, warnings) =
            match pending {
                PendingReconciliation::Rejected(summary) => return summary,
                PendingReconciliation::Ready {
                    account_id,
                    previous_balance,
                    new_balance,
                    discrepancy,
                    statement_period_end,
                    warnings,
                } => (
                    account_id,
                    previous_balance,
                    new_balance,
                    discrepancy,
                    statement_period_end,
                    warnings,
                ),
            };

        if !dry_run {
            if let Err(e) = self
                .storage
                .update_balance(&account_id, &new_balance, Utc::now())
                .await
            {
                warn!(account_id = %account_id, error = %e, "Balance update failed");
                return ReconciliationSummary::failed(
                    ReconciliationError::BalanceUpdateFailed {
                        reason: e.to_string(),
                    },
                    warnings,
                );
            }
        }

        debug!(
            account_id = %account_id,
            dry_run,
            previous = %previous_balance,
            new = %new_balance,
            "Reconciled account balance"
        );

        ReconciliationSummary {
            success: true,
            result: Some(ReconciliationResult {
                account_id,
                previous_balance,
                new_balance,
                balance_source: BalanceSource::StatementClosing,
                discrepancy,
                reconciled_at: Utc::now(),
                statement_period_end,
            }),
            errors: Vec::new(),
            warnings,
        }
    }

    /// Running balance of the latest entry at or before `date`
    pub async fn balance_at_date(
        &self,
        account_id: &str,
        date: DateTime<Utc>,
    ) -> LedgerResult<Option<BigDecimal>> {
        Ok(self
            .storage
            .latest_with_balance(account_id, Some(date))
            .await?
            .and_then(|txn| txn.balance_after))
    }

    /// Inflows minus outflows over every ledger entry of the account
    pub async fn calculated_balance(&self, account_id: &str) -> LedgerResult<BigDecimal> {
        let transactions = self.storage.find_transactions(account_id, None, None).await?;
        Ok(net_amount(&transactions))
    }

    /// Best available balance: the latest running balance, else the calculated one
    pub async fn expected_balance(&self, account_id: &str) -> LedgerResult<(BigDecimal, BalanceSource)> {
        if let Some(balance) = self
            .storage
            .latest_with_balance(account_id, None)
            .await?
            .and_then(|txn| txn.balance_after)
        {
            return Ok((balance, BalanceSource::LatestTransaction));
        }
        Ok((self.calculated_balance(account_id).await?, BalanceSource::Calculated))
    }

    /// Known balances within `[start, end]`, oldest first
    pub async fn balance_checkpoints(
        &self,
        account_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> LedgerResult<Vec<BalanceCheckpoint>> {
        let transactions = self
            .storage
            .find_transactions(account_id, Some(start), Some(end))
            .await?;

        let mut checkpoints: Vec<BalanceCheckpoint> = transactions
            .into_iter()
            .filter_map(|txn| {
                let balance = txn.balance_after?;
                let source = if txn.statement_import_id.is_some() {
                    CheckpointSource::Statement
                } else {
                    CheckpointSource::Transaction
                };
                Some(BalanceCheckpoint {
                    date: txn.transaction_date,
                    balance,
                    source,
                    transaction_id: txn.id,
                    statement_import_id: txn.statement_import_id,
                })
            })
            .collect();
        checkpoints.sort_by_key(|checkpoint| checkpoint.date);
        Ok(checkpoints)
    }
}

/// Check that each transaction starts where the previous one (by date) ended.
///
/// Pairs missing either balance are skipped.
pub fn validate_running_balances(
    transactions: &[StatementTransaction],
    tolerance: &BigDecimal,
) -> RunningBalanceCheck {
    let mut sorted: Vec<&StatementTransaction> = transactions.iter().collect();
    sorted.sort_by_key(|txn| txn.transaction_date);

    let discrepancies: Vec<RunningBalanceDiscrepancy> = sorted
        .windows(2)
        .enumerate()
        .filter_map(|(i, pair)| {
            let expected = pair[0].balance_after.as_ref()?;
            let actual = pair[1].balance_before.as_ref()?;
            ((expected - actual).abs() > *tolerance).then(|| RunningBalanceDiscrepancy {
                index: i + 1,
                expected: expected.clone(),
                actual: actual.clone(),
            })
        })
        .collect();

    RunningBalanceCheck {
        valid: discrepancies.is_empty(),
        discrepancies,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::cent;
    use crate::utils::memory_storage::{MemoryStorage, StorageOp};
    use chrono::TimeZone;
    use std::str::FromStr;

    fn day(month: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, month, d, 12, 0, 0).unwrap()
    }

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn statement(closing: &str) -> StatementAccountInfo {
        StatementAccountInfo {
            account_number: "4455".to_string(),
            account_type: StatementAccountType::Savings,
            holder_name: None,
            period_start: day(3, 1),
            period_end: day(3, 31),
            opening_balance: BigDecimal::from(0),
            closing_balance: dec(closing),
        }
    }

    async fn account_with_balance(storage: &MemoryStorage, balance: &str) -> Account {
        let account = storage
            .create_account(NewAccount {
                bank_code: BankCode::Davivienda,
                bank_name: "Davivienda".to_string(),
                account_number: "4455".to_string(),
                account_type: AccountType::Savings,
                balance: BigDecimal::from(0),
                is_active: true,
            })
            .await
            .unwrap();
        storage
            .update_balance(&account.id, &dec(balance), day(1, 1))
            .await
            .unwrap();
        account
    }

    async fn ledger_entry(
        storage: &MemoryStorage,
        account_id: &str,
        date: DateTime<Utc>,
        amount: i64,
        balance_after: Option<i64>,
        import_id: Option<&str>,
    ) {
        let txn = StatementTransaction::new(TransactionType::Income, BigDecimal::from(amount), date)
            .with_balances(None, balance_after.map(BigDecimal::from));
        storage
            .create_transactions(vec![NewLedgerTransaction::from_statement(
                &txn, account_id, import_id,
            )])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_reconcile_updates_balance() {
        let storage = MemoryStorage::new();
        let account = account_with_balance(&storage, "1000000").await;
        let reconciler = BalanceReconciler::new(storage.clone());

        let summary = reconciler
            .reconcile(&account.id, &statement("1000000.01"), &[], false)
            .await
            .unwrap();

        assert!(summary.success);
        assert!(summary.warnings.is_empty());
        let result = summary.result.unwrap();
        assert_eq!(result.previous_balance, dec("1000000"));
        assert_eq!(result.new_balance, dec("1000000.01"));
        assert_eq!(result.discrepancy, dec("0.01"));
        assert_eq!(result.balance_source, BalanceSource::StatementClosing);

        let stored = storage.find_account_by_id(&account.id).await.unwrap().unwrap();
        assert_eq!(stored.balance, dec("1000000.01"));
        assert!(stored.last_synced_at.unwrap() > day(1, 1));
    }

    #[tokio::test]
    async fn test_discrepancy_just_over_threshold() {
        let storage = MemoryStorage::new();
        let account = account_with_balance(&storage, "1000000").await;
        let reconciler = BalanceReconciler::new(storage);

        let summary = reconciler
            .reconcile(&account.id, &statement("1000000.02"), &[], false)
            .await
            .unwrap();

        assert!(summary.success);
        assert_eq!(summary.warnings.len(), 1);
        assert_eq!(summary.warnings[0].code(), "balance_discrepancy");
    }

    #[tokio::test]
    async fn test_large_discrepancy_carries_signed_difference() {
        let storage = MemoryStorage::new();
        let account = account_with_balance(&storage, "1000000").await;
        let reconciler = BalanceReconciler::new(storage);

        let summary = reconciler
            .reconcile(&account.id, &statement("1500000"), &[], false)
            .await
            .unwrap();

        match &summary.warnings[0] {
            ReconciliationWarning::BalanceDiscrepancy {
                previous_balance,
                statement_closing_balance,
                difference,
            } => {
                assert_eq!(*previous_balance, dec("1000000"));
                assert_eq!(*statement_closing_balance, dec("1500000"));
                assert_eq!(*difference, BigDecimal::from(500000));
            }
            other => panic!("unexpected warning {:?}", other),
        }
        assert!(summary.warnings[0].message().contains("500000"));
    }

    #[tokio::test]
    async fn test_future_transactions_warning() {
        let storage = MemoryStorage::new();
        let account = account_with_balance(&storage, "500").await;
        ledger_entry(&storage, &account.id, day(3, 31), 10, None, None).await;
        ledger_entry(&storage, &account.id, day(4, 2), 10, None, None).await;
        ledger_entry(&storage, &account.id, day(4, 9), 10, None, None).await;
        let reconciler = BalanceReconciler::new(storage);

        let summary = reconciler
            .reconcile(&account.id, &statement("500"), &[], false)
            .await
            .unwrap();

        assert_eq!(
            summary.warnings,
            vec![ReconciliationWarning::FutureTransactionsExist {
                count: 2,
                statement_period_end: day(3, 31),
            }]
        );
    }

    #[tokio::test]
    async fn test_stale_reconciliation_warning() {
        let storage = MemoryStorage::new();
        let account = account_with_balance(&storage, "500").await;
        ledger_entry(&storage, &account.id, day(2, 10), 10, Some(500), None).await;
        let reconciler = BalanceReconciler::new(storage);

        let summary = reconciler
            .reconcile(&account.id, &statement("500"), &[], false)
            .await
            .unwrap();

        match &summary.warnings[..] {
            [ReconciliationWarning::StaleReconciliation {
                last_reconciliation_date,
                days_since_reconciliation,
            }] => {
                assert_eq!(*last_reconciliation_date, day(2, 10));
                assert_eq!(*days_since_reconciliation, 50);
            }
            other => panic!("unexpected warnings {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_recent_running_balance_is_not_stale() {
        let storage = MemoryStorage::new();
        let account = account_with_balance(&storage, "500").await;
        ledger_entry(&storage, &account.id, day(3, 5), 10, Some(500), None).await;
        let reconciler = BalanceReconciler::new(storage);

        let summary = reconciler
            .reconcile(&account.id, &statement("500"), &[], false)
            .await
            .unwrap();
        assert!(summary.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_account_not_found() {
        let reconciler = BalanceReconciler::new(MemoryStorage::new());

        let summary = reconciler
            .reconcile("missing", &statement("10"), &[], false)
            .await
            .unwrap();

        assert!(!summary.success);
        assert!(summary.result.is_none());
        assert_eq!(summary.errors[0].code(), "account_not_found");
    }

    #[tokio::test]
    async fn test_invalid_closing_balance() {
        let storage = MemoryStorage::new();
        let account = account_with_balance(&storage, "10").await;
        let reconciler = BalanceReconciler::new(storage.clone());

        let summary = reconciler
            .reconcile(&account.id, &statement("1000000000000000"), &[], false)
            .await
            .unwrap();

        assert!(!summary.success);
        assert_eq!(summary.errors[0].code(), "invalid_balance");
        let stored = storage.find_account_by_id(&account.id).await.unwrap().unwrap();
        assert_eq!(stored.balance, dec("10"));
    }

    #[tokio::test]
    async fn test_balance_update_failure_keeps_warnings() {
        let storage = MemoryStorage::new();
        let account = account_with_balance(&storage, "100").await;
        storage.inject_failure(StorageOp::UpdateBalance);
        let reconciler = BalanceReconciler::new(storage);

        let summary = reconciler
            .reconcile(&account.id, &statement("200"), &[], false)
            .await
            .unwrap();

        assert!(!summary.success);
        assert_eq!(summary.errors[0].code(), "balance_update_failed");
        assert_eq!(summary.warnings[0].code(), "balance_discrepancy");
    }

    #[tokio::test]
    async fn test_dry_run_reads_real_balance_without_writing() {
        let storage = MemoryStorage::new();
        let account = account_with_balance(&storage, "750").await;
        let writes = storage.write_count();
        let reconciler = BalanceReconciler::new(storage.clone());

        let summary = reconciler
            .reconcile(&account.id, &statement("900"), &[], true)
            .await
            .unwrap();

        assert!(summary.success);
        let result = summary.result.unwrap();
        assert_eq!(result.previous_balance, dec("750"));
        assert_eq!(result.new_balance, dec("900"));
        assert_eq!(summary.warnings[0].code(), "balance_discrepancy");
        assert_eq!(storage.write_count(), writes);
    }

    #[tokio::test]
    async fn test_dry_run_for_unknown_account_starts_at_zero() {
        let storage = MemoryStorage::new();
        let reconciler = BalanceReconciler::new(storage.clone());

        let summary = reconciler
            .reconcile(crate::ledger::account::DRY_RUN_ACCOUNT_ID, &statement("900"), &[], true)
            .await
            .unwrap();

        assert!(summary.success);
        assert_eq!(summary.result.unwrap().previous_balance, BigDecimal::from(0));
        assert_eq!(storage.write_count(), 0);
    }

    #[tokio::test]
    async fn test_assessment_sees_ledger_before_new_entries() {
        let storage = MemoryStorage::new();
        let account = account_with_balance(&storage, "500").await;
        ledger_entry(&storage, &account.id, day(1, 2), 10, Some(500), None).await;
        let reconciler = BalanceReconciler::new(storage.clone());

        let pending = reconciler
            .assess(&account.id, &statement("500"), &[], false)
            .await
            .unwrap();
        ledger_entry(&storage, &account.id, day(3, 30), 10, Some(500), Some("imp-1")).await;
        let summary = reconciler.apply(pending, false).await;

        assert!(summary.success);
        assert_eq!(summary.warnings.len(), 1);
        assert_eq!(summary.warnings[0].code(), "stale_reconciliation");

        let after = reconciler
            .reconcile(&account.id, &statement("500"), &[], false)
            .await
            .unwrap();
        assert!(after.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_assessment_writes_nothing() {
        let storage = MemoryStorage::new();
        let account = account_with_balance(&storage, "10").await;
        let writes = storage.write_count();
        let reconciler = BalanceReconciler::new(storage.clone());

        let pending = reconciler
            .assess(&account.id, &statement("1000000000000000"), &[], false)
            .await
            .unwrap();
        assert!(matches!(pending, PendingReconciliation::Rejected(_)));

        let summary = reconciler.apply(pending, false).await;
        assert_eq!(summary.errors[0].code(), "invalid_balance");
        assert_eq!(storage.write_count(), writes);
    }

    #[tokio::test]
    async fn test_balance_helpers() {
        let storage = MemoryStorage::new();
        let account = account_with_balance(&storage, "0").await;
        ledger_entry(&storage, &account.id, day(3, 1), 100, Some(100), Some("imp-1")).await;
        ledger_entry(&storage, &account.id, day(3, 10), 50, None, None).await;
        ledger_entry(&storage, &account.id, day(3, 20), 25, Some(175), None).await;
        let reconciler = BalanceReconciler::new(storage);

        assert_eq!(
            reconciler.balance_at_date(&account.id, day(3, 15)).await.unwrap(),
            Some(BigDecimal::from(100))
        );
        assert_eq!(reconciler.balance_at_date(&account.id, day(2, 1)).await.unwrap(), None);
        assert_eq!(
            reconciler.calculated_balance(&account.id).await.unwrap(),
            BigDecimal::from(175)
        );
        assert_eq!(
            reconciler.expected_balance(&account.id).await.unwrap(),
            (BigDecimal::from(175), BalanceSource::LatestTransaction)
        );

        let checkpoints = reconciler
            .balance_checkpoints(&account.id, day(3, 1), day(3, 31))
            .await
            .unwrap();
        assert_eq!(checkpoints.len(), 2);
        assert_eq!(checkpoints[0].source, CheckpointSource::Statement);
        assert_eq!(checkpoints[0].statement_import_id.as_deref(), Some("imp-1"));
        assert_eq!(checkpoints[1].source, CheckpointSource::Transaction);
        assert_eq!(checkpoints[1].balance, BigDecimal::from(175));
    }

    #[tokio::test]
    async fn test_expected_balance_falls_back_to_calculated() {
        let storage = MemoryStorage::new();
        let account = account_with_balance(&storage, "0").await;
        ledger_entry(&storage, &account.id, day(3, 1), 40, None, None).await;
        let reconciler = BalanceReconciler::new(storage);

        assert_eq!(
            reconciler.expected_balance(&account.id).await.unwrap(),
            (BigDecimal::from(40), BalanceSource::Calculated)
        );
    }

    #[test]
    fn test_running_balance_continuity() {
        let txn = |d: u32, before: &str, after: &str| {
            StatementTransaction::new(TransactionType::Expense, BigDecimal::from(1), day(5, d))
                .with_balances(Some(dec(before)), Some(dec(after)))
        };
        let transactions = vec![
            txn(3, "99", "98"),
            txn(1, "100", "99"),
            txn(4, "97", "96"),
            StatementTransaction::new(TransactionType::Income, BigDecimal::from(1), day(5, 5)),
        ];

        let check = validate_running_balances(&transactions, &cent());
        assert!(!check.valid);
        assert_eq!(
            check.discrepancies,
            vec![RunningBalanceDiscrepancy {
                index: 2,
                expected: dec("98"),
                actual: dec("97"),
            }]
        );

        assert!(validate_running_balances(&transactions[..2], &cent()).valid);
        assert!(validate_running_balances(&[], &cent()).valid);
    }
}
