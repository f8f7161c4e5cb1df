//! Statement import workflow

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::duplicates::DuplicateDetector;
use super::fingerprint::fingerprint;
use super::locks::AccountLocks;
use super::overlap::{OverlapDetector, OverlapInfo};
use super::result::*;
use crate::config::{ImportConfig, ImportOptions};
use crate::ledger::account::AccountMatcher;
use crate::ledger::transaction::TransactionBatchBuilder;
use crate::reconciliation::BalanceReconciler;
use crate::traits::{LedgerStorage, StatementParser};
use crate::types::*;
use crate::utils::validation::validate_statement;

/// Imports bank statements into the ledger.
///
/// Each import runs five phases in order (reading, detecting duplicates,
/// importing, updating balances, complete) and reports each one to the
/// optional progress callback. Imports of the same account number are
/// serialized; the import record and its transactions are committed
/// atomically; balances are always set through [`BalanceReconciler`].
pub struct StatementImporter<P: StatementParser, S: LedgerStorage> {
    parser: P,
    storage: S,
    accounts: AccountMatcher<S>,
    duplicates: DuplicateDetector<S>,
    overlaps: OverlapDetector<S>,
    reconciler: BalanceReconciler<S>,
    locks: AccountLocks,
}

impl<P: StatementParser, S: LedgerStorage + Clone> StatementImporter<P, S> {
    pub fn new(parser: P, storage: S) -> Self {
        Self::with_config(parser, storage, ImportConfig::default())
    }

    pub fn with_config(parser: P, storage: S, config: ImportConfig) -> Self {
        Self {
            parser,
            accounts: AccountMatcher::new(storage.clone()),
            duplicates: DuplicateDetector::with_config(storage.clone(), config.matching),
            overlaps: OverlapDetector::new(storage.clone()),
            reconciler: BalanceReconciler::with_config(storage.clone(), config.reconciliation),
            storage,
            locks: AccountLocks::new(),
        }
    }

    /// Share account locks with other importers over the same storage
    pub fn with_locks(mut self, locks: AccountLocks) -> Self {
        self.locks = locks;
        self
    }
}

impl<P: StatementParser, S: LedgerStorage> StatementImporter<P, S> {
    /// Import a statement file.
    ///
    /// Never fails: expected problems are reported in [`ImportResult::errors`]
    /// and anything else becomes a single [`ImportErrorKind::Unexpected`] entry.
    pub async fn import_statement(
        &self,
        input: &FileImportInput,
        options: ImportOptions,
        progress: Option<&ProgressCallback>,
    ) -> ImportResult {
        info!(
            file = %input.file_name,
            dry_run = options.dry_run,
            "Starting statement import"
        );

        let result = match self.run_import(input, options, progress).await {
            Ok(result) => result,
            Err(e) => {
                warn!(file = %input.file_name, error = %e, "Statement import aborted");
                ImportResult::failure(ImportError::new(
                    ImportErrorKind::Unexpected,
                    format!("Unexpected error during import: {}", e),
                ))
            }
        };

        info!(
            file = %input.file_name,
            success = result.success,
            imported = result.transactions.imported,
            duplicates = result.transactions.duplicates,
            "Statement import finished"
        );
        result
    }

    /// Dry-run import: the full result without persisting anything
    pub async fn preview_import(&self, input: &FileImportInput) -> ImportResult {
        self.import_statement(input, ImportOptions::dry_run(), None).await
    }

    /// Whether a file with identical bytes was already committed
    pub async fn check_file_already_imported(&self, data: &[u8]) -> LedgerResult<bool> {
        Ok(self
            .storage
            .find_import_by_fingerprint(&fingerprint(data))
            .await?
            .is_some())
    }

    pub async fn check_period_overlaps(
        &self,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        bank_code: Option<BankCode>,
    ) -> LedgerResult<Vec<OverlapInfo>> {
        self.overlaps
            .find_overlaps(period_start, period_end, bank_code)
            .await
    }

    /// Committed imports, most recent first
    pub async fn import_history(
        &self,
        bank_code: Option<BankCode>,
    ) -> LedgerResult<Vec<StatementImportRecord>> {
        self.storage.list_imports(bank_code).await
    }

    /// Read-only balance helpers over the same storage
    pub fn reconciler(&self) -> &BalanceReconciler<S> {
        &self.reconciler
    }

    async fn run_import(
        &self,
        input: &FileImportInput,
        options: ImportOptions,
        progress: Option<&ProgressCallback>,
    ) -> LedgerResult<ImportResult> {
        let file_name = input.file_name.as_str();
        notify(progress, ImportPhase::Reading, "Reading file...", file_name);

        let statement = match self.parse(input).await {
            Ok(statement) => statement,
            Err(e) => {
                warn!(file = file_name, error = %e, "Statement could not be parsed");
                return Ok(ImportResult::failure(ImportError::new(
                    ImportErrorKind::Parse,
                    format!("Failed to parse statement file: {}", e),
                )));
            }
        };
        let info = &statement.account;

        let _guard = self.locks.acquire(&info.account_number).await;

        let file_fingerprint = fingerprint(&input.data);
        if let Some(existing) = self.storage.find_import_by_fingerprint(&file_fingerprint).await? {
            warn!(
                file = file_name,
                import_id = %existing.id,
                "Statement was already imported"
            );
            return Ok(ImportResult::failure(ImportError::new(
                ImportErrorKind::AlreadyImported,
                "This statement has already been imported",
            )));
        }

        notify(
            progress,
            ImportPhase::DetectingDuplicates,
            "Checking for duplicate transactions...",
            file_name,
        );

        let matched = match self
            .accounts
            .resolve(
                statement.bank_code,
                &info.account_number,
                info.account_type,
                options.dry_run,
            )
            .await
        {
            Ok(matched) => matched,
            Err(e) => {
                warn!(file = file_name, error = %e, "Account resolution failed");
                let mut result = ImportResult::failure(ImportError::new(
                    ImportErrorKind::AccountResolution,
                    format!("Failed to find or create account: {}", e),
                ));
                result.bank_code = Some(statement.bank_code);
                result.period_start = Some(info.period_start);
                result.period_end = Some(info.period_end);
                result.transactions.total = statement.transactions.len();
                return Ok(finish(result));
            }
        };
        let account = matched.account;

        let dedup = self
            .duplicates
            .detect(
                &statement.transactions,
                &account.id,
                info.period_start,
                info.period_end,
                Some(statement.bank_code),
            )
            .await?;

        let total = statement.transactions.len();
        let duplicate_count = dedup.duplicates.len();
        let mut result = ImportResult {
            success: false,
            statement_import_id: None,
            transactions: TransactionCounts {
                total,
                imported: 0,
                skipped: 0,
                duplicates: duplicate_count,
            },
            account: Some(AccountSummary {
                id: account.id.clone(),
                account_number: account.account_number.clone(),
                previous_balance: None,
                new_balance: account.balance.clone(),
            }),
            bank_code: Some(statement.bank_code),
            period_start: Some(info.period_start),
            period_end: Some(info.period_end),
            errors: Vec::new(),
            duplicates: dedup.duplicates,
            period_overlaps: dedup.period_overlaps,
            reconciliation: None,
        };

        if !options.allow_period_overlap && !result.period_overlaps.is_empty() {
            let files: Vec<&str> = result
                .period_overlaps
                .iter()
                .map(|overlap| overlap.file_name.as_str())
                .collect();
            let message = format!(
                "Statement period overlaps with previously imported statements: {}",
                files.join(", ")
            );
            warn!(file = file_name, overlaps = files.len(), "Import rejected for period overlap");
            result.errors.push(ImportError::new(ImportErrorKind::PeriodOverlap, message));
            return Ok(finish(result));
        }

        let selected = if options.skip_duplicates {
            dedup.unique_transactions
        } else {
            statement.transactions.clone()
        };

        // Balance checks run against the ledger as it was before this import
        let pending = if options.update_account_balance {
            Some(
                self.reconciler
                    .assess(&account.id, info, &statement.transactions, options.dry_run)
                    .await?,
            )
        } else {
            None
        };

        notify(
            progress,
            ImportPhase::Importing,
            format!("Importing {} transactions...", selected.len()),
            file_name,
        );

        let mut committed = true;
        if options.dry_run {
            result.transactions.imported = selected.len();
        } else if !selected.is_empty() {
            let record = NewStatementImport {
                file_name: input.file_name.clone(),
                file_fingerprint,
                bank_code: statement.bank_code,
                period_start: info.period_start,
                period_end: info.period_end,
                transactions_imported: selected.len(),
            };
            let outcome = match TransactionBatchBuilder::new(account.id.clone())
                .extend(&selected)
                .build()
            {
                Ok(batch) => self.storage.commit_import(record, batch).await,
                Err(e) => Err(e),
            };
            match outcome {
                Ok(done) => {
                    debug!(
                        import_id = %done.record.id,
                        transactions = done.transactions.len(),
                        "Committed statement import"
                    );
                    result.transactions.imported = done.transactions.len();
                    result.statement_import_id = Some(done.record.id);
                }
                Err(e) => {
                    warn!(file = file_name, error = %e, "Import commit failed");
                    committed = false;
                    result.errors.push(ImportError::new(
                        ImportErrorKind::Persistence,
                        format!("Failed to import transactions: {}", e),
                    ));
                }
            }
        }

        notify(
            progress,
            ImportPhase::UpdatingBalances,
            "Updating account balance...",
            file_name,
        );

        if let (true, Some(pending)) = (committed, pending) {
            let summary = self.reconciler.apply(pending, options.dry_run).await;
            if let (Some(account), Some(reconciled)) = (result.account.as_mut(), summary.result.as_ref()) {
                account.previous_balance = Some(reconciled.previous_balance.clone());
                account.new_balance = reconciled.new_balance.clone();
            }
            result.errors.extend(
                summary
                    .errors
                    .iter()
                    .map(|e| ImportError::new(ImportErrorKind::Reconciliation, e.to_string())),
            );
            result.reconciliation = Some(summary);
        } else if committed && !options.dry_run && result.transactions.imported > 0 {
            if let Err(e) = self.accounts.touch(&account.id).await {
                warn!(account_id = %account.id, error = %e, "Could not mark account as synced");
                result.errors.push(ImportError::new(
                    ImportErrorKind::Persistence,
                    format!("Failed to update account sync time: {}", e),
                ));
            }
        }

        notify(progress, ImportPhase::Complete, "Import complete", file_name);

        Ok(finish(result))
    }

    async fn parse(&self, input: &FileImportInput) -> LedgerResult<ParsedStatement> {
        let statement = self.parser.parse(&input.data, &input.metadata()).await?;
        validate_statement(&statement)?;
        Ok(statement)
    }
}

fn notify(
    progress: Option<&ProgressCallback>,
    phase: ImportPhase,
    message: impl Into<String>,
    file_name: &str,
) {
    let progress_event = ImportProgress::new(phase, message, file_name);
    debug!(phase = ?phase, step = progress_event.current_step, "{}", progress_event.message);
    if let Some(callback) = progress {
        callback(&progress_event);
    }
}

/// Fill in derived fields
fn finish(mut result: ImportResult) -> ImportResult {
    let counts = &mut result.transactions;
    counts.skipped = counts
        .total
        .saturating_sub(counts.imported + counts.duplicates);
    result.success = result.errors.is_empty();
    result
}
