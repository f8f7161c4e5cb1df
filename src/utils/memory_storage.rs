//! In-memory storage implementation for testing

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::traits::*;
use crate::types::*;

/// Storage operations that can be made to fail on purpose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageOp {
    Read,
    CreateAccount,
    UpdateBalance,
    UpdateLastSynced,
    CreateTransactions,
    CreateImport,
    CommitImport,
}

#[derive(Debug, Default)]
struct MemoryState {
    accounts: Vec<Account>,
    transactions: Vec<LedgerTransaction>,
    imports: Vec<StatementImportRecord>,
}

/// In-memory storage implementation for testing and development
///
/// All tables live behind one lock, so [`LedgerStorage::commit_import`] is
/// atomic. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    state: Arc<RwLock<MemoryState>>,
    writes: Arc<AtomicUsize>,
    failures: Arc<RwLock<HashSet<StorageOp>>>,
}

impl MemoryStorage {
    /// Create a new memory storage instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) {
        if let Ok(mut state) = self.state.write() {
            *state = MemoryState::default();
        }
        self.writes.store(0, Ordering::SeqCst);
    }

    /// Make every subsequent `op` fail with a storage error
    pub fn inject_failure(&self, op: StorageOp) {
        if let Ok(mut failures) = self.failures.write() {
            failures.insert(op);
        }
    }

    pub fn clear_failures(&self) {
        if let Ok(mut failures) = self.failures.write() {
            failures.clear();
        }
    }

    /// Number of successful write operations since creation or the last [`clear`](Self::clear)
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn account_count(&self) -> usize {
        self.read().map(|state| state.accounts.len()).unwrap_or(0)
    }

    pub fn transaction_count(&self) -> usize {
        self.read().map(|state| state.transactions.len()).unwrap_or(0)
    }

    pub fn import_count(&self) -> usize {
        self.read().map(|state| state.imports.len()).unwrap_or(0)
    }

    fn check(&self, op: StorageOp) -> LedgerResult<()> {
        let failing = self
            .failures
            .read()
            .map(|failures| failures.contains(&op))
            .unwrap_or(false);
        if failing {
            Err(LedgerError::Storage(format!("{:?} failed", op)))
        } else {
            Ok(())
        }
    }

    fn read(&self) -> LedgerResult<RwLockReadGuard<'_, MemoryState>> {
        self.state
            .read()
            .map_err(|_| LedgerError::Storage("storage lock poisoned".to_string()))
    }

    fn write(&self, op: StorageOp) -> LedgerResult<RwLockWriteGuard<'_, MemoryState>> {
        self.check(op)?;
        self.state
            .write()
            .map_err(|_| LedgerError::Storage("storage lock poisoned".to_string()))
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }

    fn fingerprint_exists(state: &MemoryState, fingerprint: &str) -> bool {
        state
            .imports
            .iter()
            .any(|record| record.file_fingerprint == fingerprint)
    }
}

#[async_trait]
impl AccountStore for MemoryStorage {
    async fn find_account_by_number(&self, account_number: &str) -> LedgerResult<Option<Account>> {
        self.check(StorageOp::Read)?;
        Ok(self
            .read()?
            .accounts
            .iter()
            .find(|account| account.account_number == account_number)
            .cloned())
    }

    async fn find_account_by_id(&self, account_id: &str) -> LedgerResult<Option<Account>> {
        self.check(StorageOp::Read)?;
        Ok(self
            .read()?
            .accounts
            .iter()
            .find(|account| account.id == account_id)
            .cloned())
    }

    async fn create_account(&self, account: NewAccount) -> LedgerResult<Account> {
        let mut state = self.write(StorageOp::CreateAccount)?;
        let account = Account::from_new(account);
        state.accounts.push(account.clone());
        self.record_write();
        Ok(account)
    }

    async fn update_balance(
        &self,
        account_id: &str,
        balance: &BigDecimal,
        synced_at: DateTime<Utc>,
    ) -> LedgerResult<()> {
        let mut state = self.write(StorageOp::UpdateBalance)?;
        let account = state
            .accounts
            .iter_mut()
            .find(|account| account.id == account_id)
            .ok_or_else(|| LedgerError::AccountNotFound(account_id.to_string()))?;
        account.balance = balance.clone();
        account.last_synced_at = Some(synced_at);
        account.updated_at = Utc::now();
        self.record_write();
        Ok(())
    }

    async fn update_last_synced(
        &self,
        account_id: &str,
        synced_at: DateTime<Utc>,
    ) -> LedgerResult<()> {
        let mut state = self.write(StorageOp::UpdateLastSynced)?;
        let account = state
            .accounts
            .iter_mut()
            .find(|account| account.id == account_id)
            .ok_or_else(|| LedgerError::AccountNotFound(account_id.to_string()))?;
        account.last_synced_at = Some(synced_at);
        account.updated_at = Utc::now();
        self.record_write();
        Ok(())
    }
}

#[async_trait]
impl TransactionStore for MemoryStorage {
    async fn find_transactions(
        &self,
        account_id: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> LedgerResult<Vec<LedgerTransaction>> {
        self.check(StorageOp::Read)?;
        let state = self.read()?;
        let mut filtered: Vec<LedgerTransaction> = state
            .transactions
            .iter()
            .filter(|txn| {
                if txn.account_id != account_id {
                    return false;
                }
                if let Some(start) = start {
                    if txn.transaction_date < start {
                        return false;
                    }
                }
                if let Some(end) = end {
                    if txn.transaction_date > end {
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect();
        filtered.sort_by_key(|txn| txn.transaction_date);
        Ok(filtered)
    }

    async fn create_transactions(
        &self,
        transactions: Vec<NewLedgerTransaction>,
    ) -> LedgerResult<Vec<LedgerTransaction>> {
        let mut state = self.write(StorageOp::CreateTransactions)?;
        let created: Vec<LedgerTransaction> = transactions
            .into_iter()
            .map(LedgerTransaction::from_new)
            .collect();
        state.transactions.extend(created.iter().cloned());
        self.record_write();
        Ok(created)
    }

    async fn latest_with_balance(
        &self,
        account_id: &str,
        as_of: Option<DateTime<Utc>>,
    ) -> LedgerResult<Option<LedgerTransaction>> {
        self.check(StorageOp::Read)?;
        Ok(self
            .read()?
            .transactions
            .iter()
            .filter(|txn| txn.account_id == account_id && txn.balance_after.is_some())
            .filter(|txn| as_of.is_none_or(|as_of| txn.transaction_date <= as_of))
            .max_by_key(|txn| txn.transaction_date)
            .cloned())
    }
}

#[async_trait]
impl ImportRecordStore for MemoryStorage {
    async fn find_import_by_fingerprint(
        &self,
        fingerprint: &str,
    ) -> LedgerResult<Option<StatementImportRecord>> {
        self.check(StorageOp::Read)?;
        Ok(self
            .read()?
            .imports
            .iter()
            .find(|record| record.file_fingerprint == fingerprint)
            .cloned())
    }

    async fn find_imports_by_period(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> LedgerResult<Vec<StatementImportRecord>> {
        self.check(StorageOp::Read)?;
        let mut records: Vec<StatementImportRecord> = self
            .read()?
            .imports
            .iter()
            .filter(|record| record.intersects(start, end))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.period_start.cmp(&a.period_start));
        Ok(records)
    }

    async fn create_import(&self, record: NewStatementImport) -> LedgerResult<StatementImportRecord> {
        let mut state = self.write(StorageOp::CreateImport)?;
        if Self::fingerprint_exists(&state, &record.file_fingerprint) {
            return Err(LedgerError::DuplicateFingerprint(record.file_fingerprint));
        }
        let record = StatementImportRecord::from_new(record);
        state.imports.push(record.clone());
        self.record_write();
        Ok(record)
    }

    async fn list_imports(
        &self,
        bank_code: Option<BankCode>,
    ) -> LedgerResult<Vec<StatementImportRecord>> {
        self.check(StorageOp::Read)?;
        let mut records: Vec<StatementImportRecord> = self
            .read()?
            .imports
            .iter()
            .filter(|record| bank_code.is_none_or(|code| record.bank_code == code))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.imported_at.cmp(&a.imported_at));
        Ok(records)
    }
}

#[async_trait]
impl LedgerStorage for MemoryStorage {
    async fn commit_import(
        &self,
        record: NewStatementImport,
        transactions: Vec<NewLedgerTransaction>,
    ) -> LedgerResult<CommittedImport> {
        let mut state = self.write(StorageOp::CommitImport)?;
        if Self::fingerprint_exists(&state, &record.file_fingerprint) {
            return Err(LedgerError::DuplicateFingerprint(record.file_fingerprint));
        }

        let record = StatementImportRecord::from_new(record);
        let transactions: Vec<LedgerTransaction> = transactions
            .into_iter()
            .map(|mut txn| {
                txn.statement_import_id = Some(record.id.clone());
                LedgerTransaction::from_new(txn)
            })
            .collect();

        state.imports.push(record.clone());
        state.transactions.extend(transactions.iter().cloned());
        self.record_write();

        Ok(CommittedImport {
            record,
            transactions,
        })
    }
}
