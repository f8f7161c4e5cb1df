//! Per-account serialization of imports

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Hands out one async mutex per account number.
///
/// Two imports for the same account run one after the other; imports for
/// different accounts proceed independently.
#[derive(Debug, Default, Clone)]
pub struct AccountLocks {
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `account_number`
    pub async fn acquire(&self, account_number: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            // Drop entries nobody else holds
            locks.retain(|key, lock| key == account_number || Arc::strong_count(lock) > 1);
            locks
                .entry(account_number.to_string())
                .or_default()
                .clone()
        };
        lock.lock_owned().await
    }
}
