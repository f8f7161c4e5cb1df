//! Account resolution for imported statements

use bigdecimal::BigDecimal;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::traits::AccountStore;
use crate::types::*;
use crate::utils::validation::validate_account_number;

/// Id of the unsaved account returned for dry runs
pub const DRY_RUN_ACCOUNT_ID: &str = "dry-run-account-id";

/// Outcome of [`AccountMatcher::resolve`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountMatch {
    pub account: Account,
    /// True when no existing account matched (including dry-run placeholders)
    pub created: bool,
}

impl AccountMatch {
    /// Whether the account only exists in memory for a dry run
    pub fn is_placeholder(&self) -> bool {
        self.account.id == DRY_RUN_ACCOUNT_ID
    }
}

/// Ledger account type for a statement's reported account type
pub fn map_account_type(statement_type: StatementAccountType, bank_code: BankCode) -> AccountType {
    match statement_type {
        StatementAccountType::Savings => AccountType::Savings,
        StatementAccountType::Checking => AccountType::Checking,
        StatementAccountType::CreditCard => AccountType::Credit,
        StatementAccountType::Unknown => infer_account_type(bank_code),
    }
}

/// Best guess from the bank alone
pub fn infer_account_type(bank_code: BankCode) -> AccountType {
    if bank_code.is_digital_wallet() {
        AccountType::DigitalWallet
    } else {
        AccountType::Savings
    }
}

/// Resolves statement accounts to ledger accounts, creating them on first sight
pub struct AccountMatcher<S: AccountStore> {
    storage: S,
}

impl<S: AccountStore> AccountMatcher<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Find the account with `account_number` or create it.
    ///
    /// Existing accounts are returned unmodified. In dry-run mode a missing
    /// account is represented by an unsaved placeholder with a zero balance.
    pub async fn resolve(
        &self,
        bank_code: BankCode,
        account_number: &str,
        statement_type: StatementAccountType,
        dry_run: bool,
    ) -> LedgerResult<AccountMatch> {
        validate_account_number(account_number)?;

        if let Some(account) = self.storage.find_account_by_number(account_number).await? {
            return Ok(AccountMatch {
                account,
                created: false,
            });
        }

        let new_account = NewAccount {
            bank_code,
            bank_name: bank_code.display_name().to_string(),
            account_number: account_number.to_string(),
            account_type: map_account_type(statement_type, bank_code),
            balance: BigDecimal::from(0),
            is_active: true,
        };

        if dry_run {
            let mut placeholder = Account::from_new(new_account);
            placeholder.id = DRY_RUN_ACCOUNT_ID.to_string();
            return Ok(AccountMatch {
                account: placeholder,
                created: true,
            });
        }

        let account = self.storage.create_account(new_account).await?;
        info!(
            account_id = %account.id,
            bank = %bank_code,
            account_type = ?account.account_type,
            "Created account for imported statement"
        );

        Ok(AccountMatch {
            account,
            created: true,
        })
    }

    /// Mark the account as freshly synchronized without touching its balance
    pub async fn touch(&self, account_id: &str) -> LedgerResult<()> {
        self.storage.update_last_synced(account_id, Utc::now()).await
    }
}
