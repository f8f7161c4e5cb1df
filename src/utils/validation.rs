//! Validation utilities

use bigdecimal::BigDecimal;

use crate::types::*;

/// Largest balance magnitude the ledger stores
pub fn max_balance() -> BigDecimal {
    BigDecimal::new(1.into(), -15)
}

/// Validate that an amount is positive
pub fn validate_positive_amount(amount: &BigDecimal) -> LedgerResult<()> {
    if *amount <= BigDecimal::from(0) {
        Err(LedgerError::Validation(format!(
            "Amount must be positive, got {}",
            amount
        )))
    } else {
        Ok(())
    }
}

/// Validate that a balance fits the ledger's representable range
pub fn validate_balance(balance: &BigDecimal) -> LedgerResult<()> {
    if balance.abs() >= max_balance() {
        return Err(LedgerError::Validation(format!(
            "Balance {} is outside the supported range",
            balance
        )));
    }
    Ok(())
}

/// Validate that an account number is usable as a lookup key
pub fn validate_account_number(account_number: &str) -> LedgerResult<()> {
    if account_number.trim().is_empty() {
        return Err(LedgerError::Validation(
            "Account number cannot be empty".to_string(),
        ));
    }

    if account_number.len() > 64 {
        return Err(LedgerError::Validation(
            "Account number cannot exceed 64 characters".to_string(),
        ));
    }

    Ok(())
}

/// Sanity checks on parser output before anything touches the ledger
pub fn validate_statement(statement: &ParsedStatement) -> LedgerResult<()> {
    let account = &statement.account;

    validate_account_number(&account.account_number)?;

    if account.period_start > account.period_end {
        return Err(LedgerError::Validation(format!(
            "Statement period starts ({}) after it ends ({})",
            account.period_start, account.period_end
        )));
    }

    for (index, transaction) in statement.transactions.iter().enumerate() {
        validate_positive_amount(&transaction.amount).map_err(|e| {
            LedgerError::Validation(format!("Transaction {}: {}", index, e))
        })?;
    }

    Ok(())
}
