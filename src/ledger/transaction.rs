//! Mapping statement transactions into ledger transactions

use bigdecimal::BigDecimal;

use crate::types::*;
use crate::utils::validation::validate_positive_amount;

impl NewLedgerTransaction {
    /// Ledger entry for a statement transaction on `account_id`
    pub fn from_statement(
        transaction: &StatementTransaction,
        account_id: &str,
        statement_import_id: Option<&str>,
    ) -> Self {
        Self {
            account_id: account_id.to_string(),
            transaction_type: transaction.transaction_type,
            amount: transaction.amount.clone(),
            transaction_date: transaction.transaction_date,
            balance_before: transaction.balance_before.clone(),
            balance_after: transaction.balance_after.clone(),
            merchant: transaction.merchant.clone(),
            description: transaction.description.clone(),
            reference: transaction.reference.clone(),
            category_id: None,
            statement_import_id: statement_import_id.map(str::to_string),
        }
    }
}

/// Builds the batch of ledger entries created by one import
pub struct TransactionBatchBuilder {
    account_id: String,
    statement_import_id: Option<String>,
    transactions: Vec<NewLedgerTransaction>,
}

impl TransactionBatchBuilder {
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            statement_import_id: None,
            transactions: Vec::new(),
        }
    }

    /// Tag every entry with the import that created it
    pub fn import_id(mut self, statement_import_id: impl Into<String>) -> Self {
        self.statement_import_id = Some(statement_import_id.into());
        for transaction in &mut self.transactions {
            transaction.statement_import_id = self.statement_import_id.clone();
        }
        self
    }

    pub fn add(mut self, transaction: &StatementTransaction) -> Self {
        self.transactions.push(NewLedgerTransaction::from_statement(
            transaction,
            &self.account_id,
            self.statement_import_id.as_deref(),
        ));
        self
    }

    pub fn extend<'a>(
        self,
        transactions: impl IntoIterator<Item = &'a StatementTransaction>,
    ) -> Self {
        transactions.into_iter().fold(self, |builder, txn| builder.add(txn))
    }

    /// Validate and return the batch in insertion order
    pub fn build(self) -> LedgerResult<Vec<NewLedgerTransaction>> {
        for transaction in &self.transactions {
            validate_positive_amount(&transaction.amount)?;
        }
        Ok(self.transactions)
    }
}

/// Inflows minus outflows
pub fn net_amount<'a>(transactions: impl IntoIterator<Item = &'a LedgerTransaction>) -> BigDecimal {
    transactions
        .into_iter()
        .map(|txn| txn.transaction_type.signed(&txn.amount))
        .sum()
}
