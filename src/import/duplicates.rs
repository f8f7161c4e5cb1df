//! Duplicate transaction detection
//!
//! Matching is heuristic. A parsed transaction is a duplicate of an existing
//! ledger entry when the amounts agree within tolerance and the types are
//! equal, and additionally either
//!
//! - the timestamps are within the time tolerance, or
//! - both fall on the same calendar day and carry the same non-empty reference.
//!
//! Matches are "exact" when amount, millisecond timestamp and type are all
//! identical, otherwise "likely".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::MatchingConfig;
use crate::import::overlap::{OverlapDetector, OverlapInfo};
use crate::traits::{ImportRecordStore, TransactionStore};
use crate::types::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Exact,
    Likely,
}

/// A parsed transaction that already exists in the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateInfo {
    pub transaction: StatementTransaction,
    pub matched_transaction_id: String,
    pub match_type: MatchType,
}

/// Outcome of classifying a statement against the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeduplicationResult {
    /// One entry per matched parsed transaction, in input order
    pub duplicates: Vec<DuplicateInfo>,
    /// Input order with matched transactions removed
    pub unique_transactions: Vec<StatementTransaction>,
    pub period_overlaps: Vec<OverlapInfo>,
}

/// First existing entry that matches `candidate`, if any
pub fn find_match<'a>(
    candidate: &StatementTransaction,
    existing: &'a [LedgerTransaction],
    config: &MatchingConfig,
) -> Option<&'a LedgerTransaction> {
    existing.iter().find(|entry| {
        let amount_matches =
            (&entry.amount - &candidate.amount).abs() <= config.amount_tolerance;
        if !amount_matches || entry.transaction_type != candidate.transaction_type {
            return false;
        }

        let gap_ms = (entry.transaction_date - candidate.transaction_date)
            .num_milliseconds()
            .abs();
        if gap_ms <= config.time_tolerance().num_milliseconds() {
            return true;
        }

        let same_day =
            entry.transaction_date.date_naive() == candidate.transaction_date.date_naive();
        same_day && references_match(candidate.reference.as_deref(), entry.reference.as_deref())
    })
}

fn references_match(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => !a.is_empty() && a == b,
        _ => false,
    }
}

/// Classify a match found by [`find_match`]
pub fn match_type(candidate: &StatementTransaction, existing: &LedgerTransaction) -> MatchType {
    let exact = existing.amount == candidate.amount
        && existing.transaction_date.timestamp_millis()
            == candidate.transaction_date.timestamp_millis()
        && existing.transaction_type == candidate.transaction_type;

    if exact {
        MatchType::Exact
    } else {
        MatchType::Likely
    }
}

/// Classifies parsed transactions against an account's existing ledger entries
pub struct DuplicateDetector<S: TransactionStore + ImportRecordStore> {
    storage: S,
    overlaps: OverlapDetector<S>,
    config: MatchingConfig,
}

impl<S: TransactionStore + ImportRecordStore + Clone> DuplicateDetector<S> {
    pub fn new(storage: S) -> Self {
        Self::with_config(storage, MatchingConfig::default())
    }

    pub fn with_config(storage: S, config: MatchingConfig) -> Self {
        Self {
            overlaps: OverlapDetector::new(storage.clone()),
            storage,
            config,
        }
    }
}

impl<S: TransactionStore + ImportRecordStore> DuplicateDetector<S> {
    /// Split `transactions` into duplicates and unique entries and collect period overlaps
    pub async fn detect(
        &self,
        transactions: &[StatementTransaction],
        account_id: &str,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        bank_code: Option<BankCode>,
    ) -> LedgerResult<DeduplicationResult> {
        let padding = self.config.search_padding();
        let existing = self
            .storage
            .find_transactions(
                account_id,
                Some(period_start - padding),
                Some(period_end + padding),
            )
            .await?;

        let period_overlaps = self
            .overlaps
            .find_overlaps(period_start, period_end, bank_code)
            .await?;

        let mut duplicates = Vec::new();
        let mut unique_transactions = Vec::new();

        for transaction in transactions {
            match find_match(transaction, &existing, &self.config) {
                Some(matched) => duplicates.push(DuplicateInfo {
                    transaction: transaction.clone(),
                    matched_transaction_id: matched.id.clone(),
                    match_type: match_type(transaction, matched),
                }),
                None => unique_transactions.push(transaction.clone()),
            }
        }

        debug!(
            account_id,
            existing = existing.len(),
            duplicates = duplicates.len(),
            unique = unique_transactions.len(),
            overlaps = period_overlaps.len(),
            "Duplicate detection finished"
        );

        Ok(DeduplicationResult {
            duplicates,
            unique_transactions,
            period_overlaps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_storage::MemoryStorage;
    use bigdecimal::BigDecimal;
    use chrono::{Duration, TimeZone};
    use std::str::FromStr;

    fn at(day: u32, hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, hour, minute, second)
            .unwrap()
    }

    fn new_entry(
        transaction_type: TransactionType,
        amount: &str,
        date: DateTime<Utc>,
        reference: Option<&str>,
    ) -> NewLedgerTransaction {
        NewLedgerTransaction {
            account_id: "acc".to_string(),
            transaction_type,
            amount: BigDecimal::from_str(amount).unwrap(),
            transaction_date: date,
            balance_before: None,
            balance_after: None,
            merchant: None,
            description: None,
            reference: reference.map(str::to_string),
            category_id: None,
            statement_import_id: None,
        }
    }

    fn existing(
        transaction_type: TransactionType,
        amount: &str,
        date: DateTime<Utc>,
        reference: Option<&str>,
    ) -> Vec<LedgerTransaction> {
        vec![LedgerTransaction::from_new(new_entry(
            transaction_type,
            amount,
            date,
            reference,
        ))]
    }

    fn parsed(
        transaction_type: TransactionType,
        amount: &str,
        date: DateTime<Utc>,
    ) -> StatementTransaction {
        StatementTransaction::new(
            transaction_type,
            BigDecimal::from_str(amount).unwrap(),
            date,
        )
    }

    #[test]
    fn test_identical_entry_is_exact() {
        let config = MatchingConfig::default();
        let ledger = existing(TransactionType::Expense, "45000", at(3, 10, 0, 0), None);
        let candidate = parsed(TransactionType::Expense, "45000.00", at(3, 10, 0, 0));

        let matched = find_match(&candidate, &ledger, &config).unwrap();
        assert_eq!(matched.id, ledger[0].id);
        assert_eq!(match_type(&candidate, matched), MatchType::Exact);
    }

    #[test]
    fn test_thirty_seconds_later_is_likely() {
        let config = MatchingConfig::default();
        let ledger = existing(TransactionType::Income, "1200", at(3, 10, 0, 0), None);
        let candidate = parsed(TransactionType::Income, "1200", at(3, 10, 0, 30));

        let matched = find_match(&candidate, &ledger, &config).unwrap();
        assert_eq!(match_type(&candidate, matched), MatchType::Likely);
    }

    #[test]
    fn test_ninety_seconds_later_without_reference_is_unique() {
        let config = MatchingConfig::default();
        let ledger = existing(TransactionType::Income, "1200", at(3, 10, 0, 0), None);
        let candidate = parsed(TransactionType::Income, "1200", at(3, 10, 1, 30));

        assert!(find_match(&candidate, &ledger, &config).is_none());
    }

    #[test]
    fn test_amount_within_a_cent_matches() {
        let config = MatchingConfig::default();
        let ledger = existing(TransactionType::Expense, "99.99", at(3, 9, 0, 0), None);

        let close = parsed(TransactionType::Expense, "100.00", at(3, 9, 0, 0));
        let far = parsed(TransactionType::Expense, "100.01", at(3, 9, 0, 0));

        let matched = find_match(&close, &ledger, &config).unwrap();
        assert_eq!(match_type(&close, matched), MatchType::Likely);
        assert!(find_match(&far, &ledger, &config).is_none());
    }

    #[test]
    fn test_type_mismatch_never_matches() {
        let config = MatchingConfig::default();
        let ledger = existing(TransactionType::TransferIn, "500", at(3, 9, 0, 0), None);
        let candidate = parsed(TransactionType::TransferOut, "500", at(3, 9, 0, 0));

        assert!(find_match(&candidate, &ledger, &config).is_none());
    }

    #[test]
    fn test_same_day_shared_reference_matches() {
        let config = MatchingConfig::default();
        let ledger = existing(
            TransactionType::Expense,
            "80000",
            at(3, 8, 0, 0),
            Some("REF123"),
        );

        let same_ref =
            parsed(TransactionType::Expense, "80000", at(3, 17, 45, 0)).with_reference("REF123");
        let other_ref =
            parsed(TransactionType::Expense, "80000", at(3, 17, 45, 0)).with_reference("REF999");
        let next_day =
            parsed(TransactionType::Expense, "80000", at(4, 8, 0, 0)).with_reference("REF123");

        assert!(find_match(&same_ref, &ledger, &config).is_some());
        assert!(find_match(&other_ref, &ledger, &config).is_none());
        assert!(find_match(&next_day, &ledger, &config).is_none());
    }

    #[test]
    fn test_empty_reference_is_not_shared() {
        let config = MatchingConfig::default();
        let ledger = existing(TransactionType::Expense, "10", at(3, 8, 0, 0), Some(""));
        let candidate = parsed(TransactionType::Expense, "10", at(3, 12, 0, 0)).with_reference("");

        assert!(find_match(&candidate, &ledger, &config).is_none());
    }

    #[tokio::test]
    async fn test_detect_preserves_input_order() {
        let storage = MemoryStorage::new();
        storage
            .create_transactions(vec![new_entry(
                TransactionType::Expense,
                "300",
                at(10, 12, 0, 0),
                None,
            )])
            .await
            .unwrap();

        let detector = DuplicateDetector::new(storage);
        let parsed_txns = vec![
            parsed(TransactionType::Income, "100", at(9, 8, 0, 0)),
            parsed(TransactionType::Expense, "300", at(10, 12, 0, 0)),
            parsed(TransactionType::Expense, "42", at(11, 8, 0, 0)),
        ];

        let result = detector
            .detect(&parsed_txns, "acc", at(1, 0, 0, 0), at(31, 0, 0, 0), None)
            .await
            .unwrap();

        assert_eq!(result.duplicates.len(), 1);
        assert_eq!(result.duplicates[0].match_type, MatchType::Exact);
        assert_eq!(result.duplicates[0].transaction, parsed_txns[1]);
        assert_eq!(
            result.unique_transactions,
            vec![parsed_txns[0].clone(), parsed_txns[2].clone()]
        );
        assert!(result.period_overlaps.is_empty());
    }

    #[tokio::test]
    async fn test_other_accounts_are_ignored() {
        let storage = MemoryStorage::new();
        let mut entry = new_entry(TransactionType::Income, "900", at(12, 9, 0, 0), None);
        entry.account_id = "someone-else".to_string();
        storage.create_transactions(vec![entry]).await.unwrap();

        let detector = DuplicateDetector::new(storage);
        let parsed_txns = vec![parsed(TransactionType::Income, "900", at(12, 9, 0, 0))];
        let result = detector
            .detect(&parsed_txns, "acc", at(1, 0, 0, 0), at(31, 0, 0, 0), None)
            .await
            .unwrap();

        assert!(result.duplicates.is_empty());
        assert_eq!(result.unique_transactions.len(), 1);
    }

    #[tokio::test]
    async fn test_search_window_is_padded_by_one_day() {
        let storage = MemoryStorage::new();
        let period_start = at(10, 0, 0, 0);
        let just_before = period_start - Duration::hours(12);
        let two_days_before = period_start - Duration::days(2);

        storage
            .create_transactions(vec![
                new_entry(TransactionType::Expense, "75", just_before, None),
                new_entry(TransactionType::Expense, "75", two_days_before, None),
            ])
            .await
            .unwrap();

        let detector = DuplicateDetector::new(storage);
        let parsed_txns = vec![
            parsed(TransactionType::Expense, "75", just_before),
            parsed(TransactionType::Expense, "75", two_days_before),
        ];

        let result = detector
            .detect(&parsed_txns, "acc", period_start, at(20, 0, 0, 0), None)
            .await
            .unwrap();

        assert_eq!(result.duplicates.len(), 1);
        assert_eq!(result.duplicates[0].transaction.transaction_date, just_before);
        assert_eq!(result.unique_transactions.len(), 1);
    }
}
