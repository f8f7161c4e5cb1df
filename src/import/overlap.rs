//! Statement period overlap detection

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::traits::ImportRecordStore;
use crate::types::*;

/// A previously committed import whose period intersects a candidate period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlapInfo {
    pub import_id: String,
    pub file_name: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub overlap_start: DateTime<Utc>,
    pub overlap_end: DateTime<Utc>,
    /// Inclusive day count of the intersection
    pub overlap_days: i64,
}

/// Intersection of two inclusive ranges, `None` when they are disjoint
pub fn overlap_range(
    start_a: DateTime<Utc>,
    end_a: DateTime<Utc>,
    start_b: DateTime<Utc>,
    end_b: DateTime<Utc>,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = start_a.max(start_b);
    let end = end_a.min(end_b);
    (start <= end).then_some((start, end))
}

/// Whole days in an inclusive window: a same-day window counts as 1.
pub fn overlap_days(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    if start > end {
        return 0;
    }
    let day_ms = Duration::days(1).num_milliseconds();
    let span_ms = (end - start).num_milliseconds();
    (span_ms + day_ms - 1) / day_ms + 1
}

/// Finds committed imports whose statement period intersects a candidate period
pub struct OverlapDetector<S: ImportRecordStore> {
    storage: S,
}

impl<S: ImportRecordStore> OverlapDetector<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Overlaps with `[period_start, period_end]`, optionally restricted to one bank
    pub async fn find_overlaps(
        &self,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        bank_code: Option<BankCode>,
    ) -> LedgerResult<Vec<OverlapInfo>> {
        let imports = self
            .storage
            .find_imports_by_period(period_start, period_end)
            .await?;

        let overlaps: Vec<OverlapInfo> = imports
            .into_iter()
            .filter(|record| bank_code.is_none_or(|code| record.bank_code == code))
            .filter_map(|record| {
                let (overlap_start, overlap_end) = overlap_range(
                    period_start,
                    period_end,
                    record.period_start,
                    record.period_end,
                )?;
                Some(OverlapInfo {
                    import_id: record.id,
                    file_name: record.file_name,
                    period_start: record.period_start,
                    period_end: record.period_end,
                    overlap_start,
                    overlap_end,
                    overlap_days: overlap_days(overlap_start, overlap_end),
                })
            })
            .collect();

        debug!(
            %period_start,
            %period_end,
            overlaps = overlaps.len(),
            "Period overlap check"
        );

        Ok(overlaps)
    }
}
