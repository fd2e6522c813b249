//! Summary store manager.
//!
//! New aggregates replace every stored row sharing their `(metric_id,
//! datestamp)` pair. The merged set is then bounded by a two-tier retention:
//! daily rows for the recent window, the latest day of each calendar month
//! for older history, nothing beyond the long window.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use super::dataset::SummaryRecord;
use super::store::upsert_by_key;
use crate::constants::{DEFAULT_SUMMARY_DAILY_DAYS, DEFAULT_SUMMARY_RETENTION_MONTHS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Rows older than this many months are dropped
    pub months: u32,
    /// Rows within this many days keep daily resolution
    pub daily_days: u32,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            months: DEFAULT_SUMMARY_RETENTION_MONTHS,
            daily_days: DEFAULT_SUMMARY_DAILY_DAYS,
        }
    }
}

pub fn merge(existing: Vec<SummaryRecord>, new_rows: Vec<SummaryRecord>) -> Vec<SummaryRecord> {
    upsert_by_key(existing, new_rows)
}

/// Apply the retention policy relative to `today`.
///
/// Output is ordered by `(metric_id, datestamp)`, so applying it twice gives
/// the same rows in the same order.
pub fn retain(rows: Vec<SummaryRecord>, policy: RetentionPolicy, today: NaiveDate) -> Vec<SummaryRecord> {
    let oldest = today
        .checked_sub_months(Months::new(policy.months))
        .unwrap_or(NaiveDate::MIN);
    let daily_from = today
        .checked_sub_signed(Duration::days(i64::from(policy.daily_days)))
        .unwrap_or(NaiveDate::MIN);

    let (recent, older): (Vec<_>, Vec<_>) = rows
        .into_iter()
        .filter(|r| r.datestamp >= oldest)
        .partition(|r| r.datestamp >= daily_from);

    // latest day per calendar month, across all metrics
    let mut month_ends: BTreeMap<(i32, u32), NaiveDate> = BTreeMap::new();
    for r in &older {
        let key = (r.datestamp.year(), r.datestamp.month());
        month_ends
            .entry(key)
            .and_modify(|d| *d = (*d).max(r.datestamp))
            .or_insert(r.datestamp);
    }

    let mut retained = recent;
    retained.extend(older.into_iter().filter(|r| {
        month_ends.get(&(r.datestamp.year(), r.datestamp.month())) == Some(&r.datestamp)
    }));

    retained.sort_by(|a, b| {
        a.metric_id
            .cmp(&b.metric_id)
            .then_with(|| a.datestamp.cmp(&b.datestamp))
    });
    retained
}
