//! Detail store manager.
//!
//! Every metric present in a batch is replaced wholesale: its stored rows are
//! dropped and the batch rows take their place. Pruning to the trailing
//! window runs over the whole merged set so untouched metrics age out too.

use chrono::{Duration, NaiveDate};

use super::dataset::DetailRecord;
use super::store::upsert_by_key;

/// Replace-by-metric merge
pub fn merge(existing: Vec<DetailRecord>, batch: Vec<DetailRecord>) -> Vec<DetailRecord> {
    upsert_by_key(existing, batch)
}

/// Keep rows dated on or after `today - days`. `days == 0` disables pruning.
pub fn prune(rows: Vec<DetailRecord>, days: u32, today: NaiveDate) -> Vec<DetailRecord> {
    if days == 0 {
        return rows;
    }
    let cutoff = today
        .checked_sub_signed(Duration::days(i64::from(days)))
        .unwrap_or(NaiveDate::MIN);
    let before = rows.len();
    let kept: Vec<DetailRecord> = rows.into_iter().filter(|r| r.datestamp >= cutoff).collect();

    if kept.len() < before {
        log::debug!("Pruned {} detail rows older than {}", before - kept.len(), cutoff);
    }
    kept
}
