//! Aggregator - pivots detail rows into per-day summary rows.
//!
//! Groups by the full descriptive key (day, metric, title, category,
//! thresholds, weight, indicator flag and every declared dimension) and sums
//! `compliance` into `totalok` and `count` into `total`.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::dataset::{DetailRecord, Dimensions, SummaryRecord};

/// Floats are keyed by bit pattern so the key is totally ordered
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct GroupKey {
    datestamp: NaiveDate,
    metric_id: String,
    title: String,
    category: String,
    slo: u64,
    slo_min: u64,
    weight: u64,
    indicator: bool,
    dimensions: Dimensions,
}

impl GroupKey {
    fn of(r: &DetailRecord) -> Self {
        Self {
            datestamp: r.datestamp,
            metric_id: r.metric_id.clone(),
            title: r.title.clone(),
            category: r.category.clone(),
            slo: r.slo.to_bits(),
            slo_min: r.slo_min.to_bits(),
            weight: r.weight.to_bits(),
            indicator: r.indicator,
            dimensions: r.dimensions.clone(),
        }
    }

    fn into_summary(self, totalok: f64, total: f64) -> SummaryRecord {
        SummaryRecord {
            datestamp: self.datestamp,
            metric_id: self.metric_id,
            title: self.title,
            category: self.category,
            slo: f64::from_bits(self.slo),
            slo_min: f64::from_bits(self.slo_min),
            weight: f64::from_bits(self.weight),
            indicator: self.indicator,
            dimensions: self.dimensions,
            totalok,
            total,
        }
    }
}

/// One summary row per distinct group key, in key order
pub fn aggregate(records: &[DetailRecord]) -> Vec<SummaryRecord> {
    let mut groups: BTreeMap<GroupKey, (f64, f64)> = BTreeMap::new();

    for r in records {
        let entry = groups.entry(GroupKey::of(r)).or_insert((0.0, 0.0));
        entry.0 += r.compliance;
        entry.1 += r.count;
    }

    groups
        .into_iter()
        .map(|(key, (totalok, total))| key.into_summary(totalok, total))
        .collect()
}
