use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Declared dimension values of a row, keyed by dimension field name
pub type Dimensions = BTreeMap<String, String>;

/// Core detail fields; anything else that is not a declared dimension is dropped
pub const CORE_FIELDS: [&str; 12] = [
    "datestamp",
    "metric_id",
    "resource",
    "compliance",
    "count",
    "detail",
    "title",
    "category",
    "slo",
    "slo_min",
    "weight",
    "indicator",
];

/// How `compliance`/`count` are interpreted for a metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricMode {
    /// `compliance` is the compliant share of `count`; score = totalok / total
    Ratio,
    /// Raw count metric; score = total and no 0..1 bounds apply
    Indicator,
}

impl MetricMode {
    pub fn from_indicator(indicator: bool) -> Self {
        if indicator {
            MetricMode::Indicator
        } else {
            MetricMode::Ratio
        }
    }

    pub fn is_indicator(self) -> bool {
        self == MetricMode::Indicator
    }

    /// `None` when a ratio metric observed nothing
    pub fn score(self, totalok: f64, total: f64) -> Option<f64> {
        match self {
            MetricMode::Ratio if total == 0.0 => None,
            MetricMode::Ratio => Some(totalok / total),
            MetricMode::Indicator => Some(total),
        }
    }
}

/// One compliance check outcome for one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailRecord {
    pub datestamp: NaiveDate,
    pub metric_id: String,
    pub resource: String,
    pub compliance: f64,
    pub count: f64,
    pub detail: String,
    pub title: String,
    pub category: String,
    pub slo: f64,
    pub slo_min: f64,
    pub weight: f64,
    pub indicator: bool,
    #[serde(flatten)]
    pub dimensions: Dimensions,
}

impl DetailRecord {
    pub fn mode(&self) -> MetricMode {
        MetricMode::from_indicator(self.indicator)
    }
}

/// Aggregate of detail rows for one (metric, day, dimension tuple)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub datestamp: NaiveDate,
    pub metric_id: String,
    pub title: String,
    pub category: String,
    pub slo: f64,
    pub slo_min: f64,
    pub weight: f64,
    pub indicator: bool,
    #[serde(flatten)]
    pub dimensions: Dimensions,
    pub totalok: f64,
    pub total: f64,
}

impl SummaryRecord {
    pub fn mode(&self) -> MetricMode {
        MetricMode::from_indicator(self.indicator)
    }

    pub fn score(&self) -> Option<f64> {
        self.mode().score(self.totalok, self.total)
    }

    /// Dimension value, `undefined` when the row predates the dimension
    pub fn dimension(&self, name: &str) -> &str {
        self.dimensions
            .get(name)
            .map(String::as_str)
            .unwrap_or(crate::constants::UNDEFINED)
    }
}
