//! Read-side reports over the summary and detail stores.
//!
//! Scores roll up in two steps: rows are summed per metric (`totalok / total`,
//! or `total` for indicator metrics), then metrics are combined with a
//! weighted average on `weight`. Thresholds of a group are the plain mean of
//! its metrics' thresholds.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{Months, NaiveDate};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::dataset::raw::format_number;
use super::dataset::{DetailRecord, Dimensions, MetricMode, SummaryRecord};
use super::rag::{mean, weighted_average, Rag, Status};
use crate::constants::{DEFAULT_SLO, DEFAULT_SLO_MIN};

// ============================================================================
// FILTER
// ============================================================================

/// Selected value per dimension; a row must match every selection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    selections: BTreeMap<String, String>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, dimension: impl Into<String>, value: impl Into<String>) -> Self {
        self.selections.insert(dimension.into(), value.into());
        self
    }

    /// Pick the declared dimensions out of query parameters; empty values
    /// mean "no selection"
    pub fn from_query(dimensions: &IndexMap<String, String>, query: &HashMap<String, String>) -> Self {
        let selections = dimensions
            .keys()
            .filter_map(|d| {
                query
                    .get(d)
                    .filter(|v| !v.trim().is_empty())
                    .map(|v| (d.clone(), v.clone()))
            })
            .collect();
        Self { selections }
    }

    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }

    fn matches_dimensions(&self, dimensions: &Dimensions) -> bool {
        self.selections
            .iter()
            .all(|(d, v)| dimensions.get(d).map(String::as_str).unwrap_or(crate::constants::UNDEFINED) == v)
    }

    pub fn matches(&self, row: &SummaryRecord) -> bool {
        self.matches_dimensions(&row.dimensions)
    }

    pub fn apply(&self, rows: &[SummaryRecord]) -> Vec<SummaryRecord> {
        rows.iter().filter(|r| self.matches(r)).cloned().collect()
    }

    pub fn apply_detail(&self, rows: &[DetailRecord]) -> Vec<DetailRecord> {
        rows.iter()
            .filter(|r| self.matches_dimensions(&r.dimensions))
            .cloned()
            .collect()
    }
}

/// Rows dated on the most recent datestamp
pub fn latest(rows: &[SummaryRecord]) -> Vec<SummaryRecord> {
    match rows.iter().map(|r| r.datestamp).max() {
        Some(day) => rows.iter().filter(|r| r.datestamp == day).cloned().collect(),
        None => Vec::new(),
    }
}

// ============================================================================
// ROLL-UP
// ============================================================================

#[derive(Debug, Clone)]
struct MetricRollup {
    metric_id: String,
    title: String,
    mode: MetricMode,
    totalok: f64,
    total: f64,
    weight: f64,
    slo: f64,
    slo_min: f64,
}

impl MetricRollup {
    fn score(&self) -> Option<f64> {
        self.mode.score(self.totalok, self.total)
    }
}

/// Sum rows per metric; descriptive fields come from the metric's first row
fn rollup<'a>(rows: impl IntoIterator<Item = &'a SummaryRecord>) -> Vec<MetricRollup> {
    let mut metrics: BTreeMap<&str, MetricRollup> = BTreeMap::new();
    for r in rows {
        let entry = metrics.entry(r.metric_id.as_str()).or_insert_with(|| MetricRollup {
            metric_id: r.metric_id.clone(),
            title: r.title.clone(),
            mode: r.mode(),
            totalok: 0.0,
            total: 0.0,
            weight: r.weight,
            slo: r.slo,
            slo_min: r.slo_min,
        });
        entry.totalok += r.totalok;
        entry.total += r.total;
    }
    metrics.into_values().collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct GroupScore {
    score: Option<f64>,
    slo: f64,
    slo_min: f64,
    status: Status,
}

fn score_group<'a>(rows: impl IntoIterator<Item = &'a SummaryRecord>) -> GroupScore {
    let metrics = rollup(rows);
    let score = weighted_average(metrics.iter().filter_map(|m| m.score().map(|s| (s, m.weight)))).ok();
    let slo = mean(metrics.iter().map(|m| m.slo)).unwrap_or(DEFAULT_SLO);
    let slo_min = mean(metrics.iter().map(|m| m.slo_min)).unwrap_or(DEFAULT_SLO_MIN);

    GroupScore {
        score,
        slo,
        slo_min,
        status: Status::of(score, slo, slo_min),
    }
}

/// Ascending with missing scores last
fn cmp_scores(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn cmp_scores_desc(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        _ => cmp_scores(a, b),
    }
}

// ============================================================================
// REPORTS
// ============================================================================

/// Overall score for one day
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverviewPoint {
    pub datestamp: NaiveDate,
    pub score: Option<f64>,
    pub slo: f64,
    pub slo_min: f64,
    pub status: Status,
}

/// Score of one category or dimension value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupLine {
    pub group: String,
    pub score: Option<f64>,
    pub slo: f64,
    pub slo_min: f64,
    pub status: Status,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricLine {
    pub metric_id: String,
    pub title: String,
    pub indicator: bool,
    pub score: Option<f64>,
    pub slo: f64,
    pub slo_min: f64,
    pub status: Status,
    /// `"93.33%"` for ratio metrics, the raw count for indicators
    pub display: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailLine {
    pub datestamp: NaiveDate,
    pub resource: String,
    pub compliance: f64,
    pub detail: String,
    pub status: Rag,
}

pub fn overview(rows: &[SummaryRecord]) -> Vec<OverviewPoint> {
    let mut days: BTreeMap<NaiveDate, Vec<&SummaryRecord>> = BTreeMap::new();
    for r in rows {
        days.entry(r.datestamp).or_default().push(r);
    }

    days.into_iter()
        .map(|(datestamp, rows)| {
            let g = score_group(rows);
            OverviewPoint {
                datestamp,
                score: g.score,
                slo: g.slo,
                slo_min: g.slo_min,
                status: g.status,
            }
        })
        .collect()
}

fn grouped<F>(rows: &[SummaryRecord], key: F) -> Vec<GroupLine>
where
    F: Fn(&SummaryRecord) -> &str,
{
    let mut groups: BTreeMap<&str, Vec<&SummaryRecord>> = BTreeMap::new();
    for r in rows {
        groups.entry(key(r)).or_default().push(r);
    }

    let mut lines: Vec<GroupLine> = groups
        .into_iter()
        .map(|(group, rows)| {
            let g = score_group(rows);
            GroupLine {
                group: group.to_string(),
                score: g.score,
                slo: g.slo,
                slo_min: g.slo_min,
                status: g.status,
            }
        })
        .collect();
    lines.sort_by(|a, b| cmp_scores_desc(a.score, b.score));
    lines
}

pub fn by_category(rows: &[SummaryRecord]) -> Vec<GroupLine> {
    grouped(rows, |r| r.category.as_str())
}

pub fn by_dimension(rows: &[SummaryRecord], dimension: &str) -> Vec<GroupLine> {
    grouped(rows, |r| r.dimension(dimension))
}

pub fn metrics_table(rows: &[SummaryRecord]) -> Vec<MetricLine> {
    let mut lines: Vec<MetricLine> = rollup(rows)
        .into_iter()
        .map(|m| {
            let score = m.score();
            let display = match (score, m.mode) {
                (None, _) => "n/a".to_string(),
                (Some(s), MetricMode::Indicator) => format_number(s),
                (Some(s), MetricMode::Ratio) => format!("{:.2}%", s * 100.0),
            };
            MetricLine {
                status: Status::of(score, m.slo, m.slo_min),
                indicator: m.mode.is_indicator(),
                metric_id: m.metric_id,
                title: m.title,
                score,
                slo: m.slo,
                slo_min: m.slo_min,
                display,
            }
        })
        .collect();
    lines.sort_by(|a, b| cmp_scores(a.score, b.score));
    lines
}

/// Per-resource rows of one metric
pub fn detail_table(rows: &[DetailRecord], metric_id: &str) -> Vec<DetailLine> {
    rows.iter()
        .filter(|r| r.metric_id == metric_id)
        .map(|r| DetailLine {
            datestamp: r.datestamp,
            resource: r.resource.clone(),
            compliance: r.compliance,
            detail: r.detail.clone(),
            status: if r.compliance == 0.0 {
                Rag::Red
            } else if r.compliance == 1.0 {
                Rag::Green
            } else {
                Rag::Amber
            },
        })
        .collect()
}

/// Thin a trend axis to at most 12 dates from the last 12 months: the first,
/// the last and up to 10 evenly spaced ones in between
pub fn sample_dates(dates: &[NaiveDate], today: NaiveDate) -> Vec<NaiveDate> {
    let since = today.checked_sub_months(Months::new(12)).unwrap_or(NaiveDate::MIN);
    let window: Vec<NaiveDate> = dates
        .iter()
        .copied()
        .filter(|d| *d >= since)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let n = window.len();
    if n < 12 {
        return window;
    }

    let mut picked = BTreeSet::new();
    picked.insert(window[0]);
    picked.insert(window[n - 1]);
    let step = (n - 2) / 10;
    if step > 0 {
        picked.extend(window[1..n - 1].iter().step_by(step).take(10).copied());
    }
    picked.into_iter().collect()
}

/// Distinct values per declared dimension among the latest rows
pub fn filter_options(rows: &[SummaryRecord], dimensions: &[String]) -> IndexMap<String, Vec<String>> {
    let current = latest(rows);
    dimensions
        .iter()
        .map(|d| {
            let values: BTreeSet<String> = current.iter().map(|r| r.dimension(d).to_string()).collect();
            (d.clone(), values.into_iter().collect())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn row(metric: &str, day: NaiveDate, category: &str, team: &str, totalok: f64, total: f64) -> SummaryRecord {
        let mut dimensions = Dimensions::new();
        dimensions.insert("team".to_string(), team.to_string());
        SummaryRecord {
            datestamp: day,
            metric_id: metric.to_string(),
            title: format!("{} title", metric),
            category: category.to_string(),
            slo: 0.95,
            slo_min: 0.90,
            weight: 0.5,
            indicator: false,
            dimensions,
            totalok,
            total,
        }
    }

    fn sample() -> Vec<SummaryRecord> {
        let d1 = ymd(2024, 6, 1);
        let d2 = ymd(2024, 6, 2);
        vec![
            row("m1", d1, "storage", "blue", 1.0, 2.0),
            row("m1", d2, "storage", "blue", 9.0, 10.0),
            row("m1", d2, "storage", "red", 5.0, 5.0),
            row("m2", d2, "network", "blue", 14.0, 15.0),
        ]
    }

    #[test]
    fn test_filter_and_latest() {
        let rows = sample();
        let blue = Filter::new().with("team", "blue").apply(&rows);
        assert_eq!(blue.len(), 3);

        let newest = latest(&rows);
        assert_eq!(newest.len(), 3);
        assert!(newest.iter().all(|r| r.datestamp == ymd(2024, 6, 2)));
        assert!(latest(&[]).is_empty());
    }

    #[test]
    fn test_filter_from_query_ignores_undeclared_and_empty() {
        let mut dims = IndexMap::new();
        dims.insert("team".to_string(), "Team".to_string());
        dims.insert("region".to_string(), "Region".to_string());
        let mut query = HashMap::new();
        query.insert("team".to_string(), "blue".to_string());
        query.insert("region".to_string(), "".to_string());
        query.insert("colour".to_string(), "green".to_string());

        assert_eq!(Filter::from_query(&dims, &query), Filter::new().with("team", "blue"));
    }

    #[test]
    fn test_overview_weighted_by_metric() {
        let points = overview(&sample());
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].datestamp, ymd(2024, 6, 1));
        assert_eq!(points[0].score, Some(0.5));
        assert_eq!(points[0].status, Status::Red);

        // m1 = 14/15, m2 = 14/15, equal weights
        let day2 = points[1].score.unwrap();
        assert!((day2 - 14.0 / 15.0).abs() < 1e-12);
        assert_eq!(points[1].status, Status::Amber);
    }

    #[test]
    fn test_zero_weight_group_is_no_data() {
        let mut rows = sample();
        for r in &mut rows {
            r.weight = 0.0;
        }
        let points = overview(&rows);
        assert!(points.iter().all(|p| p.score.is_none() && p.status == Status::NoData));
    }

    #[test]
    fn test_by_category_sorted_descending() {
        let mut rows = latest(&sample());
        rows.push(row("m3", ymd(2024, 6, 2), "compute", "blue", 1.0, 10.0));
        let lines = by_category(&rows);

        let groups: Vec<&str> = lines.iter().map(|l| l.group.as_str()).collect();
        assert_eq!(groups, vec!["network", "storage", "compute"]);
        assert_eq!(lines[1].score, Some(14.0 / 15.0));
        assert_eq!(lines[2].status, Status::Red);
    }

    #[test]
    fn test_by_dimension() {
        let lines = by_dimension(&latest(&sample()), "team");
        assert_eq!(lines[0].group, "red");
        assert_eq!(lines[0].status, Status::Green);
        let missing = by_dimension(&latest(&sample()), "region");
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].group, "undefined");
    }

    #[test]
    fn test_metrics_table_display() {
        let mut rows = latest(&sample());
        rows.push({
            let mut r = row("m3", ymd(2024, 6, 2), "defects", "blue", 0.0, 7.0);
            r.indicator = true;
            r.slo = 5.0;
            r.slo_min = 10.0;
            r
        });
        let lines = metrics_table(&rows);

        assert_eq!(lines[0].metric_id, "m1");
        assert_eq!(lines[0].display, "93.33%");
        let m3 = lines.iter().find(|l| l.metric_id == "m3").unwrap();
        assert_eq!(m3.display, "7");
        assert_eq!(m3.status, Status::Amber);
    }

    #[test]
    fn test_metrics_table_no_observations() {
        let lines = metrics_table(&[row("m1", ymd(2024, 6, 2), "storage", "blue", 0.0, 0.0)]);
        assert_eq!(lines[0].display, "n/a");
        assert_eq!(lines[0].status, Status::NoData);
    }

    #[test]
    fn test_detail_table_row_status() {
        let base = DetailRecord {
            datestamp: ymd(2024, 6, 2),
            metric_id: "m1".to_string(),
            resource: "r1".to_string(),
            compliance: 0.0,
            count: 1.0,
            detail: String::new(),
            title: "m1".to_string(),
            category: "storage".to_string(),
            slo: 0.95,
            slo_min: 0.9,
            weight: 0.5,
            indicator: false,
            dimensions: Dimensions::new(),
        };
        let rows: Vec<DetailRecord> = [0.0, 1.0, 0.5]
            .iter()
            .map(|c| DetailRecord {
                compliance: *c,
                ..base.clone()
            })
            .chain(std::iter::once(DetailRecord {
                metric_id: "m2".to_string(),
                ..base.clone()
            }))
            .collect();

        let statuses: Vec<Rag> = detail_table(&rows, "m1").iter().map(|l| l.status).collect();
        assert_eq!(statuses, vec![Rag::Red, Rag::Green, Rag::Amber]);
    }

    #[test]
    fn test_sample_dates_keeps_small_sets() {
        let today = ymd(2024, 6, 15);
        let dates = vec![ymd(2024, 6, 1), ymd(2024, 6, 1), ymd(2023, 1, 1), ymd(2024, 5, 1)];
        assert_eq!(sample_dates(&dates, today), vec![ymd(2024, 5, 1), ymd(2024, 6, 1)]);
    }

    #[test]
    fn test_sample_dates_thins_long_axis() {
        let today = ymd(2024, 6, 15);
        let dates: Vec<NaiveDate> = (0..100)
            .map(|d| today - chrono::Duration::days(d))
            .collect();
        let sampled = sample_dates(&dates, today);

        assert_eq!(sampled.len(), 12);
        assert_eq!(sampled.first(), Some(&(today - chrono::Duration::days(99))));
        assert_eq!(sampled.last(), Some(&today));
    }

    #[test]
    fn test_filter_options_from_latest() {
        let options = filter_options(&sample(), &["team".to_string(), "region".to_string()]);
        assert_eq!(options["team"], vec!["blue".to_string(), "red".to_string()]);
        assert_eq!(options["region"], vec!["undefined".to_string()]);
    }
}
