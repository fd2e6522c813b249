//! Metrics engine - ingestion pipeline and store access.
//!
//! ```text
//! RawBatch -> normalize -> upsert detail (merge + prune)
//!                       -> aggregate -> upsert summary (merge + retain)
//!                                    -> mirrors (best effort)
//! ```
//!
//! A batch that fails validation touches neither store. Mirror failures are
//! logged and never fail an ingest.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use super::aggregate::aggregate;
use super::config::EngineConfig;
use super::dataset::{load_file, DetailRecord, FormatError, MetricMode, RawBatch, SummaryRecord};
use super::rag::NoData;
use super::report::{self, Filter, OverviewPoint};
use super::store::{mirrors_from_env, Mirror, MirrorPayload, ParquetStore, StoreError, StoreRecord};
use super::validate::{normalize, ValidationError};
use super::{detail, summary};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    NoData(#[from] NoData),
}

/// Per-metric score of an ingested batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreLine {
    pub metric_id: String,
    pub totalok: f64,
    pub total: f64,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    pub batch_id: Uuid,
    pub uploaded: usize,
    pub result: Vec<ScoreLine>,
}

pub struct MetricsEngine {
    config: EngineConfig,
    detail: ParquetStore<DetailRecord>,
    summary: ParquetStore<SummaryRecord>,
    mirrors: Vec<Box<dyn Mirror>>,
}

impl MetricsEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_mirrors(config, Vec::new())
    }

    /// Mirrors configured from the environment
    pub fn from_env(config: EngineConfig) -> Self {
        Self::with_mirrors(config, mirrors_from_env())
    }

    pub fn with_mirrors(config: EngineConfig, mirrors: Vec<Box<dyn Mirror>>) -> Self {
        let dimensions = config.dimension_names();
        Self {
            detail: ParquetStore::new(config.data.detail.clone(), dimensions.clone()),
            summary: ParquetStore::new(config.data.summary.clone(), dimensions),
            config,
            mirrors,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ========================================================================
    // INGEST
    // ========================================================================

    pub fn ingest(&self, batch: &RawBatch) -> Result<IngestReport, EngineError> {
        self.ingest_at(batch, Local::now().naive_local())
    }

    /// Ingest with an explicit clock; `now` fills missing datestamps and
    /// anchors both retention windows
    pub fn ingest_at(&self, batch: &RawBatch, now: NaiveDateTime) -> Result<IngestReport, EngineError> {
        let batch_id = Uuid::new_v4();
        let records = normalize(batch, &self.config.dimensions, self.config.validation, now)?;
        let aggregates = aggregate(&records);
        let uploaded = records.len();
        let result = score_lines(&aggregates);

        log::info!(
            "Batch {}: {} rows across {} metrics",
            batch_id,
            uploaded,
            result.len()
        );

        let today = now.date();
        let detail_rows = self.upsert_detail(records, today)?;
        let summary_rows = self.upsert_summary(aggregates, today)?;

        log::info!(
            "Batch {} stored: detail={} rows, summary={} rows",
            batch_id,
            detail_rows,
            summary_rows
        );

        Ok(IngestReport {
            batch_id,
            uploaded,
            result,
        })
    }

    /// Load a CSV / JSON / parquet file and ingest it
    pub fn ingest_file(&self, path: &Path) -> Result<IngestReport, EngineError> {
        let batch = load_file(path)?;
        log::info!("Loaded {} rows from {}", batch.len(), path.display());
        self.ingest(&batch)
    }

    /// Replace-by-metric merge, prune, persist. Returns the stored row count.
    pub fn upsert_detail(&self, records: Vec<DetailRecord>, today: NaiveDate) -> Result<usize, StoreError> {
        let days = self.config.retention.detail_days;
        let rows = self
            .detail
            .update(|existing| detail::prune(detail::merge(existing, records), days, today))?;
        self.publish(&self.detail, &rows);
        Ok(rows.len())
    }

    /// Key-pair merge, retention, persist. Returns the stored row count.
    pub fn upsert_summary(&self, new_rows: Vec<SummaryRecord>, today: NaiveDate) -> Result<usize, StoreError> {
        let policy = self.config.retention.summary_policy();
        let rows = self
            .summary
            .update(|existing| summary::retain(summary::merge(existing, new_rows), policy, today))?;
        self.publish(&self.summary, &rows);
        Ok(rows.len())
    }

    fn publish<R: StoreRecord>(&self, store: &ParquetStore<R>, rows: &[R]) {
        if self.mirrors.is_empty() {
            return;
        }
        let payload = MirrorPayload::build(store.path(), rows, store.dimensions());
        for mirror in &self.mirrors {
            if let Err(e) = mirror.publish(&payload) {
                log::warn!("Mirror {} failed for {} store: {}", mirror.name(), R::TABLE, e);
            }
        }
    }

    // ========================================================================
    // READ
    // ========================================================================

    pub fn load_detail(&self) -> Result<Vec<DetailRecord>, StoreError> {
        self.detail.load()
    }

    pub fn load_summary(&self) -> Result<Vec<SummaryRecord>, StoreError> {
        self.summary.load()
    }

    /// Latest overall score for the filtered summary
    pub fn current_score(&self, filter: &Filter) -> Result<OverviewPoint, EngineError> {
        let rows = filter.apply(&self.load_summary()?);
        report::overview(&report::latest(&rows))
            .pop()
            .filter(|p| p.score.is_some())
            .ok_or(EngineError::NoData(NoData))
    }
}

/// Sum a batch's aggregates per metric
fn score_lines(aggregates: &[SummaryRecord]) -> Vec<ScoreLine> {
    let mut metrics: BTreeMap<&str, (MetricMode, f64, f64)> = BTreeMap::new();
    for s in aggregates {
        let entry = metrics
            .entry(s.metric_id.as_str())
            .or_insert((s.mode(), 0.0, 0.0));
        entry.1 += s.totalok;
        entry.2 += s.total;
    }

    metrics
        .into_iter()
        .map(|(metric_id, (mode, totalok, total))| ScoreLine {
            metric_id: metric_id.to_string(),
            totalok,
            total,
            score: mode.score(totalok, total),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::dataset::parse_csv;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    struct FailingMirror {
        calls: Arc<AtomicUsize>,
    }

    impl Mirror for FailingMirror {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn publish(&self, _payload: &MirrorPayload<'_>) -> Result<(), StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Mirror {
                mirror: "failing",
                message: "unreachable".to_string(),
            })
        }
    }

    fn config(dir: &TempDir) -> EngineConfig {
        let mut config = EngineConfig::default();
        config.data.detail = dir.path().join("detail.parquet");
        config.data.summary = dir.path().join("summary.parquet");
        config
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 15)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_score_lines_per_metric() {
        let batch = parse_csv(b"metric_id,resource,compliance\nm1,r1,1\nm1,r2,0\nm2,r1,1\n").unwrap();
        let dir = TempDir::new().unwrap();
        let engine = MetricsEngine::new(config(&dir));

        let report = engine.ingest_at(&batch, now()).unwrap();
        assert_eq!(report.uploaded, 3);
        assert_eq!(
            report.result,
            vec![
                ScoreLine {
                    metric_id: "m1".to_string(),
                    totalok: 1.0,
                    total: 2.0,
                    score: Some(0.5)
                },
                ScoreLine {
                    metric_id: "m2".to_string(),
                    totalok: 1.0,
                    total: 1.0,
                    score: Some(1.0)
                },
            ]
        );
    }

    #[test]
    fn test_mirror_failure_does_not_fail_ingest() {
        let dir = TempDir::new().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = MetricsEngine::with_mirrors(
            config(&dir),
            vec![Box::new(FailingMirror { calls: calls.clone() })],
        );
        let batch = parse_csv(b"metric_id,resource,compliance\nm1,r1,1\n").unwrap();

        assert!(engine.ingest_at(&batch, now()).is_ok());
        // once per store
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(engine.load_summary().unwrap().len(), 1);
    }

    #[test]
    fn test_current_score_without_data() {
        let dir = TempDir::new().unwrap();
        let engine = MetricsEngine::new(config(&dir));
        assert!(matches!(
            engine.current_score(&Filter::new()),
            Err(EngineError::NoData(_))
        ));
    }

    #[test]
    fn test_old_detail_pruned_across_metrics() {
        let dir = TempDir::new().unwrap();
        let engine = MetricsEngine::new(config(&dir));
        let old = parse_csv(b"datestamp,metric_id,resource,compliance\n2024-06-01,m1,r1,1\n").unwrap();
        let fresh = parse_csv(b"metric_id,resource,compliance\nm2,r1,1\n").unwrap();

        engine.ingest_at(&old, now()).unwrap();
        engine.ingest_at(&fresh, now()).unwrap();

        let detail = engine.load_detail().unwrap();
        assert_eq!(detail.len(), 1);
        assert_eq!(detail[0].metric_id, "m2");
        // summary history is kept
        assert_eq!(engine.load_summary().unwrap().len(), 2);
    }
}
