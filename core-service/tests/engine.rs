use std::collections::HashSet;
use std::fs;

use assurance_core::logic::dataset::{parse_csv, parse_json};
use assurance_core::logic::report::{self, Filter};
use assurance_core::{classify, EngineConfig, EngineError, MetricsEngine, Rag, Status};
use assurance_core::logic::ValidationError;
use chrono::{NaiveDate, NaiveDateTime};
use tempfile::TempDir;

fn config(dir: &TempDir, extra: &str) -> EngineConfig {
    let yaml = format!(
        "tokens: [t0k3n]\ndimensions:\n  team: Team\ndata:\n  detail: {}\n  summary: {}\n{}",
        dir.path().join("detail.parquet").display(),
        dir.path().join("summary.parquet").display(),
        extra
    );
    EngineConfig::from_yaml_str(&yaml).unwrap()
}

fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

#[test]
fn single_row_batch_gets_defaults_and_green_summary() {
    let dir = TempDir::new().unwrap();
    let engine = MetricsEngine::new(config(&dir, ""));
    let batch = parse_json(br#"[{"metric_id": "m1", "resource": "r1", "compliance": 1}]"#).unwrap();

    let report = engine.ingest_at(&batch, at(2024, 6, 15)).unwrap();
    assert_eq!(report.uploaded, 1);
    assert_eq!(report.result[0].score, Some(1.0));

    let detail = engine.load_detail().unwrap();
    assert_eq!(detail.len(), 1);
    let d = &detail[0];
    assert_eq!(d.slo, 0.95);
    assert_eq!(d.slo_min, 0.90);
    assert_eq!(d.weight, 0.5);
    assert_eq!(d.category, "undefined");
    assert_eq!(d.title, "m1");
    assert_eq!(d.dimensions["team"], "undefined");

    let summary = engine.load_summary().unwrap();
    assert_eq!(summary.len(), 1);
    let s = &summary[0];
    assert_eq!(s.totalok, 1.0);
    assert_eq!(s.total, 1.0);
    assert_eq!(classify(s.score().unwrap(), s.slo, s.slo_min), Rag::Green);
}

#[test]
fn batch_without_resource_touches_no_store() {
    let dir = TempDir::new().unwrap();
    let engine = MetricsEngine::new(config(&dir, ""));
    let good = parse_csv(b"metric_id,resource,compliance\nm1,r1,1\n").unwrap();
    engine.ingest_at(&good, at(2024, 6, 15)).unwrap();

    let detail_before = fs::read(dir.path().join("detail.parquet")).unwrap();
    let summary_before = fs::read(dir.path().join("summary.parquet")).unwrap();

    let bad = parse_csv(b"metric_id,compliance\nm1,0\n").unwrap();
    let err = engine.ingest_at(&bad, at(2024, 6, 15)).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Validation(ValidationError::MissingColumn(ref c)) if c == "resource"
    ));

    assert_eq!(fs::read(dir.path().join("detail.parquet")).unwrap(), detail_before);
    assert_eq!(fs::read(dir.path().join("summary.parquet")).unwrap(), summary_before);
}

#[test]
fn rejected_first_batch_creates_no_files() {
    let dir = TempDir::new().unwrap();
    let engine = MetricsEngine::new(config(&dir, ""));
    let bad = parse_csv(b"resource,compliance\nr1,1\n").unwrap();

    assert!(engine.ingest_at(&bad, at(2024, 6, 15)).is_err());
    assert!(!dir.path().join("detail.parquet").exists());
    assert!(!dir.path().join("summary.parquet").exists());
}

#[test]
fn detail_holds_exactly_the_latest_batch_per_metric() {
    let dir = TempDir::new().unwrap();
    let engine = MetricsEngine::new(config(&dir, ""));
    let now = at(2024, 6, 15);

    let first = parse_csv(b"metric_id,resource,compliance\nm1,a,1\nm1,b,0\nm1,c,1\nm2,x,1\n").unwrap();
    engine.ingest_at(&first, now).unwrap();
    let second = parse_csv(b"metric_id,resource,compliance\nm1,d,0\n").unwrap();
    engine.ingest_at(&second, now).unwrap();

    let detail = engine.load_detail().unwrap();
    let m1: Vec<&str> = detail
        .iter()
        .filter(|r| r.metric_id == "m1")
        .map(|r| r.resource.as_str())
        .collect();
    assert_eq!(m1, vec!["d"]);
    assert_eq!(detail.iter().filter(|r| r.metric_id == "m2").count(), 1);
}

#[test]
fn summary_keys_stay_unique_across_reingests() {
    let dir = TempDir::new().unwrap();
    let engine = MetricsEngine::new(config(&dir, ""));
    let batch = parse_csv(
        b"datestamp,metric_id,resource,compliance,team\n\
          2024-06-14,m1,a,1,blue\n\
          2024-06-14,m1,b,0,red\n\
          2024-06-15,m1,a,1,blue\n",
    )
    .unwrap();

    for _ in 0..3 {
        engine.ingest_at(&batch, at(2024, 6, 15)).unwrap();
    }

    let summary = engine.load_summary().unwrap();
    // one row per (metric, day, team)
    assert_eq!(summary.len(), 3);
    let keys: HashSet<(String, NaiveDate, String)> = summary
        .iter()
        .map(|s| (s.metric_id.clone(), s.datestamp, s.dimension("team").to_string()))
        .collect();
    assert_eq!(keys.len(), summary.len());
}

#[test]
fn summary_history_collapses_to_month_ends() {
    let dir = TempDir::new().unwrap();
    let engine = MetricsEngine::new(config(&dir, ""));

    for (metric, day) in [("m1", 3), ("m1", 10), ("m1", 24), ("m2", 10)] {
        let csv = format!("datestamp,metric_id,resource,compliance\n2024-02-{:02},{},r1,1\n", day, metric);
        let batch = parse_csv(csv.as_bytes()).unwrap();
        engine.ingest_at(&batch, at(2024, 6, 15)).unwrap();
    }

    // m2's earlier day in the same month is not the month end
    let kept: Vec<(String, NaiveDate)> = engine
        .load_summary()
        .unwrap()
        .into_iter()
        .map(|s| (s.metric_id, s.datestamp))
        .collect();
    assert_eq!(kept, vec![("m1".to_string(), NaiveDate::from_ymd_opt(2024, 2, 24).unwrap())]);
}

#[test]
fn indicator_batches_skip_ratio_bounds() {
    let dir = TempDir::new().unwrap();
    let engine = MetricsEngine::new(config(&dir, ""));
    let batch = parse_csv(
        b"metric_id,resource,compliance,count,slo,slo_min,indicator\n\
          defects,r1,0,12,5,10,true\n",
    )
    .unwrap();

    let report = engine.ingest_at(&batch, at(2024, 6, 15)).unwrap();
    assert_eq!(report.result[0].score, Some(12.0));

    let summary = engine.load_summary().unwrap();
    let s = &summary[0];
    // lower is better, 12 is past slo_min
    assert_eq!(classify(s.score().unwrap(), s.slo, s.slo_min), Rag::Red);
}

#[test]
fn strict_mode_rejects_counts() {
    let dir = TempDir::new().unwrap();
    let engine = MetricsEngine::new(config(&dir, "validation: strict\n"));
    let batch = parse_csv(b"metric_id,resource,compliance\nm1,r1,7\n").unwrap();

    let err = engine.ingest_at(&batch, at(2024, 6, 15)).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Validation(ValidationError::OutOfRange { ref field, .. }) if field == "compliance"
    ));
}

#[test]
fn reports_over_ingested_data() {
    let dir = TempDir::new().unwrap();
    let engine = MetricsEngine::new(config(&dir, ""));
    let batch = parse_csv(
        b"metric_id,resource,compliance,category,team\n\
          m1,a,1,storage,blue\n\
          m1,b,1,storage,red\n\
          m2,c,0,network,blue\n",
    )
    .unwrap();
    engine.ingest_at(&batch, at(2024, 6, 15)).unwrap();

    let summary = engine.load_summary().unwrap();
    let categories = report::by_category(&report::latest(&summary));
    assert_eq!(categories[0].group, "storage");
    assert_eq!(categories[0].status, Status::Green);
    assert_eq!(categories[1].status, Status::Red);

    let current = engine.current_score(&Filter::new().with("team", "red")).unwrap();
    assert_eq!(current.score, Some(1.0));

    let lines = report::detail_table(&engine.load_detail().unwrap(), "m2");
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].status, Rag::Red);
}

#[test]
fn concurrent_ingests_lose_no_rows() {
    let dir = TempDir::new().unwrap();
    let engine = std::sync::Arc::new(MetricsEngine::new(config(&dir, "")));

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let engine = engine.clone();
            std::thread::spawn(move || {
                let csv = format!("metric_id,resource,compliance\nm{},r1,1\n", i);
                let batch = parse_csv(csv.as_bytes()).unwrap();
                engine.ingest_at(&batch, at(2024, 6, 15)).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let detail: HashSet<String> = engine.load_detail().unwrap().into_iter().map(|d| d.metric_id).collect();
    let summary: HashSet<String> = engine.load_summary().unwrap().into_iter().map(|s| s.metric_id).collect();
    let expected: HashSet<String> = (0..16).map(|i| format!("m{}", i)).collect();
    assert_eq!(detail, expected);
    assert_eq!(summary, expected);
}
