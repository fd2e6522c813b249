//! assurance-load - one-shot batch load into the detail/summary stores

use std::path::PathBuf;
use std::process::ExitCode;

use assurance_core::constants::{APP_NAME, APP_VERSION};
use assurance_core::logic::dataset::InputFormat;
use assurance_core::{EngineConfig, IngestReport, MetricsEngine};
use clap::Parser;
use tabled::{settings::Style, Table, Tabled};

#[derive(Debug, Parser)]
#[command(name = "assurance-load", version, about = "Load a metrics file into the assurance stores")]
struct Cli {
    /// Engine configuration (YAML)
    #[arg(long, default_value = "config.yml")]
    config: PathBuf,

    /// File to load (.csv, .json, .jsonl or .parquet)
    #[arg(long)]
    load: PathBuf,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    log::info!("{} loader v{}", APP_NAME, APP_VERSION);

    if !cli.load.exists() {
        println!("File {} does not exist, nothing to load", cli.load.display());
        return ExitCode::SUCCESS;
    }
    if let Err(e) = InputFormat::from_path(&cli.load) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    match run(&cli) {
        Ok(report) => {
            print!("{}", render_report(&report));
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("Load failed: {}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<IngestReport> {
    let config = EngineConfig::from_file(&cli.config)?;
    let engine = MetricsEngine::from_env(config);
    Ok(engine.ingest_file(&cli.load)?)
}

#[derive(Tabled)]
struct ScoreRow {
    metric_id: String,
    totalok: f64,
    total: f64,
    score: String,
}

fn render_report(report: &IngestReport) -> String {
    let rows = report.result.iter().map(|line| ScoreRow {
        metric_id: line.metric_id.clone(),
        totalok: line.totalok,
        total: line.total,
        score: line
            .score
            .map(|s| format!("{:.4}", s))
            .unwrap_or_else(|| "-".to_string()),
    });

    let mut table = Table::new(rows);
    table.with(Style::psql());
    format!(
        "Batch {} - uploaded {} records\n{}\n",
        report.batch_id, report.uploaded, table
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use assurance_core::ScoreLine;
    use uuid::Uuid;

    #[test]
    fn test_cli_parses_flags() {
        let cli = Cli::try_parse_from(["assurance-load", "--config", "c.yml", "--load", "batch.csv"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("c.yml"));
        assert_eq!(cli.load, PathBuf::from("batch.csv"));
    }

    #[test]
    fn test_load_flag_required() {
        assert!(Cli::try_parse_from(["assurance-load"]).is_err());
    }

    #[test]
    fn test_render_report() {
        let report = IngestReport {
            batch_id: Uuid::nil(),
            uploaded: 2,
            result: vec![ScoreLine {
                metric_id: "encrypted_disks".to_string(),
                totalok: 1.0,
                total: 2.0,
                score: Some(0.5),
            }],
        };
        let text = render_report(&report);
        assert!(text.contains("uploaded 2 records"));
        assert!(text.contains("encrypted_disks"));
        assert!(text.contains("0.5000"));
        assert!(text.lines().nth(1).unwrap().contains("metric_id"));
    }

    #[test]
    fn test_render_report_without_score() {
        let report = IngestReport {
            batch_id: Uuid::nil(),
            uploaded: 1,
            result: vec![ScoreLine {
                metric_id: "empty".to_string(),
                totalok: 0.0,
                total: 0.0,
                score: None,
            }],
        };
        let text = render_report(&report);
        let row = text.lines().find(|l| l.contains("empty")).unwrap();
        assert!(row.trim_end().ends_with('-'));
    }
}
