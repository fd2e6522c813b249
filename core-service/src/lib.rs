//! Continuous assurance engine.
//!
//! Ingests batches of compliance-check results, keeps a short-lived detail
//! store and a long-lived per-day summary store, and classifies scores
//! against service-level thresholds.

pub mod constants;
pub mod logic;

pub use logic::{
    classify, EngineConfig, EngineError, IngestReport, MetricsEngine, Rag, ScoreLine, Status,
};
