//! Logic Module - Metrics Ingestion & Retention Engine
//!
//! ## Pipeline
//! - `validate` - defaults and rejects incoming batches
//! - `detail` - replace-by-metric detail upsert + short retention
//! - `aggregate` - per-day / per-dimension totals
//! - `summary` - key-pair summary upsert + two-tier retention
//! - `rag` - red / amber / green classification
//!
//! ## Supporting modules
//! - `dataset/` - raw batches, typed records, input formats
//! - `store/` - parquet stores and mirrors
//! - `report` - read-side roll-ups for dashboards
//! - `engine` - the facade wiring it all together

pub mod aggregate;
pub mod config;
pub mod dataset;
pub mod detail;
pub mod engine;
pub mod rag;
pub mod report;
pub mod store;
pub mod summary;
pub mod validate;

pub use config::{ConfigError, EngineConfig};
pub use engine::{EngineError, IngestReport, MetricsEngine, ScoreLine};
pub use rag::{classify, Rag, Status};
pub use validate::{ValidationError, ValidationMode};
