//! Dataset Module - Batch & Record Types
//!
//! Raw tabular batches as received from clients and files, plus the typed
//! detail/summary records the stores hold.
//!
//! ## Structure
//! - `raw.rs` - column-named untyped batch (`RawBatch`, `RawValue`)
//! - `record.rs` - `DetailRecord`, `SummaryRecord`, `MetricMode`
//! - `formats.rs` - CSV / JSON / parquet decoders

pub mod formats;
pub mod raw;
pub mod record;


pub use formats::{load_file, parse_csv, parse_json, read_parquet, FormatError, InputFormat};
pub use raw::{parse_day, RawBatch, RawValue, RowReader};
pub use record::{DetailRecord, Dimensions, MetricMode, SummaryRecord, CORE_FIELDS};
