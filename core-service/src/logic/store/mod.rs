//! Store Module - Columnar detail/summary stores
//!
//! Both stores are whole-file artifacts: read fully, mutated in memory and
//! written back with an atomic replace. Writers are serialized per store.
//!
//! ## Structure
//! - `records.rs` - column layout of `DetailRecord` / `SummaryRecord`
//! - `parquet.rs` - local parquet backend (`ParquetStore`)
//! - `mirror.rs` - best-effort object storage and SQLite mirrors

pub mod mirror;
pub mod parquet;
pub mod records;

use std::collections::HashSet;
use std::sync::Arc;

use arrow_array::{ArrayRef, BooleanArray, Float64Array, RecordBatch, StringArray};
use arrow_schema::{ArrowError, DataType, Field, Schema};
use thiserror::Error;

use super::dataset::{RawValue, RowReader};
use super::validate::ValidationError;

pub use self::mirror::{mirrors_from_env, BlobMirror, Mirror, MirrorPayload, SqliteMirror};
pub use self::parquet::ParquetStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] ::parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("Failed to decode {path}: {message}")]
    Decode { path: String, message: String },

    #[error("Invalid row in {table} store: {source}")]
    Schema {
        table: &'static str,
        #[source]
        source: ValidationError,
    },

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Mirror '{mirror}' failed: {message}")]
    Mirror { mirror: &'static str, message: String },
}

/// Physical type of a stored column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Real,
    Flag,
}

impl ColumnKind {
    fn data_type(self) -> DataType {
        match self {
            ColumnKind::Text => DataType::Utf8,
            ColumnKind::Real => DataType::Float64,
            ColumnKind::Flag => DataType::Boolean,
        }
    }

    pub fn sql_type(self) -> &'static str {
        match self {
            ColumnKind::Text => "TEXT",
            ColumnKind::Real => "REAL",
            ColumnKind::Flag => "INTEGER",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// A record type that can live in a store
pub trait StoreRecord: Clone + Send + Sync + 'static {
    /// Table / artifact name
    const TABLE: &'static str;

    /// Columns identifying the rows an incoming record replaces
    const KEY_COLUMNS: &'static [&'static str];

    fn columns(dimensions: &[String]) -> Vec<Column>;

    /// Cells in `columns()` order
    fn to_row(&self, dimensions: &[String]) -> Vec<RawValue>;

    fn from_row(row: &RowReader<'_>, dimensions: &[String]) -> Result<Self, ValidationError>;

    /// Values of `KEY_COLUMNS`
    fn primary_key(&self) -> Vec<String>;
}

/// Replace every existing row whose key appears in `incoming`, then append.
/// Rows with keys absent from `incoming` are never touched.
pub fn upsert_by_key<R: StoreRecord>(existing: Vec<R>, incoming: Vec<R>) -> Vec<R> {
    let keys: HashSet<Vec<String>> = incoming.iter().map(R::primary_key).collect();
    let mut merged = incoming;
    merged.extend(
        existing
            .into_iter()
            .filter(|r| !keys.contains(&r.primary_key())),
    );
    merged
}

/// Build an arrow batch with one nullable column per declared column
pub fn to_record_batch<R: StoreRecord>(rows: &[R], dimensions: &[String]) -> Result<RecordBatch, ArrowError> {
    let columns = R::columns(dimensions);
    let cells: Vec<Vec<RawValue>> = rows.iter().map(|r| r.to_row(dimensions)).collect();

    let fields: Vec<Field> = columns
        .iter()
        .map(|c| Field::new(c.name.as_str(), c.kind.data_type(), true))
        .collect();

    let arrays: Vec<ArrayRef> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| column_array(c.kind, cells.iter().map(|row| &row[i])))
        .collect();

    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)
}

fn column_array<'a>(kind: ColumnKind, values: impl Iterator<Item = &'a RawValue>) -> ArrayRef {
    match kind {
        ColumnKind::Text => Arc::new(
            values
                .map(|v| (!v.is_null()).then(|| v.render()))
                .collect::<StringArray>(),
        ),
        ColumnKind::Real => Arc::new(values.map(RawValue::as_f64).collect::<Float64Array>()),
        ColumnKind::Flag => Arc::new(
            values
                .map(|v| match v {
                    RawValue::Null => None,
                    other => Some(other.as_flag()),
                })
                .collect::<BooleanArray>(),
        ),
    }
}
