//! Input decoders: CSV text, JSON records and parquet files into a [`RawBatch`].

use std::fs::File;
use std::path::Path;

use arrow_array::cast::AsArray;
use arrow_array::types::{
    Date32Type, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type,
    TimestampMicrosecondType, TimestampMillisecondType, TimestampNanosecondType,
    TimestampSecondType, UInt16Type, UInt32Type, UInt64Type, UInt8Type,
};
use arrow_array::{Array, ArrayRef, RecordBatch};
use arrow_schema::{DataType, TimeUnit};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value;
use thiserror::Error;

use super::raw::{RawBatch, RawValue};

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("Unknown file format '{0}'. Must end with either .csv, .json, or .parquet")]
    UnknownExtension(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),
    #[error("Unsupported column type for '{column}': {data_type}")]
    UnsupportedColumn { column: String, data_type: String },
    #[error("Malformed input: {0}")]
    Shape(String),
}

/// Supported batch encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    Json,
    Parquet,
}

impl InputFormat {
    pub fn from_path(path: &Path) -> Result<Self, FormatError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => Ok(InputFormat::Csv),
            "json" | "jsonl" => Ok(InputFormat::Json),
            "parquet" => Ok(InputFormat::Parquet),
            _ => Err(FormatError::UnknownExtension(path.display().to_string())),
        }
    }
}

/// Load a batch from disk, picking the decoder by file extension
pub fn load_file(path: &Path) -> Result<RawBatch, FormatError> {
    match InputFormat::from_path(path)? {
        InputFormat::Csv => parse_csv(&std::fs::read(path)?),
        InputFormat::Json => parse_json(&std::fs::read(path)?),
        InputFormat::Parquet => read_parquet(path),
    }
}

// ============================================================================
// CSV
// ============================================================================

/// Header row plus comma-delimited rows. Empty cells become nulls.
pub fn parse_csv(data: &[u8]) -> Result<RawBatch, FormatError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(data);

    let headers = reader.headers()?.clone();
    let mut batch = RawBatch::new(headers.iter());

    for record in reader.records() {
        let record = record?;
        let row = record
            .iter()
            .map(|cell| {
                if cell.is_empty() {
                    RawValue::Null
                } else {
                    RawValue::Text(cell.to_string())
                }
            })
            .collect();
        batch.push_row(row);
    }

    Ok(batch)
}

// ============================================================================
// JSON
// ============================================================================

/// Accepts an array of records, JSON lines, or a column-oriented object
/// (`{"col": [..]}` or `{"col": {"0": ..}}`).
pub fn parse_json(data: &[u8]) -> Result<RawBatch, FormatError> {
    let text = std::str::from_utf8(data).map_err(|e| FormatError::Shape(e.to_string()))?;
    let trimmed = text.trim_start();

    if trimmed.is_empty() {
        return Ok(RawBatch::default());
    }

    let records: Vec<Value> = match serde_json::from_str::<Value>(text) {
        Ok(Value::Array(items)) => items,
        Ok(Value::Object(map)) => return columns_to_batch(map),
        Ok(other) => {
            return Err(FormatError::Shape(format!(
                "expected an array of records, got {}",
                json_kind(&other)
            )))
        }
        // Not a single document: try JSON lines
        Err(_) => text
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(serde_json::from_str::<Value>)
            .collect::<Result<_, _>>()?,
    };

    records_to_batch(records)
}

fn records_to_batch(records: Vec<Value>) -> Result<RawBatch, FormatError> {
    let mut columns: Vec<String> = Vec::new();
    for record in &records {
        let obj = record
            .as_object()
            .ok_or_else(|| FormatError::Shape(format!("expected a record, got {}", json_kind(record))))?;
        for key in obj.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }

    let mut batch = RawBatch::new(columns.clone());
    for record in &records {
        if let Some(obj) = record.as_object() {
            let row = columns
                .iter()
                .map(|c| obj.get(c).map(json_cell).unwrap_or(RawValue::Null))
                .collect();
            batch.push_row(row);
        }
    }
    Ok(batch)
}

fn columns_to_batch(map: serde_json::Map<String, Value>) -> Result<RawBatch, FormatError> {
    let mut columns = Vec::with_capacity(map.len());
    let mut values: Vec<Vec<RawValue>> = Vec::with_capacity(map.len());

    for (name, column) in map {
        let cells: Vec<RawValue> = match column {
            Value::Array(items) => items.iter().map(json_cell).collect(),
            Value::Object(index) => {
                // pandas "columns" orient: {"0": v, "1": v}
                let mut pairs: Vec<(usize, RawValue)> = index
                    .iter()
                    .map(|(k, v)| {
                        k.parse::<usize>()
                            .map(|i| (i, json_cell(v)))
                            .map_err(|_| FormatError::Shape(format!("non-numeric row index '{}'", k)))
                    })
                    .collect::<Result<_, _>>()?;
                pairs.sort_by_key(|(i, _)| *i);
                pairs.into_iter().map(|(_, v)| v).collect()
            }
            other => {
                return Err(FormatError::Shape(format!(
                    "column '{}' must be an array or object, got {}",
                    name,
                    json_kind(&other)
                )))
            }
        };
        columns.push(name);
        values.push(cells);
    }

    let height = values.iter().map(Vec::len).max().unwrap_or(0);
    let mut batch = RawBatch::new(columns);
    for row in 0..height {
        batch.push_row(
            values
                .iter()
                .map(|col| col.get(row).cloned().unwrap_or(RawValue::Null))
                .collect(),
        );
    }
    Ok(batch)
}

fn json_cell(value: &Value) -> RawValue {
    match value {
        Value::Null => RawValue::Null,
        Value::Bool(b) => RawValue::Bool(*b),
        Value::Number(n) => n.as_f64().map(RawValue::Number).unwrap_or(RawValue::Null),
        Value::String(s) => RawValue::Text(s.clone()),
        other => RawValue::Text(other.to_string()),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ============================================================================
// PARQUET
// ============================================================================

/// Read every row group of a parquet file
pub fn read_parquet(path: &Path) -> Result<RawBatch, FormatError> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;

    let mut batch = RawBatch::new(schema.fields().iter().map(|f| f.name().clone()));
    for record_batch in reader {
        append_record_batch(&mut batch, &record_batch?)?;
    }
    Ok(batch)
}

/// Copy an arrow batch into the raw batch; column order must match
pub fn append_record_batch(batch: &mut RawBatch, record_batch: &RecordBatch) -> Result<(), FormatError> {
    let schema = record_batch.schema();
    for row in 0..record_batch.num_rows() {
        let cells = record_batch
            .columns()
            .iter()
            .zip(schema.fields().iter())
            .map(|(column, field)| arrow_cell(column, row, field.name()))
            .collect::<Result<Vec<_>, _>>()?;
        batch.push_row(cells);
    }
    Ok(())
}

fn arrow_cell(array: &ArrayRef, row: usize, column: &str) -> Result<RawValue, FormatError> {
    if array.is_null(row) {
        return Ok(RawValue::Null);
    }

    let value = match array.data_type() {
        DataType::Utf8 => RawValue::Text(array.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => RawValue::Text(array.as_string::<i64>().value(row).to_string()),
        DataType::Boolean => RawValue::Bool(array.as_boolean().value(row)),
        DataType::Float64 => RawValue::Number(array.as_primitive::<Float64Type>().value(row)),
        DataType::Float32 => RawValue::Number(array.as_primitive::<Float32Type>().value(row) as f64),
        DataType::Int64 => RawValue::Number(array.as_primitive::<Int64Type>().value(row) as f64),
        DataType::Int32 => RawValue::Number(array.as_primitive::<Int32Type>().value(row) as f64),
        DataType::Int16 => RawValue::Number(array.as_primitive::<Int16Type>().value(row) as f64),
        DataType::Int8 => RawValue::Number(array.as_primitive::<Int8Type>().value(row) as f64),
        DataType::UInt64 => RawValue::Number(array.as_primitive::<UInt64Type>().value(row) as f64),
        DataType::UInt32 => RawValue::Number(array.as_primitive::<UInt32Type>().value(row) as f64),
        DataType::UInt16 => RawValue::Number(array.as_primitive::<UInt16Type>().value(row) as f64),
        DataType::UInt8 => RawValue::Number(array.as_primitive::<UInt8Type>().value(row) as f64),
        DataType::Date32 => array
            .as_primitive::<Date32Type>()
            .value_as_date(row)
            .map(|d| RawValue::Text(d.format("%Y-%m-%d").to_string()))
            .unwrap_or(RawValue::Null),
        DataType::Timestamp(unit, _) => {
            let ts = match unit {
                TimeUnit::Second => array.as_primitive::<TimestampSecondType>().value_as_datetime(row),
                TimeUnit::Millisecond => array.as_primitive::<TimestampMillisecondType>().value_as_datetime(row),
                TimeUnit::Microsecond => array.as_primitive::<TimestampMicrosecondType>().value_as_datetime(row),
                TimeUnit::Nanosecond => array.as_primitive::<TimestampNanosecondType>().value_as_datetime(row),
            };
            ts.map(|t| RawValue::Text(t.format("%Y-%m-%d %H:%M:%S").to_string()))
                .unwrap_or(RawValue::Null)
        }
        other => {
            return Err(FormatError::UnsupportedColumn {
                column: column.to_string(),
                data_type: other.to_string(),
            })
        }
    };
    Ok(value)
}
