//! Untyped tabular batch as received from CSV, JSON or parquet inputs.
//!
//! Column presence matters to validation (a missing `metric_id` column is an
//! error, a missing `slo` column is defaulted), so the batch keeps the header
//! separate from the cells instead of deserializing straight into records.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// A single cell
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl RawValue {
    pub fn is_null(&self) -> bool {
        match self {
            RawValue::Null => true,
            RawValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Text rendering used for string fields and error messages
    pub fn render(&self) -> String {
        match self {
            RawValue::Null => String::new(),
            RawValue::Bool(b) => b.to_string(),
            RawValue::Number(n) => format_number(*n),
            RawValue::Text(s) => s.clone(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RawValue::Number(n) => Some(*n),
            RawValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            RawValue::Text(s) => s.trim().parse::<f64>().ok(),
            RawValue::Null => None,
        }
    }

    /// Case-insensitive "true" is true, anything else is false
    pub fn as_flag(&self) -> bool {
        match self {
            RawValue::Bool(b) => *b,
            RawValue::Number(n) => *n != 0.0,
            RawValue::Text(s) => s.trim().eq_ignore_ascii_case("true"),
            RawValue::Null => false,
        }
    }

    pub fn as_day(&self) -> Option<NaiveDate> {
        match self {
            RawValue::Text(s) => parse_day(s),
            _ => None,
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Text(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

impl From<bool> for RawValue {
    fn from(value: bool) -> Self {
        RawValue::Bool(value)
    }
}

/// Integral floats render without a trailing `.0` so numeric ids stay readable
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS[.f]`, ISO `T` separated and RFC 3339
pub fn parse_day(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if let Ok(day) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(day);
    }
    for fmt in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(ts.date());
        }
    }
    DateTime::parse_from_rfc3339(text).ok().map(|ts| ts.date_naive())
}

/// Column-named rows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawBatch {
    columns: Vec<String>,
    rows: Vec<Vec<RawValue>>,
}

impl RawBatch {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row; short rows are padded with nulls, long rows truncated
    pub fn push_row(&mut self, mut row: Vec<RawValue>) {
        row.resize(self.columns.len(), RawValue::Null);
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn rows(&self) -> impl Iterator<Item = RowReader<'_>> {
        self.rows.iter().enumerate().map(move |(index, cells)| RowReader {
            batch: self,
            index,
            cells,
        })
    }
}

/// Borrowed view over one row with by-name lookup
#[derive(Debug, Clone, Copy)]
pub struct RowReader<'a> {
    batch: &'a RawBatch,
    index: usize,
    cells: &'a [RawValue],
}

impl<'a> RowReader<'a> {
    /// Zero-based position of the row inside its batch
    pub fn index(&self) -> usize {
        self.index
    }

    /// `None` when the column is absent or the cell is null
    pub fn get(&self, column: &str) -> Option<&'a RawValue> {
        let cells: &'a [RawValue] = self.cells;
        self.batch
            .column_index(column)
            .map(|i| &cells[i])
            .filter(|v| !v.is_null())
    }
}
