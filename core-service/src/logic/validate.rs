//! Batch validation and normalization.
//!
//! Turns a [`RawBatch`] into typed [`DetailRecord`]s. Missing optional columns
//! are defaulted; only a missing `metric_id` or `resource` column rejects the
//! batch outright. Bound checks (0..1 ratios, `slo > slo_min`) depend on the
//! [`ValidationMode`]: count-based (indicator) batches carry raw counts in
//! `compliance`, so bounding them would reject valid data.

use chrono::{NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    DEFAULT_COMPLIANCE, DEFAULT_COUNT, DEFAULT_SLO, DEFAULT_SLO_MIN, DEFAULT_WEIGHT, UNDEFINED,
};
use crate::logic::dataset::{DetailRecord, Dimensions, RawBatch, RawValue, RowReader};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Missing mandatory column : {0}")]
    MissingColumn(String),

    #[error("Values in '{field}' column must be between 0 and 1 (row {row}: {value})")]
    OutOfRange { field: String, row: usize, value: f64 },

    #[error("slo must be greater than slo_min (row {row}: slo={slo}, slo_min={slo_min})")]
    InvalidSlo { row: usize, slo: f64, slo_min: f64 },

    #[error("Invalid value in '{field}' column (row {row}): '{value}'")]
    InvalidValue { field: String, row: usize, value: String },
}

impl ValidationError {
    /// Name of the offending field
    pub fn field(&self) -> &str {
        match self {
            ValidationError::MissingColumn(field) => field,
            ValidationError::OutOfRange { field, .. } => field,
            ValidationError::InvalidSlo { .. } => "slo",
            ValidationError::InvalidValue { field, .. } => field,
        }
    }
}

/// Whether ratio bound checks run on a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Strict unless any row is an indicator (count-based) row
    #[default]
    Auto,
    Strict,
    Lenient,
}

impl ValidationMode {
    fn enforces_bounds(self, records: &[DetailRecord]) -> bool {
        match self {
            ValidationMode::Strict => true,
            ValidationMode::Lenient => false,
            ValidationMode::Auto => !records.iter().any(|r| r.indicator),
        }
    }
}

/// Validate and default a batch. `now` fills a missing `datestamp`.
pub fn normalize(
    batch: &RawBatch,
    dimensions: &IndexMap<String, String>,
    mode: ValidationMode,
    now: NaiveDateTime,
) -> Result<Vec<DetailRecord>, ValidationError> {
    for required in ["metric_id", "resource"] {
        if !batch.has_column(required) {
            return Err(ValidationError::MissingColumn(required.to_string()));
        }
    }

    let today = now.date();
    let records = batch
        .rows()
        .map(|row| detail_from_row(&row, dimensions, today))
        .collect::<Result<Vec<_>, _>>()?;

    if mode.enforces_bounds(&records) {
        check_bounds(&records)?;
    }

    Ok(records)
}

fn detail_from_row(
    row: &RowReader<'_>,
    dimensions: &IndexMap<String, String>,
    today: NaiveDate,
) -> Result<DetailRecord, ValidationError> {
    let metric_id = required_text(row, "metric_id")?;
    let resource = required_text(row, "resource")?;

    Ok(DetailRecord {
        datestamp: day(row, "datestamp")?.unwrap_or(today),
        title: text(row, "title").unwrap_or_else(|| metric_id.clone()),
        metric_id,
        resource,
        compliance: number(row, "compliance", DEFAULT_COMPLIANCE)?,
        count: number(row, "count", DEFAULT_COUNT)?,
        detail: text(row, "detail").unwrap_or_default(),
        category: text(row, "category").unwrap_or_else(|| UNDEFINED.to_string()),
        slo: number(row, "slo", DEFAULT_SLO)?,
        slo_min: number(row, "slo_min", DEFAULT_SLO_MIN)?,
        weight: number(row, "weight", DEFAULT_WEIGHT)?,
        indicator: row.get("indicator").map(RawValue::as_flag).unwrap_or(false),
        dimensions: dimension_values(row, dimensions.keys()),
    })
}

fn check_bounds(records: &[DetailRecord]) -> Result<(), ValidationError> {
    for (row, r) in records.iter().enumerate() {
        for (field, value) in [
            ("slo", r.slo),
            ("slo_min", r.slo_min),
            ("weight", r.weight),
            ("compliance", r.compliance),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ValidationError::OutOfRange {
                    field: field.to_string(),
                    row,
                    value,
                });
            }
        }
        if r.slo <= r.slo_min {
            return Err(ValidationError::InvalidSlo {
                row,
                slo: r.slo,
                slo_min: r.slo_min,
            });
        }
    }
    Ok(())
}

// ============================================================================
// CELL ACCESSORS (shared with the store loaders)
// ============================================================================

pub(crate) fn text(row: &RowReader<'_>, column: &str) -> Option<String> {
    row.get(column).map(RawValue::render)
}

pub(crate) fn required_text(row: &RowReader<'_>, column: &str) -> Result<String, ValidationError> {
    text(row, column).ok_or_else(|| ValidationError::InvalidValue {
        field: column.to_string(),
        row: row.index(),
        value: String::new(),
    })
}

pub(crate) fn number(row: &RowReader<'_>, column: &str, default: f64) -> Result<f64, ValidationError> {
    match row.get(column) {
        None => Ok(default),
        Some(value) => value
            .as_f64()
            .filter(|n| n.is_finite())
            .ok_or_else(|| ValidationError::InvalidValue {
                field: column.to_string(),
                row: row.index(),
                value: value.render(),
            }),
    }
}

pub(crate) fn day(row: &RowReader<'_>, column: &str) -> Result<Option<NaiveDate>, ValidationError> {
    match row.get(column) {
        None => Ok(None),
        Some(value) => value.as_day().map(Some).ok_or_else(|| ValidationError::InvalidValue {
            field: column.to_string(),
            row: row.index(),
            value: value.render(),
        }),
    }
}

pub(crate) fn dimension_values<'k>(
    row: &RowReader<'_>,
    names: impl IntoIterator<Item = &'k String>,
) -> Dimensions {
    names
        .into_iter()
        .map(|name| {
            let value = text(row, name).unwrap_or_else(|| UNDEFINED.to_string());
            (name.clone(), value)
        })
        .collect()
}
