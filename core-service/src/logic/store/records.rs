//! Column layout of the detail and summary stores.
//!
//! Declared dimensions sit after the descriptive columns. Loading tolerates
//! artifacts written before a dimension (or `count` / `indicator`) existed:
//! absent cells fall back to the same defaults ingest uses.

use crate::constants::{
    DEFAULT_COMPLIANCE, DEFAULT_COUNT, DEFAULT_SLO, DEFAULT_SLO_MIN, DEFAULT_WEIGHT, UNDEFINED,
};
use crate::logic::dataset::{DetailRecord, RawValue, RowReader, SummaryRecord};
use crate::logic::validate::{day, dimension_values, number, required_text, text, ValidationError};

use super::{Column, ColumnKind, StoreRecord};

fn required_day(row: &RowReader<'_>) -> Result<chrono::NaiveDate, ValidationError> {
    day(row, "datestamp")?.ok_or_else(|| ValidationError::InvalidValue {
        field: "datestamp".to_string(),
        row: row.index(),
        value: String::new(),
    })
}

fn dimension_columns(dimensions: &[String]) -> impl Iterator<Item = Column> + '_ {
    dimensions.iter().map(|d| Column::new(d.as_str(), ColumnKind::Text))
}

fn dimension_cells<'a>(
    values: &'a crate::logic::dataset::Dimensions,
    dimensions: &'a [String],
) -> impl Iterator<Item = RawValue> + 'a {
    dimensions.iter().map(move |d| {
        RawValue::Text(values.get(d).cloned().unwrap_or_else(|| UNDEFINED.to_string()))
    })
}

// ============================================================================
// DETAIL
// ============================================================================

impl StoreRecord for DetailRecord {
    const TABLE: &'static str = "detail";
    const KEY_COLUMNS: &'static [&'static str] = &["metric_id"];

    fn columns(dimensions: &[String]) -> Vec<Column> {
        let mut columns = vec![
            Column::new("datestamp", ColumnKind::Text),
            Column::new("metric_id", ColumnKind::Text),
            Column::new("resource", ColumnKind::Text),
            Column::new("compliance", ColumnKind::Real),
            Column::new("count", ColumnKind::Real),
            Column::new("detail", ColumnKind::Text),
            Column::new("title", ColumnKind::Text),
            Column::new("category", ColumnKind::Text),
            Column::new("slo", ColumnKind::Real),
            Column::new("slo_min", ColumnKind::Real),
            Column::new("weight", ColumnKind::Real),
            Column::new("indicator", ColumnKind::Flag),
        ];
        columns.extend(dimension_columns(dimensions));
        columns
    }

    fn to_row(&self, dimensions: &[String]) -> Vec<RawValue> {
        let mut row = vec![
            RawValue::Text(self.datestamp.format("%Y-%m-%d").to_string()),
            RawValue::Text(self.metric_id.clone()),
            RawValue::Text(self.resource.clone()),
            RawValue::Number(self.compliance),
            RawValue::Number(self.count),
            RawValue::Text(self.detail.clone()),
            RawValue::Text(self.title.clone()),
            RawValue::Text(self.category.clone()),
            RawValue::Number(self.slo),
            RawValue::Number(self.slo_min),
            RawValue::Number(self.weight),
            RawValue::Bool(self.indicator),
        ];
        row.extend(dimension_cells(&self.dimensions, dimensions));
        row
    }

    fn from_row(row: &RowReader<'_>, dimensions: &[String]) -> Result<Self, ValidationError> {
        let metric_id = required_text(row, "metric_id")?;
        Ok(DetailRecord {
            datestamp: required_day(row)?,
            resource: text(row, "resource").unwrap_or_default(),
            compliance: number(row, "compliance", DEFAULT_COMPLIANCE)?,
            count: number(row, "count", DEFAULT_COUNT)?,
            detail: text(row, "detail").unwrap_or_default(),
            title: text(row, "title").unwrap_or_else(|| metric_id.clone()),
            category: text(row, "category").unwrap_or_else(|| UNDEFINED.to_string()),
            slo: number(row, "slo", DEFAULT_SLO)?,
            slo_min: number(row, "slo_min", DEFAULT_SLO_MIN)?,
            weight: number(row, "weight", DEFAULT_WEIGHT)?,
            indicator: row.get("indicator").map(RawValue::as_flag).unwrap_or(false),
            dimensions: dimension_values(row, dimensions),
            metric_id,
        })
    }

    fn primary_key(&self) -> Vec<String> {
        vec![self.metric_id.clone()]
    }
}

// ============================================================================
// SUMMARY
// ============================================================================

impl StoreRecord for SummaryRecord {
    const TABLE: &'static str = "summary";
    const KEY_COLUMNS: &'static [&'static str] = &["metric_id", "datestamp"];

    fn columns(dimensions: &[String]) -> Vec<Column> {
        let mut columns = vec![
            Column::new("datestamp", ColumnKind::Text),
            Column::new("metric_id", ColumnKind::Text),
            Column::new("title", ColumnKind::Text),
            Column::new("category", ColumnKind::Text),
            Column::new("slo", ColumnKind::Real),
            Column::new("slo_min", ColumnKind::Real),
            Column::new("weight", ColumnKind::Real),
            Column::new("indicator", ColumnKind::Flag),
        ];
        columns.extend(dimension_columns(dimensions));
        columns.push(Column::new("totalok", ColumnKind::Real));
        columns.push(Column::new("total", ColumnKind::Real));
        columns
    }

    fn to_row(&self, dimensions: &[String]) -> Vec<RawValue> {
        let mut row = vec![
            RawValue::Text(self.datestamp.format("%Y-%m-%d").to_string()),
            RawValue::Text(self.metric_id.clone()),
            RawValue::Text(self.title.clone()),
            RawValue::Text(self.category.clone()),
            RawValue::Number(self.slo),
            RawValue::Number(self.slo_min),
            RawValue::Number(self.weight),
            RawValue::Bool(self.indicator),
        ];
        row.extend(dimension_cells(&self.dimensions, dimensions));
        row.push(RawValue::Number(self.totalok));
        row.push(RawValue::Number(self.total));
        row
    }

    fn from_row(row: &RowReader<'_>, dimensions: &[String]) -> Result<Self, ValidationError> {
        let metric_id = required_text(row, "metric_id")?;
        Ok(SummaryRecord {
            datestamp: required_day(row)?,
            title: text(row, "title").unwrap_or_else(|| metric_id.clone()),
            category: text(row, "category").unwrap_or_else(|| UNDEFINED.to_string()),
            slo: number(row, "slo", DEFAULT_SLO)?,
            slo_min: number(row, "slo_min", DEFAULT_SLO_MIN)?,
            weight: number(row, "weight", DEFAULT_WEIGHT)?,
            indicator: row.get("indicator").map(RawValue::as_flag).unwrap_or(false),
            dimensions: dimension_values(row, dimensions),
            totalok: number(row, "totalok", 0.0)?,
            total: number(row, "total", 0.0)?,
            metric_id,
        })
    }

    fn primary_key(&self) -> Vec<String> {
        vec![
            self.metric_id.clone(),
            self.datestamp.format("%Y-%m-%d").to_string(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::dataset::{Dimensions, RawBatch};
    use chrono::NaiveDate;

    fn summary() -> SummaryRecord {
        let mut dimensions = Dimensions::new();
        dimensions.insert("team".to_string(), "blue".to_string());
        SummaryRecord {
            datestamp: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            metric_id: "m1".to_string(),
            title: "Encrypted disks".to_string(),
            category: "storage".to_string(),
            slo: 0.95,
            slo_min: 0.9,
            weight: 0.5,
            indicator: false,
            dimensions,
            totalok: 3.0,
            total: 4.0,
        }
    }

    #[test]
    fn test_summary_columns_match_row_width() {
        let dims = vec!["team".to_string(), "region".to_string()];
        let columns = SummaryRecord::columns(&dims);
        let row = summary().to_row(&dims);
        assert_eq!(columns.len(), row.len());
        assert_eq!(columns.last().map(|c| c.name.as_str()), Some("total"));
        // region predates the row
        assert_eq!(row[9], RawValue::Text("undefined".to_string()));
    }

    #[test]
    fn test_summary_row_reads_back() {
        let dims = vec!["team".to_string()];
        let names: Vec<String> = SummaryRecord::columns(&dims).into_iter().map(|c| c.name).collect();
        let mut batch = RawBatch::new(names);
        batch.push_row(summary().to_row(&dims));

        let row = batch.rows().next().unwrap();
        assert_eq!(SummaryRecord::from_row(&row, &dims).unwrap(), summary());
    }

    #[test]
    fn test_detail_loads_legacy_layout() {
        let mut batch = RawBatch::new(["datestamp", "metric_id", "resource", "compliance"]);
        batch.push_row(vec!["2024-06-01".into(), "m1".into(), "r1".into(), 1.0.into()]);
        let dims = vec!["team".to_string()];

        let row = batch.rows().next().unwrap();
        let record = DetailRecord::from_row(&row, &dims).unwrap();
        assert_eq!(record.count, 1.0);
        assert!(!record.indicator);
        assert_eq!(record.dimensions["team"], "undefined");
    }

    #[test]
    fn test_primary_keys() {
        assert_eq!(summary().primary_key(), vec!["m1".to_string(), "2024-06-01".to_string()]);
    }
}
