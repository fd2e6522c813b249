//! Reports handlers
//!
//! Read-only views over the summary and detail stores. Every endpoint takes
//! the declared dimensions as optional query parameters
//! (`?team=blue&business_unit=retail`).

use std::collections::HashMap;

use assurance_core::logic::config::RagPalette;
use assurance_core::logic::dataset::{DetailRecord, SummaryRecord};
use assurance_core::logic::report::{self, DetailLine, Filter, GroupLine, MetricLine, OverviewPoint};
use assurance_core::{EngineError, Status};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Local;
use indexmap::IndexMap;
use serde::Serialize;

use crate::{AppError, AppResult, AppState};

type Params = Query<HashMap<String, String>>;

async fn summary_rows(state: &AppState, params: &HashMap<String, String>) -> AppResult<Vec<SummaryRecord>> {
    let engine = state.engine.clone();
    let rows = tokio::task::spawn_blocking(move || engine.load_summary()).await??;
    let filter = Filter::from_query(&state.engine.config().dimensions, params);
    Ok(if filter.is_empty() { rows } else { filter.apply(&rows) })
}

async fn detail_rows(state: &AppState, params: &HashMap<String, String>) -> AppResult<Vec<DetailRecord>> {
    let engine = state.engine.clone();
    let rows = tokio::task::spawn_blocking(move || engine.load_detail()).await??;
    let filter = Filter::from_query(&state.engine.config().dimensions, params);
    Ok(filter.apply_detail(&rows))
}

/// Raw summary rows
pub async fn summary(
    State(state): State<AppState>,
    Query(params): Params,
) -> AppResult<Json<Vec<SummaryRecord>>> {
    Ok(Json(summary_rows(&state, &params).await?))
}

#[derive(Debug, Serialize)]
pub struct OverviewReport {
    pub status: Status,
    pub current: Option<OverviewPoint>,
    pub trend: Vec<OverviewPoint>,
}

/// Current overall score plus a thinned trend line
pub async fn overview(
    State(state): State<AppState>,
    Query(params): Params,
) -> AppResult<Json<OverviewReport>> {
    let rows = summary_rows(&state, &params).await?;
    let points = report::overview(&rows);

    let dates: Vec<_> = points.iter().map(|p| p.datestamp).collect();
    let keep = report::sample_dates(&dates, Local::now().date_naive());
    let trend: Vec<OverviewPoint> = points
        .into_iter()
        .filter(|p| keep.contains(&p.datestamp))
        .collect();

    let filter = Filter::from_query(&state.engine.config().dimensions, &params);
    let engine = state.engine.clone();
    let current = match tokio::task::spawn_blocking(move || engine.current_score(&filter)).await? {
        Ok(point) => Some(point),
        Err(EngineError::NoData(_)) => None,
        Err(e) => return Err(e.into()),
    };

    Ok(Json(OverviewReport {
        status: current.as_ref().map(|p| p.status).unwrap_or(Status::NoData),
        current,
        trend,
    }))
}

/// Latest scores per category
pub async fn category(
    State(state): State<AppState>,
    Query(params): Params,
) -> AppResult<Json<Vec<GroupLine>>> {
    let rows = summary_rows(&state, &params).await?;
    Ok(Json(report::by_category(&report::latest(&rows))))
}

/// Latest scores per value of `?dimension=`, default the primary dimension
pub async fn dimension(
    State(state): State<AppState>,
    Query(params): Params,
) -> AppResult<Json<Vec<GroupLine>>> {
    let config = state.engine.config();
    let name = match params.get("dimension") {
        Some(d) if config.dimensions.contains_key(d) => d.clone(),
        Some(d) => return Err(AppError::BadRequest(format!("Unknown dimension '{}'", d))),
        None => config
            .primary_dimension()
            .map(str::to_string)
            .ok_or_else(|| AppError::BadRequest("No dimensions configured".to_string()))?,
    };

    let rows = summary_rows(&state, &params).await?;
    Ok(Json(report::by_dimension(&report::latest(&rows), &name)))
}

/// Latest score per metric, worst first
pub async fn metrics(
    State(state): State<AppState>,
    Query(params): Params,
) -> AppResult<Json<Vec<MetricLine>>> {
    let rows = summary_rows(&state, &params).await?;
    Ok(Json(report::metrics_table(&report::latest(&rows))))
}

#[derive(Debug, Serialize)]
pub struct MetricDetail {
    pub metric_id: String,
    pub title: String,
    pub resources: Vec<DetailLine>,
}

/// Per-resource results of one metric
pub async fn detail(
    State(state): State<AppState>,
    Path(metric_id): Path<String>,
    Query(params): Params,
) -> AppResult<Json<MetricDetail>> {
    let rows = detail_rows(&state, &params).await?;
    let title = rows
        .iter()
        .find(|r| r.metric_id == metric_id)
        .map(|r| r.title.clone())
        .ok_or_else(|| AppError::NotFound(format!("Metric '{}' not found", metric_id)))?;

    Ok(Json(MetricDetail {
        resources: report::detail_table(&rows, &metric_id),
        metric_id,
        title,
    }))
}

#[derive(Debug, Serialize)]
pub struct DisplayConfig {
    pub dimensions: IndexMap<String, String>,
    #[serde(rename = "RAG")]
    pub rag: RagPalette,
    pub filter_options: IndexMap<String, Vec<String>>,
}

/// Dimension labels, RAG colours and filter choices for dashboards
pub async fn display(State(state): State<AppState>) -> AppResult<Json<DisplayConfig>> {
    let rows = summary_rows(&state, &HashMap::new()).await?;
    let config = state.engine.config();

    Ok(Json(DisplayConfig {
        filter_options: report::filter_options(&rows, &config.dimension_names()),
        dimensions: config.dimensions.clone(),
        rag: config.rag.clone(),
    }))
}
