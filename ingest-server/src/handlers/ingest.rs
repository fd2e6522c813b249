//! Ingest handler
//!
//! Body is CSV text, or JSON records when sent as `application/json`.

use assurance_core::logic::dataset::{parse_csv, parse_json};
use assurance_core::ScoreLine;
use axum::{
    body::Bytes,
    extract::State,
    http::{header::CONTENT_TYPE, HeaderMap},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::middleware::auth::TokenContext;
use crate::{AppError, AppResult, AppState};

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub success: bool,
    pub batch_id: Uuid,
    pub message: String,
    pub result: Vec<ScoreLine>,
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.trim_start().starts_with("application/json"))
        .unwrap_or(false)
}

/// Upload a batch
pub async fn upload(
    State(state): State<AppState>,
    caller: TokenContext,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<IngestResponse>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(AppError::BadRequest("No CSV data provided".to_string()));
    }

    let json = is_json(&headers);
    let engine = state.engine.clone();
    let report = tokio::task::spawn_blocking(move || -> AppResult<_> {
        let batch = if json { parse_json(&body)? } else { parse_csv(&body)? };
        Ok(engine.ingest(&batch)?)
    })
    .await??;

    tracing::info!(
        batch_id = %report.batch_id,
        rows = report.uploaded,
        metrics = report.result.len(),
        caller = %caller.fingerprint,
        "Batch ingested"
    );

    Ok(Json(IngestResponse {
        success: true,
        batch_id: report.batch_id,
        message: format!("Uploaded {} records", report.uploaded),
        result: report.result,
    }))
}
