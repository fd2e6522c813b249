//! Error handling

use assurance_core::logic::dataset::FormatError;
use assurance_core::logic::store::StoreError;
use assurance_core::EngineError;
use axum::{
    response::{IntoResponse, Response},
    http::StatusCode,
    Json,
};
use serde_json::json;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub enum AppError {
    // Auth errors
    Unauthorized,
    Forbidden,

    // Resource errors
    NotFound(String),
    /// Nothing to score; reported as a 200 payload, not a failure
    NoData(String),

    // Request errors
    BadRequest(String),
    ValidationError(String),

    // Store errors
    StorageError(String),

    // Generic errors
    InternalError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::NoData(msg) = &self {
            let body = Json(json!({
                "success": true,
                "status": "no_data",
                "current": null,
                "message": msg
            }));
            return (StatusCode::OK, body).into_response();
        }

        let (status, error_message) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Authentication required"),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "Invalid token"),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.as_str()),
            AppError::NoData(msg) => (StatusCode::OK, msg.as_str()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.as_str()),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.as_str()),
            AppError::StorageError(msg) => {
                tracing::error!("Storage error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Storage error occurred")
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = Json(json!({
            "success": false,
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Validation(e) => AppError::ValidationError(e.to_string()),
            EngineError::Format(e) => e.into(),
            EngineError::Store(e) => e.into(),
            EngineError::NoData(e) => AppError::NoData(e.to_string()),
        }
    }
}

impl From<FormatError> for AppError {
    fn from(err: FormatError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::StorageError(err.to_string())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::InternalError(err.to_string())
    }
}
