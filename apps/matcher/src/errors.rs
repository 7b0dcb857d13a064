use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::matching::pipeline::PipelineError;
use crate::scorer::ScorerError;
use crate::store::StoreError;

/// HTTP-facing error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Scorer error: {0}")]
    Scorer(#[from] ScorerError),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Scorer(e) => AppError::Scorer(e),
            PipelineError::Storage(e) => AppError::Storage(e),
            PipelineError::MissingJob(id) => AppError::NotFound(format!("job {id}")),
            PipelineError::Superseded => AppError::Conflict(err.to_string()),
            PipelineError::ExcludedWithoutRecord(_) => AppError::Conflict(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::Scorer(ScorerError::Timeout(after)) => {
                tracing::warn!("Scorer timed out after {after:?}");
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    "SCORER_TIMEOUT",
                    "The scoring service did not answer in time".to_string(),
                )
            }
            AppError::Scorer(ScorerError::Unavailable(msg)) => {
                tracing::warn!("Scorer unavailable: {msg}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SCORER_UNAVAILABLE",
                    "The scoring service is unavailable".to_string(),
                )
            }
            AppError::Storage(e) => {
                tracing::error!("Storage error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    "A storage error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
