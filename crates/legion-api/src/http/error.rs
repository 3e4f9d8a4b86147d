//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use legion_types::error::LegionError;

use super::response::ApiResponse;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    Legion(LegionError),
    /// Malformed request input caught before reaching the engine.
    Validation(String),
    Internal(String),
}

impl From<LegionError> for AppError {
    fn from(e: LegionError) -> Self {
        AppError::Legion(e)
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Legion(err @ LegionError::Validation(_)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", err.to_string())
            }
            AppError::Legion(err @ LegionError::NotFound { .. }) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string())
            }
            AppError::Legion(err @ LegionError::CredentialUnavailable { .. }) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "CREDENTIAL_UNAVAILABLE",
                err.to_string(),
            ),
            AppError::Legion(
                err @ (LegionError::ModelInvocation(_) | LegionError::DecisionParse(_)),
            ) => (StatusCode::INTERNAL_SERVER_ERROR, "MODEL_ERROR", err.to_string()),
            AppError::Legion(err @ LegionError::Storage(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR", err.to_string())
            }
            AppError::Legion(err @ LegionError::Interrupted(_)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "BATCH_INTERRUPTED",
                err.to_string(),
            ),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg.clone())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if status.is_server_error() {
            tracing::warn!(code, %message, "Request failed");
        }
        (status, axum::Json(ApiResponse::<()>::failure(code, message))).into_response()
    }
}
