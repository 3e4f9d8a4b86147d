//! Envelope response format for all API responses.
//!
//! ```json
//! {
//!   "success": true,
//!   "data": { ... },
//!   "meta": { "request_id": "...", "timestamp": "...", "response_time_ms": 5 }
//! }
//! ```
//!
//! Failures set `success: false`, omit `data`, and carry an `error` object.

use std::time::Instant;

use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiErrorDetail>,
    pub meta: ApiMeta,
}

#[derive(Debug, Serialize)]
pub struct ApiMeta {
    pub request_id: String,
    /// RFC 3339 timestamp of the response.
    pub timestamp: String,
    pub response_time_ms: u64,
}

impl ApiMeta {
    fn now(response_time_ms: u64) -> Self {
        Self {
            request_id: uuid::Uuid::now_v7().to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            response_time_ms,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND").
    pub code: String,
    pub message: String,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T, response_time_ms: u64) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            meta: ApiMeta::now(response_time_ms),
        }
    }
}

impl ApiResponse<()> {
    pub fn failure(code: &str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiErrorDetail {
                code: code.to_string(),
                message: message.into(),
            }),
            meta: ApiMeta::now(0),
        }
    }
}

/// Wrap `data` in a success envelope timed from `start`.
pub fn respond<T: Serialize>(start: Instant, data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse::success(
        data,
        start.elapsed().as_millis() as u64,
    ))
}
