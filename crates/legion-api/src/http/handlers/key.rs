//! Credential pool handlers. Secrets are accepted but never returned.

use std::time::Instant;

use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;

use legion_types::credential::CredentialView;

use crate::http::error::AppError;
use crate::http::response::{ApiResponse, respond};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateKeyRequest {
    pub name: String,
    pub secret: String,
}

/// GET /api/v1/keys
pub async fn list_keys(State(state): State<AppState>) -> Json<ApiResponse<Vec<CredentialView>>> {
    let start = Instant::now();
    respond(start, state.legion.list_credentials())
}

/// POST /api/v1/keys
pub async fn create_key(
    State(state): State<AppState>,
    Json(body): Json<CreateKeyRequest>,
) -> Result<Json<ApiResponse<CredentialView>>, AppError> {
    let start = Instant::now();
    let view = state.legion.add_credential(&body.name, &body.secret).await?;
    Ok(respond(start, view))
}

/// DELETE /api/v1/keys/{id}
pub async fn delete_key(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<CredentialView>>, AppError> {
    let start = Instant::now();
    let existing = state.legion.find_credential(&id)?;
    let removed = state.legion.remove_credential(&existing.id).await?;
    Ok(respond(start, removed))
}
