//! Minion CRUD handlers.

use std::time::Instant;

use axum::Json;
use axum::extract::{Path, State};

use legion_types::minion::{CreateMinionRequest, Minion, UpdateMinionRequest};

use crate::http::error::AppError;
use crate::http::response::{ApiResponse, respond};
use crate::state::AppState;

/// GET /api/v1/minions
pub async fn list_minions(State(state): State<AppState>) -> Json<ApiResponse<Vec<Minion>>> {
    let start = Instant::now();
    respond(start, state.legion.list_minions())
}

/// GET /api/v1/minions/{id}
pub async fn get_minion(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Minion>>, AppError> {
    let start = Instant::now();
    Ok(respond(start, state.legion.find_minion(&id)?))
}

/// POST /api/v1/minions
pub async fn create_minion(
    State(state): State<AppState>,
    Json(body): Json<CreateMinionRequest>,
) -> Result<Json<ApiResponse<Minion>>, AppError> {
    let start = Instant::now();
    let minion = state.legion.add_minion(body).await?;
    Ok(respond(start, minion))
}

/// PUT /api/v1/minions/{id}
pub async fn update_minion(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateMinionRequest>,
) -> Result<Json<ApiResponse<Minion>>, AppError> {
    let start = Instant::now();
    let existing = state.legion.find_minion(&id)?;
    let minion = state.legion.update_minion(&existing.id, body).await?;
    Ok(respond(start, minion))
}

/// DELETE /api/v1/minions/{id}
pub async fn delete_minion(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Minion>>, AppError> {
    let start = Instant::now();
    let existing = state.legion.find_minion(&id)?;
    let removed = state.legion.remove_minion(&existing.id).await?;
    Ok(respond(start, removed))
}
