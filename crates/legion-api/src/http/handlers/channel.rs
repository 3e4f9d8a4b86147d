//! Channel CRUD and autonomous-mode handlers.

use std::time::Instant;

use axum::Json;
use axum::extract::{Path, State};

use legion_core::turn::BatchReport;
use legion_types::channel::{Channel, CreateChannelRequest, UpdateChannelRequest};

use crate::http::error::AppError;
use crate::http::response::{ApiResponse, respond};
use crate::state::AppState;

/// GET /api/v1/channels
pub async fn list_channels(State(state): State<AppState>) -> Json<ApiResponse<Vec<Channel>>> {
    let start = Instant::now();
    respond(start, state.legion.list_channels())
}

/// GET /api/v1/channels/{id}
pub async fn get_channel(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Channel>>, AppError> {
    let start = Instant::now();
    Ok(respond(start, state.legion.find_channel(&id)?))
}

/// POST /api/v1/channels
pub async fn create_channel(
    State(state): State<AppState>,
    Json(body): Json<CreateChannelRequest>,
) -> Result<Json<ApiResponse<Channel>>, AppError> {
    let start = Instant::now();
    let channel = state.legion.add_channel(body).await?;
    Ok(respond(start, channel))
}

/// PUT /api/v1/channels/{id}
pub async fn update_channel(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateChannelRequest>,
) -> Result<Json<ApiResponse<Channel>>, AppError> {
    let start = Instant::now();
    let existing = state.legion.find_channel(&id)?;
    let channel = state.legion.update_channel(&existing.id, body).await?;
    Ok(respond(start, channel))
}

/// DELETE /api/v1/channels/{id}
pub async fn delete_channel(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Channel>>, AppError> {
    let start = Instant::now();
    let existing = state.legion.find_channel(&id)?;
    let removed = state.legion.remove_channel(&existing.id).await?;
    Ok(respond(start, removed))
}

/// POST /api/v1/channels/{id}/auto/start
pub async fn start_auto(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Channel>>, AppError> {
    let start = Instant::now();
    let existing = state.legion.find_channel(&id)?;
    let channel = state.legion.start_auto_mode(&existing.id).await?;
    Ok(respond(start, channel))
}

/// POST /api/v1/channels/{id}/auto/pause
pub async fn pause_auto(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Channel>>, AppError> {
    let start = Instant::now();
    let existing = state.legion.find_channel(&id)?;
    let channel = state.legion.pause_auto_mode(&existing.id).await?;
    Ok(respond(start, channel))
}

/// POST /api/v1/channels/{id}/auto/trigger
///
/// Runs one autonomous cycle now and returns once it completes.
pub async fn trigger_auto(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<BatchReport>>, AppError> {
    let start = Instant::now();
    let existing = state.legion.find_channel(&id)?;
    let report = state.legion.trigger_autonomous(&existing.id).await?;
    Ok(respond(start, report))
}
