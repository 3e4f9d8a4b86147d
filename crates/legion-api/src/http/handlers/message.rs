//! Transcript handlers. Posting a message runs a full batch before replying;
//! live progress goes out over `/ws/events`.

use std::time::Instant;

use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;

use legion_core::turn::BatchReport;
use legion_types::message::{ChatMessage, MessageId};

use crate::http::error::AppError;
use crate::http::handlers::parse_id;
use crate::http::response::{ApiResponse, respond};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MessageBody {
    pub content: String,
}

/// GET /api/v1/channels/{id}/messages
pub async fn list_messages(
    State(state): State<AppState>,
    Path(channel): Path<String>,
) -> Result<Json<ApiResponse<Vec<ChatMessage>>>, AppError> {
    let start = Instant::now();
    let channel = state.legion.find_channel(&channel)?;
    Ok(respond(start, state.legion.list_messages(&channel.id)?))
}

/// POST /api/v1/channels/{id}/messages
pub async fn post_message(
    State(state): State<AppState>,
    Path(channel): Path<String>,
    Json(body): Json<MessageBody>,
) -> Result<Json<ApiResponse<BatchReport>>, AppError> {
    let start = Instant::now();
    let channel = state.legion.find_channel(&channel)?;
    let report = state.legion.submit_message(&channel.id, &body.content).await?;
    Ok(respond(start, report))
}

/// PUT /api/v1/channels/{id}/messages/{message_id}
pub async fn edit_message(
    State(state): State<AppState>,
    Path((channel, message_id)): Path<(String, String)>,
    Json(body): Json<MessageBody>,
) -> Result<Json<ApiResponse<ChatMessage>>, AppError> {
    let start = Instant::now();
    let channel = state.legion.find_channel(&channel)?;
    let message_id: MessageId = parse_id(&message_id, "message")?;
    let edited = state
        .legion
        .edit_message(&channel.id, &message_id, &body.content)
        .await?;
    Ok(respond(start, edited))
}

/// DELETE /api/v1/channels/{id}/messages/{message_id}
pub async fn delete_message(
    State(state): State<AppState>,
    Path((channel, message_id)): Path<(String, String)>,
) -> Result<Json<ApiResponse<ChatMessage>>, AppError> {
    let start = Instant::now();
    let channel = state.legion.find_channel(&channel)?;
    let message_id: MessageId = parse_id(&message_id, "message")?;
    let removed = state.legion.delete_message(&channel.id, &message_id).await?;
    Ok(respond(start, removed))
}
