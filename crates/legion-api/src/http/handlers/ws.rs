//! WebSocket handler streaming engine events.
//!
//! `/ws/events` subscribes to the [`EventBus`](legion_core::event::EventBus)
//! and pushes every `LegionEvent` (message upserts, stream deltas, minion
//! status, notices, auto-mode changes) to the client as a JSON text frame.
//! Clients may send `{"type":"ping"}`; anything else is ignored.
//! `?channel=<id or name>` narrows the stream to one channel.
//!
//! A slow client that lags the broadcast channel misses the skipped events
//! and keeps receiving from the newest one.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;

use legion_core::event::EventSubscription;

use crate::http::error::AppError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    pub channel: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsCommand {
    /// Keep-alive. Answered with `{"type":"pong"}`.
    Ping,
}

/// GET /ws/events
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let events = state.legion.events();
    let subscription = match query.channel.as_deref() {
        Some(channel) => events.subscribe_channel(state.legion.find_channel(channel)?.id),
        None => events.subscribe(),
    };
    Ok(ws.on_upgrade(move |socket| handle_ws_connection(socket, subscription)))
}

async fn handle_ws_connection(socket: WebSocket, mut events: EventSubscription) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                match serde_json::to_string(&event) {
                    Ok(json) => {
                        if ws_sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => tracing::warn!("Failed to serialize LegionEvent: {err}"),
                }
            }

            msg_result = ws_receiver.next() => {
                match msg_result {
                    Some(Ok(Message::Text(text))) => match serde_json::from_str::<WsCommand>(&text) {
                        Ok(WsCommand::Ping) => {
                            let pong = r#"{"type":"pong"}"#;
                            if ws_sender.send(Message::Text(pong.into())).await.is_err() {
                                break;
                            }
                        }
                        Err(err) => {
                            tracing::debug!(raw = %text.as_str(), error = %err, "Ignoring WebSocket frame");
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        tracing::debug!("WebSocket receive error: {err}");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    tracing::debug!("WebSocket connection closed");
}
