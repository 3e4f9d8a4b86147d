//! HTTP/REST API layer for Legion.
//!
//! Axum-based REST API at `/api/v1/` with an envelope response format, plus
//! the `/ws/events` WebSocket that streams batch progress.

pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
