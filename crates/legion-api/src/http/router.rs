//! Axum router configuration with middleware.
//!
//! REST routes live under `/api/v1/`; the event WebSocket is `/ws/events`.
//! Middleware: CORS, request tracing.

use axum::Router;
use axum::routing::{get, post, put};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/health", get(health_check))
        // Minions
        .route(
            "/minions",
            get(handlers::minion::list_minions).post(handlers::minion::create_minion),
        )
        .route(
            "/minions/{id}",
            get(handlers::minion::get_minion)
                .put(handlers::minion::update_minion)
                .delete(handlers::minion::delete_minion),
        )
        // Channels
        .route(
            "/channels",
            get(handlers::channel::list_channels).post(handlers::channel::create_channel),
        )
        .route(
            "/channels/{id}",
            get(handlers::channel::get_channel)
                .put(handlers::channel::update_channel)
                .delete(handlers::channel::delete_channel),
        )
        .route("/channels/{id}/auto/start", post(handlers::channel::start_auto))
        .route("/channels/{id}/auto/pause", post(handlers::channel::pause_auto))
        .route("/channels/{id}/auto/trigger", post(handlers::channel::trigger_auto))
        // Messages
        .route(
            "/channels/{id}/messages",
            get(handlers::message::list_messages).post(handlers::message::post_message),
        )
        .route(
            "/channels/{id}/messages/{message_id}",
            put(handlers::message::edit_message).delete(handlers::message::delete_message),
        )
        // Credentials
        .route(
            "/keys",
            get(handlers::key::list_keys).post(handlers::key::create_key),
        )
        .route("/keys/{id}", axum::routing::delete(handlers::key::delete_key));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(health_check))
        .route("/ws/events", get(handlers::ws::ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
