//! HTTP control surface
//!
//! Per-session REST endpoints plus a Server-Sent Events stream of
//! [`JukeboxEvent`](jukebox_common::events::JukeboxEvent)s.

pub mod handlers;
pub mod sse;

use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::registry::SessionRegistry;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/sessions", get(handlers::list_sessions))
        .route(
            "/sessions/:key",
            get(handlers::session_status).delete(handlers::disconnect_session),
        )
        .route("/sessions/:key/join", post(handlers::join))
        .route("/sessions/:key/request", post(handlers::request_song))
        .route("/sessions/:key/pause", post(handlers::pause))
        .route("/sessions/:key/resume", post(handlers::resume))
        .route("/sessions/:key/skip", post(handlers::skip))
        .route("/sessions/:key/stop", post(handlers::stop))
        .route("/sessions/:key/volume", post(handlers::set_volume))
        .route("/sessions/:key/loop", post(handlers::set_loop))
        .route("/sessions/:key/shuffle", post(handlers::shuffle))
        .route("/sessions/:key/queue", delete(handlers::clear_queue))
        .route("/sessions/:key/queue/move", post(handlers::move_song))
        .route("/sessions/:key/queue/:position", delete(handlers::remove_song))
        .route("/events", get(sse::event_stream))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
