//! HTTP API module
//! 
//! This module contains the WebSocket endpoint devices sync through, plus
//! read-only HTTP handlers and their response structures.

pub mod handlers;
pub mod responses;
pub mod ws;

use std::sync::Arc;
use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use handlers::*;
use ws::ws_handler;

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/timers/:user_id", get(timer_handler))
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
