//! HTTP endpoint handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use tracing::debug;

use crate::state::{AppState, TimerSnapshot};
use super::responses::{HealthResponse, StatusResponse};

/// Handle GET /status - Return connection and timer counts
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        connected_users: state.registry.user_count(),
        open_connections: state.registry.connection_count(),
        active_timers: state.engine.active_timer_count(),
        uptime: state.get_uptime(),
        port: state.port,
        host: state.host.clone(),
        timestamp: Utc::now(),
    })
}

/// Handle GET /timers/:user_id - Recomputed timer for one user
pub async fn timer_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<TimerSnapshot>, StatusCode> {
    match state.broadcaster.peek(&user_id).await {
        Some(snapshot) => Ok(Json(snapshot)),
        None => {
            debug!("No active timer for user {}", user_id);
            Err(StatusCode::NOT_FOUND)
        }
    }
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
