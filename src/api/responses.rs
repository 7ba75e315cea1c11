//! API response structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Server overview returned by `GET /status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub connected_users: usize,
    pub open_connections: usize,
    pub active_timers: usize,
    pub uptime: String,
    pub port: u16,
    pub host: String,
    pub timestamp: DateTime<Utc>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    /// Create a new health response
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
