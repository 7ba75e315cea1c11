//! Main application state management

use std::{sync::Arc, time::{Duration, Instant}};

use tracing::info;

use crate::{
    config::Config,
    services::{TaskStore, UserSettingsStore},
    sync::{CommandDispatcher, ConnectionRegistry, SyncBroadcaster},
    timer::{EngineOptions, TimerEngine},
    utils::Clock,
};

/// Shared state handed to every request handler and connection task
pub struct AppState {
    /// Authoritative in-memory timers
    pub engine: Arc<TimerEngine>,
    /// Live device connections per user
    pub registry: Arc<ConnectionRegistry>,
    pub broadcaster: Arc<SyncBroadcaster>,
    pub dispatcher: CommandDispatcher,
    /// Per-connection outbound queue depth
    pub channel_capacity: usize,
    /// Bound on a single send to one device
    pub send_timeout: Duration,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
}

impl AppState {
    /// Wire the engine, registry, broadcaster and dispatcher together
    pub fn new(
        config: &Config,
        settings_store: Arc<dyn UserSettingsStore>,
        task_store: Arc<dyn TaskStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let options = EngineOptions {
            skip_policy: config.skip_policy,
            store_timeout: Duration::from_millis(config.store_timeout_ms),
        };
        let engine = Arc::new(TimerEngine::new(
            Arc::clone(&settings_store),
            task_store,
            clock,
            options,
        ));
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcaster = Arc::new(SyncBroadcaster::new(
            Arc::clone(&engine),
            Arc::clone(&registry),
            Duration::from_millis(config.send_timeout_ms),
        ));
        let dispatcher =
            CommandDispatcher::new(Arc::clone(&engine), Arc::clone(&broadcaster), settings_store);

        info!(
            "Timer core ready (skip policy {:?}, store timeout {}ms, send timeout {}ms)",
            options.skip_policy, config.store_timeout_ms, config.send_timeout_ms
        );

        Self {
            engine,
            registry,
            broadcaster,
            dispatcher,
            channel_capacity: config.channel_capacity,
            send_timeout: Duration::from_millis(config.send_timeout_ms),
            start_time: Instant::now(),
            port: config.port,
            host: config.host.clone(),
        }
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        format_uptime(self.start_time.elapsed())
    }
}

fn format_uptime(duration: Duration) -> String {
    let hours = duration.as_secs() / 3600;
    let minutes = (duration.as_secs() % 3600) / 60;
    let seconds = duration.as_secs() % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
