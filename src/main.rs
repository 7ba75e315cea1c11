//! Pomodoro Sync - real-time timer synchronization server
//! 
//! This is the main entry point for the pomodoro-sync application.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use pomodoro_sync::{
    api::create_router,
    config::Config,
    services::{MemorySettingsStore, MemoryTaskStore, SeedData},
    state::AppState,
    utils::{shutdown_signal, SystemClock},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("pomodoro_sync={},tower_http=info", config.log_level()))
        .init();

    info!("Starting pomodoro-sync server v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: host={}, port={}, skip_policy={:?}",
          config.host, config.port, config.skip_policy);

    let seed = match &config.data_file {
        Some(path) => SeedData::load(path).await?,
        None => SeedData::default(),
    };
    let (settings_store, task_store): (MemorySettingsStore, MemoryTaskStore) = seed.into_stores();

    // Create application state
    let state = Arc::new(AppState::new(
        &config,
        Arc::new(settings_store),
        Arc::new(task_store),
        Arc::new(SystemClock),
    ));

    // Create HTTP router with all endpoints
    let app = create_router(state);

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  GET  /ws?user_id=<id>  - Timer sync WebSocket");
    info!("  GET  /timers/<id>      - Current timer for a user");
    info!("  GET  /status           - Connection and timer counts");
    info!("  GET  /health           - Health check");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_signal().await;
            info!("Shutdown signal received");
        })
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
