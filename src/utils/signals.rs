//! Signal handling for graceful shutdown

use futures::stream::StreamExt;
use signal_hook_tokio::Signals;
use tracing::{error, info};

/// Wait for shutdown signals (SIGTERM, SIGINT)
pub async fn shutdown_signal() {
    let mut signals = match Signals::new([
        signal_hook::consts::SIGTERM,
        signal_hook::consts::SIGINT,
    ]) {
        Ok(signals) => signals,
        Err(e) => {
            error!("Failed to create signal handler: {}", e);
            // Without signal handling the server runs until killed
            std::future::pending::<()>().await;
            return;
        }
    };

    if let Some(signal) = signals.next().await {
        info!("Received signal: {}", signal);
    }
}
