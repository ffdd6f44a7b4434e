//! Waypost server entry point.
//!
//! Loads configuration from the environment, starts the broadcast hub,
//! and serves HTTP and `WebSocket` traffic until SIGINT or SIGTERM.
//!
//! Static client assets are served from `STATIC_DIR` (default `./public`,
//! relative to the working directory). The repository's `public/`
//! directory holds a minimal browser client; run the binary from the
//! workspace root or point `STATIC_DIR` at another directory.

use std::sync::Arc;

use tokio::time;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use waypost_server::{AppState, ServerConfig};

/// Application entry point.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound or the server fails
/// while running.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("waypost-server starting");

    let config = ServerConfig::from_env();
    info!(
        addr = %config.socket_addr_string(),
        read_timeout_ms = config.read_timeout.as_millis(),
        write_timeout_ms = config.write_timeout.as_millis(),
        idle_timeout_ms = config.idle_timeout.as_millis(),
        shutdown_grace_ms = config.shutdown_grace.as_millis(),
        queue_capacity = config.queue_capacity,
        "configuration loaded"
    );

    let (hub, dispatcher) = waypost_hub::spawn(config.hub_config());
    let state = Arc::new(AppState::new(hub.clone(), config.connection_settings()));

    let signal_hub = hub.clone();
    tokio::spawn(async move {
        waypost_server::shutdown_signal().await;
        signal_hub.shutdown();
    });

    let served = waypost_server::start_server(&config, state).await;

    // A failed server never saw the shutdown token; stop the hub anyway.
    hub.shutdown();
    match time::timeout(config.shutdown_grace, dispatcher).await {
        Ok(Ok(final_state)) => info!(
            tracked_locations = final_state.cache_size(),
            "dispatcher stopped"
        ),
        Ok(Err(e)) => warn!(error = %e, "dispatcher task failed"),
        Err(_elapsed) => warn!("dispatcher did not stop within the grace period"),
    }

    served?;
    info!("Server stopped");
    Ok(())
}
