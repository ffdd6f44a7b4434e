//! Shared application state for the Axum server.

use tokio_util::task::TaskTracker;
use waypost_hub::HubHandle;

use crate::config::ConnectionSettings;

/// State injected into every handler via Axum's `State` extractor.
///
/// Holds only a [`HubHandle`]; the registry and cache stay inside the
/// dispatcher task.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Access to the broadcast hub.
    pub hub: HubHandle,
    /// Timing applied to each `WebSocket` connection.
    pub connection: ConnectionSettings,
    /// Tracks connection tasks so shutdown can wait for them.
    pub tracker: TaskTracker,
}

impl AppState {
    /// Create state around a running hub.
    pub fn new(hub: HubHandle, connection: ConnectionSettings) -> Self {
        Self {
            hub,
            connection,
            tracker: TaskTracker::new(),
        }
    }
}
