//! REST endpoint handlers.
//!
//! Both endpoints read the hub's observability snapshot and never
//! participate in the dispatcher's event loop.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/health` | Liveness plus connected client count |
//! | `GET` | `/stats` | Connection, cache, and queue counters |
//!
//! Any other method on these paths yields `405 Method Not Allowed`.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `"healthy"` while the server answers.
    pub status: &'static str,
    /// Server time of the response.
    pub timestamp: DateTime<Utc>,
    /// Number of live `WebSocket` connections.
    pub connected: usize,
    /// Always `true`; kept for existing monitors.
    pub uptime_check: bool,
}

/// Body of `GET /stats`.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    /// Number of live `WebSocket` connections.
    pub connected_clients: usize,
    /// Number of identities with a cached last-known location.
    pub tracked_locations: usize,
    /// Updates waiting in the ingress queue.
    pub broadcast_queue: usize,
    /// Server time of the response.
    pub timestamp: DateTime<Utc>,
}

/// `GET /health`
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let snapshot = state.hub.snapshot().await;
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now(),
        connected: snapshot.connected_clients,
        uptime_check: true,
    })
}

/// `GET /stats`
pub async fn stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    let snapshot = state.hub.snapshot().await;
    Json(StatsResponse {
        connected_clients: snapshot.connected_clients,
        tracked_locations: snapshot.tracked_locations,
        broadcast_queue: snapshot.queue_depth,
        timestamp: Utc::now(),
    })
}

/// Fallback for non-GET requests on the REST endpoints.
pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}
