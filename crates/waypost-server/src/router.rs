//! Axum router construction for the Waypost server.
//!
//! Assembles the `WebSocket` endpoint, the REST endpoints, and the static
//! file fallback into a single [`Router`] with CORS and request tracing.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router.
///
/// The router includes:
/// - `GET /ws` -- location-sharing `WebSocket`
/// - `GET /health` -- liveness and connected client count
/// - `GET /stats` -- connection, cache, and queue counters
/// - anything else -- files from `static_dir` (`index.html` for `/`)
///
/// `read_timeout` bounds how long a plain HTTP request may take. It does
/// not apply to an upgraded `WebSocket`, which has its own idle deadline.
pub fn build_router(state: Arc<AppState>, static_dir: &Path, read_timeout: Duration) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws", get(ws::ws_upgrade))
        .route(
            "/health",
            get(handlers::health).fallback(handlers::method_not_allowed),
        )
        .route(
            "/stats",
            get(handlers::stats).fallback(handlers::method_not_allowed),
        )
        .fallback_service(ServeDir::new(static_dir))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            read_timeout,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
