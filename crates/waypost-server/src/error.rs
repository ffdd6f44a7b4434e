//! Error types for the HTTP and `WebSocket` surface.
//!
//! [`ApiError`] converts into an Axum response. [`TransportError`] ends a
//! single connection and never leaves its task. [`ServerError`] covers
//! the listener lifecycle; only a bind failure is fatal to the process.

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors returned by the REST endpoints.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The endpoint exists but does not accept this method.
    #[error("method not allowed")]
    MethodNotAllowed,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        };

        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Per-connection failures. Each one unregisters the connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The underlying socket failed.
    #[error("socket error: {0}")]
    Socket(#[from] axum::Error),

    /// No frame arrived within the idle deadline.
    #[error("no traffic for {0:?}")]
    IdleTimeout(Duration),

    /// A frame could not be decoded as a location update.
    #[error("malformed frame: {0}")]
    Decode(#[from] serde_json::Error),

    /// An outbound frame could not be written within the deadline.
    #[error("write timed out after {0:?}")]
    WriteTimeout(Duration),
}

/// Errors that can occur when starting or running the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to the network address.
    #[error("bind error: {0}")]
    Bind(String),

    /// The server encountered a fatal error while serving.
    #[error("serve error: {0}")]
    Serve(String),

    /// Connections were still open when the shutdown grace period ended.
    #[error("{remaining} connection(s) still open after {grace:?}, force-closing")]
    ShutdownTimeout {
        /// Connection tasks still running.
        remaining: usize,
        /// The grace period that elapsed.
        grace: Duration,
    },
}
