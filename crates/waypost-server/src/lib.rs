//! HTTP and `WebSocket` server for Waypost.
//!
//! This crate exposes:
//!
//! - **`WebSocket` endpoint** (`/ws`) where every client both publishes
//!   its own location and receives everyone else's
//! - **REST endpoints** (`/health`, `/stats`) reading the hub's
//!   observability snapshot
//! - **Static files** from a configurable directory for everything else
//!
//! # Architecture
//!
//! ```text
//! client --> reader --> validate --> ingress queue --> dispatcher
//!                                                         |
//! client <-- writer <-- outbox <------- fan-out <---------+
//! ```
//!
//! All registry and cache state lives in the dispatcher task owned by
//! [`waypost_hub`]. Connection tasks and HTTP handlers only talk to it
//! through a [`waypost_hub::HubHandle`].

pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

pub use config::{ConnectionSettings, ServerConfig};
pub use error::{ApiError, ServerError, TransportError};
pub use router::build_router;
pub use server::{bind, serve, shutdown_signal, start_server};
pub use state::AppState;
