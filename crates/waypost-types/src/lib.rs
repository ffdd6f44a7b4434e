//! Shared type definitions for the Waypost location broadcast server.
//!
//! This crate holds the types that cross crate boundaries: the frames
//! exchanged with clients, the connection identifier used by the hub,
//! and the read-only snapshot served to health and stats endpoints.
//!
//! # Modules
//!
//! - [`ids`] -- Small, stable connection identifiers
//! - [`location`] -- Inbound frames and validated location updates
//! - [`snapshot`] -- Observability snapshot of the hub

pub mod ids;
pub mod location;
pub mod snapshot;

// Re-export all public types at crate root for convenience.
pub use ids::ConnectionId;
pub use location::{DEFAULT_DEVICE_TYPE, InboundLocation, LocationUpdate};
pub use snapshot::HubSnapshot;
