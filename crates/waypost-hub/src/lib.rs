//! Connection registry and broadcast hub for Waypost.
//!
//! This crate is the concurrency core of the server. A single
//! [`Dispatcher`] task owns the set of live connections and the
//! last-known location per identity, and is the only code that mutates
//! them. Everything else talks to it through a [`HubHandle`]:
//!
//! ```text
//! reader --validate--> ingress queue --> dispatcher --fan-out--> outboxes
//!        --register/unregister------------^
//! ```
//!
//! # Guarantees
//!
//! - Registry and cache mutations are strictly serialized.
//! - Offering an update never blocks; a full queue drops the newest item.
//! - A failed write to one connection never aborts delivery to the rest.
//! - Unregister is idempotent.
//! - After shutdown begins, registrations fail and every live connection
//!   is closed.
//!
//! The last-known cache is never expired. It grows with the number of
//! distinct identities seen over the life of the process.

pub mod dispatcher;
pub mod error;
pub mod hub;
pub mod ingress;
pub mod registry;
pub mod stats;
pub mod validate;

// Re-export primary types for convenience.
pub use dispatcher::{Dispatcher, Registration};
pub use error::{DeliveryError, HubError, QueueFullError, ValidationError};
pub use hub::{HubConfig, HubHandle, new, spawn};
pub use ingress::{IngressReceiver, IngressSender};
pub use registry::{
    OUTBOX_CAPACITY, OutboxReceiver, OutboxSender, RegistryState, RemovedConnection, outbox,
};
pub use stats::HubStats;
pub use validate::validate;
