//! Error taxonomy for the hub.
//!
//! None of these errors ever stop the dispatcher. Validation and queue
//! errors are per-message and only logged by the caller; delivery errors
//! remove one connection; [`HubError`] is returned to callers that try to
//! use a hub that has shut down.

/// Why an inbound location frame was rejected.
///
/// The message is dropped and the connection stays open.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// The identity was empty.
    #[error("user ID is required")]
    MissingIdentity,

    /// The identity exceeded the maximum length.
    #[error("user ID is too long ({len} chars, max {max})")]
    IdentityTooLong {
        /// Length of the rejected identity in characters.
        len: usize,
        /// Maximum accepted length.
        max: usize,
    },

    /// Latitude was non-finite or outside the accepted range.
    #[error("invalid latitude: {0}")]
    InvalidLatitude(f64),

    /// Longitude was non-finite or outside the accepted range.
    #[error("invalid longitude: {0}")]
    InvalidLongitude(f64),

    /// The device type exceeded the maximum length.
    #[error("device type is too long ({len} chars, max {max})")]
    DeviceTypeTooLong {
        /// Length of the rejected device type in characters.
        len: usize,
        /// Maximum accepted length.
        max: usize,
    },
}

/// The ingress queue was full and the offered update was dropped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("broadcast queue full, dropping update from {identity}")]
pub struct QueueFullError {
    /// Identity of the dropped update.
    pub identity: String,
}

/// A fan-out write to one connection failed.
///
/// The connection is scheduled for removal; other connections are
/// unaffected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The connection's outbound buffer is full (slow consumer).
    #[error("outbound buffer full")]
    Backlogged,

    /// The connection's writer has gone away.
    #[error("connection writer closed")]
    Closed,
}

/// Errors returned by [`HubHandle`](crate::HubHandle) operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HubError {
    /// The hub is shutting down and accepts no new registrations.
    #[error("hub is shutting down")]
    ShuttingDown,
}
