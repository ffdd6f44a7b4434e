//! Read-only view of hub state for health and stats endpoints.

use serde::{Deserialize, Serialize};

/// A consistent snapshot of the hub's observable counters.
///
/// `connected_clients` and `tracked_locations` are always read together
/// under one lock, so they never straddle an in-flight mutation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubSnapshot {
    /// Number of live connections in the registry.
    pub connected_clients: usize,
    /// Number of distinct identities held in the last-known cache.
    pub tracked_locations: usize,
    /// Number of validated updates waiting in the ingress queue.
    pub queue_depth: usize,
}
