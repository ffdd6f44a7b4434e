//! Read-only observability surface.
//!
//! The dispatcher publishes connection count and cache size together
//! after every mutation that changes them. Readers never touch the
//! registry itself and never wait on the dispatcher's event loop.

use tokio::sync::RwLock;
use waypost_types::HubSnapshot;

use crate::ingress::IngressSender;

/// Counters that must be read together.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryCounts {
    /// Number of live connections.
    pub connections: usize,
    /// Number of cached identities.
    pub cached: usize,
}

/// Shared, lock-protected view of the hub's counters.
#[derive(Debug)]
pub struct HubStats {
    counts: RwLock<RegistryCounts>,
    ingress: IngressSender,
}

impl HubStats {
    /// Create stats that report queue depth from `ingress`.
    pub fn new(ingress: IngressSender) -> Self {
        Self {
            counts: RwLock::new(RegistryCounts::default()),
            ingress,
        }
    }

    /// Replace the published counters. Called only by the dispatcher.
    pub(crate) async fn publish(&self, counts: RegistryCounts) {
        *self.counts.write().await = counts;
    }

    /// Take a consistent snapshot of the hub.
    pub async fn snapshot(&self) -> HubSnapshot {
        let counts = *self.counts.read().await;
        HubSnapshot {
            connected_clients: counts.connections,
            tracked_locations: counts.cached,
            queue_depth: self.ingress.depth(),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use chrono::Utc;
    use waypost_types::LocationUpdate;

    use super::*;
    use crate::ingress;

    #[tokio::test]
    async fn snapshot_reflects_published_counts_and_queue() {
        let (tx, _rx) = ingress::channel(8);
        let stats = HubStats::new(tx.clone());

        assert_eq!(stats.snapshot().await, HubSnapshot::default());

        stats
            .publish(RegistryCounts {
                connections: 3,
                cached: 5,
            })
            .await;
        tx.offer(LocationUpdate {
            id: String::from("a"),
            lat: 0.0,
            lng: 0.0,
            device_type: String::from("Unknown"),
            received_at: Utc::now(),
        })
        .unwrap();

        let snap = stats.snapshot().await;
        assert_eq!(snap.connected_clients, 3);
        assert_eq!(snap.tracked_locations, 5);
        assert_eq!(snap.queue_depth, 1);
    }
}
