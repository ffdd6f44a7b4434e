//! Registry of live connections and the last-known location cache.
//!
//! [`RegistryState`] is plain data with no interior locking. It is owned
//! by exactly one [`Dispatcher`](crate::Dispatcher) and mutated only from
//! its event loop, so the per-message path never takes a lock.
//!
//! Connections live in an arena keyed by [`ConnectionId`]. Ids grow
//! monotonically, so iterating the `BTreeMap` visits connections in
//! registration order.

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use waypost_types::{ConnectionId, LocationUpdate};

use crate::error::DeliveryError;

/// Slots in each connection's outbound buffer.
///
/// A client that falls this many frames behind is treated as a failed
/// write and removed.
pub const OUTBOX_CAPACITY: usize = 64;

/// Sending half of a connection's outbound frame buffer.
pub type OutboxSender = mpsc::Sender<Arc<str>>;

/// Receiving half of a connection's outbound frame buffer, drained by the
/// connection's writer.
pub type OutboxReceiver = mpsc::Receiver<Arc<str>>;

/// Create an outbound frame buffer of [`OUTBOX_CAPACITY`] slots.
pub fn outbox() -> (OutboxSender, OutboxReceiver) {
    mpsc::channel(OUTBOX_CAPACITY)
}

/// Everything the dispatcher keeps about one live connection.
#[derive(Debug)]
pub struct ConnectionRecord {
    /// Peer address reported by the transport.
    pub remote_addr: SocketAddr,
    /// When the connection was registered.
    pub connected_at: DateTime<Utc>,
    outbox: OutboxSender,
    closer: CancellationToken,
}

impl ConnectionRecord {
    /// Build a record from its outbound buffer and close token.
    pub fn new(remote_addr: SocketAddr, outbox: OutboxSender, closer: CancellationToken) -> Self {
        Self {
            remote_addr,
            connected_at: Utc::now(),
            outbox,
            closer,
        }
    }

    /// Attempt a non-blocking write of one frame.
    fn try_write(&self, frame: &Arc<str>) -> Result<(), DeliveryError> {
        self.outbox
            .try_send(Arc::clone(frame))
            .map_err(|e| match e {
                TrySendError::Full(_) => DeliveryError::Backlogged,
                TrySendError::Closed(_) => DeliveryError::Closed,
            })
    }

    /// Close the connection: signal its tasks and drop the outbound buffer.
    fn close(self) {
        self.closer.cancel();
    }
}

/// Outcome of broadcasting one frame to every live connection.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct FanOutReport {
    /// Connections the frame was handed to.
    pub delivered: usize,
    /// Connections whose write failed; already removed and closed.
    pub removed: Vec<RemovedConnection>,
}

/// A connection dropped by [`RegistryState::fan_out`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedConnection {
    /// Handle of the removed connection.
    pub id: ConnectionId,
    /// Peer address it was registered with.
    pub remote_addr: SocketAddr,
    /// When it was registered.
    pub connected_at: DateTime<Utc>,
    /// Why the write failed.
    pub error: DeliveryError,
}

/// Live connection set and per-identity last-known cache.
#[derive(Debug, Default)]
pub struct RegistryState {
    live: BTreeMap<ConnectionId, ConnectionRecord>,
    last_known: HashMap<String, LocationUpdate>,
}

impl RegistryState {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a live connection.
    ///
    /// Returns `false` and leaves the registry unchanged if `id` is
    /// already live.
    pub fn insert(&mut self, id: ConnectionId, record: ConnectionRecord) -> bool {
        if self.live.contains_key(&id) {
            return false;
        }
        self.live.insert(id, record);
        true
    }

    /// Remove and close a connection. Removing an absent id is a no-op.
    ///
    /// Returns whether a connection was removed.
    pub fn remove(&mut self, id: ConnectionId) -> bool {
        match self.live.remove(&id) {
            Some(record) => {
                record.close();
                true
            }
            None => false,
        }
    }

    /// Store `update` as the latest position for its identity.
    ///
    /// Returns `true` when the identity was not cached before.
    pub fn record(&mut self, update: LocationUpdate) -> bool {
        self.last_known.insert(update.id.clone(), update).is_none()
    }

    /// Hand `frame` to every live connection, then remove those that failed.
    ///
    /// One failed write never stops delivery to the remaining
    /// connections. Removal happens only after the full pass.
    pub fn fan_out(&mut self, frame: &Arc<str>) -> FanOutReport {
        let mut report = FanOutReport::default();
        let mut failed = Vec::new();

        for (id, record) in &self.live {
            match record.try_write(frame) {
                Ok(()) => report.delivered = report.delivered.saturating_add(1),
                Err(e) => failed.push((*id, e)),
            }
        }

        for (id, error) in failed {
            if let Some(record) = self.live.remove(&id) {
                report.removed.push(RemovedConnection {
                    id,
                    remote_addr: record.remote_addr,
                    connected_at: record.connected_at,
                    error,
                });
                record.close();
            }
        }

        report
    }

    /// Close every live connection. Returns how many were closed.
    pub fn close_all(&mut self) -> usize {
        let live = std::mem::take(&mut self.live);
        let count = live.len();
        for record in live.into_values() {
            record.close();
        }
        count
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.live.len()
    }

    /// Number of cached identities.
    pub fn cache_size(&self) -> usize {
        self.last_known.len()
    }

    /// Whether `id` is currently live.
    pub fn is_live(&self, id: ConnectionId) -> bool {
        self.live.contains_key(&id)
    }

    /// Latest cached update for `identity`.
    pub fn last_known(&self, identity: &str) -> Option<&LocationUpdate> {
        self.last_known.get(identity)
    }

    /// Live connection ids in registration order.
    pub fn connection_ids(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.live.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::net::{Ipv4Addr, SocketAddr};

    use super::*;

    fn addr() -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, 40_000))
    }

    fn update(id: &str, lat: f64) -> LocationUpdate {
        LocationUpdate {
            id: id.to_owned(),
            lat,
            lng: 0.0,
            device_type: String::from("Mobile"),
            received_at: Utc::now(),
        }
    }

    fn connect(state: &mut RegistryState, id: u64) -> (OutboxReceiver, CancellationToken) {
        let (tx, rx) = outbox();
        let token = CancellationToken::new();
        assert!(state.insert(ConnectionId(id), ConnectionRecord::new(addr(), tx, token.clone())));
        (rx, token)
    }

    #[test]
    fn cache_keeps_only_latest_per_identity() {
        let mut state = RegistryState::new();
        assert!(state.record(update("alice", 10.0)));
        assert!(!state.record(update("alice", 20.0)));

        assert_eq!(state.cache_size(), 1);
        let cached = state.last_known("alice").unwrap();
        assert!((cached.lat - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut state = RegistryState::new();
        let (_rx, _token) = connect(&mut state, 1);

        let (tx, _rx2) = outbox();
        let inserted = state.insert(
            ConnectionId(1),
            ConnectionRecord::new(addr(), tx, CancellationToken::new()),
        );
        assert!(!inserted);
        assert_eq!(state.connection_count(), 1);
    }

    #[test]
    fn remove_is_idempotent() {
        let mut state = RegistryState::new();
        let (_rx, token) = connect(&mut state, 1);
        let (_rx2, _token2) = connect(&mut state, 2);

        assert!(state.remove(ConnectionId(1)));
        assert!(token.is_cancelled());
        assert_eq!(state.connection_count(), 1);

        assert!(!state.remove(ConnectionId(1)));
        assert!(!state.remove(ConnectionId(99)));
        assert_eq!(state.connection_count(), 1);
        assert!(state.is_live(ConnectionId(2)));
    }

    #[test]
    fn fan_out_isolates_a_broken_connection() {
        let mut state = RegistryState::new();
        let (mut rx1, _t1) = connect(&mut state, 1);
        let (rx2, t2) = connect(&mut state, 2);
        let (mut rx3, _t3) = connect(&mut state, 3);
        drop(rx2);

        let frame: Arc<str> = Arc::from("{\"id\":\"a\"}");
        let report = state.fan_out(&frame);

        assert_eq!(report.delivered, 2);
        assert_eq!(report.removed.len(), 1);
        let removed = report.removed.first().unwrap();
        assert_eq!(removed.id, ConnectionId(2));
        assert_eq!(removed.error, DeliveryError::Closed);
        assert_eq!(removed.remote_addr, addr());
        assert!(removed.connected_at <= Utc::now());
        assert_eq!(state.connection_count(), 2);
        assert!(t2.is_cancelled());
        assert_eq!(rx1.try_recv().unwrap(), frame);
        assert_eq!(rx3.try_recv().unwrap(), frame);
    }

    #[test]
    fn fan_out_removes_backlogged_connection() {
        let mut state = RegistryState::new();
        let (_slow, _t1) = connect(&mut state, 1);
        let (mut fast, _t2) = connect(&mut state, 2);

        let frame: Arc<str> = Arc::from("x");
        for _ in 0..OUTBOX_CAPACITY {
            let report = state.fan_out(&frame);
            assert_eq!(report.delivered, 2);
            fast.try_recv().unwrap();
        }

        let report = state.fan_out(&frame);
        assert_eq!(report.delivered, 1);
        let removed: Vec<_> = report.removed.iter().map(|r| (r.id, r.error)).collect();
        assert_eq!(removed, vec![(ConnectionId(1), DeliveryError::Backlogged)]);
        assert_eq!(state.connection_ids().collect::<Vec<_>>(), vec![ConnectionId(2)]);
    }

    #[test]
    fn connections_iterate_by_id() {
        let mut state = RegistryState::new();
        let _c3 = connect(&mut state, 3);
        let _c1 = connect(&mut state, 1);
        let _c2 = connect(&mut state, 2);
        let ids: Vec<_> = state.connection_ids().map(ConnectionId::into_inner).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn close_all_drops_every_outbox() {
        let mut state = RegistryState::new();
        let (mut rx1, t1) = connect(&mut state, 1);
        let (mut rx2, t2) = connect(&mut state, 2);

        assert_eq!(state.close_all(), 2);
        assert_eq!(state.connection_count(), 0);
        assert!(t1.is_cancelled() && t2.is_cancelled());
        assert!(rx1.recv().await.is_none());
        assert!(rx2.recv().await.is_none());
    }
}
