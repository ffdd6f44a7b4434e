//! The dispatcher: single serialized owner of the registry and cache.
//!
//! One task runs [`Dispatcher::run`]. It waits on four sources at once
//! (register requests, unregister notices, the ingress queue, and a
//! periodic stats tick) and handles exactly one event end-to-end before
//! looking at the next. Nothing else ever writes [`RegistryState`].
//!
//! Per connection the dispatcher sees `Unregistered -> Live -> Removed`.
//! Removal is terminal; a reconnecting client is registered under a new
//! [`ConnectionId`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use waypost_types::{ConnectionId, LocationUpdate};

use crate::ingress::IngressReceiver;
use crate::registry::{ConnectionRecord, OutboxSender, RegistryState};
use crate::stats::{HubStats, RegistryCounts};

/// Request to add a connection to the live set.
#[derive(Debug)]
pub(crate) struct RegisterRequest {
    pub(crate) remote_addr: SocketAddr,
    pub(crate) outbox: OutboxSender,
    pub(crate) reply: oneshot::Sender<Registration>,
}

/// Result of a successful registration.
#[derive(Debug, Clone)]
pub struct Registration {
    /// Handle allocated for the connection.
    pub id: ConnectionId,
    /// Cancelled when the hub closes this connection, either after a
    /// failed write or during shutdown.
    pub closed: CancellationToken,
}

/// Event loop owning all mutable hub state.
#[derive(Debug)]
pub struct Dispatcher {
    state: RegistryState,
    next_id: u64,
    register_rx: mpsc::UnboundedReceiver<RegisterRequest>,
    unregister_rx: mpsc::UnboundedReceiver<ConnectionId>,
    ingress_rx: IngressReceiver,
    stats: Arc<HubStats>,
    stats_interval: Duration,
    shutdown: CancellationToken,
    published: RegistryCounts,
}

impl Dispatcher {
    pub(crate) fn new(
        register_rx: mpsc::UnboundedReceiver<RegisterRequest>,
        unregister_rx: mpsc::UnboundedReceiver<ConnectionId>,
        ingress_rx: IngressReceiver,
        stats: Arc<HubStats>,
        stats_interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            state: RegistryState::new(),
            next_id: 1,
            register_rx,
            unregister_rx,
            ingress_rx,
            stats,
            stats_interval,
            shutdown,
            published: RegistryCounts::default(),
        }
    }

    /// Run until the hub's shutdown token is cancelled.
    ///
    /// The event being handled when shutdown arrives runs to completion.
    /// Every remaining connection is then closed and the final state is
    /// returned.
    pub async fn run(mut self) -> RegistryState {
        let mut ticker = time::interval_at(
            Instant::now() + self.stats_interval,
            self.stats_interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let shutdown = self.shutdown.clone();

        info!(
            stats_interval_secs = self.stats_interval.as_secs(),
            "Dispatcher started"
        );

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                Some(request) = self.register_rx.recv() => self.handle_register(request).await,
                Some(id) = self.unregister_rx.recv() => self.handle_unregister(id).await,
                Some(update) = self.ingress_rx.recv() => self.handle_update(update).await,
                _ = ticker.tick() => self.log_stats().await,
            }
        }

        let closed = self.state.close_all();
        self.publish_counts().await;
        info!(
            closed,
            tracked_locations = self.state.cache_size(),
            "Dispatcher stopped"
        );

        self.state
    }

    async fn handle_register(&mut self, request: RegisterRequest) {
        let RegisterRequest {
            remote_addr,
            outbox,
            reply,
        } = request;

        if self.shutdown.is_cancelled() {
            debug!(remote = %remote_addr, "Registration refused during shutdown");
            return;
        }

        let id = ConnectionId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);

        let closed = self.shutdown.child_token();
        let record = ConnectionRecord::new(remote_addr, outbox, closed.clone());
        if !self.state.insert(id, record) {
            warn!(connection = %id, "Connection id already live, registration dropped");
            return;
        }

        if reply.send(Registration { id, closed }).is_err() {
            // The registrant went away before it learned its id.
            self.state.remove(id);
            debug!(connection = %id, "Registrant gone, connection discarded");
        } else {
            info!(
                connection = %id,
                remote = %remote_addr,
                total = self.state.connection_count(),
                "Client registered"
            );
        }

        self.publish_counts().await;
    }

    async fn handle_unregister(&mut self, id: ConnectionId) {
        if self.state.remove(id) {
            info!(
                connection = %id,
                total = self.state.connection_count(),
                "Client unregistered"
            );
            self.publish_counts().await;
        } else {
            debug!(connection = %id, "Unregister for absent connection ignored");
        }
    }

    async fn handle_update(&mut self, update: LocationUpdate) {
        let frame = match serde_json::to_string(&update) {
            Ok(json) => Some(Arc::<str>::from(json)),
            Err(e) => {
                warn!(identity = %update.id, error = %e, "Failed to encode update");
                None
            }
        };

        self.state.record(update);

        if let Some(frame) = frame {
            let report = self.state.fan_out(&frame);
            let now = Utc::now();
            for removed in &report.removed {
                warn!(
                    connection = %removed.id,
                    remote = %removed.remote_addr,
                    connected_secs = now.signed_duration_since(removed.connected_at).num_seconds(),
                    error = %removed.error,
                    "Error writing to client, removed"
                );
            }
            debug!(
                delivered = report.delivered,
                removed = report.removed.len(),
                "Update broadcast"
            );
        }

        self.publish_counts().await;
    }

    async fn log_stats(&self) {
        let snapshot = self.stats.snapshot().await;
        info!(
            connected_clients = snapshot.connected_clients,
            tracked_locations = snapshot.tracked_locations,
            queue_depth = snapshot.queue_depth,
            "Hub stats"
        );
    }

    async fn publish_counts(&mut self) {
        let counts = RegistryCounts {
            connections: self.state.connection_count(),
            cached: self.state.cache_size(),
        };
        if counts != self.published {
            self.stats.publish(counts).await;
            self.published = counts;
        }
    }
}
