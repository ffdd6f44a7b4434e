//! Hub construction and the cloneable handle used by connection tasks.
//!
//! [`new`] wires the three event channels, the ingress queue, and the
//! stats surface together and returns a [`HubHandle`] plus the
//! [`Dispatcher`] that must be driven. [`spawn`] does the same and runs
//! the dispatcher on a background Tokio task.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use waypost_types::{ConnectionId, HubSnapshot, LocationUpdate};

use crate::dispatcher::{Dispatcher, RegisterRequest, Registration};
use crate::error::{HubError, QueueFullError};
use crate::ingress::{self, DEFAULT_QUEUE_CAPACITY, IngressSender};
use crate::registry::{OutboxSender, RegistryState};
use crate::stats::HubStats;

/// Shortest accepted stats interval.
const MIN_STATS_INTERVAL: Duration = Duration::from_millis(10);

/// Tunables for a hub instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubConfig {
    /// Ingress queue slots.
    pub queue_capacity: usize,
    /// Interval between diagnostic stats lines.
    pub stats_interval: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            stats_interval: Duration::from_secs(30),
        }
    }
}

/// Cloneable access to a running hub.
///
/// Every method either sends an event to the dispatcher or reads the
/// stats surface; none touches the registry directly.
#[derive(Debug, Clone)]
pub struct HubHandle {
    register_tx: mpsc::UnboundedSender<RegisterRequest>,
    unregister_tx: mpsc::UnboundedSender<ConnectionId>,
    ingress: IngressSender,
    stats: Arc<HubStats>,
    shutdown: CancellationToken,
}

/// Build a hub without starting it.
///
/// The returned [`Dispatcher`] must be run (usually on its own task) for
/// any event to be processed.
pub fn new(config: HubConfig) -> (HubHandle, Dispatcher) {
    let (register_tx, register_rx) = mpsc::unbounded_channel();
    let (unregister_tx, unregister_rx) = mpsc::unbounded_channel();
    let (ingress_tx, ingress_rx) = ingress::channel(config.queue_capacity);
    let stats = Arc::new(HubStats::new(ingress_tx.clone()));
    let shutdown = CancellationToken::new();

    let dispatcher = Dispatcher::new(
        register_rx,
        unregister_rx,
        ingress_rx,
        Arc::clone(&stats),
        config.stats_interval.max(MIN_STATS_INTERVAL),
        shutdown.clone(),
    );

    let handle = HubHandle {
        register_tx,
        unregister_tx,
        ingress: ingress_tx,
        stats,
        shutdown,
    };

    (handle, dispatcher)
}

/// Build a hub and run its dispatcher on a background task.
///
/// The join handle resolves to the final registry state after shutdown.
pub fn spawn(config: HubConfig) -> (HubHandle, JoinHandle<RegistryState>) {
    let (handle, dispatcher) = new(config);
    let task = tokio::spawn(dispatcher.run());
    (handle, task)
}

impl HubHandle {
    /// Register a new connection whose outbound frames go to `outbox`.
    ///
    /// Resolves once the dispatcher has added the connection to the live
    /// set.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::ShuttingDown`] once shutdown has begun.
    pub async fn register(
        &self,
        remote_addr: SocketAddr,
        outbox: OutboxSender,
    ) -> Result<Registration, HubError> {
        if self.shutdown.is_cancelled() {
            return Err(HubError::ShuttingDown);
        }

        let (reply, response) = oneshot::channel();
        self.register_tx
            .send(RegisterRequest {
                remote_addr,
                outbox,
                reply,
            })
            .map_err(|_closed| HubError::ShuttingDown)?;

        response.await.map_err(|_closed| HubError::ShuttingDown)
    }

    /// Ask the dispatcher to drop a connection.
    ///
    /// Fire-and-forget and idempotent: unregistering an absent or already
    /// removed connection does nothing.
    pub fn unregister(&self, id: ConnectionId) {
        // A closed channel means the dispatcher already closed everything.
        let _ = self.unregister_tx.send(id);
    }

    /// Offer a validated update to the ingress queue without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`QueueFullError`] when the update was dropped.
    pub fn offer(&self, update: LocationUpdate) -> Result<(), QueueFullError> {
        self.ingress.offer(update)
    }

    /// Consistent snapshot of connection count, cache size, and queue depth.
    pub async fn snapshot(&self) -> HubSnapshot {
        self.stats.snapshot().await
    }

    /// Begin shutdown. New registrations fail from this point on.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Whether shutdown has begun.
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Token cancelled when shutdown begins.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}
