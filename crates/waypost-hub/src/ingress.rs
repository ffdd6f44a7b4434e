//! Bounded ingress queue between connection readers and the dispatcher.
//!
//! Many readers offer validated updates; the dispatcher is the single
//! consumer. Offering never blocks: when the queue is full the incoming
//! update is dropped and the caller receives a [`QueueFullError`] to log.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use waypost_types::LocationUpdate;

use crate::error::QueueFullError;

/// Default number of queue slots.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Producer side of the ingress queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct IngressSender {
    tx: mpsc::Sender<LocationUpdate>,
}

/// Consumer side of the ingress queue, owned by the dispatcher.
#[derive(Debug)]
pub struct IngressReceiver {
    rx: mpsc::Receiver<LocationUpdate>,
}

/// Create a bounded ingress queue. A capacity of zero is raised to one.
pub fn channel(capacity: usize) -> (IngressSender, IngressReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (IngressSender { tx }, IngressReceiver { rx })
}

impl IngressSender {
    /// Offer an update without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`QueueFullError`] when every slot is taken, or when the
    /// dispatcher is gone. The update is dropped in both cases.
    pub fn offer(&self, update: LocationUpdate) -> Result<(), QueueFullError> {
        match self.tx.try_send(update) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(dropped) | TrySendError::Closed(dropped)) => {
                Err(QueueFullError {
                    identity: dropped.id,
                })
            }
        }
    }

    /// Number of updates currently waiting in the queue.
    pub fn depth(&self) -> usize {
        self.tx.max_capacity().saturating_sub(self.tx.capacity())
    }

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}

impl IngressReceiver {
    /// Wait for the next queued update.
    ///
    /// Returns `None` once every sender has been dropped and the queue is
    /// drained.
    pub async fn recv(&mut self) -> Option<LocationUpdate> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use chrono::Utc;

    use super::*;

    fn update(id: &str) -> LocationUpdate {
        LocationUpdate {
            id: id.to_owned(),
            lat: 1.0,
            lng: 2.0,
            device_type: String::from("Mobile"),
            received_at: Utc::now(),
        }
    }

    #[test]
    fn overflow_drops_newest_without_blocking() {
        let (tx, _rx) = channel(4);

        let mut accepted = 0;
        let mut dropped = Vec::new();
        for i in 0..10 {
            match tx.offer(update(&format!("user-{i}"))) {
                Ok(()) => accepted += 1,
                Err(e) => dropped.push(e.identity),
            }
        }

        assert_eq!(accepted, 4);
        assert_eq!(dropped.len(), 6);
        assert_eq!(dropped.first().unwrap(), "user-4");
        assert_eq!(tx.depth(), 4);
    }

    #[tokio::test]
    async fn queued_items_are_delivered_in_order() {
        let (tx, mut rx) = channel(8);
        tx.offer(update("a")).unwrap();
        tx.offer(update("b")).unwrap();
        assert_eq!(tx.depth(), 2);

        assert_eq!(rx.recv().await.unwrap().id, "a");
        assert_eq!(rx.recv().await.unwrap().id, "b");
        assert_eq!(tx.depth(), 0);
    }

    #[test]
    fn zero_capacity_is_raised() {
        let (tx, _rx) = channel(0);
        assert_eq!(tx.capacity(), 1);
        assert!(tx.offer(update("a")).is_ok());
        assert!(tx.offer(update("b")).is_err());
    }

    #[test]
    fn offer_after_consumer_dropped_fails() {
        let (tx, rx) = channel(4);
        drop(rx);
        let err = tx.offer(update("gone")).unwrap_err();
        assert_eq!(err.identity, "gone");
    }
}
