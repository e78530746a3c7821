//! Registry of live subscriber connections.
//!
//! Each `WebSocket` connection owns the receiving half of a bounded channel
//! and registers the sending half here as a [`SubscriberHandle`]. The
//! simulation loop calls [`SubscriberRegistry::broadcast`] once per tick.
//!
//! # Locking
//!
//! A single [`Mutex`] guards the handle map. `broadcast` holds it only
//! long enough to clone a snapshot, sends outside the lock, and then takes
//! it again to prune handles whose connection has gone away. A slow or
//! vanished subscriber therefore never blocks `subscribe`/`unsubscribe`.
//!
//! # Delivery
//!
//! Sends never wait. A closed channel means the connection task exited and
//! the handle is pruned. A full channel means the client is lagging: the
//! message is skipped for that client only, matching how a lagged broadcast
//! receiver behaves.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rfidsim_types::SubscriberId;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

/// Messages buffered per subscriber before it counts as lagging.
pub const SUBSCRIBER_BUFFER: usize = 256;

/// Shared, cheaply clonable message text.
pub type Message = Arc<str>;

/// Sending half of one subscriber connection.
#[derive(Debug, Clone)]
pub struct SubscriberHandle {
    id: SubscriberId,
    tx: mpsc::Sender<Message>,
}

/// Outcome of a single send to one subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The message was queued for the connection.
    Delivered,
    /// The connection's buffer is full; the message was dropped for it.
    Lagged,
    /// The connection is gone.
    Closed,
}

impl SubscriberHandle {
    /// Create a handle with a fresh id and return it together with the
    /// receiving half the connection task should drain.
    pub fn channel() -> (Self, mpsc::Receiver<Message>) {
        Self::channel_with_id(SubscriberId::new())
    }

    fn channel_with_id(id: SubscriberId) -> (Self, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        (Self { id, tx }, rx)
    }

    /// The subscriber's id.
    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    /// Try to queue `message` without waiting.
    pub fn send(&self, message: &Message) -> SendOutcome {
        match self.tx.try_send(Arc::clone(message)) {
            Ok(()) => SendOutcome::Delivered,
            Err(TrySendError::Full(_)) => SendOutcome::Lagged,
            Err(TrySendError::Closed(_)) => SendOutcome::Closed,
        }
    }
}

/// Counts from one [`SubscriberRegistry::broadcast`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Subscribers that received the message.
    pub delivered: usize,
    /// Subscribers that skipped the message because they are lagging.
    pub lagged: usize,
    /// Subscribers removed because their connection is gone.
    pub pruned: usize,
}

/// Thread-safe set of live subscribers.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    handles: Mutex<HashMap<SubscriberId, SubscriberHandle>>,
}

impl SubscriberRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber.
    ///
    /// Idempotent: if a handle with the same id is already registered the
    /// existing one is kept. Returns `true` when the handle was added.
    pub fn subscribe(&self, handle: SubscriberHandle) -> bool {
        let id = handle.id;
        let mut handles = self.lock();
        if handles.contains_key(&id) {
            return false;
        }
        handles.insert(id, handle);
        debug!(subscriber = %id, total = handles.len(), "Subscriber registered");
        true
    }

    /// Remove a subscriber. A missing id is a no-op.
    ///
    /// Returns `true` when a handle was removed.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut handles = self.lock();
        let removed = handles.remove(&id).is_some();
        if removed {
            debug!(subscriber = %id, total = handles.len(), "Subscriber removed");
        }
        removed
    }

    /// Register a new subscriber and return its id plus the receiver the
    /// connection task should drain.
    pub fn connect(&self) -> (SubscriberId, mpsc::Receiver<Message>) {
        let (handle, rx) = SubscriberHandle::channel();
        let id = handle.id;
        self.subscribe(handle);
        (id, rx)
    }

    /// Deliver `message` to every registered subscriber.
    ///
    /// Never fails from the caller's point of view: subscribers whose
    /// connection is gone are pruned, lagging subscribers skip this one
    /// message, and everyone else receives it.
    pub fn broadcast(&self, message: &Message) -> BroadcastReport {
        let snapshot: Vec<SubscriberHandle> = self.lock().values().cloned().collect();

        let mut report = BroadcastReport::default();
        let mut closed = Vec::new();
        for handle in &snapshot {
            match handle.send(message) {
                SendOutcome::Delivered => report.delivered = report.delivered.saturating_add(1),
                SendOutcome::Lagged => {
                    debug!(subscriber = %handle.id, "Subscriber lagging, message skipped");
                    report.lagged = report.lagged.saturating_add(1);
                }
                SendOutcome::Closed => closed.push(handle.id),
            }
        }

        if !closed.is_empty() {
            let mut handles = self.lock();
            for id in &closed {
                if handles.remove(id).is_some() {
                    report.pruned = report.pruned.saturating_add(1);
                }
            }
            debug!(
                pruned = report.pruned,
                remaining = handles.len(),
                "Pruned closed subscribers"
            );
        }

        report
    }

    /// Number of registered subscribers.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no subscribers are registered.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.lock().contains_key(&id)
    }

    /// Lock the map. Poisoning is ignored: the map has no invariants
    /// spanning more than one entry.
    fn lock(&self) -> MutexGuard<'_, HashMap<SubscriberId, SubscriberHandle>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn msg(text: &str) -> Message {
        Arc::from(text)
    }

    #[test]
    fn subscribe_is_idempotent() {
        let registry = SubscriberRegistry::new();
        let (handle, _rx) = SubscriberHandle::channel();
        assert!(registry.subscribe(handle.clone()));
        assert!(!registry.subscribe(handle));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unsubscribe_missing_is_noop() {
        let registry = SubscriberRegistry::new();
        assert!(!registry.unsubscribe(SubscriberId::new()));
        let (id, _rx) = registry.connect();
        assert!(registry.unsubscribe(id));
        assert!(!registry.unsubscribe(id));
        assert!(registry.is_empty());
    }

    #[test]
    fn broadcast_reaches_every_subscriber() {
        let registry = SubscriberRegistry::new();
        let (_a, mut rx_a) = registry.connect();
        let (_b, mut rx_b) = registry.connect();

        let report = registry.broadcast(&msg("hello"));
        assert_eq!(report.delivered, 2);
        assert_eq!(&*rx_a.try_recv().unwrap(), "hello");
        assert_eq!(&*rx_b.try_recv().unwrap(), "hello");
    }

    #[test]
    fn broadcast_prunes_closed_subscribers() {
        let registry = SubscriberRegistry::new();
        let (_live, mut live_rx) = registry.connect();
        let (dead, dead_rx) = registry.connect();
        drop(dead_rx);

        let report = registry.broadcast(&msg("tick"));
        assert_eq!(report.delivered, 1);
        assert_eq!(report.pruned, 1);
        assert!(!registry.contains(dead));
        assert_eq!(registry.len(), 1);
        assert_eq!(&*live_rx.try_recv().unwrap(), "tick");
    }

    #[test]
    fn lagging_subscriber_is_skipped_not_pruned() {
        let registry = SubscriberRegistry::new();
        let (slow, mut slow_rx) = registry.connect();

        for _ in 0..SUBSCRIBER_BUFFER {
            assert_eq!(registry.broadcast(&msg("fill")).delivered, 1);
        }
        let report = registry.broadcast(&msg("overflow"));
        assert_eq!(report.lagged, 1);
        assert_eq!(report.pruned, 0);
        assert!(registry.contains(slow));

        // Draining makes room again.
        assert_eq!(&*slow_rx.try_recv().unwrap(), "fill");
        assert_eq!(registry.broadcast(&msg("again")).delivered, 1);
    }

    #[test]
    fn broadcast_with_no_subscribers_is_fine() {
        let registry = SubscriberRegistry::new();
        assert_eq!(registry.broadcast(&msg("nobody")), BroadcastReport::default());
    }
}
