//! The event bus and its subscriptions.
//!
//! Each subscription owns a small bounded `mpsc` queue. Publishing fans an
//! event out to every queue registered for its kind at call time.

use super::types::{Event, EventKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

/// Default per-subscriber queue size.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 1;

/// What `publish` does when a subscriber's queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishPolicy {
    /// Wait for the subscriber to make room (back-pressure on the publisher).
    #[default]
    Wait,
    /// Drop the event for that subscriber and log a warning.
    DropWhenFull,
}

/// Cloneable handle to a shared subscriber registry.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<EventBusInner>,
}

struct EventBusInner {
    subscribers: RwLock<HashMap<EventKind, Vec<mpsc::Sender<Event>>>>,
    capacity: usize,
    policy: PublishPolicy,
}

/// Receiving end of one subscription.
///
/// Yields events until the bus is closed (or dropped) and the queue is
/// drained. Subscribing again gives a fresh, independent queue.
pub struct Subscription {
    kind: EventKind,
    rx: mpsc::Receiver<Event>,
}

impl EventBus {
    /// Create a bus whose subscriptions each buffer `capacity` events.
    ///
    /// A capacity of zero is bumped to one, the smallest queue `mpsc` allows.
    pub fn new(capacity: usize, policy: PublishPolicy) -> Self {
        Self {
            inner: Arc::new(EventBusInner {
                subscribers: RwLock::new(HashMap::new()),
                capacity: capacity.max(1),
                policy,
            }),
        }
    }

    /// Register a new delivery endpoint for `kind`.
    pub async fn subscribe(&self, kind: EventKind) -> Subscription {
        let (tx, rx) = mpsc::channel(self.inner.capacity);
        let mut subscribers = self.inner.subscribers.write().await;
        subscribers.entry(kind).or_default().push(tx);
        debug!(%kind, "New subscription registered");
        Subscription { kind, rx }
    }

    /// Deliver `event` to every subscriber of its kind.
    ///
    /// Returns how many subscribers accepted it. With no subscriber the event
    /// is dropped; that is expected and only logged at debug level.
    pub async fn publish(&self, event: impl Into<Event>) -> usize {
        let event = event.into();
        let kind = event.kind();

        // Snapshot the senders so no lock is held while waiting on a queue.
        let senders = {
            let subscribers = self.inner.subscribers.read().await;
            subscribers.get(&kind).cloned().unwrap_or_default()
        };

        if senders.is_empty() {
            debug!(%kind, "No subscriber, event dropped");
            return 0;
        }

        let mut delivered = 0;
        let mut saw_closed = false;
        for sender in &senders {
            let sent = match self.inner.policy {
                PublishPolicy::Wait => sender.send(event.clone()).await.is_ok(),
                PublishPolicy::DropWhenFull => match sender.try_send(event.clone()) {
                    Ok(()) => true,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        warn!(%kind, "Subscriber queue full, event dropped");
                        false
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => false,
                },
            };
            if sent {
                delivered += 1;
            } else if sender.is_closed() {
                saw_closed = true;
            }
        }

        if saw_closed {
            self.prune(kind).await;
        }
        delivered
    }

    /// Terminate every subscription.
    ///
    /// Receivers still yield whatever is already queued, then end. Later
    /// publishes find no subscriber and are dropped.
    pub async fn close(&self) {
        let mut subscribers = self.inner.subscribers.write().await;
        let count: usize = subscribers.values().map(Vec::len).sum();
        subscribers.clear();
        debug!(subscriptions = count, "Event bus closed");
    }

    /// Number of live subscriptions for `kind`.
    pub async fn subscriber_count(&self, kind: EventKind) -> usize {
        let subscribers = self.inner.subscribers.read().await;
        subscribers
            .get(&kind)
            .map(|s| s.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }

    async fn prune(&self, kind: EventKind) {
        let mut subscribers = self.inner.subscribers.write().await;
        if let Some(list) = subscribers.get_mut(&kind) {
            list.retain(|tx| !tx.is_closed());
            if list.is_empty() {
                subscribers.remove(&kind);
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_CAPACITY, PublishPolicy::default())
    }
}

impl Subscription {
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Wait for the next event; `None` once the bus is closed and drained.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Take an event if one is already queued.
    pub fn try_recv(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }

    /// View the subscription as a lazy stream of events.
    pub fn into_stream(self) -> ReceiverStream<Event> {
        ReceiverStream::new(self.rx)
    }
}
