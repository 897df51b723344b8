//! Multi-subscriber registry keyed by event category.
//!
//! [`SubscriptionRegistry`] maps each [`EventCategory`] to a set of
//! independent delivery queues. Fan-out takes the read lock; subscribe,
//! unsubscribe and teardown take the write lock.
//!
//! Queues are unbounded so that a slow screen never stalls delivery to the
//! others or blocks the connection's read task. The cost is memory: a
//! consumer that stops reading without unsubscribing grows its queue until
//! the session ends.

use std::collections::HashMap;

use tokio::sync::{RwLock, mpsc};

pub use tokio::sync::mpsc::error::TryRecvError;

use crate::domain::{EventCategory, FeedEvent, SubscriptionId};

type Queue = mpsc::UnboundedSender<FeedEvent>;

/// Receiving end of one subscription.
///
/// [`Subscription::recv`] yields `None` once the subscription has been
/// removed via [`SubscriptionRegistry::unsubscribe`] or the registry was
/// torn down, after any already-queued events have been drained.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    category: EventCategory,
    receiver: mpsc::UnboundedReceiver<FeedEvent>,
}

impl Subscription {
    /// Identifier to pass to [`SubscriptionRegistry::unsubscribe`].
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Category this subscription receives.
    #[must_use]
    pub const fn category(&self) -> EventCategory {
        self.category
    }

    /// Waits for the next event; `None` means end-of-stream.
    pub async fn recv(&mut self) -> Option<FeedEvent> {
        self.receiver.recv().await
    }

    /// Returns a queued event without waiting.
    ///
    /// # Errors
    ///
    /// [`TryRecvError::Empty`] if nothing is queued yet;
    /// [`TryRecvError::Disconnected`] once the stream has ended and been
    /// drained.
    pub fn try_recv(&mut self) -> Result<FeedEvent, TryRecvError> {
        self.receiver.try_recv()
    }
}

/// Category → subscriber queues, shared by the feed client and UI screens.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    queues: RwLock<HashMap<EventCategory, HashMap<SubscriptionId, Queue>>>,
}

impl SubscriptionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fresh queue under `category`.
    pub async fn subscribe(&self, category: EventCategory) -> Subscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = SubscriptionId::new();

        self.queues
            .write()
            .await
            .entry(category)
            .or_default()
            .insert(id, sender);

        tracing::debug!(subscription_id = %id, category = category.as_str(), "subscribed");
        Subscription {
            id,
            category,
            receiver,
        }
    }

    /// Removes a subscription and closes its queue.
    ///
    /// Returns `false` for unknown (or already removed) ids.
    pub async fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut map = self.queues.write().await;
        for (category, queues) in map.iter_mut() {
            if queues.remove(&id).is_some() {
                tracing::debug!(subscription_id = %id, category = category.as_str(), "unsubscribed");
                return true;
            }
        }
        false
    }

    /// Delivers a copy of `event` to every queue of its category.
    ///
    /// Returns the number of queues the event was delivered to. Queues whose
    /// receiver was dropped without unsubscribing are pruned.
    pub async fn publish(&self, event: &FeedEvent) -> usize {
        let category = event.category();
        let mut delivered = 0usize;
        let mut stale = Vec::new();

        {
            let map = self.queues.read().await;
            let Some(queues) = map.get(&category) else {
                return 0;
            };
            for (id, queue) in queues {
                if queue.send(event.clone()).is_ok() {
                    delivered += 1;
                } else {
                    stale.push(*id);
                }
            }
        }

        if !stale.is_empty() {
            let mut map = self.queues.write().await;
            if let Some(queues) = map.get_mut(&category) {
                for id in &stale {
                    queues.remove(id);
                }
            }
            tracing::debug!(pruned = stale.len(), category = category.as_str(), "pruned dropped subscribers");
        }

        delivered
    }

    /// Closes every queue in every category and clears the registry.
    ///
    /// Returns the number of subscriptions that were closed.
    pub async fn close_all(&self) -> usize {
        let mut map = self.queues.write().await;
        let closed = map.values().map(HashMap::len).sum();
        map.clear();
        tracing::debug!(closed, "closed all subscriptions");
        closed
    }

    /// Number of live subscriptions for `category`.
    pub async fn subscriber_count(&self, category: EventCategory) -> usize {
        self.queues
            .read()
            .await
            .get(&category)
            .map_or(0, HashMap::len)
    }

    /// Total number of live subscriptions.
    pub async fn len(&self) -> usize {
        self.queues.read().await.values().map(HashMap::len).sum()
    }

    /// Returns `true` if there are no live subscriptions.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
