//! In-process change notifications.
//!
//! Two payload-less topics: subscribers re-read the store or the tracker
//! when notified. Delivery is synchronous on the publishing thread, after the
//! change is durable. A [`Subscription`] unsubscribes when dropped, so a
//! listener lives exactly as long as the scope that owns its handle.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tracing::trace;

/// Notification topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// The entry collection changed; re-read the store.
    EntriesChanged,
    /// The active selection changed; re-read the tracker.
    ActiveSelectionChanged,
}

type Callback = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    subscribers: Vec<(u64, Topic, Callback)>,
}

/// Topic-based publish/subscribe hub. Clones share the same subscribers.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.lock().subscribers.len();
        f.debug_struct("EventBus").field("subscribers", &count).finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `callback` for `topic`. Keep the returned handle alive for as
    /// long as the callback should fire.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe<F>(&self, topic: Topic, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut registry = self.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.subscribers.push((id, topic, Arc::new(callback)));
        trace!(id, ?topic, "Subscribed");
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Deliver `topic` to every current subscriber, in subscription order.
    ///
    /// Callbacks run without the registry lock held, so they may subscribe,
    /// unsubscribe or publish.
    pub fn publish(&self, topic: Topic) {
        let callbacks: Vec<Callback> = self
            .lock()
            .subscribers
            .iter()
            .filter(|(_, t, _)| *t == topic)
            .map(|(_, _, cb)| Arc::clone(cb))
            .collect();
        trace!(?topic, count = callbacks.len(), "Publishing");
        for callback in callbacks {
            callback();
        }
    }

    /// Number of live subscribers on `topic`.
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.lock()
            .subscribers
            .iter()
            .filter(|(_, t, _)| *t == topic)
            .count()
    }
}

/// Scoped subscription handle.
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            let mut registry = registry.lock().unwrap_or_else(PoisonError::into_inner);
            registry.subscribers.retain(|(id, _, _)| *id != self.id);
            trace!(id = self.id, "Unsubscribed");
        }
    }
}
