//! Type-keyed event bus.
//!
//! Notifications are routed by their Rust type: subscribers register for a
//! concrete event type and only see events of that type. Handlers run
//! synchronously on whichever thread publishes, which is usually not the
//! thread ticking the tree.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

type Handler = Arc<dyn Fn(&dyn Any) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct SubscriptionId(u64);

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    topics: RwLock<HashMap<TypeId, Vec<(SubscriptionId, Handler)>>>,
}

impl Registry {
    fn remove(&self, topic: TypeId, id: SubscriptionId) -> bool {
        let mut topics = self.topics.write().unwrap_or_else(PoisonError::into_inner);
        let Some(handlers) = topics.get_mut(&topic) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(handler_id, _)| *handler_id != id);
        let removed = handlers.len() != before;
        if handlers.is_empty() {
            topics.remove(&topic);
        }
        removed
    }
}

/// Publish/subscribe channel keyed by event type.
///
/// Cloning is cheap; clones share the same subscriber registry.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Registry>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for events of type `E`.
    ///
    /// The handler stays registered until the returned [`Subscription`] is
    /// cancelled or dropped.
    pub fn subscribe<E, F>(&self, handler: F) -> Subscription
    where
        E: Any,
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.registry.next_id.fetch_add(1, Ordering::Relaxed));
        let topic = TypeId::of::<E>();
        let erased: Handler = Arc::new(move |event: &dyn Any| {
            if let Some(event) = event.downcast_ref::<E>() {
                handler(event);
            }
        });

        self.registry
            .topics
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(topic)
            .or_default()
            .push((id, erased));

        Subscription {
            registry: Arc::downgrade(&self.registry),
            topic,
            id,
            active: true,
        }
    }

    /// Delivers `event` to every handler subscribed to `E`.
    ///
    /// Returns the number of handlers invoked. Handlers are called after the
    /// registry lock is released, so they may subscribe or unsubscribe freely.
    pub fn publish<E: Any>(&self, event: &E) -> usize {
        let topic = TypeId::of::<E>();
        let handlers: Vec<Handler> = {
            let topics = self
                .registry
                .topics
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            match topics.get(&topic) {
                Some(handlers) => handlers.iter().map(|(_, h)| Arc::clone(h)).collect(),
                None => Vec::new(),
            }
        };

        if handlers.is_empty() {
            // No subscribers for this type - this is normal, not an error
            tracing::trace!(
                event = std::any::type_name::<E>(),
                "no subscribers for event"
            );
        }

        for handler in &handlers {
            handler(event);
        }
        handlers.len()
    }

    /// Number of live subscriptions for events of type `E`.
    pub fn subscriber_count<E: Any>(&self) -> usize {
        self.registry
            .topics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&TypeId::of::<E>())
            .map_or(0, Vec::len)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let topics = self
            .registry
            .topics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("EventBus").field("topics", &topics).finish()
    }
}

/// Handle to a registered event handler.
///
/// Dropping the handle unsubscribes. The handle only holds a weak reference,
/// so it never keeps a bus alive on its own.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    registry: Weak<Registry>,
    topic: TypeId,
    id: SubscriptionId,
    active: bool,
}

impl Subscription {
    /// Removes the handler. Returns `true` if it was still registered.
    pub fn unsubscribe(mut self) -> bool {
        self.cancel()
    }

    /// Returns `true` until the subscription is cancelled.
    pub fn is_active(&self) -> bool {
        self.active
    }

    fn cancel(&mut self) -> bool {
        if !std::mem::replace(&mut self.active, false) {
            return false;
        }
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.remove(self.topic, self.id))
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id.0)
            .field("active", &self.active)
            .finish()
    }
}
