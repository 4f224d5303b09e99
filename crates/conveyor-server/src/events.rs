//! The application monitor: typed events with subscribe/unsubscribe/raise.
//!
//! ```ignore
//! const ORDER_PLACED: EventDefinition<u64> = EventDefinition::new("OrderPlaced");
//!
//! let subscription = events.subscribe(&ORDER_PLACED, Arc::new(|id: &u64| {
//!     tracing::info!(order_id = id, "Order placed");
//! }));
//! events.raise(&ORDER_PLACED, &42);
//! events.unsubscribe(subscription);
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::trace;

/// A handler invoked with the raised value.
pub type EventHandler<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A named, typed event.
pub struct EventDefinition<T> {
    name: &'static str,
    _marker: PhantomData<fn(&T)>,
}

impl<T> EventDefinition<T> {
    /// Creates an event definition.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    /// Returns the event name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for EventDefinition<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for EventDefinition<T> {}

impl<T> fmt::Debug for EventDefinition<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EventDefinition").field(&self.name).finish()
    }
}

/// Handle returned by [`Events::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription {
    event: &'static str,
    type_id: TypeId,
    id: u64,
}

impl Subscription {
    /// Returns the name of the subscribed event.
    #[must_use]
    pub const fn event(&self) -> &'static str {
        self.event
    }
}

type EventKey = (&'static str, TypeId);

/// The typed event bus of an application.
#[derive(Clone, Default)]
pub struct Events {
    handlers: HashMap<EventKey, Vec<(u64, Arc<dyn Any + Send + Sync>)>>,
    next_id: u64,
}

impl Events {
    /// Creates an empty monitor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `handler` to `definition`.
    pub fn subscribe<T: 'static>(
        &mut self,
        definition: &EventDefinition<T>,
        handler: EventHandler<T>,
    ) -> Subscription {
        let key = (definition.name, TypeId::of::<T>());
        let id = self.next_id;
        self.next_id += 1;

        self.handlers
            .entry(key)
            .or_default()
            .push((id, Arc::new(handler) as Arc<dyn Any + Send + Sync>));
        trace!(event = definition.name, subscription = id, "Subscribed to event");

        Subscription {
            event: key.0,
            type_id: key.1,
            id,
        }
    }

    /// Removes a subscription. Returns `false` if it was already removed.
    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        let key = (subscription.event, subscription.type_id);
        let Some(handlers) = self.handlers.get_mut(&key) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(id, _)| *id != subscription.id);
        let removed = handlers.len() != before;
        if handlers.is_empty() {
            self.handlers.remove(&key);
        }
        removed
    }

    /// Invokes every handler subscribed to `definition`, in subscription order.
    pub fn raise<T: 'static>(&self, definition: &EventDefinition<T>, value: &T) {
        let key = (definition.name, TypeId::of::<T>());
        let Some(handlers) = self.handlers.get(&key) else {
            return;
        };
        trace!(event = definition.name, handlers = handlers.len(), "Raising event");
        for (_, handler) in handlers {
            if let Some(handler) = handler.downcast_ref::<EventHandler<T>>() {
                handler(value);
            }
        }
    }

    /// Returns the number of handlers subscribed to `definition`.
    #[must_use]
    pub fn subscribers<T: 'static>(&self, definition: &EventDefinition<T>) -> usize {
        self.handlers
            .get(&(definition.name, TypeId::of::<T>()))
            .map_or(0, Vec::len)
    }
}

impl fmt::Debug for Events {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut events: Vec<_> = self
            .handlers
            .iter()
            .map(|((name, _), handlers)| (*name, handlers.len()))
            .collect();
        events.sort_unstable();
        f.debug_struct("Events").field("handlers", &events).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    const PING: EventDefinition<u32> = EventDefinition::new("Ping");

    #[test]
    fn test_raise_in_subscription_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut events = Events::new();

        for tag in ["first", "second"] {
            let log = Arc::clone(&log);
            events.subscribe(&PING, Arc::new(move |n: &u32| log.lock().push(format!("{tag}:{n}"))));
        }

        events.raise(&PING, &7);
        assert_eq!(*log.lock(), vec!["first:7", "second:7"]);
    }

    #[test]
    fn test_unsubscribe() {
        let count = Arc::new(Mutex::new(0));
        let mut events = Events::new();

        let counter = Arc::clone(&count);
        let subscription = events.subscribe(&PING, Arc::new(move |_: &u32| *counter.lock() += 1));
        events.raise(&PING, &1);

        assert!(events.unsubscribe(subscription));
        assert!(!events.unsubscribe(subscription));
        events.raise(&PING, &2);

        assert_eq!(*count.lock(), 1);
        assert_eq!(events.subscribers(&PING), 0);
    }

    #[test]
    fn test_same_name_different_type_is_distinct() {
        const PING_TEXT: EventDefinition<String> = EventDefinition::new("Ping");
        let hits = Arc::new(Mutex::new(Vec::new()));
        let mut events = Events::new();

        let log = Arc::clone(&hits);
        events.subscribe(&PING_TEXT, Arc::new(move |s: &String| log.lock().push(s.clone())));

        events.raise(&PING, &1);
        assert!(hits.lock().is_empty());

        events.raise(&PING_TEXT, &"pong".to_string());
        assert_eq!(*hits.lock(), vec!["pong".to_string()]);
    }

    #[test]
    fn test_raise_without_subscribers() {
        let events = Events::new();
        events.raise(&PING, &1);
        assert_eq!(events.subscribers(&PING), 0);
    }
}
