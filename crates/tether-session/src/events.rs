//! Typed observer list.
//!
//! Delivery rules:
//! - every subscriber sees every event, in emission order;
//! - callback handlers run after the subscriber lock is released, so a
//!   handler may subscribe, unsubscribe or query the session freely;
//! - a handler returning an error is logged and does not stop delivery to the
//!   handlers after it.

#![allow(clippy::disallowed_types, reason = "Synchronous locking operations only")]

use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::mpsc;

/// Error type returned by callback handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

type Handler<T> = Arc<dyn Fn(&T) -> Result<(), HandlerError> + Send + Sync>;

/// Handle for removing a callback handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscribers<T> {
    next_id: u64,
    handlers: Vec<(SubscriptionId, Handler<T>)>,
    channels: Vec<mpsc::UnboundedSender<T>>,
}

/// Observer list for one event type.
pub struct EventBus<T> {
    subscribers: Mutex<Subscribers<T>>,
}

impl<T> Default for EventBus<T> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Subscribers {
                next_id: 0,
                handlers: Vec::new(),
                channels: Vec::new(),
            }),
        }
    }
}

impl<T: Clone + fmt::Debug> EventBus<T> {
    /// Empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Channel receiving every future event. Dropping the receiver
    /// unsubscribes.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().channels.push(tx);
        rx
    }

    /// Register a callback handler.
    pub fn on<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&T) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let mut subscribers = self.lock();
        let id = SubscriptionId(subscribers.next_id);
        subscribers.next_id += 1;
        subscribers.handlers.push((id, Arc::new(handler)));
        id
    }

    /// Remove a callback handler. Returns whether it was registered.
    pub fn off(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.lock();
        let before = subscribers.handlers.len();
        subscribers.handlers.retain(|(handler_id, _)| *handler_id != id);
        subscribers.handlers.len() != before
    }

    /// Deliver `event` to every subscriber. Returns the number of handlers
    /// that failed.
    pub fn emit(&self, event: &T) -> usize {
        let handlers: Vec<Handler<T>> = {
            let mut subscribers = self.lock();
            subscribers.channels.retain(|tx| tx.send(event.clone()).is_ok());
            subscribers.handlers.iter().map(|(_, h)| Arc::clone(h)).collect()
        };

        let mut failures = 0;
        for handler in handlers {
            if let Err(e) = handler(event) {
                failures += 1;
                tracing::warn!(?event, error = %e, "event handler failed");
            }
        }
        failures
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Subscribers<T>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn failing_handler_does_not_block_others() {
        let bus = EventBus::<u32>::new();
        let seen = Arc::new(AtomicUsize::new(0));

        bus.on(|_| Err("boom".into()));
        let counter = Arc::clone(&seen);
        bus.on(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert_eq!(bus.emit(&1), 1);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn channel_subscribers_see_every_event_in_order() {
        let bus = EventBus::<u32>::new();
        let mut rx = bus.subscribe();

        for n in 0..5 {
            bus.emit(&n);
        }

        let received: Vec<u32> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(received, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn handler_can_resubscribe_without_deadlock() {
        let bus = Arc::new(EventBus::<u32>::new());
        let inner = Arc::clone(&bus);
        bus.on(move |_| {
            let _rx = inner.subscribe();
            Ok(())
        });

        assert_eq!(bus.emit(&7), 0);
    }

    #[test]
    fn off_removes_handler() {
        let bus = EventBus::<u32>::new();
        let id = bus.on(|_| Err("boom".into()));

        assert!(bus.off(id));
        assert_eq!(bus.emit(&1), 0);
        assert!(!bus.off(id));
    }
}
