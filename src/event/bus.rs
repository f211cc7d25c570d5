use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::event::{ControlEvent, EventHandler, EventKind};

/// Identifies a subscription so it can be removed again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct Subscription {
    kind: EventKind,
    id: SubscriptionId,
    handler: Arc<dyn EventHandler>,
}

/// A simple event bus for broadcasting control events to registered handlers.
///
/// Cloning the bus yields another handle to the same subscriber list, so one
/// bus can be injected into every component.
#[derive(Clone)]
pub struct EventBus {
    handlers: Arc<Mutex<Vec<Subscription>>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &format!("<{} handlers>", self.handlers.lock().len()))
            .finish()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Creates a new event bus
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Subscribe a handler to receive events of one kind
    pub fn subscribe(&self, kind: EventKind, handler: impl EventHandler + 'static) -> SubscriptionId {
        let id = SubscriptionId(Uuid::new_v4());
        self.handlers.lock().push(Subscription {
            kind,
            id,
            handler: Arc::new(handler),
        });
        id
    }

    /// Removes a subscription. Returns false if it was not registered for `kind`.
    pub fn unsubscribe(&self, kind: EventKind, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.lock();
        let before = handlers.len();
        handlers.retain(|sub| !(sub.kind == kind && sub.id == id));
        handlers.len() != before
    }

    /// Number of handlers registered for `kind`
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.lock().iter().filter(|sub| sub.kind == kind).count()
    }

    /// Emit an event to all handlers registered for its kind, in subscription order.
    ///
    /// A panicking handler is logged and skipped; the remaining handlers still run.
    pub fn publish(&self, event: ControlEvent) {
        let kind = event.kind();
        // Handlers may subscribe or publish from inside a callback.
        let targets: Vec<Arc<dyn EventHandler>> = self
            .handlers
            .lock()
            .iter()
            .filter(|sub| sub.kind == kind)
            .map(|sub| Arc::clone(&sub.handler))
            .collect();

        for handler in targets {
            let result = panic::catch_unwind(AssertUnwindSafe(|| handler.handle_event(&event)));
            if let Err(payload) = result {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_owned());
                log::error!("Handler for '{}' event failed: {}", kind, message);
            }
        }
    }
}
