mod bus;
mod events;

pub use bus::{EventBus, SubscriptionId};
pub use events::{ControlEvent, EventKind};

/// Receives events published on an [`EventBus`]
pub trait EventHandler: Send + Sync {
    fn handle_event(&self, event: &ControlEvent);
}

impl<F> EventHandler for F
where
    F: Fn(&ControlEvent) + Send + Sync,
{
    fn handle_event(&self, event: &ControlEvent) {
        self(event)
    }
}
