use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use crate::log_event::LogEvent;

pub type LogHandler = Arc<dyn Fn(&LogEvent) + Send + Sync>;

/// Anything that can deliver log events to registered handlers.
pub trait LogSource: Send + Sync {
    /// Registers a handler; dropping the returned guard unregisters it.
    fn subscribe(&self, handler: LogHandler) -> Subscription;
}

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    handlers: RwLock<Vec<(u64, LogHandler)>>,
}

impl Registry {
    fn remove(&self, id: u64) {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        handlers.retain(|(hid, _)| *hid != id);
    }
}

/// In-process log event fan-out. `publish` may be called from any thread.
#[derive(Clone, Default)]
pub struct LogBroadcaster {
    registry: Arc<Registry>,
}

impl LogBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, event: &LogEvent) {
        // Handlers run outside the lock so they may subscribe or publish.
        let handlers: Vec<LogHandler> = self
            .registry
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect();
        for handler in handlers {
            handler(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl LogSource for LogBroadcaster {
    fn subscribe(&self, handler: LogHandler) -> Subscription {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, handler));
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }
}

/// Registration guard. Unsubscribes on drop, on every exit path.
#[must_use = "dropping the subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    registry: Weak<Registry>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}
