use super::*;
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

pub type EventCallback = Arc<dyn Fn(&Event) + Send + Sync>;

/// Named listener registry with a log of dispatched events.
pub struct EventSystem {
    event_queue: Arc<RwLock<VecDeque<Event>>>,
    handlers: Arc<RwLock<HashMap<String, Vec<EventCallback>>>>,
}

impl EventSystem {
    pub fn new() -> Self {
        Self {
            event_queue: Arc::new(RwLock::new(VecDeque::new())),
            handlers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn add_listener<F>(&self, event_type: &str, callback: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .entry(event_type.to_string())
            .or_default()
            .push(Arc::new(callback));
    }

    pub fn listener_count(&self, event_type: &str) -> usize {
        self.handlers
            .read()
            .get(event_type)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Runs every listener registered for the event's name, then queues it.
    pub fn dispatch(&self, event: Event) {
        // Listeners may register further listeners, so run them unlocked.
        let callbacks: Vec<EventCallback> = self
            .handlers
            .read()
            .get(event.name())
            .cloned()
            .unwrap_or_default();
        tracing::trace!("dispatching {} to {} listeners", event.name(), callbacks.len());
        for callback in callbacks {
            callback(&event);
        }
        self.event_queue.write().push_back(event);
    }

    /// Returns every event dispatched since the last drain.
    pub fn drain(&self) -> Vec<Event> {
        self.event_queue.write().drain(..).collect()
    }
}

impl Default for EventSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSystem")
            .field("listeners", &self.handlers.read().len())
            .field("queued", &self.event_queue.read().len())
            .finish()
    }
}
