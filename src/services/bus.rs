//! Host event bus
//!
//! Handlers are plain callbacks keyed by event name. Every `on` must be paired
//! with an `off` when the subscriber goes away, otherwise the handler outlives
//! the widget for the rest of the host session.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const TIMER_STARTED: &str = "timer-started";
pub const TIMER_STOPPED: &str = "timer-stopped";
pub const FILTER_ACTIVE: &str = "filter-active";
pub const FILTER_RESET: &str = "filter-reset";

/// Payload carried by host events. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl EventPayload {
    pub fn for_timer(timer_name: impl Into<String>) -> Self {
        Self {
            timer_name: Some(timer_name.into()),
            ..Default::default()
        }
    }
}

/// A named event together with its payload
#[derive(Debug, Clone, PartialEq)]
pub struct HostEvent {
    pub name: String,
    pub payload: EventPayload,
}

pub type Handler = Arc<dyn Fn(&HostEvent) + Send + Sync>;

/// Identifies one registered handler for `off`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: HashMap<String, Vec<(HandlerId, Handler)>>,
}

/// Cloneable handle to a shared event bus
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus").finish_non_exhaustive()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for an event
    pub fn on<F>(&self, event: &str, handler: F) -> HandlerId
    where
        F: Fn(&HostEvent) + Send + Sync + 'static,
    {
        let mut registry = match self.registry.lock() {
            Ok(registry) => registry,
            Err(poisoned) => poisoned.into_inner(),
        };
        registry.next_id += 1;
        let id = HandlerId(registry.next_id);
        registry
            .handlers
            .entry(event.to_string())
            .or_default()
            .push((id, Arc::new(handler)));
        debug!("Registered handler {:?} for {}", id, event);
        id
    }

    /// Remove a handler, returns false if it was not registered
    pub fn off(&self, event: &str, id: HandlerId) -> bool {
        let mut registry = match self.registry.lock() {
            Ok(registry) => registry,
            Err(poisoned) => poisoned.into_inner(),
        };
        let Some(handlers) = registry.handlers.get_mut(event) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(handler_id, _)| *handler_id != id);
        let removed = handlers.len() != before;
        if handlers.is_empty() {
            registry.handlers.remove(event);
        }
        removed
    }

    /// Deliver an event to every handler registered for it.
    ///
    /// Returns the number of handlers invoked.
    pub fn emit(&self, event: &str, payload: EventPayload) -> usize {
        // Snapshot the handlers so a handler may call on/off without deadlocking
        let handlers: Vec<Handler> = match self.registry.lock() {
            Ok(registry) => registry
                .handlers
                .get(event)
                .map(|hs| hs.iter().map(|(_, h)| Arc::clone(h)).collect())
                .unwrap_or_default(),
            Err(_) => {
                warn!("Event bus registry poisoned, dropping {}", event);
                return 0;
            }
        };

        let host_event = HostEvent {
            name: event.to_string(),
            payload,
        };
        for handler in &handlers {
            handler(&host_event);
        }
        debug!("Emitted {} to {} handler(s)", event, handlers.len());
        handlers.len()
    }

    /// Number of handlers currently registered for an event
    pub fn listener_count(&self, event: &str) -> usize {
        self.registry
            .lock()
            .map(|registry| registry.handlers.get(event).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}
