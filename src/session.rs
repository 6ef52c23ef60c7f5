//! The append-only session buffer.
//!
//! One buffer exists per page load. Every producer (DOM engine callback,
//! network decorators, lifecycle observer) appends through a clone of
//! [`SessionBuffer`]; events are never mutated or removed once inserted.
//! Custom events all pass through [`SessionBuffer::record_custom`], the
//! single tagging write path that stamps the `type: 5` marker and the
//! wall-clock timestamp.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::events::{CustomData, CustomEvent, SessionEvent};

/// Shared handle to the ordered session log.
#[derive(Clone, Default)]
pub struct SessionBuffer {
    events: Arc<Mutex<Vec<SessionEvent>>>,
}

impl SessionBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a DOM-layer event verbatim. The shape is owned by the
    /// external engine and must not be altered here.
    pub fn record_dom(&self, event: serde_json::Value) {
        self.events.lock().push(SessionEvent::Dom(event));
    }

    /// Appends a custom-tagged event, stamping type marker and timestamp.
    pub fn record_custom(&self, data: CustomData) {
        self.events
            .lock()
            .push(SessionEvent::Custom(CustomEvent::now(data)));
    }

    /// Independent shallow copy of the current session. Mutating the
    /// returned vector cannot touch the live buffer.
    pub fn dump(&self) -> Vec<SessionEvent> {
        self.events.lock().clone()
    }

    /// Custom-tagged network events only, in original relative order.
    pub fn network_events(&self) -> Vec<SessionEvent> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.is_network())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Compact JSON of the full session, as relayed to an opener window.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.dump())
    }

    /// Pretty-printed JSON of the full session, as written to the download
    /// artifact.
    pub fn to_json_pretty(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(&self.dump())
    }
}
