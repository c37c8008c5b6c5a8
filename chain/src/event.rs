//! Chain events published to in-process subscribers.

use serde::{Deserialize, Serialize};

/// Event kind filter. `All` subscribes to every event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    All,
    Tx,
    Block,
}

impl EventKind {
    /// Whether an event of this kind passes the given subscriber filter.
    pub fn matches(self, filter: EventKind) -> bool {
        filter == EventKind::All || filter == self
    }
}

/// A published chain event. `body` carries the JSON text of the payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub action: String,
    pub body: String,
}

impl Event {
    pub fn new(kind: EventKind, action: &str, body: String) -> Self {
        Self {
            kind,
            action: action.to_string(),
            body,
        }
    }
}
