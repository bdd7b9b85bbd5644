//! Bridge from instance events to the story layer.
//!
//! Instances call `check_triggers` synchronously inside a tick. The bridge
//! keeps a bounded history for inspection and, when a receiver is
//! attached, forwards each event over an unbounded tokio channel so the
//! narrative engine can react outside the tick loop.

use std::collections::VecDeque;

use parking_lot::Mutex;
use psyche_core::narrative::NarrativeHooks;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Retained events when no capacity is given.
const DEFAULT_HISTORY: usize = 256;

/// One event offered to the narrative engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeEvent {
    /// Event name, e.g. `emotional_trigger`.
    pub name: String,
    /// Event payload.
    pub payload: serde_json::Value,
}

/// Records narrative events and optionally forwards them.
pub struct NarrativeBridge {
    history: Mutex<VecDeque<NarrativeEvent>>,
    capacity: usize,
    sender: Option<mpsc::UnboundedSender<NarrativeEvent>>,
}

impl NarrativeBridge {
    /// A recording-only bridge.
    #[must_use]
    pub fn new() -> Self {
        Self {
            history: Mutex::new(VecDeque::new()),
            capacity: DEFAULT_HISTORY,
            sender: None,
        }
    }

    /// A bridge that also forwards every event to the returned receiver.
    #[must_use]
    pub fn with_channel() -> (Self, mpsc::UnboundedReceiver<NarrativeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let bridge = Self {
            sender: Some(tx),
            ..Self::new()
        };
        (bridge, rx)
    }

    /// Recorded events, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<NarrativeEvent> {
        self.history.lock().iter().cloned().collect()
    }

    /// How many recorded events carry `name`.
    #[must_use]
    pub fn count(&self, name: &str) -> usize {
        self.history.lock().iter().filter(|e| e.name == name).count()
    }

    /// Forget every recorded event.
    pub fn clear(&self) {
        self.history.lock().clear();
    }
}

impl Default for NarrativeBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl NarrativeHooks for NarrativeBridge {
    fn check_triggers(&self, event_name: &str, payload: &serde_json::Value) {
        let event = NarrativeEvent {
            name: event_name.to_string(),
            payload: payload.clone(),
        };
        trace!(event = event_name, "Narrative event");
        if let Some(sender) = &self.sender {
            if sender.send(event.clone()).is_err() {
                debug!(event = event_name, "Narrative receiver dropped");
            }
        }
        let mut history = self.history.lock();
        if history.len() == self.capacity {
            history.pop_front();
        }
        history.push_back(event);
    }
}
