//! Narrative engine contract.
//!
//! The controller forwards emotional triggers and health transitions to
//! the story layer as named events with a JSON payload. Calls are
//! fire-and-forget; nothing the hook does flows back into the simulation.

use std::sync::Arc;

/// Receives named events from a running instance.
pub trait NarrativeHooks: Send + Sync {
    /// Offer an event to the narrative engine.
    fn check_triggers(&self, event_name: &str, payload: &serde_json::Value);
}

/// Hooks that ignore every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNarrative;

impl NarrativeHooks for NullNarrative {
    fn check_triggers(&self, _event_name: &str, _payload: &serde_json::Value) {}
}

/// Shared handle to narrative hooks.
pub type SharedNarrative = Arc<dyn NarrativeHooks>;

/// The default, ignoring hooks.
#[must_use]
pub fn null_narrative() -> SharedNarrative {
    Arc::new(NullNarrative)
}

/// Event names the controller emits.
pub mod events {
    /// An emotional trigger crossed its threshold.
    pub const EMOTIONAL_TRIGGER: &str = "emotional_trigger";
    /// Stability fell below the critical threshold.
    pub const INSTANCE_CRITICAL: &str = "instance_critical";
    /// Corruption reached its maximum.
    pub const INSTANCE_CORRUPTED: &str = "instance_corrupted";
    /// Memory usage reached its maximum.
    pub const MEMORY_EXHAUSTED: &str = "memory_exhausted";
    /// An error cascade ran.
    pub const ERROR_CASCADE: &str = "error_cascade";
    /// An emotional thread crashed.
    pub const THREAD_CRASHED: &str = "thread_crashed";
}
