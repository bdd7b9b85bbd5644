//! Player action surface.
//!
//! Actions are plain strings routed through one static table to a
//! category handler on the controller.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::emotional::{ThreadStage, VulnerabilityKind};
use crate::error::{PsycheError, Result};
use crate::instance::state::InstanceStatus;
use crate::ledger::{LeakReport, MemoryBlock, MemoryCapacity};
use crate::metrics::CounterSnapshot;
use crate::process::ProcessInfo;
use crate::types::{Advisory, BlockId, ResourceUsage, ThreadId};

/// Handler category of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionCategory {
    /// Simulated process control.
    Process,
    /// Memory ledger access.
    Memory,
    /// Emotional state manipulation.
    Emotional,
    /// Instance maintenance and diagnostics.
    System,
}

impl fmt::Display for ActionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Process => "process",
            Self::Memory => "memory",
            Self::Emotional => "emotional",
            Self::System => "system",
        })
    }
}

/// Every action the controller accepts.
pub const ACTIONS: [(&str, ActionCategory); 20] = [
    ("ps", ActionCategory::Process),
    ("kill", ActionCategory::Process),
    ("nice", ActionCategory::Process),
    ("renice", ActionCategory::Process),
    ("suspend", ActionCategory::Process),
    ("resume", ActionCategory::Process),
    ("free", ActionCategory::Memory),
    ("dump", ActionCategory::Memory),
    ("peek", ActionCategory::Memory),
    ("poke", ActionCategory::Memory),
    ("protect", ActionCategory::Memory),
    ("unprotect", ActionCategory::Memory),
    ("calm", ActionCategory::Emotional),
    ("intensify", ActionCategory::Emotional),
    ("balance", ActionCategory::Emotional),
    ("suppress", ActionCategory::Emotional),
    ("reboot", ActionCategory::System),
    ("stabilize", ActionCategory::System),
    ("defragment", ActionCategory::System),
    ("analyze", ActionCategory::System),
];

/// Actions still accepted while a maintenance window is open.
pub const READ_ONLY_ACTIONS: [&str; 2] = ["ps", "analyze"];

/// Resolve an action name to its canonical name and category.
///
/// # Errors
///
/// `UnknownAction` when the name is not in [`ACTIONS`].
pub fn lookup(action: &str) -> Result<(&'static str, ActionCategory)> {
    ACTIONS
        .iter()
        .find(|(name, _)| *name == action)
        .copied()
        .ok_or_else(|| PsycheError::UnknownAction(action.to_string()))
}

/// Parameters shared by every action. Each action reads the fields it needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionParams {
    /// Target process id.
    pub pid: Option<u32>,
    /// Target memory block.
    pub address: Option<u64>,
    /// Target emotion.
    pub emotion: Option<String>,
    /// Magnitude for calm and intensify.
    pub amount: Option<f32>,
    /// Nice delta (`nice`) or absolute nice value (`renice`).
    pub priority: Option<i32>,
    /// Replacement description for `poke`.
    pub value: Option<String>,
    /// Suppression mechanism.
    pub mechanism: Option<String>,
    /// Regulation strategy for `calm`.
    pub strategy: Option<String>,
    /// Length of a timed regulation started by `calm`.
    pub duration_ms: Option<u64>,
    /// Pool filter for `dump`.
    pub pool: Option<String>,
    /// Intensity bucket (`low`, `medium`, `high`) for `dump`.
    pub bucket: Option<String>,
    /// Execute even when the instance is too unstable.
    pub force: bool,
}

impl ActionParams {
    /// Parameters with only `force` set.
    #[must_use]
    pub fn forced() -> Self {
        Self {
            force: true,
            ..Self::default()
        }
    }

    pub(crate) fn require_pid(&self, action: &str) -> Result<u32> {
        self.pid
            .ok_or_else(|| PsycheError::invalid_param(action, "pid is required"))
    }

    pub(crate) fn require_address(&self, action: &str) -> Result<BlockId> {
        self.address
            .map(BlockId)
            .ok_or_else(|| PsycheError::invalid_param(action, "address is required"))
    }
}

/// Data an action returns besides its message.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub enum ActionData {
    /// Nothing beyond the message.
    #[default]
    None,
    /// Process listing.
    Processes(Vec<ProcessInfo>),
    /// Memory dump.
    Blocks(Vec<MemoryBlock>),
    /// A single block.
    Block(Box<MemoryBlock>),
    /// New nice value.
    Priority(i32),
    /// Diagnostic report.
    Report(Box<AnalysisReport>),
}

/// Result of a successfully dispatched action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionOutcome {
    /// Canonical action name.
    pub action: &'static str,
    /// Handler category.
    pub category: ActionCategory,
    /// Whether the action took effect. Advisory failures are `false`.
    pub success: bool,
    /// Summary for the debugger UI.
    pub message: String,
    /// Hints when the action did not take effect.
    pub hints: Vec<String>,
    /// Extra data.
    pub data: ActionData,
}

impl ActionOutcome {
    pub(crate) fn new(action: &'static str, category: ActionCategory, message: impl Into<String>) -> Self {
        Self {
            action,
            category,
            success: true,
            message: message.into(),
            hints: Vec::new(),
            data: ActionData::None,
        }
    }

    pub(crate) fn from_advisory(action: &'static str, category: ActionCategory, advisory: Advisory) -> Self {
        Self {
            action,
            category,
            success: advisory.success,
            message: advisory.message,
            hints: advisory.hints,
            data: ActionData::None,
        }
    }

    pub(crate) fn with_data(mut self, data: ActionData) -> Self {
        self.data = data;
        self
    }
}

/// A thread the player can intervene on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadSummary {
    /// Thread id.
    pub id: ThreadId,
    /// Emotion being processed.
    pub emotion: String,
    /// Current stage.
    pub stage: ThreadStage,
    /// Thread stability.
    pub stability: f32,
    /// Open issues.
    pub issues: Vec<VulnerabilityKind>,
}

/// Output of the `analyze` action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    /// Lifecycle status.
    pub status: InstanceStatus,
    /// Instance stability.
    pub stability: f32,
    /// Instance corruption.
    pub corruption: f32,
    /// Simulated uptime.
    pub uptime_ms: u64,
    /// Aggregate resource usage.
    pub resources: ResourceUsage,
    /// Errors in the rolling log.
    pub error_count: usize,
    /// Ledger capacity.
    pub memory: MemoryCapacity,
    /// Corrupted blocks.
    pub corrupted_blocks: usize,
    /// Leak candidates, highest score first.
    pub leaks: Vec<LeakReport>,
    /// Threads with open issues.
    pub debuggable_threads: Vec<ThreadSummary>,
    /// The most intense emotions, strongest first.
    pub top_emotions: Vec<(String, f32)>,
    /// Counter values.
    pub counters: CounterSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_routes_by_table() {
        assert_eq!(lookup("kill").ok(), Some(("kill", ActionCategory::Process)));
        assert_eq!(lookup("poke").ok(), Some(("poke", ActionCategory::Memory)));
        assert_eq!(lookup("suppress").ok(), Some(("suppress", ActionCategory::Emotional)));
        assert_eq!(lookup("analyze").ok(), Some(("analyze", ActionCategory::System)));
        assert!(matches!(lookup("format_c"), Err(PsycheError::UnknownAction(_))));
    }

    #[test]
    fn params_deserialize_with_defaults() {
        let params: ActionParams =
            serde_json::from_str(r#"{"emotion":"grief","force":true}"#).expect("valid");
        assert_eq!(params.emotion.as_deref(), Some("grief"));
        assert!(params.force);
        assert!(params.pid.is_none());
        assert!(params.require_pid("kill").is_err());
    }
}
