//! Core type definitions shared by every psyche subsystem.
//!
//! All types are serializable so that a full instance can be captured
//! into a snapshot and restored without loss.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identity Types
// ---------------------------------------------------------------------------

/// Unique identifier for one simulated character instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub Uuid);

impl InstanceId {
    /// Create a new random instance ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle to a memory block inside one ledger.
///
/// Handles are allocated sequentially per ledger and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(pub u64);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

/// Handle to an emotional processing thread inside one engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(pub u64);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thread-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// Milliseconds in one simulated second.
pub const SECOND_MS: u64 = 1_000;
/// Milliseconds in one simulated minute.
pub const MINUTE_MS: u64 = 60 * SECOND_MS;
/// Milliseconds in one simulated hour.
pub const HOUR_MS: u64 = 60 * MINUTE_MS;
/// Milliseconds in one simulated day.
pub const DAY_MS: u64 = 24 * HOUR_MS;
/// Milliseconds in one simulated year (365 days).
pub const YEAR_MS: u64 = 365 * DAY_MS;

/// Simulated instance time, in milliseconds since the instance started.
///
/// The clock only moves when the controller is ticked, so every duration,
/// cooldown and age in the runtime is deterministic.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SimTime(pub u64);

impl SimTime {
    /// The instant the instance started.
    pub const ZERO: Self = Self(0);

    /// Raw milliseconds.
    #[must_use]
    pub fn as_millis(self) -> u64 {
        self.0
    }

    /// Milliseconds elapsed since `earlier` (zero if `earlier` is in the future).
    #[must_use]
    pub fn since(self, earlier: Self) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    /// This instant advanced by `ms` milliseconds.
    #[must_use]
    pub fn plus(self, ms: u64) -> Self {
        Self(self.0.saturating_add(ms))
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t+{}ms", self.0)
    }
}

// ---------------------------------------------------------------------------
// Severity & advisory outcomes
// ---------------------------------------------------------------------------

/// Severity attached to recorded errors and log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational.
    Low,
    /// Degrades gameplay but is recoverable.
    Medium,
    /// Significant fault.
    High,
    /// Always triggers an error cascade.
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Outcome of a gameplay operation that can fail without being a fault.
///
/// Failed interventions, unknown suppression mechanisms and strategies
/// still on cooldown are reported through this type instead of an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advisory {
    /// Whether the operation took effect.
    pub success: bool,
    /// Human-readable summary for the debugger UI.
    pub message: String,
    /// Hints for the player when the operation failed.
    #[serde(default)]
    pub hints: Vec<String>,
}

impl Advisory {
    /// A successful outcome.
    #[must_use]
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            hints: Vec::new(),
        }
    }

    /// A failed outcome without hints.
    #[must_use]
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            hints: Vec::new(),
        }
    }

    /// A failed outcome carrying hints.
    #[must_use]
    pub fn fail_with_hints(message: impl Into<String>, hints: Vec<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            hints,
        }
    }
}

// ---------------------------------------------------------------------------
// Resource usage
// ---------------------------------------------------------------------------

/// Simulated resource usage reported by a subsystem or aggregated
/// for a whole instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    /// CPU load in percent (0–100 once clamped).
    pub cpu: f32,
    /// Memory units in use.
    pub memory: u64,
    /// Number of simulated threads.
    pub threads: u32,
}

impl ResourceUsage {
    /// Component-wise sum of two usage reports.
    #[must_use]
    pub fn combine(self, other: Self) -> Self {
        Self {
            cpu: self.cpu + other.cpu,
            memory: self.memory.saturating_add(other.memory),
            threads: self.threads.saturating_add(other.threads),
        }
    }
}

/// Clamp a value to the unit interval, mapping NaN to zero.
#[must_use]
pub fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_time_since_saturates() {
        assert_eq!(SimTime(100).since(SimTime(40)), 60);
        assert_eq!(SimTime(40).since(SimTime(100)), 0);
    }

    #[test]
    fn clamp_unit_handles_nan() {
        assert_eq!(clamp_unit(f32::NAN), 0.0);
        assert_eq!(clamp_unit(1.7), 1.0);
        assert_eq!(clamp_unit(-0.2), 0.0);
    }

    #[test]
    fn usage_combines() {
        let a = ResourceUsage { cpu: 10.0, memory: 100, threads: 2 };
        let b = ResourceUsage { cpu: 5.5, memory: 50, threads: 1 };
        let c = a.combine(b);
        assert!((c.cpu - 15.5).abs() < f32::EPSILON);
        assert_eq!(c.memory, 150);
        assert_eq!(c.threads, 3);
    }

    #[test]
    fn block_id_display_is_hex() {
        assert_eq!(BlockId(26).to_string(), "0x001a");
    }
}
