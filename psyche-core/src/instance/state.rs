//! Instance lifecycle and health bookkeeping.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Severity, SimTime};

/// Lifecycle status of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    /// Constructed, not yet initialized.
    Uninitialized,
    /// `initialize` is running.
    Initializing,
    /// Healthy and ticking.
    Running,
    /// Inside a reboot window.
    Rebooting,
    /// Inside a stabilize window.
    Stabilizing,
    /// Inside a defragment window.
    Defragmenting,
    /// Stability latched below the critical threshold.
    Critical,
    /// Corruption latched at its maximum.
    Corrupted,
    /// Memory usage latched at its ceiling.
    MemoryExhausted,
    /// Shut down; no further ticks or actions.
    Shutdown,
}

impl InstanceStatus {
    /// Snake-case name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::Rebooting => "rebooting",
            Self::Stabilizing => "stabilizing",
            Self::Defragmenting => "defragmenting",
            Self::Critical => "critical",
            Self::Corrupted => "corrupted",
            Self::MemoryExhausted => "memory_exhausted",
            Self::Shutdown => "shutdown",
        }
    }

    /// Whether the instance accepts ticks and actions.
    #[must_use]
    pub fn is_live(self) -> bool {
        !matches!(self, Self::Uninitialized | Self::Initializing | Self::Shutdown)
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One entry in the rolling error log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// When the error happened.
    pub timestamp: SimTime,
    /// Error class, e.g. `action_execution`.
    pub kind: String,
    /// Error text.
    pub message: String,
    /// Severity of the underlying error.
    pub severity: Severity,
    /// Action being executed, if any.
    pub action: Option<String>,
}

/// Age- and length-bounded error log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorLog {
    records: Vec<ErrorRecord>,
}

impl ErrorLog {
    /// Build a log from existing records.
    #[must_use]
    pub fn from_records(records: Vec<ErrorRecord>) -> Self {
        Self { records }
    }

    /// Append a record, dropping the oldest beyond `max`.
    pub fn push(&mut self, record: ErrorRecord, max: usize) {
        self.records.push(record);
        if self.records.len() > max {
            let excess = self.records.len() - max;
            self.records.drain(..excess);
        }
    }

    /// Drop records older than `ttl_ms`. Returns how many were removed.
    pub fn age_out(&mut self, now: SimTime, ttl_ms: u64) -> usize {
        let before = self.records.len();
        self.records.retain(|r| now.since(r.timestamp) <= ttl_ms);
        before - self.records.len()
    }

    /// Remove every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Records, oldest first.
    #[must_use]
    pub fn records(&self) -> &[ErrorRecord] {
        &self.records
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Latched health conditions. Each stays set until a system action clears it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthFlags {
    /// Stability fell below the critical threshold.
    pub critical: bool,
    /// Corruption reached 1.0.
    pub corrupted: bool,
    /// Memory usage reached the ceiling.
    pub memory_exhausted: bool,
}

impl HealthFlags {
    /// Whether any condition is latched.
    #[must_use]
    pub fn any(self) -> bool {
        self.critical || self.corrupted || self.memory_exhausted
    }
}

/// System actions that run over a simulated delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceKind {
    /// Partial reset of stability and corruption.
    Reboot,
    /// Stability boost.
    Stabilize,
    /// Ledger defragmentation.
    Defragment,
}

impl MaintenanceKind {
    /// Status shown while the window is open.
    #[must_use]
    pub fn status(self) -> InstanceStatus {
        match self {
            Self::Reboot => InstanceStatus::Rebooting,
            Self::Stabilize => InstanceStatus::Stabilizing,
            Self::Defragment => InstanceStatus::Defragmenting,
        }
    }

    /// Action name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Reboot => "reboot",
            Self::Stabilize => "stabilize",
            Self::Defragment => "defragment",
        }
    }
}

/// A maintenance window in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingMaintenance {
    /// What runs when the window closes.
    pub kind: MaintenanceKind,
    /// Window start.
    pub started_at: SimTime,
    /// When the effect applies.
    pub completes_at: SimTime,
}

/// Health transitions reported by ticks and actions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum HealthEvent {
    /// The critical latch was set.
    Critical {
        /// Stability at the time.
        stability: f32,
    },
    /// The corrupted latch was set.
    Corrupted,
    /// The memory exhaustion latch was set.
    MemoryExhausted {
        /// Aggregate memory usage.
        memory: u64,
    },
    /// A maintenance window closed and its effect applied.
    MaintenanceCompleted(MaintenanceKind),
    /// The status changed.
    StatusChanged {
        /// Previous status.
        from: InstanceStatus,
        /// New status.
        to: InstanceStatus,
    },
}
