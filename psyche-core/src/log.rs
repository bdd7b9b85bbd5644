//! Gameplay-facing system log.
//!
//! The debugger UI shows a "system log" of what the simulated mind is
//! doing. This is separate from developer diagnostics (which go through
//! `tracing`): subsystems push [`LogRecord`]s into an injected
//! [`SystemLog`] sink chosen when the instance is constructed. The default
//! sink discards everything.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::SimTime;

/// Level of a gameplay log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Fine-grained detail.
    Debug,
    /// Normal activity.
    Info,
    /// Something the player should look at.
    Warning,
    /// A fault.
    Error,
}

/// Which part of the runtime produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogCategory {
    /// Instance controller lifecycle and health.
    Instance,
    /// Emotional engine.
    Emotional,
    /// Memory ledger.
    Memory,
    /// Simulated processes.
    Process,
    /// Player actions.
    Action,
}

/// One record in the system log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Simulated time the record was produced.
    pub timestamp: SimTime,
    /// Record level.
    pub level: LogLevel,
    /// Message text.
    pub message: String,
    /// Producing subsystem.
    pub category: LogCategory,
    /// Optional extra detail (ids, values).
    pub detail: Option<String>,
}

impl LogRecord {
    /// Build a record without detail.
    #[must_use]
    pub fn new(
        timestamp: SimTime,
        level: LogLevel,
        category: LogCategory,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            level,
            message: message.into(),
            category,
            detail: None,
        }
    }

    /// Attach detail text.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Sink for gameplay log records.
pub trait SystemLog: Send + Sync {
    /// Accept one record. Must not panic.
    fn record(&self, record: LogRecord);
}

/// A sink that discards every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSystemLog;

impl SystemLog for NullSystemLog {
    fn record(&self, _record: LogRecord) {}
}

/// Shared handle to a log sink.
pub type SharedLog = Arc<dyn SystemLog>;

/// The default, discarding sink.
#[must_use]
pub fn null_log() -> SharedLog {
    Arc::new(NullSystemLog)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{LogRecord, SystemLog};
    use parking_lot::Mutex;

    /// Captures records for assertions.
    #[derive(Default)]
    pub struct CaptureLog {
        pub records: Mutex<Vec<LogRecord>>,
    }

    impl SystemLog for CaptureLog {
        fn record(&self, record: LogRecord) {
            self.records.lock().push(record);
        }
    }
}
