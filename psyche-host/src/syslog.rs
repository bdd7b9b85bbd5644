//! Buffered gameplay log.
//!
//! [`BufferedSystemLog`] is the `SystemLog` sink the host hands to every
//! instance. It keeps the most recent records for the debugger UI and
//! mirrors each one to `tracing` so server operators see the same stream.

use std::collections::VecDeque;

use parking_lot::Mutex;
use psyche_core::log::{LogCategory, LogLevel, LogRecord, SystemLog};
use tracing::{debug, error, info, warn};

/// Default number of retained records.
pub const DEFAULT_CAPACITY: usize = 512;

/// Bounded ring buffer of [`LogRecord`]s.
pub struct BufferedSystemLog {
    records: Mutex<VecDeque<LogRecord>>,
    capacity: usize,
    mirror: bool,
}

impl BufferedSystemLog {
    /// A buffer holding at most `capacity` records, mirrored to `tracing`.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY))),
            capacity: capacity.max(1),
            mirror: true,
        }
    }

    /// Disable the `tracing` mirror.
    #[must_use]
    pub fn quiet(mut self) -> Self {
        self.mirror = false;
        self
    }

    /// Number of buffered records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// The last `n` records, oldest first.
    #[must_use]
    pub fn recent(&self, n: usize) -> Vec<LogRecord> {
        let records = self.records.lock();
        let skip = records.len().saturating_sub(n);
        records.iter().skip(skip).cloned().collect()
    }

    /// Buffered records from one subsystem, oldest first.
    #[must_use]
    pub fn by_category(&self, category: LogCategory) -> Vec<LogRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.category == category)
            .cloned()
            .collect()
    }

    /// Remove and return every buffered record.
    pub fn drain(&self) -> Vec<LogRecord> {
        self.records.lock().drain(..).collect()
    }
}

impl Default for BufferedSystemLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl SystemLog for BufferedSystemLog {
    fn record(&self, record: LogRecord) {
        if self.mirror {
            let category = record.category;
            let detail = record.detail.as_deref().unwrap_or("");
            match record.level {
                LogLevel::Debug => debug!(category = ?category, detail, at = %record.timestamp, "{}", record.message),
                LogLevel::Info => info!(category = ?category, detail, at = %record.timestamp, "{}", record.message),
                LogLevel::Warning => warn!(category = ?category, detail, at = %record.timestamp, "{}", record.message),
                LogLevel::Error => error!(category = ?category, detail, at = %record.timestamp, "{}", record.message),
            }
        }
        let mut records = self.records.lock();
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use psyche_core::types::SimTime;

    fn record(at: u64, category: LogCategory) -> LogRecord {
        LogRecord::new(SimTime(at), LogLevel::Info, category, format!("event {at}"))
    }

    #[test]
    fn buffer_drops_oldest() {
        let log = BufferedSystemLog::new(3).quiet();
        for i in 0..5 {
            log.record(record(i, LogCategory::Memory));
        }
        assert_eq!(log.len(), 3);
        let recent = log.recent(10);
        assert_eq!(recent[0].timestamp, SimTime(2));
        assert_eq!(recent[2].timestamp, SimTime(4));
    }

    #[test]
    fn recent_returns_tail() {
        let log = BufferedSystemLog::default();
        for i in 0..4 {
            log.record(record(i, LogCategory::Emotional));
        }
        let tail = log.recent(2);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].message, "event 2");
    }

    #[test]
    fn filters_and_drains() {
        let log = BufferedSystemLog::default().quiet();
        log.record(record(1, LogCategory::Memory));
        log.record(record(2, LogCategory::Action));
        log.record(record(3, LogCategory::Memory));
        assert_eq!(log.by_category(LogCategory::Memory).len(), 2);
        assert_eq!(log.drain().len(), 3);
        assert!(log.is_empty());
    }
}
