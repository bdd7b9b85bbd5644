//! Pressure relief chain.
//!
//! ```text
//! expired → compress (>1h, once) → low value (<0.3) → force GC (<0.5, only under reserve)
//! ```
//!
//! Protected blocks are never deleted by any stage. Traumatic blocks are
//! never compressed, and traumatic/procedural blocks never expire.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::ledger::block::PoolKind;
use crate::ledger::heuristics::value_score;
use crate::ledger::MemoryLedger;
use crate::log::LogLevel;
use crate::types::BlockId;

/// Value below which blocks are dropped by the low-value stage.
pub const LOW_VALUE_THRESHOLD: f32 = 0.3;
/// Value below which blocks are dropped by forced garbage collection.
pub const FORCE_GC_THRESHOLD: f32 = 0.5;

/// What one pass of the chain reclaimed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PressureReport {
    /// Blocks deleted for outliving their pool's retention.
    pub expired: usize,
    /// Blocks compressed.
    pub compressed: usize,
    /// Blocks deleted for low value.
    pub low_value: usize,
    /// Blocks deleted by forced collection.
    pub forced: usize,
    /// Units returned to the ledger.
    pub reclaimed: u64,
}

impl PressureReport {
    /// Whether the pass changed nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.expired == 0 && self.compressed == 0 && self.low_value == 0 && self.forced == 0
    }
}

impl MemoryLedger {
    /// Run the full chain.
    pub fn relieve_pressure(&mut self) -> PressureReport {
        let before = self.capacity.allocated;
        let mut report = PressureReport {
            expired: self.cleanup_expired_memories(),
            compressed: self.compress_old_memories(),
            low_value: self.cleanup_low_value_memories(),
            ..PressureReport::default()
        };
        if self.capacity.is_under_pressure() {
            report.forced = self.force_garbage_collection();
        }
        report.reclaimed = before.saturating_sub(self.capacity.allocated);

        if !report.is_empty() {
            info!(
                expired = report.expired,
                compressed = report.compressed,
                low_value = report.low_value,
                forced = report.forced,
                reclaimed = report.reclaimed,
                "Memory pressure relieved"
            );
            self.emit(
                LogLevel::Info,
                format!("Reclaimed {} units of memory", report.reclaimed),
            );
        }
        report
    }

    /// Delete unprotected blocks older than their pool's retention.
    pub fn cleanup_expired_memories(&mut self) -> usize {
        let now = self.now;
        let config = &self.config;
        let expired: Vec<BlockId> = self
            .blocks
            .values()
            .filter(|b| !b.protected)
            .filter(|b| b.pool.retention_ms(config).is_some_and(|r| b.age_ms(now) > r))
            .map(|b| b.id)
            .collect();
        self.remove_all(&expired)
    }

    /// Shrink every uncompressed, non-traumatic block older than the
    /// compression age to 70% of its size.
    pub fn compress_old_memories(&mut self) -> usize {
        let now = self.now;
        let after = self.config.compress_after_ms;
        let mut compressed = 0;
        for block in self.blocks.values_mut() {
            if block.compressed || block.pool == PoolKind::Traumatic || block.age_ms(now) <= after {
                continue;
            }
            let new_size = block.compressed_size();
            let saved = block.size - new_size;
            block.size = new_size;
            block.compressed = true;
            self.capacity.release(saved);
            if let Some(pool) = self.pools.get_mut(&block.pool) {
                pool.used = pool.used.saturating_sub(saved);
            }
            compressed += 1;
        }
        compressed
    }

    /// Delete unprotected blocks valued below [`LOW_VALUE_THRESHOLD`].
    pub fn cleanup_low_value_memories(&mut self) -> usize {
        self.remove_below(LOW_VALUE_THRESHOLD)
    }

    /// Delete unprotected blocks valued below [`FORCE_GC_THRESHOLD`].
    pub fn force_garbage_collection(&mut self) -> usize {
        let removed = self.remove_below(FORCE_GC_THRESHOLD);
        if removed > 0 {
            self.emit(
                LogLevel::Warning,
                format!("Forced garbage collection dropped {removed} memories"),
            );
        }
        removed
    }

    fn remove_below(&mut self, threshold: f32) -> usize {
        let doomed: Vec<BlockId> = self
            .blocks
            .values()
            .filter(|b| !b.protected && value_score(b) < threshold)
            .map(|b| b.id)
            .collect();
        self.remove_all(&doomed)
    }

    fn remove_all(&mut self, ids: &[BlockId]) -> usize {
        ids.iter().filter(|id| self.remove_block(**id).is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::ledger::block::MemoryData;
    use crate::types::{SimTime, HOUR_MS};

    fn ledger() -> MemoryLedger {
        MemoryLedger::new(LedgerConfig::default())
    }

    #[test]
    fn expired_short_term_is_dropped_but_traumatic_kept() {
        let mut ledger = ledger();
        let short = ledger
            .allocate_memory(MemoryData::new("lunch", &["joy"], 0.6), PoolKind::ShortTerm)
            .expect("fits");
        let trauma = ledger
            .allocate_memory(MemoryData::new("fire", &["fear"], 0.6), PoolKind::Traumatic)
            .expect("fits");
        ledger.set_time(SimTime(7 * HOUR_MS));

        assert_eq!(ledger.cleanup_expired_memories(), 1);
        assert!(ledger.get(short).is_none());
        assert!(ledger.get(trauma).is_some());
        assert!(ledger.capacity().is_consistent());
    }

    #[test]
    fn compression_runs_once_and_skips_traumatic() {
        let mut ledger = ledger();
        let old = ledger
            .allocate_memory(MemoryData::new("school", &["pride"], 0.6), PoolKind::LongTerm)
            .expect("fits");
        let trauma = ledger
            .allocate_memory(MemoryData::new("crash", &["fear"], 0.6), PoolKind::Traumatic)
            .expect("fits");
        let size = ledger.get(old).map(|b| b.size).unwrap_or_default();
        ledger.set_time(SimTime(2 * HOUR_MS));

        assert_eq!(ledger.compress_old_memories(), 1);
        let compressed = ledger.get(old).expect("block");
        assert!(compressed.compressed);
        assert_eq!(compressed.size, (size as f64 * 0.7).round() as u64);
        assert!(!ledger.get(trauma).expect("block").compressed);
        assert_eq!(ledger.compress_old_memories(), 0);

        let allocated: u64 = ledger.blocks().map(|b| b.size).sum();
        assert_eq!(ledger.capacity().allocated, allocated);
        assert!(ledger.capacity().is_consistent());
    }

    #[test]
    fn forced_collection_only_under_reserve() {
        let mut ledger = MemoryLedger::new(LedgerConfig {
            total_capacity: 1_000,
            reserved: 500,
            ..LedgerConfig::default()
        });
        // value 0.4·0.25 + 0.2 + 0.1·0.2 = 0.32: survives the low-value stage
        let weak = ledger
            .allocate_memory(MemoryData::new("a", &["joy"], 0.25), PoolKind::LongTerm)
            .expect("fits");
        let report = ledger.relieve_pressure();
        assert_eq!(report.forced, 0);
        assert!(ledger.get(weak).is_some());

        let big = MemoryData {
            sensory_details: vec!["x".into(); 6],
            ..MemoryData::new("b", &["joy"], 0.9)
        };
        let strong = ledger.allocate_memory(big, PoolKind::LongTerm).expect("fits");
        ledger.protect(strong).expect("exists");
        assert!(ledger.capacity().is_under_pressure());

        let report = ledger.relieve_pressure();
        assert_eq!(report.forced, 1);
        assert!(ledger.get(weak).is_none());
        assert!(ledger.get(strong).is_some());
    }
}
