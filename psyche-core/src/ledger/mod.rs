//! # Memory Ledger
//!
//! Pooled, capacity-accounted storage of a character's memories.
//!
//! Blocks live in one flat arena keyed by [`BlockId`]; each pool holds the
//! ids it owns, and the [`EmotionalIndex`] holds non-owning references by
//! emotion and intensity bucket. The pressure relief chain in
//! [`pressure`] keeps the ledger under capacity.

pub mod block;
pub mod capacity;
pub mod heuristics;
pub mod index;
pub mod pressure;

use std::cmp::Reverse;
use std::collections::BTreeMap;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::LedgerConfig;
use crate::error::{PsycheError, Result};
use crate::log::{null_log, LogCategory, LogLevel, LogRecord, SharedLog};
use crate::types::{BlockId, ResourceUsage, SimTime, HOUR_MS};

pub use block::{AccessPattern, MemoryBlock, MemoryData, MemoryPool, PoolKind, CORRUPTION_THRESHOLD};
pub use capacity::MemoryCapacity;
pub use heuristics::{corruption_risk, detect_leaks, is_leak_candidate, leak_score, value_score, LeakReport};
pub use index::{EmotionalIndex, IntensityBucket};
pub use pressure::PressureReport;

/// Integrity lost per simulated hour per unit of corruption risk.
const INTEGRITY_DECAY_PER_HOUR: f32 = 0.01;
/// Integrity restored to each block by defragmentation.
const DEFRAG_RESTORE: f32 = 0.1;
/// Integrity lost by a poke.
const POKE_COST: f32 = 0.1;

/// Events reported from one ledger tick.
#[derive(Debug, Clone, PartialEq)]
pub enum MemoryEvent {
    /// A block's integrity crossed the corruption threshold.
    BlockCorrupted {
        /// Block.
        block: BlockId,
    },
    /// A leak scan found candidates.
    LeaksDetected {
        /// Reports, highest score first.
        leaks: Vec<LeakReport>,
    },
    /// Maintenance ran the pressure chain.
    PressureRelieved(PressureReport),
    /// A short-term block was consolidated into long-term storage.
    BlockPromoted {
        /// Block.
        block: BlockId,
    },
}

/// Serializable form of the ledger. Pools and indexes are rebuilt on restore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Every block, ordered by id.
    pub blocks: Vec<MemoryBlock>,
    /// Capacity accounting.
    pub capacity: MemoryCapacity,
    /// Next handle.
    pub next_id: u64,
    /// Ledger clock.
    pub now: SimTime,
    /// Last maintenance run.
    pub last_maintenance: SimTime,
    /// Last leak scan.
    pub last_leak_scan: SimTime,
    /// Emotional stability seen at the last tick.
    pub emotional_stability: f32,
    /// Most recent leak scan.
    pub leaks: Vec<LeakReport>,
}

/// The memory ledger of one instance.
pub struct MemoryLedger {
    config: LedgerConfig,
    log: SharedLog,
    now: SimTime,
    blocks: BTreeMap<BlockId, MemoryBlock>,
    pools: BTreeMap<PoolKind, MemoryPool>,
    index: EmotionalIndex,
    capacity: MemoryCapacity,
    next_id: u64,
    last_maintenance: SimTime,
    last_leak_scan: SimTime,
    emotional_stability: f32,
    leaks: Vec<LeakReport>,
}

impl std::fmt::Debug for MemoryLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryLedger")
            .field("blocks", &self.blocks.len())
            .field("capacity", &self.capacity)
            .field("now", &self.now)
            .finish_non_exhaustive()
    }
}

impl MemoryLedger {
    /// An empty ledger with the discarding log.
    #[must_use]
    pub fn new(config: LedgerConfig) -> Self {
        Self::with_log(config, null_log())
    }

    /// An empty ledger reporting to `log`.
    #[must_use]
    pub fn with_log(config: LedgerConfig, log: SharedLog) -> Self {
        let capacity = MemoryCapacity::new(config.total_capacity, config.reserved);
        Self {
            config,
            log,
            now: SimTime::ZERO,
            blocks: BTreeMap::new(),
            pools: PoolKind::ALL.into_iter().map(|p| (p, MemoryPool::default())).collect(),
            index: EmotionalIndex::default(),
            capacity,
            next_id: 1,
            last_maintenance: SimTime::ZERO,
            last_leak_scan: SimTime::ZERO,
            emotional_stability: 1.0,
            leaks: Vec::new(),
        }
    }

    /// Ledger configuration.
    #[must_use]
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Capacity accounting.
    #[must_use]
    pub fn capacity(&self) -> &MemoryCapacity {
        &self.capacity
    }

    /// Ledger clock.
    #[must_use]
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Move the clock without running maintenance.
    pub fn set_time(&mut self, now: SimTime) {
        self.now = self.now.max(now);
    }

    /// Every block, ordered by id.
    pub fn blocks(&self) -> impl Iterator<Item = &MemoryBlock> {
        self.blocks.values()
    }

    /// Number of blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the ledger holds no blocks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// One block.
    #[must_use]
    pub fn get(&self, id: BlockId) -> Option<&MemoryBlock> {
        self.blocks.get(&id)
    }

    /// Accounting of one pool.
    #[must_use]
    pub fn pool(&self, kind: PoolKind) -> Option<&MemoryPool> {
        self.pools.get(&kind)
    }

    /// Blocks in one pool, ordered by id.
    pub fn blocks_in(&self, kind: PoolKind) -> impl Iterator<Item = &MemoryBlock> {
        self.pools
            .get(&kind)
            .into_iter()
            .flat_map(|p| p.blocks.iter())
            .filter_map(|id| self.blocks.get(id))
    }

    /// The emotional index.
    #[must_use]
    pub fn index(&self) -> &EmotionalIndex {
        &self.index
    }

    /// Corrupted block count.
    #[must_use]
    pub fn corrupted_count(&self) -> usize {
        self.blocks.values().filter(|b| b.is_corrupted()).count()
    }

    /// Leaks from the most recent scan.
    #[must_use]
    pub fn leaks(&self) -> &[LeakReport] {
        &self.leaks
    }

    /// Simulated load of the ledger.
    #[must_use]
    pub fn usage(&self) -> ResourceUsage {
        let fragmented = self.blocks.values().filter(|b| b.fragmented).count();
        ResourceUsage {
            cpu: self.blocks.len() as f32 * 0.05 + fragmented as f32 * 0.5,
            memory: self.capacity.allocated,
            threads: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Allocation
    // -----------------------------------------------------------------------

    /// Store a memory in `pool`.
    ///
    /// # Errors
    ///
    /// `CapacityExceeded` when the block does not fit; the pressure chain
    /// runs before the error is returned.
    pub fn allocate_memory(&mut self, data: MemoryData, pool: PoolKind) -> Result<BlockId> {
        let size = data.size();
        if !self.capacity.allocate(size) {
            let available = self.capacity.available;
            warn!(requested = size, available, pool = %pool, "Memory allocation failed");
            self.emit(
                LogLevel::Error,
                format!("Allocation of {size} units failed ({available} available)"),
            );
            self.relieve_pressure();
            return Err(PsycheError::CapacityExceeded {
                requested: size,
                available,
            });
        }

        let id = BlockId(self.next_id);
        self.next_id += 1;
        let block = MemoryBlock::new(id, pool, data, self.now);
        self.index.insert(&block);
        self.pools.entry(pool).or_default().insert(id, size);
        self.blocks.insert(id, block);
        debug!(block = %id, size, pool = %pool, "Memory allocated");
        Ok(id)
    }

    /// Free a block.
    ///
    /// # Errors
    ///
    /// `MemoryNotFound` or `BlockProtected`.
    pub fn delete_memory(&mut self, id: BlockId) -> Result<MemoryBlock> {
        let block = self.blocks.get(&id).ok_or(PsycheError::MemoryNotFound(id))?;
        if block.protected {
            return Err(PsycheError::BlockProtected(id));
        }
        self.remove_block(id).ok_or(PsycheError::MemoryNotFound(id))
    }

    pub(crate) fn remove_block(&mut self, id: BlockId) -> Option<MemoryBlock> {
        let block = self.blocks.remove(&id)?;
        self.index.remove(&block);
        if let Some(pool) = self.pools.get_mut(&block.pool) {
            pool.remove(id, block.size);
        }
        self.capacity.release(block.size);
        Some(block)
    }

    // -----------------------------------------------------------------------
    // Retrieval
    // -----------------------------------------------------------------------

    /// The `limit` most charged, uncorrupted blocks tagged with `emotion`.
    /// Every returned block records an access.
    pub fn retrieve_memories_by_emotion(&mut self, emotion: &str, limit: usize) -> Vec<MemoryBlock> {
        let ids = self.index.for_emotion(emotion);
        self.retrieve(ids, limit)
    }

    /// The `limit` most charged, uncorrupted blocks in an intensity bucket.
    pub fn retrieve_memories_by_intensity(&mut self, bucket: IntensityBucket, limit: usize) -> Vec<MemoryBlock> {
        let ids = self.index.for_bucket(bucket);
        self.retrieve(ids, limit)
    }

    fn retrieve(&mut self, ids: Vec<BlockId>, limit: usize) -> Vec<MemoryBlock> {
        let mut found: Vec<(BlockId, OrderedFloat<f32>)> = ids
            .into_iter()
            .filter_map(|id| self.blocks.get(&id))
            .filter(|b| !b.is_corrupted())
            .map(|b| (b.id, OrderedFloat(b.emotional_charge)))
            .collect();
        found.sort_by_key(|&(id, charge)| (Reverse(charge), id));
        found.truncate(limit);

        let now = self.now;
        found
            .into_iter()
            .filter_map(|(id, _)| {
                let block = self.blocks.get_mut(&id)?;
                block.touch(now);
                Some(block.clone())
            })
            .collect()
    }

    /// Read a block for the `peek` action.
    ///
    /// # Errors
    ///
    /// `MemoryNotFound`, or `MemoryCorrupted` for a corrupted block.
    pub fn peek(&mut self, id: BlockId) -> Result<MemoryBlock> {
        let now = self.now;
        let block = self.blocks.get_mut(&id).ok_or(PsycheError::MemoryNotFound(id))?;
        if block.is_corrupted() {
            return Err(PsycheError::MemoryCorrupted(id));
        }
        block.touch(now);
        Ok(block.clone())
    }

    /// Overwrite a block's description for the `poke` action. The block
    /// becomes fragmented and loses integrity; its size is unchanged.
    ///
    /// # Errors
    ///
    /// `MemoryNotFound`, `MemoryCorrupted`, or `BlockProtected`.
    pub fn poke(&mut self, id: BlockId, description: Option<String>) -> Result<()> {
        let block = self.blocks.get_mut(&id).ok_or(PsycheError::MemoryNotFound(id))?;
        if block.is_corrupted() {
            return Err(PsycheError::MemoryCorrupted(id));
        }
        if block.protected {
            return Err(PsycheError::BlockProtected(id));
        }
        if let Some(description) = description {
            block.content.description = description;
        }
        block.fragmented = true;
        block.adjust_integrity(-POKE_COST);
        let integrity = block.integrity_score;
        self.emit(
            LogLevel::Warning,
            format!("Block {id} rewritten (integrity {integrity:.2})"),
        );
        Ok(())
    }

    /// Mark a block protected.
    ///
    /// # Errors
    ///
    /// `MemoryNotFound`.
    pub fn protect(&mut self, id: BlockId) -> Result<()> {
        self.set_protected(id, true)
    }

    /// Clear a block's protection.
    ///
    /// # Errors
    ///
    /// `MemoryNotFound`.
    pub fn unprotect(&mut self, id: BlockId) -> Result<()> {
        self.set_protected(id, false)
    }

    fn set_protected(&mut self, id: BlockId, protected: bool) -> Result<()> {
        let block = self.blocks.get_mut(&id).ok_or(PsycheError::MemoryNotFound(id))?;
        block.protected = protected;
        Ok(())
    }

    /// Damage a block's integrity (error cascades).
    ///
    /// # Errors
    ///
    /// `MemoryNotFound`.
    pub fn corrupt_block(&mut self, id: BlockId, amount: f32) -> Result<bool> {
        let block = self.blocks.get_mut(&id).ok_or(PsycheError::MemoryNotFound(id))?;
        let was_corrupted = block.is_corrupted();
        block.adjust_integrity(-amount);
        let now_corrupted = block.is_corrupted();
        if now_corrupted && !was_corrupted {
            self.emit(LogLevel::Error, format!("Block {id} corrupted"));
        }
        Ok(now_corrupted)
    }

    /// Clear fragmentation and restore some integrity. Returns the number
    /// of blocks repaired.
    pub fn defragment(&mut self) -> usize {
        let mut repaired = 0;
        for block in self.blocks.values_mut().filter(|b| b.fragmented) {
            block.fragmented = false;
            block.adjust_integrity(DEFRAG_RESTORE);
            repaired += 1;
        }
        self.emit(LogLevel::Info, format!("Defragmented {repaired} block(s)"));
        repaired
    }

    /// Score leak candidates now, highest first.
    #[must_use]
    pub fn detect_leaks(&self) -> Vec<LeakReport> {
        detect_leaks(self.blocks.values(), self.now)
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Advance to `now`: decay integrity, then run maintenance and leak
    /// scans when their intervals elapse.
    pub fn tick(&mut self, now: SimTime, emotional_stability: f32) -> Vec<MemoryEvent> {
        let delta_ms = now.since(self.now);
        self.set_time(now);
        self.emotional_stability = emotional_stability;
        let mut events = Vec::new();

        let hours = delta_ms as f32 / HOUR_MS as f32;
        for block in self.blocks.values_mut() {
            let was_corrupted = block.is_corrupted();
            let risk = corruption_risk(block, now, emotional_stability);
            block.adjust_integrity(-risk * INTEGRITY_DECAY_PER_HOUR * hours);
            if block.is_corrupted() && !was_corrupted {
                events.push(MemoryEvent::BlockCorrupted { block: block.id });
            }
        }

        if now.since(self.last_maintenance) >= self.config.maintenance_interval_ms {
            self.last_maintenance = now;
            let report = self.relieve_pressure();
            if !report.is_empty() {
                events.push(MemoryEvent::PressureRelieved(report));
            }
            events.extend(
                self.consolidate()
                    .into_iter()
                    .map(|block| MemoryEvent::BlockPromoted { block }),
            );
        }

        if now.since(self.last_leak_scan) >= self.config.leak_scan_interval_ms {
            self.last_leak_scan = now;
            self.leaks = self.detect_leaks();
            if !self.leaks.is_empty() {
                self.emit(
                    LogLevel::Warning,
                    format!("{} possible memory leak(s)", self.leaks.len()),
                );
                events.push(MemoryEvent::LeaksDetected {
                    leaks: self.leaks.clone(),
                });
            }
        }
        events
    }

    /// Promote frequently accessed short-term blocks to long-term storage.
    pub fn consolidate(&mut self) -> Vec<BlockId> {
        let threshold = self.config.promotion_access_count;
        let promoted: Vec<BlockId> = self
            .blocks_in(PoolKind::ShortTerm)
            .filter(|b| b.access_count >= threshold)
            .map(|b| b.id)
            .collect();
        for id in &promoted {
            let Some(block) = self.blocks.get_mut(id) else {
                continue;
            };
            block.pool = PoolKind::LongTerm;
            let size = block.size;
            if let Some(pool) = self.pools.get_mut(&PoolKind::ShortTerm) {
                pool.remove(*id, size);
            }
            self.pools.entry(PoolKind::LongTerm).or_default().insert(*id, size);
        }
        if !promoted.is_empty() {
            self.emit(
                LogLevel::Info,
                format!("Consolidated {} memory block(s)", promoted.len()),
            );
        }
        promoted
    }

    // -----------------------------------------------------------------------
    // Snapshot
    // -----------------------------------------------------------------------

    /// Capture the whole ledger.
    #[must_use]
    pub fn capture_state(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            blocks: self.blocks.values().cloned().collect(),
            capacity: self.capacity,
            next_id: self.next_id,
            now: self.now,
            last_maintenance: self.last_maintenance,
            last_leak_scan: self.last_leak_scan,
            emotional_stability: self.emotional_stability,
            leaks: self.leaks.clone(),
        }
    }

    /// Replace the ledger with a snapshot, rebuilding pools and indexes.
    pub fn restore_state(&mut self, snapshot: LedgerSnapshot) {
        self.blocks.clear();
        self.index.clear();
        self.pools = PoolKind::ALL.into_iter().map(|p| (p, MemoryPool::default())).collect();
        for block in snapshot.blocks {
            self.index.insert(&block);
            self.pools.entry(block.pool).or_default().insert(block.id, block.size);
            self.blocks.insert(block.id, block);
        }
        self.capacity = snapshot.capacity;
        self.next_id = snapshot.next_id;
        self.now = snapshot.now;
        self.last_maintenance = snapshot.last_maintenance;
        self.last_leak_scan = snapshot.last_leak_scan;
        self.emotional_stability = snapshot.emotional_stability;
        self.leaks = snapshot.leaks;
    }

    fn emit(&self, level: LogLevel, message: impl Into<String>) {
        self.log
            .record(LogRecord::new(self.now, level, LogCategory::Memory, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MINUTE_MS;

    fn ledger() -> MemoryLedger {
        MemoryLedger::new(LedgerConfig::default())
    }

    #[test]
    fn grief_allocation_takes_262_units() {
        let mut ledger = ledger();
        let before = ledger.capacity().available;
        let id = ledger
            .allocate_memory(MemoryData::new("grief memory", &["grief"], 0.9), PoolKind::ShortTerm)
            .expect("fits");
        assert_eq!(before - ledger.capacity().available, 262);
        assert_eq!(ledger.get(id).map(|b| b.size), Some(262));
        assert!(ledger.capacity().is_consistent());
        assert_eq!(ledger.index().for_emotion("grief"), vec![id]);
        assert_eq!(ledger.index().for_bucket(IntensityBucket::High), vec![id]);
    }

    #[test]
    fn allocation_beyond_capacity_fails() {
        let mut ledger = MemoryLedger::new(LedgerConfig {
            total_capacity: 300,
            reserved: 0,
            ..LedgerConfig::default()
        });
        ledger
            .allocate_memory(MemoryData::new("grief memory", &["grief"], 0.9), PoolKind::Traumatic)
            .expect("fits");
        let err = ledger
            .allocate_memory(MemoryData::new("grief memory", &["grief"], 0.9), PoolKind::Traumatic)
            .expect_err("full");
        assert!(matches!(err, PsycheError::CapacityExceeded { requested: 262, available: 38 }));
        assert!(ledger.capacity().is_consistent());
    }

    #[test]
    fn retrieval_sorts_by_charge_and_skips_corrupted() {
        let mut ledger = ledger();
        let low = ledger
            .allocate_memory(MemoryData::new("a", &["joy"], 0.2), PoolKind::LongTerm)
            .expect("fits");
        let high = ledger
            .allocate_memory(MemoryData::new("b", &["joy"], 0.9), PoolKind::LongTerm)
            .expect("fits");
        let broken = ledger
            .allocate_memory(MemoryData::new("c", &["joy"], 1.0), PoolKind::LongTerm)
            .expect("fits");
        ledger.corrupt_block(broken, 0.8).expect("exists");

        let found = ledger.retrieve_memories_by_emotion("joy", 5);
        let ids: Vec<_> = found.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![high, low]);
        assert_eq!(ledger.get(high).map(|b| b.access_count), Some(1));
        assert_eq!(ledger.get(broken).map(|b| b.access_count), Some(0));

        assert_eq!(ledger.retrieve_memories_by_emotion("joy", 1).len(), 1);
    }

    #[test]
    fn protected_blocks_cannot_be_freed() {
        let mut ledger = ledger();
        let id = ledger
            .allocate_memory(MemoryData::new("keep", &[], 0.5), PoolKind::ShortTerm)
            .expect("fits");
        ledger.protect(id).expect("exists");
        assert!(matches!(ledger.delete_memory(id), Err(PsycheError::BlockProtected(_))));
        ledger.unprotect(id).expect("exists");
        ledger.delete_memory(id).expect("freed");
        assert_eq!(ledger.capacity().allocated, 0);
        assert!(ledger.index().for_emotion("keep").is_empty());
    }

    #[test]
    fn poke_fragments_and_defragment_repairs() {
        let mut ledger = ledger();
        let id = ledger
            .allocate_memory(MemoryData::new("x", &["fear"], 0.5), PoolKind::ShortTerm)
            .expect("fits");
        ledger.poke(id, Some("y".into())).expect("poked");
        let block = ledger.get(id).expect("block");
        assert!(block.fragmented);
        assert!((block.integrity_score - 0.9).abs() < 1e-6);
        assert_eq!(block.content.description, "y");

        assert_eq!(ledger.defragment(), 1);
        let block = ledger.get(id).expect("block");
        assert!(!block.fragmented);
        assert!((block.integrity_score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn corrupted_blocks_reject_peek() {
        let mut ledger = ledger();
        let id = ledger
            .allocate_memory(MemoryData::new("x", &[], 0.5), PoolKind::ShortTerm)
            .expect("fits");
        assert!(ledger.corrupt_block(id, 0.75).expect("exists"));
        let err = ledger.peek(id).expect_err("corrupted");
        assert!(matches!(err, PsycheError::MemoryCorrupted(_)));
        assert_eq!(err.severity(), crate::types::Severity::Critical);
    }

    #[test]
    fn maintenance_promotes_frequently_read_blocks() {
        let mut ledger = ledger();
        let id = ledger
            .allocate_memory(MemoryData::new("song", &["joy", "love"], 0.6), PoolKind::ShortTerm)
            .expect("fits");
        for _ in 0..5 {
            ledger.retrieve_memories_by_emotion("joy", 1);
        }
        let events = ledger.tick(SimTime(MINUTE_MS), 1.0);
        assert!(events.contains(&MemoryEvent::BlockPromoted { block: id }));
        assert_eq!(ledger.get(id).map(|b| b.pool), Some(PoolKind::LongTerm));
        assert!(ledger.pool(PoolKind::LongTerm).is_some_and(|p| p.blocks.contains(&id)));
        assert_eq!(ledger.pool(PoolKind::ShortTerm).map(|p| p.used), Some(0));
    }

    #[test]
    fn leak_scan_reports_idle_short_term_blocks() {
        let mut ledger = ledger();
        let id = ledger
            .allocate_memory(MemoryData::new("noise", &["joy", "hope"], 0.25), PoolKind::ShortTerm)
            .expect("fits");
        ledger.tick(SimTime(40 * MINUTE_MS), 1.0);
        assert_eq!(ledger.leaks().first().map(|l| l.block), Some(id));
    }

    #[test]
    fn snapshot_restores_indexes() {
        let mut ledger = ledger();
        let id = ledger
            .allocate_memory(MemoryData::new("first day", &["hope"], 0.8), PoolKind::LongTerm)
            .expect("fits");
        let snapshot = ledger.capture_state();

        let mut restored = MemoryLedger::new(LedgerConfig::default());
        restored.restore_state(snapshot.clone());
        assert_eq!(restored.capture_state(), snapshot);
        assert_eq!(restored.index().for_emotion("hope"), vec![id]);
        assert_eq!(restored.pool(PoolKind::LongTerm).map(|p| p.used), ledger.pool(PoolKind::LongTerm).map(|p| p.used));
    }
}
