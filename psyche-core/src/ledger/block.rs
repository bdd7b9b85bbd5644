//! Memory blocks and the pools that own them.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::config::LedgerConfig;
use crate::types::{clamp_unit, BlockId, SimTime, HOUR_MS};

/// Integrity below which a block is considered corrupted.
pub const CORRUPTION_THRESHOLD: f32 = 0.3;
/// Size multiplier applied by compression.
pub const COMPRESSION_RATIO: f64 = 0.7;
/// Number of access timestamps kept per block.
const ACCESS_HISTORY: usize = 16;

// ---------------------------------------------------------------------------
// Pools
// ---------------------------------------------------------------------------

/// Retention bucket a block lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PoolKind {
    /// Recent, volatile memories.
    ShortTerm,
    /// Consolidated memories.
    LongTerm,
    /// Never expires.
    Traumatic,
    /// Pushed out of awareness.
    Suppressed,
    /// Skills and habits; never expires.
    Procedural,
}

impl PoolKind {
    /// Every pool.
    pub const ALL: [Self; 5] = [
        Self::ShortTerm,
        Self::LongTerm,
        Self::Traumatic,
        Self::Suppressed,
        Self::Procedural,
    ];

    /// Wire name, e.g. `shortTerm`.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::ShortTerm => "shortTerm",
            Self::LongTerm => "longTerm",
            Self::Traumatic => "traumatic",
            Self::Suppressed => "suppressed",
            Self::Procedural => "procedural",
        }
    }

    /// Parse a pool name; accepts camelCase and snake_case.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let folded: String = name.chars().filter(|c| *c != '_').collect::<String>().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.name().to_lowercase() == folded)
    }

    /// Retention period, or `None` for pools that never auto-expire.
    #[must_use]
    pub fn retention_ms(self, config: &LedgerConfig) -> Option<u64> {
        match self {
            Self::ShortTerm => Some(config.short_term_retention_ms),
            Self::LongTerm => Some(config.long_term_retention_ms),
            Self::Suppressed => Some(config.suppressed_retention_ms),
            Self::Traumatic | Self::Procedural => None,
        }
    }
}

impl std::fmt::Display for PoolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Membership and size accounting of one pool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryPool {
    /// Blocks in the pool.
    pub blocks: BTreeSet<BlockId>,
    /// Units used by those blocks.
    pub used: u64,
}

impl MemoryPool {
    pub(crate) fn insert(&mut self, id: BlockId, size: u64) {
        if self.blocks.insert(id) {
            self.used += size;
        }
    }

    pub(crate) fn remove(&mut self, id: BlockId, size: u64) {
        if self.blocks.remove(&id) {
            self.used = self.used.saturating_sub(size);
        }
    }
}

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

/// Allocation input and stored content of a memory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryData {
    /// What the character remembers.
    pub description: String,
    /// Sensory fragments (smells, sounds, images).
    #[serde(default)]
    pub sensory_details: Vec<String>,
    /// Emotions attached to the memory.
    #[serde(default)]
    pub emotions: Vec<String>,
    /// Emotional intensity in [0, 1].
    #[serde(default)]
    pub emotional_intensity: f32,
    /// Free-form context, e.g. the story fragment that created it.
    #[serde(default)]
    pub context: Option<String>,
}

impl MemoryData {
    /// A memory with a description, emotions and intensity.
    #[must_use]
    pub fn new(description: impl Into<String>, emotions: &[&str], intensity: f32) -> Self {
        Self {
            description: description.into(),
            emotions: emotions.iter().map(|e| (*e).to_string()).collect(),
            emotional_intensity: intensity,
            ..Self::default()
        }
    }

    /// Length of the description as the content encoder sees it: the
    /// JSON string literal, quotes and escapes included.
    #[must_use]
    pub fn description_len(&self) -> usize {
        serde_json::to_string(&self.description)
            .map_or(self.description.chars().count() + 2, |json| json.chars().count())
    }

    /// Size in ledger units.
    ///
    /// `round((100 + 2·description + 50·sensory + 10·emotions) × (1 + intensity))`
    #[must_use]
    pub fn size(&self) -> u64 {
        let base = 100.0
            + self.description_len() as f64 * 2.0
            + self.sensory_details.len() as f64 * 50.0
            + self.emotions.len() as f64 * 10.0;
        let scaled = base * (1.0 + f64::from(clamp_unit(self.emotional_intensity)));
        scaled.round() as u64
    }
}

// ---------------------------------------------------------------------------
// Access bookkeeping
// ---------------------------------------------------------------------------

/// How a block has been read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessPattern {
    /// Most recent access times, oldest first.
    pub timestamps: Vec<SimTime>,
    /// Accesses per simulated hour of the block's life.
    pub frequency_per_hour: f32,
    /// Mean gap between the recorded accesses.
    pub mean_interval_ms: Option<u64>,
}

impl AccessPattern {
    fn record(&mut self, now: SimTime, created_at: SimTime, access_count: u32) {
        self.timestamps.push(now);
        if self.timestamps.len() > ACCESS_HISTORY {
            self.timestamps.remove(0);
        }
        let age_hours = now.since(created_at) as f32 / HOUR_MS as f32;
        self.frequency_per_hour = access_count as f32 / age_hours.max(1.0);
        self.mean_interval_ms = match (self.timestamps.first(), self.timestamps.last()) {
            (Some(first), Some(last)) if self.timestamps.len() > 1 => {
                Some(last.since(*first) / (self.timestamps.len() as u64 - 1))
            }
            _ => None,
        };
    }
}

// ---------------------------------------------------------------------------
// Blocks
// ---------------------------------------------------------------------------

/// One simulated memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryBlock {
    /// Ledger handle.
    pub id: BlockId,
    /// Owning pool.
    pub pool: PoolKind,
    /// Current size in units.
    pub size: u64,
    /// Emotional charge in [0, 1].
    pub emotional_charge: f32,
    /// Emotions the block is indexed under.
    pub associated_emotions: Vec<String>,
    /// Number of reads.
    pub access_count: u32,
    /// Last read (creation time until first read).
    pub last_accessed: SimTime,
    /// Allocation time.
    pub created_at: SimTime,
    /// Integrity in [0, 1]; below [`CORRUPTION_THRESHOLD`] the block is corrupted.
    pub integrity_score: f32,
    /// Set by pokes and cleared by defragmentation.
    pub fragmented: bool,
    /// Compressed once by the pressure chain.
    pub compressed: bool,
    /// Exempt from freeing and eviction.
    pub protected: bool,
    /// What the block holds.
    pub content: MemoryData,
    /// Read history.
    pub access: AccessPattern,
}

impl MemoryBlock {
    pub(crate) fn new(id: BlockId, pool: PoolKind, content: MemoryData, now: SimTime) -> Self {
        Self {
            id,
            pool,
            size: content.size(),
            emotional_charge: clamp_unit(content.emotional_intensity),
            associated_emotions: content.emotions.clone(),
            access_count: 0,
            last_accessed: now,
            created_at: now,
            integrity_score: 1.0,
            fragmented: false,
            compressed: false,
            protected: false,
            content,
            access: AccessPattern::default(),
        }
    }

    /// Age at `now` (ms).
    #[must_use]
    pub fn age_ms(&self, now: SimTime) -> u64 {
        now.since(self.created_at)
    }

    /// Time since last access at `now` (ms).
    #[must_use]
    pub fn idle_ms(&self, now: SimTime) -> u64 {
        now.since(self.last_accessed)
    }

    /// Whether integrity fell below the corruption threshold.
    #[must_use]
    pub fn is_corrupted(&self) -> bool {
        self.integrity_score < CORRUPTION_THRESHOLD
    }

    /// Record a read.
    pub fn touch(&mut self, now: SimTime) {
        self.access_count = self.access_count.saturating_add(1);
        self.last_accessed = now;
        self.access.record(now, self.created_at, self.access_count);
    }

    /// Shift integrity by `delta`, clamped.
    pub fn adjust_integrity(&mut self, delta: f32) {
        self.integrity_score = clamp_unit(self.integrity_score + delta);
    }

    /// Size after compression.
    #[must_use]
    pub fn compressed_size(&self) -> u64 {
        (self.size as f64 * COMPRESSION_RATIO).round() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grief_memory_size_is_262() {
        let data = MemoryData::new("grief memory", &["grief"], 0.9);
        assert_eq!(data.description_len(), 14);
        assert_eq!(data.size(), 262);
    }

    #[test]
    fn sensory_details_add_fifty_each() {
        let mut data = MemoryData::new("", &[], 0.0);
        assert_eq!(data.size(), 104);
        data.sensory_details = vec!["rain".into(), "smoke".into()];
        assert_eq!(data.size(), 204);
    }

    #[test]
    fn pool_names_parse_in_both_cases() {
        assert_eq!(PoolKind::from_name("shortTerm"), Some(PoolKind::ShortTerm));
        assert_eq!(PoolKind::from_name("long_term"), Some(PoolKind::LongTerm));
        assert_eq!(PoolKind::from_name("dreams"), None);
    }

    #[test]
    fn traumatic_and_procedural_never_expire() {
        let config = LedgerConfig::default();
        assert_eq!(PoolKind::Traumatic.retention_ms(&config), None);
        assert_eq!(PoolKind::Procedural.retention_ms(&config), None);
        assert_eq!(
            PoolKind::ShortTerm.retention_ms(&config),
            Some(config.short_term_retention_ms)
        );
    }

    #[test]
    fn touch_tracks_access_pattern() {
        let mut block = MemoryBlock::new(BlockId(1), PoolKind::ShortTerm, MemoryData::default(), SimTime(0));
        block.touch(SimTime(1_000));
        assert_eq!(block.access.mean_interval_ms, None);
        block.touch(SimTime(3_000));
        block.touch(SimTime(5_000));
        assert_eq!(block.access_count, 3);
        assert_eq!(block.access.mean_interval_ms, Some(2_000));
        assert_eq!(block.last_accessed, SimTime(5_000));
    }
}
