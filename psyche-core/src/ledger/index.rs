//! Non-owning emotional indexes over ledger blocks.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::ledger::block::MemoryBlock;
use crate::types::BlockId;

/// Coarse intensity class of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntensityBucket {
    /// Charge below 0.3.
    Low,
    /// Charge in [0.3, 0.7).
    Medium,
    /// Charge of 0.7 or more.
    High,
}

impl IntensityBucket {
    /// Every bucket, lowest first.
    pub const ALL: [Self; 3] = [Self::Low, Self::Medium, Self::High];

    /// Wire name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Parse a wire name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.name() == name)
    }

    /// Bucket for an emotional charge.
    #[must_use]
    pub fn for_charge(charge: f32) -> Self {
        if charge < 0.3 {
            Self::Low
        } else if charge < 0.7 {
            Self::Medium
        } else {
            Self::High
        }
    }
}

/// Block ids by associated emotion and by intensity bucket.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmotionalIndex {
    by_emotion: BTreeMap<String, BTreeSet<BlockId>>,
    by_bucket: BTreeMap<IntensityBucket, BTreeSet<BlockId>>,
}

impl EmotionalIndex {
    /// Index a block under each of its emotions and its bucket.
    pub fn insert(&mut self, block: &MemoryBlock) {
        for emotion in &block.associated_emotions {
            self.by_emotion
                .entry(emotion.clone())
                .or_default()
                .insert(block.id);
        }
        self.by_bucket
            .entry(IntensityBucket::for_charge(block.emotional_charge))
            .or_default()
            .insert(block.id);
    }

    /// Drop every entry for a block.
    pub fn remove(&mut self, block: &MemoryBlock) {
        for emotion in &block.associated_emotions {
            if let Some(set) = self.by_emotion.get_mut(emotion) {
                set.remove(&block.id);
                if set.is_empty() {
                    self.by_emotion.remove(emotion);
                }
            }
        }
        if let Some(set) = self
            .by_bucket
            .get_mut(&IntensityBucket::for_charge(block.emotional_charge))
        {
            set.remove(&block.id);
        }
    }

    /// Blocks tagged with `emotion`.
    #[must_use]
    pub fn for_emotion(&self, emotion: &str) -> Vec<BlockId> {
        self.by_emotion
            .get(emotion)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Blocks in `bucket`.
    #[must_use]
    pub fn for_bucket(&self, bucket: IntensityBucket) -> Vec<BlockId> {
        self.by_bucket
            .get(&bucket)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Indexed emotion names.
    pub fn emotions(&self) -> impl Iterator<Item = &str> {
        self.by_emotion.keys().map(String::as_str)
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.by_emotion.clear();
        self.by_bucket.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::block::{MemoryData, PoolKind};
    use crate::types::SimTime;

    #[test]
    fn bucket_thresholds() {
        assert_eq!(IntensityBucket::for_charge(0.29), IntensityBucket::Low);
        assert_eq!(IntensityBucket::for_charge(0.3), IntensityBucket::Medium);
        assert_eq!(IntensityBucket::for_charge(0.7), IntensityBucket::High);
    }

    #[test]
    fn insert_and_remove() {
        let block = MemoryBlock::new(
            BlockId(7),
            PoolKind::ShortTerm,
            MemoryData::new("storm", &["fear", "awe"], 0.8),
            SimTime(0),
        );
        let mut index = EmotionalIndex::default();
        index.insert(&block);
        assert_eq!(index.for_emotion("fear"), vec![BlockId(7)]);
        assert_eq!(index.for_bucket(IntensityBucket::High), vec![BlockId(7)]);

        index.remove(&block);
        assert!(index.for_emotion("fear").is_empty());
        assert_eq!(index.emotions().count(), 0);
    }
}
