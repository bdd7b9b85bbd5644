//! Scoring heuristics for eviction, leak detection and corruption.
//!
//! ```text
//! value      = 0.4·charge + min(access/10, 0.3) + 0.2·integrity + 0.1·(emotions/5)
//! leak       = 0.4·age' + 0.3·idle' + 0.2·(3 − access)/3 + 0.1·(1 − charge)
//! corruption = age/1yr·0.3 + max(0, (access − 100)/1000) + (1 − stability)·0.4 + 0.2·fragmented
//! ```
//!
//! All three are pure functions of a block, the current time and (for
//! corruption) the emotional stability of the owning instance.

use serde::{Deserialize, Serialize};

use crate::ledger::block::{MemoryBlock, PoolKind};
use crate::types::{clamp_unit, BlockId, SimTime, HOUR_MS, MINUTE_MS, YEAR_MS};

/// Minimum age of a leak candidate.
pub const LEAK_MIN_AGE_MS: u64 = 30 * MINUTE_MS;
/// Minimum idle time of a leak candidate.
pub const LEAK_MIN_IDLE_MS: u64 = 10 * MINUTE_MS;
/// Access count below which a block can leak.
pub const LEAK_MAX_ACCESS: u32 = 3;
/// Charge below which a block can leak.
pub const LEAK_MAX_CHARGE: f32 = 0.3;

/// Retention value of a block, in [0, 1].
#[must_use]
pub fn value_score(block: &MemoryBlock) -> f32 {
    let access = (block.access_count as f32 / 10.0).min(0.3);
    let emotions = block.associated_emotions.len() as f32 / 5.0;
    (0.4 * block.emotional_charge + access + 0.2 * block.integrity_score + 0.1 * emotions).min(1.0)
}

/// Whether a block looks like a leak at `now`.
#[must_use]
pub fn is_leak_candidate(block: &MemoryBlock, now: SimTime) -> bool {
    block.pool == PoolKind::ShortTerm
        && block.age_ms(now) > LEAK_MIN_AGE_MS
        && block.idle_ms(now) > LEAK_MIN_IDLE_MS
        && block.access_count < LEAK_MAX_ACCESS
        && block.emotional_charge < LEAK_MAX_CHARGE
}

/// Leak score of a block at `now`.
#[must_use]
pub fn leak_score(block: &MemoryBlock, now: SimTime) -> f32 {
    let age = (block.age_ms(now) as f32 / (2 * HOUR_MS) as f32).min(1.0);
    let idle = (block.idle_ms(now) as f32 / HOUR_MS as f32).min(1.0);
    let low_access = (LEAK_MAX_ACCESS.saturating_sub(block.access_count)) as f32 / 3.0;
    let low_charge = 1.0 - block.emotional_charge;
    0.4 * age + 0.3 * idle + 0.2 * low_access + 0.1 * low_charge
}

/// Probability-like corruption risk in [0, 1].
#[must_use]
pub fn corruption_risk(block: &MemoryBlock, now: SimTime, emotional_stability: f32) -> f32 {
    let age = block.age_ms(now) as f32 / YEAR_MS as f32 * 0.3;
    let wear = ((block.access_count as f32 - 100.0) / 1000.0).max(0.0);
    let instability = (1.0 - clamp_unit(emotional_stability)) * 0.4;
    let fragmented = if block.fragmented { 0.2 } else { 0.0 };
    (age + wear + instability + fragmented).min(1.0)
}

/// A detected leak.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeakReport {
    /// Leaking block.
    pub block: BlockId,
    /// Leak score.
    pub score: f32,
    /// Units held.
    pub size: u64,
    /// Age at detection.
    pub age_ms: u64,
    /// Idle time at detection.
    pub idle_ms: u64,
}

/// Score every leak candidate, highest score first (ties by id).
#[must_use]
pub fn detect_leaks<'a>(blocks: impl IntoIterator<Item = &'a MemoryBlock>, now: SimTime) -> Vec<LeakReport> {
    let mut leaks: Vec<LeakReport> = blocks
        .into_iter()
        .filter(|b| is_leak_candidate(b, now))
        .map(|b| LeakReport {
            block: b.id,
            score: leak_score(b, now),
            size: b.size,
            age_ms: b.age_ms(now),
            idle_ms: b.idle_ms(now),
        })
        .collect();
    leaks.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.block.cmp(&b.block)));
    leaks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::block::MemoryData;

    fn block(charge: f32, emotions: &[&str]) -> MemoryBlock {
        MemoryBlock::new(
            BlockId(1),
            PoolKind::ShortTerm,
            MemoryData::new("something", emotions, charge),
            SimTime(0),
        )
    }

    #[test]
    fn value_score_weights() {
        let mut b = block(0.5, &["joy", "hope"]);
        b.access_count = 2;
        let expected = 0.4 * 0.5 + 0.2 + 0.2 * 1.0 + 0.1 * (2.0 / 5.0);
        assert!((value_score(&b) - expected).abs() < 1e-6);

        b.access_count = 50;
        b.emotional_charge = 1.0;
        b.associated_emotions = vec!["a".into(); 10];
        assert!((value_score(&b) - 1.0).abs() < 1e-6, "clamped");
    }

    #[test]
    fn leak_candidate_requires_every_condition() {
        let b = block(0.1, &[]);
        let now = SimTime(HOUR_MS);
        assert!(is_leak_candidate(&b, now));
        assert!(!is_leak_candidate(&b, SimTime(20 * MINUTE_MS)), "too young");

        let mut charged = b.clone();
        charged.emotional_charge = 0.3;
        assert!(!is_leak_candidate(&charged, now));

        let mut long_term = b.clone();
        long_term.pool = PoolKind::LongTerm;
        assert!(!is_leak_candidate(&long_term, now));

        let mut busy = b;
        busy.access_count = 3;
        assert!(!is_leak_candidate(&busy, now));
    }

    #[test]
    fn leak_score_at_saturation() {
        let b = block(0.0, &[]);
        let score = leak_score(&b, SimTime(3 * HOUR_MS));
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn leak_score_non_decreasing_in_age() {
        let b = block(0.2, &[]);
        let mut previous = 0.0;
        for minutes in (0..300).step_by(7) {
            let score = leak_score(&b, SimTime(minutes * MINUTE_MS));
            assert!(score >= previous);
            previous = score;
        }
    }

    #[test]
    fn corruption_risk_terms() {
        let mut b = block(0.5, &[]);
        assert!((corruption_risk(&b, SimTime(0), 1.0)).abs() < 1e-6);
        assert!((corruption_risk(&b, SimTime(YEAR_MS), 1.0) - 0.3).abs() < 1e-6);
        assert!((corruption_risk(&b, SimTime(0), 0.5) - 0.2).abs() < 1e-6);
        b.fragmented = true;
        b.access_count = 600;
        assert!((corruption_risk(&b, SimTime(0), 1.0) - 0.7).abs() < 1e-6);
        assert!((corruption_risk(&b, SimTime(10 * YEAR_MS), 0.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn leaks_sorted_descending() {
        let now = SimTime(2 * HOUR_MS);
        let mut old = block(0.0, &[]);
        old.id = BlockId(1);
        let mut young = block(0.2, &[]);
        young.id = BlockId(2);
        young.created_at = SimTime(HOUR_MS);
        young.last_accessed = SimTime(HOUR_MS);

        let leaks = detect_leaks([&young, &old], now);
        assert_eq!(leaks.len(), 2);
        assert_eq!(leaks[0].block, BlockId(1));
        assert!(leaks[0].score >= leaks[1].score);
    }
}
