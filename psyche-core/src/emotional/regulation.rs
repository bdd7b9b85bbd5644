//! Regulation strategies: how the character copes.
//!
//! Two paths exist:
//! - [`RegulationStrategy::apply`] is the instant path: damp the target
//!   emotions once and go on cooldown.
//! - [`ActiveRegulation`] is the timed path: the effect ramps linearly over
//!   a duration and, once finished, leaves strategy-specific side effects.

use serde::{Deserialize, Serialize};

use crate::emotional::state::EmotionalStateVector;
use crate::types::{clamp_unit, SimTime, SECOND_MS};

/// Increment added to overall regulation capacity by an instant application.
pub const REGULATION_INCREMENT: f32 = 0.05;

/// Named coping strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Reinterpret the situation.
    CognitiveReappraisal,
    /// Push the feeling down.
    Suppression,
    /// Attend to something else.
    Distraction,
    /// Let the feeling be.
    Acceptance,
    /// Act on the cause.
    ProblemSolving,
}

impl StrategyKind {
    /// All strategies in catalog order.
    pub const ALL: [Self; 5] = [
        Self::CognitiveReappraisal,
        Self::Suppression,
        Self::Distraction,
        Self::Acceptance,
        Self::ProblemSolving,
    ];

    /// Wire name, e.g. `cognitive_reappraisal`.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::CognitiveReappraisal => "cognitive_reappraisal",
            Self::Suppression => "suppression",
            Self::Distraction => "distraction",
            Self::Acceptance => "acceptance",
            Self::ProblemSolving => "problem_solving",
        }
    }

    /// Parse a wire name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    /// Default `(effectiveness, cooldown_ms)`.
    #[must_use]
    pub fn defaults(self) -> (f32, u64) {
        match self {
            Self::CognitiveReappraisal => (0.7, 30 * SECOND_MS),
            Self::Suppression => (0.5, 10 * SECOND_MS),
            Self::Distraction => (0.4, 15 * SECOND_MS),
            Self::Acceptance => (0.6, 45 * SECOND_MS),
            Self::ProblemSolving => (0.65, 60 * SECOND_MS),
        }
    }

    /// Effects left behind when a timed regulation of this kind completes.
    #[must_use]
    pub fn side_effects(self) -> &'static [SideEffect] {
        match self {
            Self::Suppression => &[SideEffect::ReboundRisk, SideEffect::GlobalDamping(0.95)],
            Self::CognitiveReappraisal => &[SideEffect::AxisShift("clarity", -0.1)],
            Self::Distraction => &[SideEffect::AxisShift("focus", -0.1)],
            Self::Acceptance => &[SideEffect::CoherenceShift(0.05)],
            Self::ProblemSolving => &[SideEffect::AxisShift("fatigue", 0.05)],
        }
    }
}

/// A deferred consequence of a completed regulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SideEffect {
    /// Suppressed feelings may come back; surfaces as a log entry.
    ReboundRisk,
    /// Multiply every emotion by the factor.
    GlobalDamping(f32),
    /// Shift a physiological/cognitive axis.
    AxisShift(&'static str, f32),
    /// Shift coherence.
    CoherenceShift(f32),
}

impl SideEffect {
    /// Apply to the state vector. Returns `true` for effects that only log.
    pub fn apply(self, state: &mut EmotionalStateVector) -> bool {
        match self {
            Self::ReboundRisk => true,
            Self::GlobalDamping(factor) => {
                state.scale_all(factor);
                false
            }
            Self::AxisShift(axis, delta) => {
                state.adjust_emotion(axis, delta);
                false
            }
            Self::CoherenceShift(delta) => {
                state.coherence = clamp_unit(state.coherence + delta);
                false
            }
        }
    }
}

/// A coping strategy with a cooldown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegulationStrategy {
    /// Which strategy.
    pub kind: StrategyKind,
    /// Strength in [0, 1].
    pub effectiveness: f32,
    /// Minimum time between uses (ms).
    pub cooldown_ms: u64,
    /// Last use, if any.
    pub last_used: Option<SimTime>,
}

impl RegulationStrategy {
    /// A strategy with its catalog defaults.
    #[must_use]
    pub fn new(kind: StrategyKind) -> Self {
        let (effectiveness, cooldown_ms) = kind.defaults();
        Self {
            kind,
            effectiveness,
            cooldown_ms,
            last_used: None,
        }
    }

    /// Whether the strategy can be used at `now`.
    ///
    /// Unusable strictly before `last_used + cooldown`, usable from that
    /// instant on.
    #[must_use]
    pub fn is_available(&self, now: SimTime) -> bool {
        self.last_used
            .is_none_or(|used| now.since(used) >= self.cooldown_ms)
    }

    /// Milliseconds until the strategy is usable again.
    #[must_use]
    pub fn remaining_cooldown(&self, now: SimTime) -> u64 {
        self.last_used
            .map_or(0, |used| self.cooldown_ms.saturating_sub(now.since(used)))
    }

    /// Damping factor applied to each target emotion.
    #[must_use]
    pub fn damping_factor(&self) -> f32 {
        1.0 - self.effectiveness * 0.3
    }

    /// Apply instantly to `targets` (all primary and secondary emotions when
    /// empty) and start the cooldown. Caller checks availability first.
    pub fn apply(&mut self, state: &mut EmotionalStateVector, targets: &[String], now: SimTime) {
        let factor = self.damping_factor();
        if targets.is_empty() {
            state.scale_all(factor);
        } else {
            for target in targets {
                state.scale_emotion(target, factor);
            }
        }
        state.regulation = clamp_unit(state.regulation + REGULATION_INCREMENT);
        self.last_used = Some(now);
    }
}

/// The default strategy set, one per kind.
#[must_use]
pub fn default_strategies() -> Vec<RegulationStrategy> {
    StrategyKind::ALL.into_iter().map(RegulationStrategy::new).collect()
}

/// A timed regulation whose effect ramps over its duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveRegulation {
    /// Sequential id within the engine.
    pub id: u64,
    /// Strategy in effect.
    pub kind: StrategyKind,
    /// Emotion being regulated.
    pub target: String,
    /// Peak effect (the strategy's effectiveness).
    pub strength: f32,
    /// Start time.
    pub started_at: SimTime,
    /// Total duration (ms).
    pub duration_ms: u64,
}

impl ActiveRegulation {
    /// Fraction of the duration elapsed at `now`, in [0, 1].
    #[must_use]
    pub fn progress(&self, now: SimTime) -> f32 {
        if self.duration_ms == 0 {
            return 1.0;
        }
        (now.since(self.started_at) as f32 / self.duration_ms as f32).min(1.0)
    }

    /// Current effect: peak strength scaled linearly by progress.
    #[must_use]
    pub fn current_effect(&self, now: SimTime) -> f32 {
        self.strength * self.progress(now)
    }

    /// Whether the duration has elapsed.
    #[must_use]
    pub fn is_complete(&self, now: SimTime) -> bool {
        now.since(self.started_at) >= self.duration_ms
    }

    /// Per-tick pull on the target emotion (scaled by tick length).
    pub fn apply_tick(&self, state: &mut EmotionalStateVector, now: SimTime, delta_ms: u64) {
        let secs = delta_ms as f32 / SECOND_MS as f32;
        let effect = self.current_effect(now) * 0.1 * secs;
        if let Some(current) = state.intensity(&self.target) {
            state.adjust_emotion(&self.target, -current * effect);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooldown_boundary_is_inclusive() {
        let mut strategy = RegulationStrategy::new(StrategyKind::Suppression);
        assert!(strategy.is_available(SimTime(0)), "never used → available");

        strategy.last_used = Some(SimTime(1_000));
        let boundary = SimTime(1_000 + strategy.cooldown_ms);
        assert!(!strategy.is_available(SimTime(boundary.0 - 1)));
        assert!(strategy.is_available(boundary));
        assert!(strategy.is_available(boundary.plus(1)));
        assert_eq!(strategy.remaining_cooldown(SimTime(boundary.0 - 250)), 250);
    }

    #[test]
    fn instant_apply_damps_targets_and_raises_regulation() {
        let mut state = EmotionalStateVector::base();
        state.primary.set("anger", 0.8);
        let before_regulation = state.regulation;
        let mut strategy = RegulationStrategy::new(StrategyKind::CognitiveReappraisal);

        strategy.apply(&mut state, &["anger".to_string()], SimTime(500));

        let expected = 0.8 * (1.0 - 0.7 * 0.3);
        let anger = state.primary.get("anger").expect("anger");
        assert!((anger - expected).abs() < 1e-6);
        assert!((state.regulation - (before_regulation + REGULATION_INCREMENT)).abs() < 1e-6);
        assert_eq!(strategy.last_used, Some(SimTime(500)));
    }

    #[test]
    fn timed_regulation_ramps_linearly() {
        let reg = ActiveRegulation {
            id: 1,
            kind: StrategyKind::Acceptance,
            target: "grief".into(),
            strength: 0.6,
            started_at: SimTime(0),
            duration_ms: 10_000,
        };
        assert!((reg.current_effect(SimTime(0)) - 0.0).abs() < 1e-6);
        assert!((reg.current_effect(SimTime(5_000)) - 0.3).abs() < 1e-6);
        assert!((reg.current_effect(SimTime(20_000)) - 0.6).abs() < 1e-6);
        assert!(reg.is_complete(SimTime(10_000)));
    }

    #[test]
    fn suppression_side_effects_include_rebound() {
        let effects = StrategyKind::Suppression.side_effects();
        assert!(effects.contains(&SideEffect::ReboundRisk));
        let mut state = EmotionalStateVector::base();
        let before = state.total_intensity();
        for effect in effects {
            effect.apply(&mut state);
        }
        assert!(state.total_intensity() < before);
    }

    #[test]
    fn strategy_names_round_trip() {
        for kind in StrategyKind::ALL {
            assert_eq!(StrategyKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(StrategyKind::from_name("yelling"), None);
    }
}
