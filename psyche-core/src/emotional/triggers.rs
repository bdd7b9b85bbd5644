//! Emotional triggers and suppression mechanisms.
//!
//! Both are rule tables over emotion names. Their only mutable state is
//! an activation counter and the time of the last activation.

use serde::{Deserialize, Serialize};

use crate::emotional::state::EmotionalStateVector;
use crate::types::{clamp_unit, SimTime};

/// Fires when any of its emotions reaches the threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    /// Trigger name, forwarded to the narrative engine when it fires.
    pub name: String,
    /// Watched emotions.
    pub emotions: Vec<String>,
    /// Activation threshold in [0, 1].
    pub threshold: f32,
    /// Number of activations so far.
    pub activation_count: u32,
    /// Last activation time.
    pub last_activated: Option<SimTime>,
}

impl Trigger {
    /// A fresh trigger.
    #[must_use]
    pub fn new(name: &str, emotions: &[&str], threshold: f32) -> Self {
        Self {
            name: name.to_string(),
            emotions: emotions.iter().map(|e| (*e).to_string()).collect(),
            threshold: clamp_unit(threshold),
            activation_count: 0,
            last_activated: None,
        }
    }

    /// The strongest watched emotion at or above the threshold, if any.
    #[must_use]
    pub fn matching_emotion<'a>(&'a self, state: &EmotionalStateVector) -> Option<(&'a str, f32)> {
        self.emotions
            .iter()
            .filter_map(|e| state.intensity(e).map(|v| (e.as_str(), v)))
            .filter(|(_, v)| *v >= self.threshold)
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Evaluate at `now`, recording the activation when it fires.
    ///
    /// A trigger stays silent for `refractory_ms` after firing.
    pub fn evaluate(
        &mut self,
        state: &EmotionalStateVector,
        now: SimTime,
        refractory_ms: u64,
    ) -> Option<(String, f32)> {
        if self
            .last_activated
            .is_some_and(|t| now.since(t) < refractory_ms)
        {
            return None;
        }
        let (emotion, value) = self
            .matching_emotion(state)
            .map(|(e, v)| (e.to_string(), v))?;
        self.activation_count += 1;
        self.last_activated = Some(now);
        Some((emotion, value))
    }
}

/// The default trigger table.
#[must_use]
pub fn default_triggers() -> Vec<Trigger> {
    vec![
        Trigger::new("abandonment", &["loneliness", "sadness"], 0.7),
        Trigger::new("threat", &["fear"], 0.75),
        Trigger::new("injustice", &["anger"], 0.7),
        Trigger::new("loss", &["grief"], 0.6),
    ]
}

/// A defense mechanism that damps a fixed set of emotions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuppressionMechanism {
    /// Mechanism name.
    pub name: String,
    /// Emotions it acts on.
    pub emotions: Vec<String>,
    /// Fraction removed from each emotion, in [0, 1].
    pub strength: f32,
    /// Number of uses so far.
    pub activation_count: u32,
    /// Last use.
    pub last_activated: Option<SimTime>,
}

impl SuppressionMechanism {
    /// A fresh mechanism.
    #[must_use]
    pub fn new(name: &str, emotions: &[&str], strength: f32) -> Self {
        Self {
            name: name.to_string(),
            emotions: emotions.iter().map(|e| (*e).to_string()).collect(),
            strength: clamp_unit(strength),
            activation_count: 0,
            last_activated: None,
        }
    }

    /// Whether this mechanism acts on `emotion`.
    #[must_use]
    pub fn covers(&self, emotion: &str) -> bool {
        self.emotions.iter().any(|e| e == emotion)
    }

    /// Apply to `only` (or every covered emotion when `None`). Suppressing
    /// costs tension and coherence. Returns the total intensity removed.
    pub fn apply(&mut self, state: &mut EmotionalStateVector, only: Option<&str>, now: SimTime) -> f32 {
        let mut removed = 0.0;
        let factor = 1.0 - self.strength;
        for emotion in &self.emotions {
            if only.is_some_and(|o| o != emotion) {
                continue;
            }
            if let Some(before) = state.intensity(emotion) {
                let after = state.scale_emotion(emotion, factor).unwrap_or(before);
                removed += before - after;
            }
        }
        state.adjust_emotion("tension", self.strength * 0.1);
        state.coherence = clamp_unit(state.coherence - self.strength * 0.05);
        self.activation_count += 1;
        self.last_activated = Some(now);
        removed
    }
}

/// The default suppression table.
#[must_use]
pub fn default_mechanisms() -> Vec<SuppressionMechanism> {
    vec![
        SuppressionMechanism::new("denial", &["grief", "sadness", "shame"], 0.4),
        SuppressionMechanism::new("intellectualization", &["fear", "anxiety"], 0.3),
        SuppressionMechanism::new("repression", &["shame", "guilt", "fear"], 0.6),
        SuppressionMechanism::new("numbing", &["sadness", "grief", "loneliness", "anger"], 0.5),
    ]
}
