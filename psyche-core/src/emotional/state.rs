//! The emotional state vector.
//!
//! Emotion intensities live in small insertion-ordered maps so that the
//! dominant-emotion tie-break ("first maximum wins") is stable across
//! snapshots and restores.

use serde::{Deserialize, Serialize};

use crate::config::EmotionOverride;
use crate::types::clamp_unit;

/// One named intensity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionLevel {
    /// Emotion or axis name.
    pub name: String,
    /// Intensity in [0, 1].
    pub value: f32,
}

/// Insertion-ordered map from emotion name to intensity in [0, 1].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmotionMap {
    entries: Vec<EmotionLevel>,
}

impl EmotionMap {
    /// Build a map from `(name, value)` pairs, clamping every value.
    #[must_use]
    pub fn from_pairs(pairs: &[(&str, f32)]) -> Self {
        Self {
            entries: pairs
                .iter()
                .map(|(name, value)| EmotionLevel {
                    name: (*name).to_string(),
                    value: clamp_unit(*value),
                })
                .collect(),
        }
    }

    /// Intensity of `name`, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f32> {
        self.entries.iter().find(|e| e.name == name).map(|e| e.value)
    }

    /// Whether `name` is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    /// Set `name` to `value` (clamped), appending it if absent.
    pub fn set(&mut self, name: &str, value: f32) {
        let value = clamp_unit(value);
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(entry) => entry.value = value,
            None => self.entries.push(EmotionLevel {
                name: name.to_string(),
                value,
            }),
        }
    }

    /// Add `delta` to an existing entry. Returns the new value.
    pub fn adjust(&mut self, name: &str, delta: f32) -> Option<f32> {
        let entry = self.entries.iter_mut().find(|e| e.name == name)?;
        entry.value = clamp_unit(entry.value + delta);
        Some(entry.value)
    }

    /// Multiply an existing entry by `factor`. Returns the new value.
    pub fn scale(&mut self, name: &str, factor: f32) -> Option<f32> {
        let entry = self.entries.iter_mut().find(|e| e.name == name)?;
        entry.value = clamp_unit(entry.value * factor);
        Some(entry.value)
    }

    /// Apply `f` to every value, clamping the result.
    pub fn map_values(&mut self, mut f: impl FnMut(&str, f32) -> f32) {
        for entry in &mut self.entries {
            entry.value = clamp_unit(f(&entry.name, entry.value));
        }
    }

    /// Iterate `(name, value)` in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.entries.iter().map(|e| (e.name.as_str(), e.value))
    }

    /// Sum of all intensities.
    #[must_use]
    pub fn sum(&self) -> f32 {
        self.entries.iter().map(|e| e.value).sum()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry with the highest intensity; the first one wins on ties.
    #[must_use]
    pub fn max_entry(&self) -> Option<(&str, f32)> {
        let mut best: Option<&EmotionLevel> = None;
        for entry in &self.entries {
            if best.is_none_or(|b| entry.value > b.value) {
                best = Some(entry);
            }
        }
        best.map(|e| (e.name.as_str(), e.value))
    }
}

/// The full emotional state of one character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionalStateVector {
    /// Basic emotions; `dominant` is chosen from these.
    pub primary: EmotionMap,
    /// Complex emotions (grief, shame, ...). Unknown input emotions land here.
    pub secondary: EmotionMap,
    /// Bodily axes: arousal, tension, fatigue.
    pub physiological: EmotionMap,
    /// Cognitive axes: clarity, focus, rumination.
    pub cognitive: EmotionMap,
    /// Behavioral axes: withdrawal, agitation.
    pub behavioral: EmotionMap,
    /// Name of the strongest primary emotion.
    pub dominant: String,
    /// Internal consistency in [0, 1].
    pub coherence: f32,
    /// Self-regulation capacity in [0, 1].
    pub regulation: f32,
}

impl EmotionalStateVector {
    /// The fixed base vector every instance starts from.
    #[must_use]
    pub fn base() -> Self {
        let mut state = Self {
            primary: EmotionMap::from_pairs(&[
                ("joy", 0.3),
                ("sadness", 0.2),
                ("anger", 0.1),
                ("fear", 0.15),
                ("surprise", 0.1),
                ("disgust", 0.05),
            ]),
            secondary: EmotionMap::from_pairs(&[
                ("grief", 0.0),
                ("anxiety", 0.2),
                ("shame", 0.05),
                ("guilt", 0.05),
                ("love", 0.3),
                ("hope", 0.3),
                ("loneliness", 0.1),
                ("pride", 0.1),
            ]),
            physiological: EmotionMap::from_pairs(&[
                ("arousal", 0.3),
                ("tension", 0.2),
                ("fatigue", 0.2),
            ]),
            cognitive: EmotionMap::from_pairs(&[
                ("clarity", 0.7),
                ("focus", 0.6),
                ("rumination", 0.1),
            ]),
            behavioral: EmotionMap::from_pairs(&[("withdrawal", 0.1), ("agitation", 0.1)]),
            dominant: String::new(),
            coherence: 0.8,
            regulation: 0.7,
        };
        state.recompute_dominant();
        state
    }

    /// The base vector with configured overrides applied.
    ///
    /// `coherence` and `regulation` may be overridden by name as well.
    #[must_use]
    pub fn with_overrides(overrides: &[EmotionOverride]) -> Self {
        let mut state = Self::base();
        for o in overrides {
            match o.name.as_str() {
                "coherence" => state.coherence = clamp_unit(o.value),
                "regulation" => state.regulation = clamp_unit(o.value),
                name => {
                    if !state.set_existing(name, o.value) {
                        state.secondary.set(name, o.value);
                    }
                }
            }
        }
        state.recompute_dominant();
        state
    }

    /// Recompute `dominant` from `primary`. Pure in `primary`.
    pub fn recompute_dominant(&mut self) -> &str {
        self.dominant = self
            .primary
            .max_entry()
            .map(|(name, _)| name.to_string())
            .unwrap_or_default();
        &self.dominant
    }

    /// Intensity of an emotion or axis by name.
    #[must_use]
    pub fn intensity(&self, name: &str) -> Option<f32> {
        self.groups().iter().find_map(|g| g.get(name))
    }

    /// Add `delta` to an emotion. Unknown names are created in `secondary`.
    /// Returns the new value.
    pub fn adjust_emotion(&mut self, name: &str, delta: f32) -> f32 {
        let value = self
            .groups_mut()
            .into_iter()
            .find_map(|g| g.adjust(name, delta));
        let value = value.unwrap_or_else(|| {
            self.secondary.set(name, delta);
            clamp_unit(delta)
        });
        if self.primary.contains(name) {
            self.recompute_dominant();
        }
        value
    }

    /// Multiply an existing emotion or axis by `factor`.
    pub fn scale_emotion(&mut self, name: &str, factor: f32) -> Option<f32> {
        let value = self
            .groups_mut()
            .into_iter()
            .find_map(|g| g.scale(name, factor));
        if self.primary.contains(name) {
            self.recompute_dominant();
        }
        value
    }

    /// Multiply every primary and secondary emotion by `factor`.
    pub fn scale_all(&mut self, factor: f32) {
        self.primary.map_values(|_, v| v * factor);
        self.secondary.map_values(|_, v| v * factor);
        self.recompute_dominant();
    }

    /// Add `delta` to every primary and secondary emotion.
    pub fn add_all(&mut self, delta: f32) {
        self.primary.map_values(|_, v| v + delta);
        self.secondary.map_values(|_, v| v + delta);
        self.recompute_dominant();
    }

    /// Move every emotion and axis toward `baseline` by `fraction` of the gap.
    ///
    /// Entries missing from the baseline decay toward zero.
    pub fn decay_toward(&mut self, baseline: &Self, fraction: f32) {
        let fraction = clamp_unit(fraction);
        let pairs = [
            (&mut self.primary, &baseline.primary),
            (&mut self.secondary, &baseline.secondary),
            (&mut self.physiological, &baseline.physiological),
            (&mut self.cognitive, &baseline.cognitive),
            (&mut self.behavioral, &baseline.behavioral),
        ];
        for (current, base) in pairs {
            current.map_values(|name, v| {
                let target = base.get(name).unwrap_or(0.0);
                v + (target - v) * fraction
            });
        }
        self.recompute_dominant();
    }

    /// Sum of all primary and secondary intensities.
    #[must_use]
    pub fn total_intensity(&self) -> f32 {
        self.primary.sum() + self.secondary.sum()
    }

    /// Mean of all primary and secondary intensities.
    #[must_use]
    pub fn mean_intensity(&self) -> f32 {
        let n = self.primary.len() + self.secondary.len();
        if n == 0 {
            0.0
        } else {
            self.total_intensity() / n as f32
        }
    }

    /// Every primary and secondary emotion, primary first.
    pub fn emotions(&self) -> impl Iterator<Item = (&str, f32)> {
        self.primary.iter().chain(self.secondary.iter())
    }

    /// Whether every value in the vector lies in [0, 1].
    #[must_use]
    pub fn is_within_bounds(&self) -> bool {
        let unit = |v: f32| (0.0..=1.0).contains(&v);
        self.groups().iter().all(|g| g.iter().all(|(_, v)| unit(v)))
            && unit(self.coherence)
            && unit(self.regulation)
    }

    fn set_existing(&mut self, name: &str, value: f32) -> bool {
        for group in self.groups_mut() {
            if group.contains(name) {
                group.set(name, value);
                return true;
            }
        }
        false
    }

    fn groups(&self) -> [&EmotionMap; 5] {
        [
            &self.primary,
            &self.secondary,
            &self.physiological,
            &self.cognitive,
            &self.behavioral,
        ]
    }

    fn groups_mut(&mut self) -> [&mut EmotionMap; 5] {
        [
            &mut self.primary,
            &mut self.secondary,
            &mut self.physiological,
            &mut self.cognitive,
            &mut self.behavioral,
        ]
    }
}

impl Default for EmotionalStateVector {
    fn default() -> Self {
        Self::base()
    }
}
