//! # Emotional Engine
//!
//! Owns one character's [`EmotionalStateVector`] and everything that moves
//! it: the input queue, decay toward baseline, regulation strategies,
//! suppression mechanisms, triggers and the emotional processing threads
//! the player debugs through interventions.
//!
//! The engine never reads a wall clock. The instance controller passes the
//! simulated time into [`EmotionalEngine::tick`] and every duration or
//! cooldown is measured against it.

pub mod intervention;
pub mod regulation;
pub mod state;
pub mod thread;
pub mod triggers;

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::EmotionalConfig;
use crate::error::{PsycheError, Result};
use crate::log::{null_log, LogCategory, LogLevel, LogRecord, SharedLog};
use crate::types::{clamp_unit, Advisory, ResourceUsage, SimTime, ThreadId, SECOND_MS};

pub use intervention::{score_solution, InterventionKind, Requirement, SolutionScore};
pub use regulation::{ActiveRegulation, RegulationStrategy, SideEffect, StrategyKind};
pub use state::{EmotionLevel, EmotionMap, EmotionalStateVector};
pub use thread::{EmotionalThread, InterventionPoint, ThreadIssue, ThreadStage, VulnerabilityKind};
pub use triggers::{SuppressionMechanism, Trigger};

/// Emotion pairs that pull coherence down when both are elevated.
pub const OPPOSING_PAIRS: [(&str, &str); 4] = [
    ("joy", "sadness"),
    ("anger", "fear"),
    ("hope", "anxiety"),
    ("love", "loneliness"),
];

/// Coherence lost per open thread issue.
const ISSUE_COHERENCE_COST: f32 = 0.05;
/// Fraction of the coherence gap closed per tick.
const COHERENCE_APPROACH: f32 = 0.1;
/// Regulation recovered per simulated second.
const REGULATION_RECOVERY_PER_SEC: f32 = 0.02;
/// Regulation lost per spawned thread.
const THREAD_SPAWN_REGULATION_COST: f32 = 0.02;
/// Minimum damping applied to queued inputs.
const MIN_DAMPING: f32 = 0.2;
/// Coherence lost per unit of processed input intensity.
const INPUT_COHERENCE_COST: f32 = 0.05;
/// Intervention success bonuses.
const INTERVENTION_STABILITY_BONUS: f32 = 0.2;
const INTERVENTION_EFFICIENCY_BONUS: f32 = 0.15;
/// Default step for the calm/intensify actions.
const DEFAULT_ACTION_AMOUNT: f32 = 0.2;

/// A request to feed an emotional stimulus into the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputRequest {
    /// Emotion name (case-insensitive).
    pub emotion: String,
    /// Intensity in [0, 1]; defaults to `default_input_intensity`.
    #[serde(default)]
    pub intensity: Option<f32>,
    /// How long the input stays queued; defaults to `default_input_duration_ms`.
    #[serde(default)]
    pub duration_ms: Option<u64>,
    /// Free-form origin, e.g. a story fragment id.
    #[serde(default)]
    pub source: Option<String>,
}

impl InputRequest {
    /// A request for `emotion` at `intensity`.
    #[must_use]
    pub fn new(emotion: impl Into<String>, intensity: f32) -> Self {
        Self {
            emotion: emotion.into(),
            intensity: Some(intensity),
            ..Self::default()
        }
    }
}

/// A normalized, queued input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionalInput {
    /// Sequential id.
    pub id: u64,
    /// Normalized emotion name.
    pub emotion: String,
    /// Intensity in [0, 1].
    pub intensity: f32,
    /// Queue lifetime.
    pub duration_ms: u64,
    /// Arrival time.
    pub received_at: SimTime,
    /// Whether the queue already applied it.
    pub processed: bool,
    /// Origin tag.
    pub source: Option<String>,
}

impl EmotionalInput {
    fn is_expired(&self, now: SimTime) -> bool {
        now.since(self.received_at) >= self.duration_ms
    }
}

/// What `process_emotional_input` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputReceipt {
    /// Queued input id.
    pub input_id: u64,
    /// Thread spawned for the input, if it crossed the spawn threshold.
    pub thread: Option<ThreadId>,
    /// Whether the immediate update path ran.
    pub immediate: bool,
}

/// A sample of the state vector recorded after each processed input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSample {
    /// When the sample was taken.
    pub timestamp: SimTime,
    /// Input that caused it.
    pub input_id: u64,
    /// Dominant emotion at the time.
    pub dominant: String,
    /// Coherence at the time.
    pub coherence: f32,
    /// Regulation at the time.
    pub regulation: f32,
    /// Primary emotions.
    pub primary: EmotionMap,
    /// Secondary emotions.
    pub secondary: EmotionMap,
}

/// Events reported from one engine tick.
#[derive(Debug, Clone, PartialEq)]
pub enum EmotionalEvent {
    /// A thread created for a strong input ran its first tick.
    ThreadSpawned {
        /// New thread.
        thread: ThreadId,
        /// Emotion being processed.
        emotion: String,
    },
    /// A thread moved to its next stage.
    ThreadStageChanged {
        /// Thread.
        thread: ThreadId,
        /// Previous stage.
        from: ThreadStage,
        /// New stage.
        to: ThreadStage,
    },
    /// A vulnerability surfaced on a thread.
    ThreadIssueDetected {
        /// Thread.
        thread: ThreadId,
        /// Issue kind.
        issue: VulnerabilityKind,
    },
    /// A thread reached `completed` and was reaped.
    ThreadCompleted {
        /// Thread.
        thread: ThreadId,
    },
    /// A thread crashed and was destroyed.
    ThreadCrashed {
        /// Thread.
        thread: ThreadId,
        /// Emotion it was processing.
        emotion: String,
    },
    /// A trigger crossed its threshold.
    TriggerFired {
        /// Trigger name.
        trigger: String,
        /// Emotion that fired it.
        emotion: String,
        /// Intensity at the time.
        intensity: f32,
    },
    /// A timed regulation finished and applied its side effects.
    RegulationCompleted {
        /// Strategy.
        kind: StrategyKind,
        /// Target emotion.
        target: String,
    },
    /// The dominant emotion changed during the tick.
    DominantChanged {
        /// Previous dominant emotion.
        from: String,
        /// New dominant emotion.
        to: String,
    },
}

/// Serializable form of the whole engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionalSnapshot {
    /// Whether `initialize` ran.
    pub initialized: bool,
    /// Engine clock.
    pub now: SimTime,
    /// Current state.
    pub state: EmotionalStateVector,
    /// Baseline the state decays toward.
    pub baseline: EmotionalStateVector,
    /// Strategies with their cooldowns.
    pub strategies: Vec<RegulationStrategy>,
    /// Timed regulations in progress.
    pub active_regulations: Vec<ActiveRegulation>,
    /// Trigger table.
    pub triggers: Vec<Trigger>,
    /// Suppression table.
    pub mechanisms: Vec<SuppressionMechanism>,
    /// Live threads, ordered by id.
    pub threads: Vec<EmotionalThread>,
    /// Input queue.
    pub queue: Vec<EmotionalInput>,
    /// Recent samples.
    pub history: Vec<StateSample>,
    /// Next thread id.
    pub next_thread_id: u64,
    /// Next input id.
    pub next_input_id: u64,
    /// Next regulation id.
    pub next_regulation_id: u64,
}

/// The emotional engine of one instance.
pub struct EmotionalEngine {
    config: EmotionalConfig,
    log: SharedLog,
    initialized: bool,
    now: SimTime,
    baseline: EmotionalStateVector,
    state: EmotionalStateVector,
    strategies: Vec<RegulationStrategy>,
    active_regulations: Vec<ActiveRegulation>,
    triggers: Vec<Trigger>,
    mechanisms: Vec<SuppressionMechanism>,
    threads: BTreeMap<ThreadId, EmotionalThread>,
    queue: Vec<EmotionalInput>,
    history: VecDeque<StateSample>,
    next_thread_id: u64,
    next_input_id: u64,
    next_regulation_id: u64,
}

impl std::fmt::Debug for EmotionalEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmotionalEngine")
            .field("initialized", &self.initialized)
            .field("now", &self.now)
            .field("dominant", &self.state.dominant)
            .field("threads", &self.threads.len())
            .field("queue", &self.queue.len())
            .finish_non_exhaustive()
    }
}

impl EmotionalEngine {
    /// Create an engine with the default (discarding) system log.
    #[must_use]
    pub fn new(config: EmotionalConfig) -> Self {
        Self::with_log(config, null_log())
    }

    /// Create an engine that reports to `log`.
    #[must_use]
    pub fn with_log(config: EmotionalConfig, log: SharedLog) -> Self {
        let baseline = EmotionalStateVector::with_overrides(&config.baseline);
        Self {
            state: baseline.clone(),
            baseline,
            config,
            log,
            initialized: false,
            now: SimTime::ZERO,
            strategies: regulation::default_strategies(),
            active_regulations: Vec::new(),
            triggers: triggers::default_triggers(),
            mechanisms: triggers::default_mechanisms(),
            threads: BTreeMap::new(),
            queue: Vec::new(),
            history: VecDeque::new(),
            next_thread_id: 1,
            next_input_id: 1,
            next_regulation_id: 1,
        }
    }

    /// Reset the state to baseline and start accepting input.
    pub fn initialize(&mut self) {
        self.state = self.baseline.clone();
        self.initialized = true;
        info!(dominant = %self.state.dominant, "Emotional engine initialized");
        self.emit(LogLevel::Info, "Emotional engine online");
    }

    /// Whether `initialize` ran.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Current state vector.
    #[must_use]
    pub fn state(&self) -> &EmotionalStateVector {
        &self.state
    }

    /// The baseline the state decays toward.
    #[must_use]
    pub fn baseline(&self) -> &EmotionalStateVector {
        &self.baseline
    }

    /// Engine clock.
    #[must_use]
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Move the engine clock without running a tick.
    pub fn set_time(&mut self, now: SimTime) {
        self.now = self.now.max(now);
    }

    /// Live threads, ordered by id.
    pub fn threads(&self) -> impl Iterator<Item = &EmotionalThread> {
        self.threads.values()
    }

    /// One thread by id.
    #[must_use]
    pub fn thread(&self, id: ThreadId) -> Option<&EmotionalThread> {
        self.threads.get(&id)
    }

    /// Threads the player can intervene on.
    #[must_use]
    pub fn get_debuggable_threads(&self) -> Vec<&EmotionalThread> {
        self.threads.values().filter(|t| t.is_debuggable()).collect()
    }

    /// Regulation strategies.
    #[must_use]
    pub fn strategies(&self) -> &[RegulationStrategy] {
        &self.strategies
    }

    /// Timed regulations in progress.
    #[must_use]
    pub fn active_regulations(&self) -> &[ActiveRegulation] {
        &self.active_regulations
    }

    /// Suppression mechanisms.
    #[must_use]
    pub fn mechanisms(&self) -> &[SuppressionMechanism] {
        &self.mechanisms
    }

    /// Trigger table.
    #[must_use]
    pub fn triggers(&self) -> &[Trigger] {
        &self.triggers
    }

    /// Recent state samples, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &StateSample> {
        self.history.iter()
    }

    /// Queued inputs, including processed ones that have not expired.
    #[must_use]
    pub fn queue(&self) -> &[EmotionalInput] {
        &self.queue
    }

    /// Open issues across all live threads.
    #[must_use]
    pub fn open_issue_count(&self) -> usize {
        self.threads.values().map(|t| t.issues.len()).sum()
    }

    /// Simulated load of the engine.
    #[must_use]
    pub fn usage(&self) -> ResourceUsage {
        let threads = u32::try_from(self.threads.len()).unwrap_or(u32::MAX);
        let queued = self.queue.iter().filter(|i| !i.processed).count() as f32;
        ResourceUsage {
            cpu: threads as f32 * 5.0
                + self.active_regulations.len() as f32 * 2.0
                + queued
                + self.state.total_intensity() * 2.0,
            memory: self.threads.len() as u64 * 256
                + self.queue.len() as u64 * 32
                + self.history.len() as u64 * 16,
            threads,
        }
    }

    // -----------------------------------------------------------------------
    // Input
    // -----------------------------------------------------------------------

    /// Normalize and enqueue an input.
    ///
    /// Inputs above `thread_spawn_threshold` spawn a processing thread; above
    /// `immediate_update_threshold` the state is also updated right away.
    ///
    /// # Errors
    ///
    /// `NotInitialized` before `initialize`, `InvalidParameter` for an
    /// empty emotion name.
    pub fn process_emotional_input(&mut self, request: InputRequest) -> Result<InputReceipt> {
        self.ensure_initialized()?;
        let emotion = request.emotion.trim().to_lowercase();
        if emotion.is_empty() {
            return Err(PsycheError::invalid_param("emotional_input", "emotion name is empty"));
        }
        let intensity = clamp_unit(request.intensity.unwrap_or(self.config.default_input_intensity));
        let input = EmotionalInput {
            id: self.next_input_id,
            emotion: emotion.clone(),
            intensity,
            duration_ms: request.duration_ms.unwrap_or(self.config.default_input_duration_ms),
            received_at: self.now,
            processed: false,
            source: request.source,
        };
        self.next_input_id += 1;
        let input_id = input.id;
        self.queue.push(input);

        let thread = (intensity > self.config.thread_spawn_threshold)
            .then(|| self.spawn_thread(&emotion, intensity));

        let immediate = intensity > self.config.immediate_update_threshold;
        if immediate {
            self.state
                .adjust_emotion(&emotion, intensity * self.config.input_weight);
        }

        debug!(input_id, emotion = %emotion, intensity, ?thread, immediate, "Emotional input queued");
        Ok(InputReceipt {
            input_id,
            thread,
            immediate,
        })
    }

    fn spawn_thread(&mut self, emotion: &str, intensity: f32) -> ThreadId {
        let id = ThreadId(self.next_thread_id);
        self.next_thread_id += 1;
        let thread = EmotionalThread::spawn(
            id,
            emotion,
            intensity,
            self.config.thread_base_efficiency,
            self.now,
        );
        self.threads.insert(id, thread);
        self.state.regulation = clamp_unit(self.state.regulation - THREAD_SPAWN_REGULATION_COST);
        self.emit_detail(
            LogLevel::Info,
            format!("Spawned emotional thread for {emotion}"),
            format!("{id} intensity={intensity:.2}"),
        );
        id
    }

    /// Damping for inputs on `emotion` from timed regulations in progress.
    #[must_use]
    pub fn damping_for(&self, emotion: &str) -> f32 {
        let total: f32 = self
            .active_regulations
            .iter()
            .filter(|r| r.target == emotion)
            .map(|r| r.current_effect(self.now))
            .sum();
        (1.0 - total).max(MIN_DAMPING)
    }

    /// Apply every unprocessed input once and drop expired inputs.
    pub fn process_emotional_queue(&mut self) -> Vec<EmotionalEvent> {
        let mut events = Vec::new();
        let pending: Vec<usize> = self
            .queue
            .iter()
            .enumerate()
            .filter(|(_, i)| !i.processed)
            .map(|(idx, _)| idx)
            .collect();

        for idx in pending {
            let (id, emotion, intensity) = {
                let input = &mut self.queue[idx];
                input.processed = true;
                (input.id, input.emotion.clone(), input.intensity)
            };
            let damping = self.damping_for(&emotion);
            self.state
                .adjust_emotion(&emotion, intensity * self.config.input_weight * damping);
            self.state.coherence = clamp_unit(self.state.coherence - intensity * INPUT_COHERENCE_COST);
            events.extend(self.check_triggers());
            self.record_sample(id);
        }

        let now = self.now;
        self.queue.retain(|i| !i.is_expired(now));
        events
    }

    fn check_triggers(&mut self) -> Vec<EmotionalEvent> {
        let mut fired = Vec::new();
        for trigger in &mut self.triggers {
            if let Some((emotion, intensity)) =
                trigger.evaluate(&self.state, self.now, self.config.trigger_refractory_ms)
            {
                fired.push(EmotionalEvent::TriggerFired {
                    trigger: trigger.name.clone(),
                    emotion,
                    intensity,
                });
            }
        }
        for event in &fired {
            if let EmotionalEvent::TriggerFired { trigger, emotion, intensity } = event {
                self.emit_detail(
                    LogLevel::Warning,
                    format!("Trigger '{trigger}' activated"),
                    format!("{emotion}={intensity:.2}"),
                );
            }
        }
        fired
    }

    fn record_sample(&mut self, input_id: u64) {
        self.history.push_back(StateSample {
            timestamp: self.now,
            input_id,
            dominant: self.state.dominant.clone(),
            coherence: self.state.coherence,
            regulation: self.state.regulation,
            primary: self.state.primary.clone(),
            secondary: self.state.secondary.clone(),
        });
        while self.history.len() > self.config.history_limit {
            self.history.pop_front();
        }
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Advance the engine to `now`, `delta_ms` after the previous tick.
    pub fn tick(&mut self, now: SimTime, delta_ms: u64) -> Vec<EmotionalEvent> {
        if !self.initialized {
            return Vec::new();
        }
        self.set_time(now);
        let secs = delta_ms as f32 / SECOND_MS as f32;
        let dominant_before = self.state.dominant.clone();

        let mut events = self.process_emotional_queue();
        events.extend(self.step_threads());
        events.extend(self.step_regulations(delta_ms));

        self.state
            .decay_toward(&self.baseline, self.config.decay_rate_per_sec * secs);
        self.recover_regulation(secs);
        self.update_coherence();

        if self.state.dominant != dominant_before {
            events.push(EmotionalEvent::DominantChanged {
                from: dominant_before,
                to: self.state.dominant.clone(),
            });
        }
        events
    }

    fn step_threads(&mut self) -> Vec<EmotionalEvent> {
        let mut events = Vec::new();
        let mut reaped = Vec::new();
        let now = self.now;

        for (id, thread) in &mut self.threads {
            if thread.stage == ThreadStage::Recognition && thread.stage_ticks == 0 {
                events.push(EmotionalEvent::ThreadSpawned {
                    thread: *id,
                    emotion: thread.emotion.clone(),
                });
            }
            let step = thread.step(now);
            if step.impact != 0.0 {
                self.state.adjust_emotion(&thread.emotion, step.impact);
            }
            if let Some((from, to)) = step.stage_change {
                thread.debug_log.push(format!("{now}: {from:?} -> {to:?}"));
                events.push(EmotionalEvent::ThreadStageChanged { thread: *id, from, to });
            }
            for issue in step.new_issues {
                thread.debug_log.push(format!("{now}: detected {}", issue.name()));
                events.push(EmotionalEvent::ThreadIssueDetected { thread: *id, issue });
            }
            if thread.is_completed() || thread.is_crashed() {
                reaped.push(*id);
            }
        }

        for id in reaped {
            let Some(thread) = self.threads.remove(&id) else {
                continue;
            };
            if thread.is_crashed() {
                self.emit_detail(
                    LogLevel::Error,
                    format!("Emotional thread crashed while processing {}", thread.emotion),
                    id.to_string(),
                );
                events.push(EmotionalEvent::ThreadCrashed {
                    thread: id,
                    emotion: thread.emotion,
                });
            } else {
                self.emit_detail(
                    LogLevel::Info,
                    format!("Finished processing {}", thread.emotion),
                    id.to_string(),
                );
                events.push(EmotionalEvent::ThreadCompleted { thread: id });
            }
        }
        events
    }

    fn step_regulations(&mut self, delta_ms: u64) -> Vec<EmotionalEvent> {
        let now = self.now;
        for regulation in &self.active_regulations {
            regulation.apply_tick(&mut self.state, now, delta_ms);
        }

        let (finished, running): (Vec<_>, Vec<_>) = std::mem::take(&mut self.active_regulations)
            .into_iter()
            .partition(|r| r.is_complete(now));
        self.active_regulations = running;

        let mut events = Vec::new();
        for regulation in finished {
            for effect in regulation.kind.side_effects() {
                if effect.apply(&mut self.state) {
                    self.emit_detail(
                        LogLevel::Warning,
                        format!("Rebound risk after suppressing {}", regulation.target),
                        regulation.kind.name(),
                    );
                }
            }
            events.push(EmotionalEvent::RegulationCompleted {
                kind: regulation.kind,
                target: regulation.target,
            });
        }
        events
    }

    fn recover_regulation(&mut self, secs: f32) {
        let target = self.baseline.regulation;
        let step = REGULATION_RECOVERY_PER_SEC * secs;
        let gap = target - self.state.regulation;
        self.state.regulation = clamp_unit(self.state.regulation + gap.clamp(-step, step));
    }

    /// Coherence the state is drifting toward.
    #[must_use]
    pub fn coherence_target(&self) -> f32 {
        let conflict: f32 = OPPOSING_PAIRS
            .iter()
            .map(|(a, b)| {
                let a = self.state.intensity(a).unwrap_or(0.0);
                let b = self.state.intensity(b).unwrap_or(0.0);
                a.min(b)
            })
            .sum();
        clamp_unit(1.0 - conflict - ISSUE_COHERENCE_COST * self.open_issue_count() as f32)
    }

    fn update_coherence(&mut self) {
        let target = self.coherence_target();
        self.state.coherence =
            clamp_unit(self.state.coherence + (target - self.state.coherence) * COHERENCE_APPROACH);
    }

    // -----------------------------------------------------------------------
    // Regulation & suppression
    // -----------------------------------------------------------------------

    /// Instantly apply a named strategy to `targets` (all emotions if empty).
    ///
    /// # Errors
    ///
    /// `NotInitialized` before `initialize`. Unknown strategies and
    /// strategies on cooldown are reported as failed advisories.
    pub fn apply_regulation_strategy(&mut self, strategy: &str, targets: &[String]) -> Result<Advisory> {
        self.ensure_initialized()?;
        let now = self.now;
        let Some(entry) = StrategyKind::from_name(strategy)
            .and_then(|kind| self.strategies.iter_mut().find(|s| s.kind == kind))
        else {
            return Ok(unknown_strategy(strategy));
        };
        if !entry.is_available(now) {
            let remaining = entry.remaining_cooldown(now);
            return Ok(Advisory::fail(format!(
                "{strategy} is on cooldown for another {remaining}ms"
            )));
        }
        entry.apply(&mut self.state, targets, now);
        self.emit(LogLevel::Info, format!("Applied {strategy}"));
        Ok(Advisory::ok(format!("{strategy} applied")))
    }

    /// Start a timed regulation of `target` lasting `duration_ms`.
    ///
    /// # Errors
    ///
    /// `NotInitialized` before `initialize`; `InvalidParameter` for an
    /// emotion the state does not track.
    pub fn apply_emotional_regulation(
        &mut self,
        strategy: &str,
        target: &str,
        duration_ms: u64,
    ) -> Result<Advisory> {
        self.ensure_initialized()?;
        if self.state.intensity(target).is_none() {
            return Err(PsycheError::invalid_param(
                "regulate",
                format!("unknown emotion '{target}'"),
            ));
        }
        let now = self.now;
        let Some(entry) = StrategyKind::from_name(strategy)
            .and_then(|kind| self.strategies.iter_mut().find(|s| s.kind == kind))
        else {
            return Ok(unknown_strategy(strategy));
        };
        if !entry.is_available(now) {
            return Ok(Advisory::fail(format!("{strategy} is on cooldown")));
        }
        entry.last_used = Some(now);
        let regulation = ActiveRegulation {
            id: self.next_regulation_id,
            kind: entry.kind,
            target: target.to_string(),
            strength: entry.effectiveness,
            started_at: now,
            duration_ms,
        };
        self.next_regulation_id += 1;
        self.active_regulations.push(regulation);
        self.emit(
            LogLevel::Info,
            format!("Regulating {target} with {strategy} for {duration_ms}ms"),
        );
        Ok(Advisory::ok(format!("{strategy} started on {target}")))
    }

    /// Run a suppression mechanism, optionally on one emotion only.
    ///
    /// # Errors
    ///
    /// `NotInitialized` before `initialize`. Unknown mechanisms and
    /// emotions the mechanism does not cover are failed advisories.
    pub fn apply_suppression(&mut self, mechanism: &str, emotion: Option<&str>) -> Result<Advisory> {
        self.ensure_initialized()?;
        let now = self.now;
        let available: Vec<String> = self.mechanisms.iter().map(|m| m.name.clone()).collect();
        let Some(entry) = self.mechanisms.iter_mut().find(|m| m.name == mechanism) else {
            return Ok(Advisory::fail_with_hints(
                format!("Unknown suppression mechanism '{mechanism}'"),
                available,
            ));
        };
        if let Some(e) = emotion {
            if !entry.covers(e) {
                return Ok(Advisory::fail_with_hints(
                    format!("{mechanism} cannot suppress {e}"),
                    entry.emotions.clone(),
                ));
            }
        }
        let removed = entry.apply(&mut self.state, emotion, now);
        self.emit_detail(
            LogLevel::Warning,
            format!("Suppressed via {mechanism}"),
            format!("removed={removed:.3}"),
        );
        Ok(Advisory::ok(format!("{mechanism} removed {removed:.2} intensity")))
    }

    // -----------------------------------------------------------------------
    // Interventions
    // -----------------------------------------------------------------------

    /// Score a player's free-text solution for `intervention` on a thread.
    ///
    /// The intervention must be one of the thread's open intervention
    /// points. Never fails: missing or non-debuggable threads, unknown or
    /// mismatched interventions and rejected solutions all come back as
    /// advisories.
    pub fn apply_emotional_intervention(
        &mut self,
        thread_id: ThreadId,
        intervention: &str,
        solution: &str,
    ) -> Advisory {
        let Some(kind) = InterventionKind::from_name(intervention) else {
            return Advisory::fail_with_hints(
                format!("Unknown intervention '{intervention}'"),
                InterventionKind::ALL.iter().map(|k| k.name().to_string()).collect(),
            );
        };
        let acceptance = self.config.intervention_acceptance;
        let now = self.now;
        let Some(thread) = self.threads.get_mut(&thread_id) else {
            return Advisory::fail(format!("No emotional thread {thread_id}"));
        };
        if !thread.is_debuggable() {
            return Advisory::fail(format!("{thread_id} has nothing to debug"));
        }
        if !thread.intervention_points.iter().any(|p| p.intervention == kind) {
            let mut available: Vec<String> = thread
                .intervention_points
                .iter()
                .map(|p| p.intervention.name().to_string())
                .collect();
            available.dedup();
            thread
                .debug_log
                .push(format!("{now}: {} does not apply", kind.name()));
            return Advisory::fail_with_hints(
                format!("{} does not address any open issue on {thread_id}", kind.name()),
                available,
            );
        }

        let score = score_solution(kind.requirements(), solution, acceptance);
        if !score.accepted {
            thread.debug_log.push(format!(
                "{now}: {} rejected ({}/{})",
                kind.name(),
                score.matched.len(),
                score.total
            ));
            return Advisory::fail_with_hints(
                format!(
                    "Solution met {} of {} requirements",
                    score.matched.len(),
                    score.total
                ),
                score.hints,
            );
        }

        thread.stability = clamp_unit(thread.stability + INTERVENTION_STABILITY_BONUS);
        thread.processing_efficiency =
            clamp_unit(thread.processing_efficiency + INTERVENTION_EFFICIENCY_BONUS);
        let resolved = thread.resolve(kind.resolves());
        thread
            .debug_log
            .push(format!("{now}: {} applied, {resolved} issue(s) resolved", kind.name()));
        let emotion = thread.emotion.clone();
        self.emit_detail(
            LogLevel::Info,
            format!("Intervention {} succeeded on {emotion}", kind.name()),
            thread_id.to_string(),
        );
        Advisory::ok(format!("{} accepted; {resolved} issue(s) resolved", kind.name()))
    }

    // -----------------------------------------------------------------------
    // Player actions
    // -----------------------------------------------------------------------

    /// Lower one emotion (or every emotion) and settle arousal.
    ///
    /// # Errors
    ///
    /// `NotInitialized`, or `InvalidParameter` for an unknown emotion.
    pub fn calm(&mut self, emotion: Option<&str>, amount: Option<f32>) -> Result<Advisory> {
        self.ensure_initialized()?;
        let amount = clamp_unit(amount.unwrap_or(DEFAULT_ACTION_AMOUNT));
        match emotion {
            Some(e) => {
                self.require_emotion("calm", e)?;
                self.state.adjust_emotion(e, -amount);
            }
            None => self.state.scale_all(1.0 - amount),
        }
        self.state.adjust_emotion("arousal", -amount / 2.0);
        let target = emotion.unwrap_or("all emotions");
        self.emit(LogLevel::Info, format!("Calmed {target} by {amount:.2}"));
        Ok(Advisory::ok(format!("Calmed {target}")))
    }

    /// Raise one emotion and arousal.
    ///
    /// # Errors
    ///
    /// `NotInitialized`, or `InvalidParameter` for a missing or unknown emotion.
    pub fn intensify(&mut self, emotion: Option<&str>, amount: Option<f32>) -> Result<Advisory> {
        self.ensure_initialized()?;
        let Some(e) = emotion else {
            return Err(PsycheError::invalid_param("intensify", "emotion is required"));
        };
        self.require_emotion("intensify", e)?;
        let amount = clamp_unit(amount.unwrap_or(DEFAULT_ACTION_AMOUNT));
        let value = self.state.adjust_emotion(e, amount);
        self.state.adjust_emotion("arousal", amount / 2.0);
        self.emit(LogLevel::Warning, format!("Intensified {e} to {value:.2}"));
        Ok(Advisory::ok(format!("{e} is now {value:.2}")))
    }

    /// Pull the whole state halfway back to baseline.
    ///
    /// # Errors
    ///
    /// `NotInitialized`.
    pub fn balance(&mut self) -> Result<Advisory> {
        self.ensure_initialized()?;
        self.state.decay_toward(&self.baseline, 0.5);
        self.state.coherence = clamp_unit(self.state.coherence + 0.1);
        self.emit(LogLevel::Info, "Rebalanced emotional state");
        Ok(Advisory::ok("State rebalanced toward baseline"))
    }

    /// Suppress an emotion with a named mechanism.
    ///
    /// # Errors
    ///
    /// `NotInitialized`, or `InvalidParameter` when the emotion is missing.
    pub fn suppress(&mut self, emotion: Option<&str>, mechanism: Option<&str>) -> Result<Advisory> {
        self.ensure_initialized()?;
        let Some(e) = emotion else {
            return Err(PsycheError::invalid_param("suppress", "emotion is required"));
        };
        let mechanism = match mechanism {
            Some(m) => m.to_string(),
            None => match self.mechanisms.iter().find(|m| m.covers(e)) {
                Some(m) => m.name.clone(),
                None => {
                    return Ok(Advisory::fail(format!("No mechanism can suppress {e}")));
                }
            },
        };
        self.apply_suppression(&mechanism, Some(e))
    }

    /// Add `delta` to every emotion (used by error cascades).
    pub fn intensify_all(&mut self, delta: f32) {
        self.state.add_all(delta);
    }

    /// Destabilize every live thread by `amount`.
    pub fn destabilize_threads(&mut self, amount: f32) {
        for thread in self.threads.values_mut() {
            thread.stability = clamp_unit(thread.stability - amount);
        }
    }

    fn require_emotion(&self, action: &str, emotion: &str) -> Result<()> {
        if self.state.intensity(emotion).is_some() {
            Ok(())
        } else {
            Err(PsycheError::invalid_param(action, format!("unknown emotion '{emotion}'")))
        }
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(PsycheError::NotInitialized("emotional engine"))
        }
    }

    // -----------------------------------------------------------------------
    // Snapshot
    // -----------------------------------------------------------------------

    /// Capture the whole engine.
    #[must_use]
    pub fn capture_state(&self) -> EmotionalSnapshot {
        EmotionalSnapshot {
            initialized: self.initialized,
            now: self.now,
            state: self.state.clone(),
            baseline: self.baseline.clone(),
            strategies: self.strategies.clone(),
            active_regulations: self.active_regulations.clone(),
            triggers: self.triggers.clone(),
            mechanisms: self.mechanisms.clone(),
            threads: self.threads.values().cloned().collect(),
            queue: self.queue.clone(),
            history: self.history.iter().cloned().collect(),
            next_thread_id: self.next_thread_id,
            next_input_id: self.next_input_id,
            next_regulation_id: self.next_regulation_id,
        }
    }

    /// Replace the engine's state with a snapshot.
    pub fn restore_state(&mut self, snapshot: EmotionalSnapshot) {
        self.initialized = snapshot.initialized;
        self.now = snapshot.now;
        self.state = snapshot.state;
        self.baseline = snapshot.baseline;
        self.strategies = snapshot.strategies;
        self.active_regulations = snapshot.active_regulations;
        self.triggers = snapshot.triggers;
        self.mechanisms = snapshot.mechanisms;
        self.threads = snapshot.threads.into_iter().map(|t| (t.id, t)).collect();
        self.queue = snapshot.queue;
        self.history = snapshot.history.into();
        self.next_thread_id = snapshot.next_thread_id;
        self.next_input_id = snapshot.next_input_id;
        self.next_regulation_id = snapshot.next_regulation_id;
    }

    fn emit(&self, level: LogLevel, message: impl Into<String>) {
        self.log
            .record(LogRecord::new(self.now, level, LogCategory::Emotional, message));
    }

    fn emit_detail(&self, level: LogLevel, message: impl Into<String>, detail: impl Into<String>) {
        self.log.record(
            LogRecord::new(self.now, level, LogCategory::Emotional, message).with_detail(detail),
        );
    }
}

fn unknown_strategy(name: &str) -> Advisory {
    Advisory::fail_with_hints(
        format!("Unknown regulation strategy '{name}'"),
        StrategyKind::ALL.iter().map(|k| k.name().to_string()).collect(),
    )
}
