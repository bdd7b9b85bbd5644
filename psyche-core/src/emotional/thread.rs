//! Emotional processing threads.
//!
//! A thread is the simulated work of digesting one significant input. It
//! walks a fixed stage sequence; while it runs it pushes on the emotional
//! state, and per-emotion vulnerabilities can surface as issues that slow
//! it down, destabilize it, or crash it outright.
//!
//! ```text
//! recognition → appraisal → response_generation → regulation → integration → completed
//! ```

use serde::{Deserialize, Serialize};

use crate::emotional::intervention::InterventionKind;
use crate::types::{clamp_unit, SimTime, ThreadId};

/// Progress added per tick is this times `processing_efficiency`.
pub const PROGRESS_PER_TICK: f32 = 0.1;
/// Scale of a thread's per-tick push on the state vector.
pub const IMPACT_SCALE: f32 = 0.02;

/// Stage of an emotional thread, in processing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadStage {
    /// Noticing the feeling.
    Recognition,
    /// Judging what it means.
    Appraisal,
    /// Choosing a response.
    ResponseGeneration,
    /// Bringing it under control.
    Regulation,
    /// Folding it into the self-narrative.
    Integration,
    /// Done; the thread is reaped.
    Completed,
}

impl ThreadStage {
    /// The following stage (`Completed` is terminal).
    #[must_use]
    pub fn next(self) -> Self {
        match self {
            Self::Recognition => Self::Appraisal,
            Self::Appraisal => Self::ResponseGeneration,
            Self::ResponseGeneration => Self::Regulation,
            Self::Regulation => Self::Integration,
            Self::Integration | Self::Completed => Self::Completed,
        }
    }

    /// Direction of the thread's impact on its emotion during this stage.
    #[must_use]
    pub fn impact_sign(self) -> f32 {
        match self {
            Self::Recognition | Self::Appraisal | Self::ResponseGeneration => 1.0,
            Self::Regulation | Self::Integration => -1.0,
            Self::Completed => 0.0,
        }
    }
}

/// Failure modes an emotional thread can develop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VulnerabilityKind {
    /// Grief or sadness stuck in appraisal.
    RuminationLoop,
    /// Overwhelming intensity with low stability.
    EmotionalFlooding,
    /// Fear or anxiety refusing to generate a response.
    AvoidanceSpiral,
    /// Anger escaping regulation.
    SuppressionLeak,
    /// Shame or guilt eroding the self-model.
    IdentityFragmentation,
    /// Fatal; the thread is destroyed.
    ThreadCrash,
}

impl VulnerabilityKind {
    /// Every vulnerability, checked in this order.
    pub const ALL: [Self; 6] = [
        Self::RuminationLoop,
        Self::EmotionalFlooding,
        Self::AvoidanceSpiral,
        Self::SuppressionLeak,
        Self::IdentityFragmentation,
        Self::ThreadCrash,
    ];

    /// Wire name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::RuminationLoop => "rumination_loop",
            Self::EmotionalFlooding => "emotional_flooding",
            Self::AvoidanceSpiral => "avoidance_spiral",
            Self::SuppressionLeak => "suppression_leak",
            Self::IdentityFragmentation => "identity_fragmentation",
            Self::ThreadCrash => "thread_crash",
        }
    }

    /// Whether this issue destroys the thread.
    #[must_use]
    pub fn is_fatal(self) -> bool {
        matches!(self, Self::ThreadCrash)
    }

    /// `(efficiency_penalty, stability_penalty)` applied on detection.
    #[must_use]
    pub fn penalties(self) -> (f32, f32) {
        match self {
            Self::RuminationLoop => (0.15, 0.1),
            Self::EmotionalFlooding => (0.1, 0.15),
            Self::AvoidanceSpiral => (0.1, 0.1),
            Self::SuppressionLeak => (0.05, 0.15),
            Self::IdentityFragmentation => (0.1, 0.2),
            Self::ThreadCrash => (0.0, 0.0),
        }
    }

    /// The intervention that resolves this issue.
    #[must_use]
    pub fn remedy(self) -> Option<InterventionKind> {
        match self {
            Self::RuminationLoop => Some(InterventionKind::BreakRuminationLoop),
            Self::EmotionalFlooding => Some(InterventionKind::ContainFlooding),
            Self::AvoidanceSpiral => Some(InterventionKind::ApproachAvoidance),
            Self::SuppressionLeak => Some(InterventionKind::ReleaseSuppression),
            Self::IdentityFragmentation => Some(InterventionKind::IntegrateIdentity),
            Self::ThreadCrash => None,
        }
    }

    /// Whether `thread` currently exhibits this vulnerability.
    #[must_use]
    pub fn detect(self, thread: &EmotionalThread) -> bool {
        let emotion = thread.emotion.as_str();
        match self {
            Self::RuminationLoop => {
                matches!(emotion, "grief" | "sadness")
                    && thread.stage == ThreadStage::Appraisal
                    && thread.stage_ticks >= 10
                    && thread.current_stage_progress < 0.6
            }
            Self::EmotionalFlooding => thread.intensity > 0.9 && thread.stability < 0.5,
            Self::AvoidanceSpiral => {
                matches!(emotion, "fear" | "anxiety")
                    && thread.stage == ThreadStage::ResponseGeneration
                    && thread.intensity > 0.7
            }
            Self::SuppressionLeak => {
                emotion == "anger" && thread.stage == ThreadStage::Regulation && thread.stability < 0.5
            }
            Self::IdentityFragmentation => {
                matches!(emotion, "shame" | "guilt")
                    && thread.stage == ThreadStage::Appraisal
                    && thread.stability < 0.4
            }
            Self::ThreadCrash => thread.stability < 0.1,
        }
    }
}

/// A detected issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadIssue {
    /// What went wrong.
    pub kind: VulnerabilityKind,
    /// Stage in which it appeared.
    pub stage: ThreadStage,
    /// When it appeared.
    pub detected_at: SimTime,
}

/// A remediation the player can attempt on a thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionPoint {
    /// Intervention to apply.
    pub intervention: InterventionKind,
    /// Issue it addresses.
    pub issue: VulnerabilityKind,
    /// Names of the keyword requirements.
    pub requirements: Vec<String>,
}

impl InterventionPoint {
    fn for_issue(issue: VulnerabilityKind) -> Option<Self> {
        let intervention = issue.remedy()?;
        Some(Self {
            intervention,
            issue,
            requirements: intervention
                .requirements()
                .iter()
                .map(|r| r.name.to_string())
                .collect(),
        })
    }
}

/// What one tick did to a thread.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThreadStep {
    /// Signed intensity change to apply to the thread's emotion.
    pub impact: f32,
    /// `(from, to)` if the stage advanced.
    pub stage_change: Option<(ThreadStage, ThreadStage)>,
    /// Issues detected this tick.
    pub new_issues: Vec<VulnerabilityKind>,
}

/// In-progress processing of one emotionally significant input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionalThread {
    /// Handle within the engine.
    pub id: ThreadId,
    /// Emotion being processed.
    pub emotion: String,
    /// Intensity of the originating input.
    pub intensity: f32,
    /// Current stage.
    pub stage: ThreadStage,
    /// Progress through the current stage, in [0, 1).
    pub current_stage_progress: f32,
    /// Ticks spent in the current stage.
    pub stage_ticks: u32,
    /// Stability in [0, 1].
    pub stability: f32,
    /// Processing efficiency in [0, 1].
    pub processing_efficiency: f32,
    /// Open issues.
    pub issues: Vec<ThreadIssue>,
    /// Remediations available for open issues.
    pub intervention_points: Vec<InterventionPoint>,
    /// Debugger-visible progress notes.
    pub debug_log: Vec<String>,
    /// Creation time.
    pub created_at: SimTime,
}

impl EmotionalThread {
    /// Spawn a thread in `recognition`.
    #[must_use]
    pub fn spawn(id: ThreadId, emotion: &str, intensity: f32, efficiency: f32, now: SimTime) -> Self {
        let intensity = clamp_unit(intensity);
        Self {
            id,
            emotion: emotion.to_string(),
            intensity,
            stage: ThreadStage::Recognition,
            current_stage_progress: 0.0,
            stage_ticks: 0,
            stability: clamp_unit(1.0 - intensity * 0.4),
            processing_efficiency: clamp_unit(efficiency),
            issues: Vec::new(),
            intervention_points: Vec::new(),
            debug_log: Vec::new(),
            created_at: now,
        }
    }

    /// Discount applied to impact for each open issue.
    #[must_use]
    pub fn issue_discount(&self) -> f32 {
        1.0 / (1.0 + 0.5 * self.issues.len() as f32)
    }

    /// Signed impact on the state vector at the current stage.
    #[must_use]
    pub fn impact(&self) -> f32 {
        self.intensity * self.stability * self.issue_discount() * IMPACT_SCALE * self.stage.impact_sign()
    }

    /// Whether the thread has an issue of `kind`.
    #[must_use]
    pub fn has_issue(&self, kind: VulnerabilityKind) -> bool {
        self.issues.iter().any(|i| i.kind == kind)
    }

    /// Whether the thread reached `completed`.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.stage == ThreadStage::Completed
    }

    /// Whether the thread carries a fatal issue.
    #[must_use]
    pub fn is_crashed(&self) -> bool {
        self.issues.iter().any(|i| i.kind.is_fatal())
    }

    /// Whether the player can intervene on this thread.
    #[must_use]
    pub fn is_debuggable(&self) -> bool {
        !self.is_completed() && !self.is_crashed() && !self.issues.is_empty()
    }

    /// Run one tick: compute impact, advance progress, detect issues.
    pub fn step(&mut self, now: SimTime) -> ThreadStep {
        let mut step = ThreadStep::default();
        if self.is_completed() || self.is_crashed() {
            return step;
        }

        step.impact = self.impact();

        self.current_stage_progress += PROGRESS_PER_TICK * self.processing_efficiency;
        self.stage_ticks += 1;
        if self.current_stage_progress >= 1.0 {
            let from = self.stage;
            self.stage = from.next();
            self.current_stage_progress = 0.0;
            self.stage_ticks = 0;
            step.stage_change = Some((from, self.stage));
        }

        if !self.is_completed() {
            for kind in VulnerabilityKind::ALL {
                if !self.has_issue(kind) && kind.detect(self) {
                    self.flag_issue(kind, now);
                    step.new_issues.push(kind);
                }
            }
        }
        step
    }

    /// Record an issue and apply its efficiency/stability penalties.
    pub fn flag_issue(&mut self, kind: VulnerabilityKind, now: SimTime) {
        let (efficiency_penalty, stability_penalty) = kind.penalties();
        self.processing_efficiency = clamp_unit(self.processing_efficiency - efficiency_penalty);
        self.stability = clamp_unit(self.stability - stability_penalty);
        self.issues.push(ThreadIssue {
            kind,
            stage: self.stage,
            detected_at: now,
        });
        if let Some(point) = InterventionPoint::for_issue(kind) {
            self.intervention_points.push(point);
        }
    }

    /// Remove issues of the given kinds. Returns how many were removed.
    pub fn resolve(&mut self, kinds: &[VulnerabilityKind]) -> usize {
        let before = self.issues.len();
        self.issues.retain(|i| !kinds.contains(&i.kind));
        self.intervention_points.retain(|p| !kinds.contains(&p.issue));
        before - self.issues.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thread(emotion: &str, intensity: f32) -> EmotionalThread {
        EmotionalThread::spawn(ThreadId(1), emotion, intensity, 0.8, SimTime(0))
    }

    #[test]
    fn first_tick_progress_is_point_zero_eight() {
        let mut t = thread("grief", 0.95);
        let step = t.step(SimTime(100));
        assert!((t.current_stage_progress - 0.08).abs() < 1e-6);
        assert!(step.new_issues.is_empty());
        assert!(step.impact > 0.0);
    }

    #[test]
    fn stages_advance_in_order_until_completed() {
        let mut t = thread("joy", 0.65);
        let mut seen = vec![t.stage];
        for i in 0..200 {
            if let Some((_, to)) = t.step(SimTime(i * 100)).stage_change {
                seen.push(to);
            }
            if t.is_completed() {
                break;
            }
        }
        assert_eq!(
            seen,
            vec![
                ThreadStage::Recognition,
                ThreadStage::Appraisal,
                ThreadStage::ResponseGeneration,
                ThreadStage::Regulation,
                ThreadStage::Integration,
                ThreadStage::Completed,
            ]
        );
    }

    #[test]
    fn stalled_grief_appraisal_becomes_rumination() {
        let mut t = thread("grief", 0.7);
        t.stage = ThreadStage::Appraisal;
        t.processing_efficiency = 0.4;
        for i in 0..10 {
            t.step(SimTime(i));
        }
        assert!(t.has_issue(VulnerabilityKind::RuminationLoop));
        assert!(t.is_debuggable());
        assert_eq!(t.intervention_points[0].intervention, InterventionKind::BreakRuminationLoop);
        assert!(t.processing_efficiency < 0.4, "issue discounts efficiency");
    }

    #[test]
    fn low_stability_crashes_thread() {
        let mut t = thread("anger", 0.9);
        t.stability = 0.05;
        let step = t.step(SimTime(0));
        assert!(step.new_issues.contains(&VulnerabilityKind::ThreadCrash));
        assert!(t.is_crashed());
        assert!(!t.is_debuggable());
        assert_eq!(t.step(SimTime(1)), ThreadStep::default(), "crashed threads do not run");
    }

    #[test]
    fn regulation_stage_impact_is_negative() {
        let mut t = thread("fear", 0.7);
        t.stage = ThreadStage::Regulation;
        assert!(t.impact() < 0.0);
    }

    #[test]
    fn resolve_removes_issue_and_point() {
        let mut t = thread("fear", 0.8);
        t.flag_issue(VulnerabilityKind::AvoidanceSpiral, SimTime(0));
        assert_eq!(t.resolve(&[VulnerabilityKind::AvoidanceSpiral]), 1);
        assert!(t.issues.is_empty());
        assert!(t.intervention_points.is_empty());
    }
}
