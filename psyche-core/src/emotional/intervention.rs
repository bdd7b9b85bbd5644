//! Intervention validation: the debugging puzzle.
//!
//! The player types a free-text "patch" for an emotional thread. Each
//! intervention lists keyword requirements; a requirement is met when the
//! lowercased solution contains any of its keywords. The solution is
//! accepted when the share of met requirements reaches the acceptance
//! ratio (70% by default). Scoring is a pure function of its inputs.

use serde::{Deserialize, Serialize};

use crate::emotional::thread::VulnerabilityKind;

/// One keyword requirement of an intervention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requirement {
    /// Requirement name.
    pub name: &'static str,
    /// Any of these (case-insensitive substrings) satisfies it.
    pub keywords: &'static [&'static str],
    /// Hint shown when the requirement is not met.
    pub hint: &'static str,
}

/// The closed catalog of interventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionKind {
    /// Resolves `rumination_loop`.
    BreakRuminationLoop,
    /// Resolves `emotional_flooding`.
    ContainFlooding,
    /// Resolves `avoidance_spiral`.
    ApproachAvoidance,
    /// Resolves `suppression_leak`.
    ReleaseSuppression,
    /// Resolves `identity_fragmentation`.
    IntegrateIdentity,
}

const BREAK_RUMINATION: &[Requirement] = &[
    Requirement {
        name: "acknowledge",
        keywords: &["acknowledge", "accept", "recognize", "notice"],
        hint: "Acknowledge the loop before trying to leave it.",
    },
    Requirement {
        name: "reframe",
        keywords: &["reframe", "perspective", "meaning", "another way"],
        hint: "Offer a different perspective on what happened.",
    },
    Requirement {
        name: "interrupt",
        keywords: &["interrupt", "break", "stop", "exit"],
        hint: "Name a concrete way to break the cycle.",
    },
    Requirement {
        name: "ground",
        keywords: &["present", "breathe", "ground", "here and now"],
        hint: "Bring attention back to the present moment.",
    },
];

const CONTAIN_FLOODING: &[Requirement] = &[
    Requirement {
        name: "pace",
        keywords: &["slow", "pace", "one at a time", "gradual"],
        hint: "Slow the input down; not everything at once.",
    },
    Requirement {
        name: "safety",
        keywords: &["safe", "secure", "protect"],
        hint: "Establish that the character is safe right now.",
    },
    Requirement {
        name: "regulate",
        keywords: &["breathe", "calm", "regulate"],
        hint: "Give the body a way to calm down.",
    },
];

const APPROACH_AVOIDANCE: &[Requirement] = &[
    Requirement {
        name: "approach",
        keywords: &["face", "approach", "confront"],
        hint: "The fear has to be approached, not routed around.",
    },
    Requirement {
        name: "support",
        keywords: &["support", "help", "together", "friend"],
        hint: "Nobody has to do this alone.",
    },
    Requirement {
        name: "small_steps",
        keywords: &["step", "small", "gradual"],
        hint: "Break the approach into small steps.",
    },
];

const RELEASE_SUPPRESSION: &[Requirement] = &[
    Requirement {
        name: "express",
        keywords: &["express", "release", "let out", "voice"],
        hint: "The feeling needs an outlet.",
    },
    Requirement {
        name: "validate",
        keywords: &["valid", "allowed", "okay", "justified"],
        hint: "Tell the character the feeling is allowed.",
    },
    Requirement {
        name: "channel",
        keywords: &["channel", "direct", "constructive"],
        hint: "Point the energy somewhere constructive.",
    },
];

const INTEGRATE_IDENTITY: &[Requirement] = &[
    Requirement {
        name: "compassion",
        keywords: &["compassion", "kind", "forgive"],
        hint: "Start from self-compassion.",
    },
    Requirement {
        name: "separate",
        keywords: &["behavior", "action", "not who", "mistake"],
        hint: "Separate what was done from who they are.",
    },
    Requirement {
        name: "repair",
        keywords: &["repair", "amend", "make it right", "apologize"],
        hint: "Suggest a way to make amends.",
    },
];

impl InterventionKind {
    /// Every intervention in catalog order.
    pub const ALL: [Self; 5] = [
        Self::BreakRuminationLoop,
        Self::ContainFlooding,
        Self::ApproachAvoidance,
        Self::ReleaseSuppression,
        Self::IntegrateIdentity,
    ];

    /// Wire name, e.g. `break_rumination_loop`.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::BreakRuminationLoop => "break_rumination_loop",
            Self::ContainFlooding => "contain_flooding",
            Self::ApproachAvoidance => "approach_avoidance",
            Self::ReleaseSuppression => "release_suppression",
            Self::IntegrateIdentity => "integrate_identity",
        }
    }

    /// Parse a wire name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    /// Keyword requirements.
    #[must_use]
    pub fn requirements(self) -> &'static [Requirement] {
        match self {
            Self::BreakRuminationLoop => BREAK_RUMINATION,
            Self::ContainFlooding => CONTAIN_FLOODING,
            Self::ApproachAvoidance => APPROACH_AVOIDANCE,
            Self::ReleaseSuppression => RELEASE_SUPPRESSION,
            Self::IntegrateIdentity => INTEGRATE_IDENTITY,
        }
    }

    /// Issues removed from the thread on success. Every intervention
    /// resolves at least one issue.
    #[must_use]
    pub fn resolves(self) -> &'static [VulnerabilityKind] {
        match self {
            Self::BreakRuminationLoop => &[VulnerabilityKind::RuminationLoop],
            Self::ContainFlooding => &[VulnerabilityKind::EmotionalFlooding],
            Self::ApproachAvoidance => &[VulnerabilityKind::AvoidanceSpiral],
            Self::ReleaseSuppression => &[VulnerabilityKind::SuppressionLeak],
            Self::IntegrateIdentity => &[VulnerabilityKind::IdentityFragmentation],
        }
    }
}

/// Result of scoring one solution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolutionScore {
    /// Names of satisfied requirements.
    pub matched: Vec<&'static str>,
    /// Hints for unsatisfied requirements, in catalog order.
    pub hints: Vec<String>,
    /// Total number of requirements.
    pub total: usize,
    /// Whether the solution passes.
    pub accepted: bool,
}

/// Score `solution` against `requirements`.
///
/// Accepted iff `matched / total >= acceptance`, evaluated in integer
/// per-mille so that the boundary is exact.
#[must_use]
pub fn score_solution(requirements: &[Requirement], solution: &str, acceptance: f32) -> SolutionScore {
    let lowered = solution.to_lowercase();
    let mut matched = Vec::new();
    let mut hints = Vec::new();
    for requirement in requirements {
        if requirement.keywords.iter().any(|k| lowered.contains(k)) {
            matched.push(requirement.name);
        } else {
            hints.push(requirement.hint.to_string());
        }
    }
    let total = requirements.len();
    let permille = (f64::from(acceptance) * 1000.0).round() as usize;
    let accepted = total > 0 && matched.len() * 1000 >= total * permille;
    SolutionScore {
        matched,
        hints,
        total,
        accepted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_threshold_of_four_requirements() {
        let reqs = InterventionKind::BreakRuminationLoop.requirements();
        assert_eq!(reqs.len(), 4);

        // ceil(0.7 × 4) = 3 → accepted
        let three = score_solution(reqs, "I acknowledge it, reframe it and break the cycle", 0.7);
        assert_eq!(three.matched.len(), 3);
        assert!(three.accepted);
        assert_eq!(three.hints.len(), 1);

        // 2 → rejected
        let two = score_solution(reqs, "Acknowledge it and reframe it", 0.7);
        assert_eq!(two.matched.len(), 2);
        assert!(!two.accepted);
        assert_eq!(two.hints.len(), 2);
    }

    #[test]
    fn three_requirements_need_all_three() {
        let reqs = InterventionKind::ContainFlooding.requirements();
        let two = score_solution(reqs, "slow down, you are safe", 0.7);
        assert!(!two.accepted, "2/3 ≈ 0.67 < 0.7");
        let all = score_solution(reqs, "slow down, you are safe, breathe", 0.7);
        assert!(all.accepted);
    }

    #[test]
    fn matching_is_case_insensitive_substring() {
        let reqs = InterventionKind::ReleaseSuppression.requirements();
        let score = score_solution(reqs, "VOICE it, it is OKAY, then CHANNEL it", 0.7);
        assert!(score.accepted);
    }

    #[test]
    fn ten_requirement_boundary_is_exact() {
        const KEYS: [&[&str]; 10] = [
            &["k0"], &["k1"], &["k2"], &["k3"], &["k4"],
            &["k5"], &["k6"], &["k7"], &["k8"], &["k9"],
        ];
        let reqs: Vec<Requirement> = KEYS
            .iter()
            .map(|&keywords| Requirement { name: "r", keywords, hint: "h" })
            .collect();
        assert!(score_solution(&reqs, "k0 k1 k2 k3 k4 k5 k6", 0.7).accepted);
        assert!(!score_solution(&reqs, "k0 k1 k2 k3 k4 k5", 0.7).accepted);
    }

    #[test]
    fn names_round_trip() {
        for kind in InterventionKind::ALL {
            assert_eq!(InterventionKind::from_name(kind.name()), Some(kind));
        }
    }

    #[test]
    fn every_intervention_resolves_its_remedy() {
        for kind in InterventionKind::ALL {
            assert!(!kind.resolves().is_empty(), "{} resolves nothing", kind.name());
            for issue in kind.resolves() {
                assert_eq!(issue.remedy(), Some(kind));
            }
        }
    }
}
