//! Property-Based Tests for the psyche runtime
//!
//! Uses `proptest` to check structural invariants under random input
//! sequences: capacity accounting, emotion clamping, dominant-emotion
//! idempotence, heuristic monotonicity, cooldown boundaries and the
//! intervention acceptance threshold.

use proptest::prelude::*;

use psyche_core::config::{EmotionalConfig, LedgerConfig};
use psyche_core::emotional::{score_solution, EmotionalEngine, InputRequest, InterventionKind, StrategyKind};
use psyche_core::instance::{ActionParams, InstanceController};
use psyche_core::ledger::{corruption_risk, leak_score, MemoryData, MemoryLedger, PoolKind};
use psyche_core::{PsycheConfig, SimTime, HOUR_MS, MINUTE_MS};

const EMOTIONS: [&str; 8] = ["joy", "sadness", "anger", "fear", "grief", "anxiety", "shame", "hope"];

// ---------------------------------------------------------------------------
// Strategy helpers
// ---------------------------------------------------------------------------

fn arb_emotion() -> impl Strategy<Value = &'static str> {
    prop::sample::select(EMOTIONS.to_vec())
}

fn arb_pool() -> impl Strategy<Value = PoolKind> {
    prop::sample::select(PoolKind::ALL.to_vec())
}

fn arb_memory() -> impl Strategy<Value = MemoryData> {
    (
        "[a-z ]{1,40}",
        prop::collection::vec(arb_emotion(), 0..4),
        0.0..=1.0f32,
        0usize..4,
    )
        .prop_map(|(description, emotions, intensity, sensory)| MemoryData {
            sensory_details: vec!["detail".to_string(); sensory],
            ..MemoryData::new(description, &emotions, intensity)
        })
}

#[derive(Debug, Clone)]
enum LedgerOp {
    Allocate(MemoryData, PoolKind),
    Delete(usize),
    Touch(&'static str),
    Advance(u64),
}

fn arb_ledger_op() -> impl Strategy<Value = LedgerOp> {
    prop_oneof![
        4 => (arb_memory(), arb_pool()).prop_map(|(m, p)| LedgerOp::Allocate(m, p)),
        1 => (0usize..64).prop_map(LedgerOp::Delete),
        1 => arb_emotion().prop_map(LedgerOp::Touch),
        2 => (1u64..(2 * HOUR_MS)).prop_map(LedgerOp::Advance),
    ]
}

fn engine() -> EmotionalEngine {
    let mut engine = EmotionalEngine::new(EmotionalConfig::default());
    engine.initialize();
    engine
}

// ---------------------------------------------------------------------------
// Property: allocated + available == total after every ledger mutation
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn capacity_is_always_consistent(ops in prop::collection::vec(arb_ledger_op(), 1..80)) {
        let mut ledger = MemoryLedger::new(LedgerConfig {
            total_capacity: 5_000,
            reserved: 500,
            ..LedgerConfig::default()
        });
        let mut now = SimTime::ZERO;
        for op in ops {
            match op {
                LedgerOp::Allocate(data, pool) => {
                    let _ = ledger.allocate_memory(data, pool);
                }
                LedgerOp::Delete(n) => {
                    let id = ledger.blocks().nth(n).map(|b| b.id);
                    if let Some(id) = id {
                        let _ = ledger.delete_memory(id);
                    }
                }
                LedgerOp::Touch(emotion) => {
                    let _ = ledger.retrieve_memories_by_emotion(emotion, 3);
                }
                LedgerOp::Advance(ms) => {
                    now = now.plus(ms);
                    let _ = ledger.tick(now, 0.5);
                }
            }
            let capacity = ledger.capacity();
            prop_assert_eq!(capacity.allocated + capacity.available, capacity.total);
            let stored: u64 = ledger.blocks().map(|b| b.size).sum();
            prop_assert_eq!(stored, capacity.allocated);
        }
    }

    #[test]
    fn allocation_reduces_available_by_block_size(data in arb_memory(), pool in arb_pool()) {
        let mut ledger = MemoryLedger::new(LedgerConfig::default());
        let expected = data.size();
        let before = ledger.capacity().available;
        let id = ledger.allocate_memory(data, pool).expect("default ledger fits one block");
        prop_assert_eq!(before - ledger.capacity().available, expected);
        prop_assert_eq!(ledger.get(id).map(|b| b.size), Some(expected));
    }
}

// ---------------------------------------------------------------------------
// Property: intensities stay within [0, 1]
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn emotions_stay_clamped(
        inputs in prop::collection::vec((arb_emotion(), 0.0..=1.0f32), 1..30),
        boosts in prop::collection::vec(-2.0..2.0f32, 0..5),
        ticks in 1usize..40,
    ) {
        let mut engine = engine();
        for (emotion, intensity) in inputs {
            engine
                .process_emotional_input(InputRequest::new(emotion, intensity))
                .expect("initialized");
        }
        for boost in boosts {
            engine.intensify_all(boost);
            prop_assert!(engine.state().is_within_bounds());
        }
        let targets = vec!["fear".to_string(), "grief".to_string()];
        engine
            .apply_regulation_strategy("cognitive_reappraisal", &targets)
            .expect("initialized");
        engine.apply_suppression("numbing", None).expect("initialized");
        for i in 0..ticks {
            let now = SimTime((i as u64 + 1) * 100);
            engine.tick(now, 100);
            prop_assert!(engine.state().is_within_bounds());
        }
    }

    #[test]
    fn dominant_is_idempotent(inputs in prop::collection::vec((arb_emotion(), 0.0..=1.0f32), 0..10)) {
        let mut engine = engine();
        for (emotion, intensity) in inputs {
            engine
                .process_emotional_input(InputRequest::new(emotion, intensity))
                .expect("initialized");
        }
        let mut state = engine.state().clone();
        let first = state.recompute_dominant().to_string();
        let second = state.recompute_dominant().to_string();
        prop_assert_eq!(first, second);
    }
}

// ---------------------------------------------------------------------------
// Property: leak score and corruption risk never decrease with age
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn heuristics_non_decreasing_in_age(
        data in arb_memory(),
        stability in 0.0..=1.0f32,
        a in 0u64..(48 * HOUR_MS),
        b in 0u64..(48 * HOUR_MS),
    ) {
        let (earlier, later) = if a <= b { (a, b) } else { (b, a) };
        let mut ledger = MemoryLedger::new(LedgerConfig::default());
        let id = ledger.allocate_memory(data, PoolKind::ShortTerm).expect("fits");
        let block = ledger.get(id).cloned().expect("stored");

        prop_assert!(leak_score(&block, SimTime(later)) >= leak_score(&block, SimTime(earlier)));
        prop_assert!(
            corruption_risk(&block, SimTime(later), stability)
                >= corruption_risk(&block, SimTime(earlier), stability)
        );
    }
}

// ---------------------------------------------------------------------------
// Property: cooldown boundary is exact
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn strategy_usable_exactly_at_cooldown(index in 0usize..5, start in 0u64..MINUTE_MS) {
        let kind = StrategyKind::ALL[index];
        let (_, cooldown) = kind.defaults();
        let mut engine = engine();
        let targets = vec!["sadness".to_string()];

        engine.set_time(SimTime(start));
        let first = engine.apply_regulation_strategy(kind.name(), &targets).expect("initialized");
        prop_assert!(first.success);

        engine.set_time(SimTime(start + cooldown - 1));
        let early = engine.apply_regulation_strategy(kind.name(), &targets).expect("initialized");
        prop_assert!(!early.success);

        engine.set_time(SimTime(start + cooldown));
        let on_time = engine.apply_regulation_strategy(kind.name(), &targets).expect("initialized");
        prop_assert!(on_time.success);
    }
}

// ---------------------------------------------------------------------------
// Property: ceil(0.7 n) requirements accepted, one fewer rejected
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn intervention_threshold_is_exact(index in 0usize..InterventionKind::ALL.len()) {
        let kind = InterventionKind::ALL[index];
        let requirements = kind.requirements();
        let n = requirements.len();
        let needed = (n * 7).div_ceil(10);

        let solution = |k: usize| {
            requirements[..k]
                .iter()
                .map(|r| r.keywords[0])
                .collect::<Vec<_>>()
                .join(" and ")
        };
        prop_assert!(score_solution(requirements, &solution(needed), 0.7).accepted);
        prop_assert!(!score_solution(requirements, &solution(needed - 1), 0.7).accepted);
    }
}

// ---------------------------------------------------------------------------
// Property: stability and corruption stay within [0, 1] under any action mix
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn instance_health_stays_clamped(
        actions in prop::collection::vec(
            (
                prop::sample::select(vec!["calm", "intensify", "balance", "suppress", "kill", "peek", "nice"]),
                arb_emotion(),
                0u32..8,
            ),
            1..25,
        ),
    ) {
        let mut controller = InstanceController::new(PsycheConfig::default());
        controller.initialize().expect("fresh");
        for (action, emotion, target) in actions {
            let params = ActionParams {
                emotion: Some(emotion.to_string()),
                pid: Some(target),
                address: Some(u64::from(target)),
                force: true,
                ..ActionParams::default()
            };
            let _ = controller.execute_action(action, &params);
            controller.step().expect("live");
            prop_assert!((0.0..=1.0).contains(&controller.stability()));
            prop_assert!((0.0..=1.0).contains(&controller.corruption()));
            prop_assert!(controller.emotional().state().is_within_bounds());
        }
    }
}
