//! Integration Tests: End-to-End Instance Flows
//!
//! Scenarios driven through the public controller API: memory sizing,
//! thread spawning, the intervention puzzle, action routing and
//! snapshot round-trips in every encoding.

use psyche_core::emotional::{EmotionalEvent, InputRequest, ThreadStage, VulnerabilityKind};
use psyche_core::instance::{ActionData, ActionParams, InstanceController, InstanceStatus};
use psyche_core::ledger::{MemoryData, PoolKind};
use psyche_core::snapshot::{InstanceSnapshot, SnapshotFormat};
use psyche_core::{PsycheConfig, PsycheError};

fn running() -> InstanceController {
    let mut controller = InstanceController::new(PsycheConfig::default());
    controller.initialize().expect("fresh instance");
    controller
}

fn address(id: psyche_core::BlockId) -> ActionParams {
    ActionParams {
        address: Some(id.0),
        ..ActionParams::default()
    }
}

// ---------------------------------------------------------------------------
// Memory sizing
// ---------------------------------------------------------------------------

#[test]
fn grief_memory_costs_262_units() {
    let mut controller = running();
    let before = controller.ledger().capacity().available;

    let id = controller
        .allocate_memory(MemoryData::new("grief memory", &["grief"], 0.9), PoolKind::LongTerm)
        .expect("fits");

    let capacity = *controller.ledger().capacity();
    assert_eq!(before - capacity.available, 262);
    assert_eq!(capacity.allocated + capacity.available, capacity.total);
    assert_eq!(controller.ledger().get(id).map(|b| b.size), Some(262));
    assert_eq!(controller.counters().snapshot().blocks_allocated, 1);
}

#[test]
fn oversized_allocation_fails_and_is_counted() {
    let mut controller = running();
    let huge = MemoryData {
        sensory_details: vec!["noise".into(); 2_000],
        ..MemoryData::new("everything at once", &["fear"], 1.0)
    };
    assert!(matches!(
        controller.allocate_memory(huge, PoolKind::ShortTerm),
        Err(PsycheError::CapacityExceeded { .. })
    ));
    assert_eq!(controller.counters().snapshot().allocation_failures, 1);
    assert!(controller.ledger().capacity().is_consistent());
}

// ---------------------------------------------------------------------------
// Emotional threads and interventions
// ---------------------------------------------------------------------------

#[test]
fn strong_grief_spawns_thread_and_progresses() {
    let mut controller = running();
    let grief_before = controller.emotional().state().intensity("grief").unwrap_or_default();

    let receipt = controller
        .process_emotional_input(InputRequest::new("grief", 0.95))
        .expect("accepted");
    assert!(receipt.immediate);
    let thread = receipt.thread.expect("spawned");
    assert!(controller.emotional().state().intensity("grief").unwrap_or_default() > grief_before);

    let report = controller.tick(100).expect("live");
    assert!(report
        .emotional
        .iter()
        .any(|e| matches!(e, EmotionalEvent::ThreadSpawned { thread: t, .. } if *t == thread)));

    let t = controller.emotional().thread(thread).expect("alive");
    assert_eq!(t.stage, ThreadStage::Recognition);
    assert!((t.current_stage_progress - 0.08).abs() < 1e-6);
    assert_eq!(controller.counters().snapshot().threads_spawned, 1);
}

#[test]
fn weak_input_spawns_nothing() {
    let mut controller = running();
    let receipt = controller
        .process_emotional_input(InputRequest::new("joy", 0.4))
        .expect("accepted");
    assert!(receipt.thread.is_none());
    assert!(!receipt.immediate);
}

#[test]
fn flooding_is_fixed_by_intervention() {
    let mut controller = running();
    let thread = controller
        .process_emotional_input(InputRequest::new("anger", 0.95))
        .expect("accepted")
        .thread
        .expect("spawned");
    controller.emotional_mut().destabilize_threads(0.2);
    controller.tick(100).expect("live");

    let t = controller.emotional().thread(thread).expect("alive");
    assert!(t.has_issue(VulnerabilityKind::EmotionalFlooding));
    assert!(t.is_debuggable());

    let rejected = controller.intervene(thread, "contain_flooding", "just slow down");
    assert!(!rejected.success);
    assert_eq!(rejected.hints.len(), 2);

    let accepted = controller.intervene(
        thread,
        "contain_flooding",
        "Slow down, you are safe here. Breathe.",
    );
    assert!(accepted.success, "{}", accepted.message);
    let t = controller.emotional().thread(thread).expect("alive");
    assert!(!t.has_issue(VulnerabilityKind::EmotionalFlooding));

    let counters = controller.counters().snapshot();
    assert_eq!(counters.interventions_accepted, 1);
    assert_eq!(counters.interventions_rejected, 1);
}

#[test]
fn intervention_on_missing_thread_is_advisory() {
    let mut controller = running();
    let advisory = controller.intervene(psyche_core::ThreadId(42), "contain_flooding", "breathe");
    assert!(!advisory.success);
    assert!(controller.errors().is_empty());
}

// ---------------------------------------------------------------------------
// Memory actions
// ---------------------------------------------------------------------------

#[test]
fn memory_actions_round_trip_through_controller() {
    let mut controller = running();
    let id = controller
        .allocate_memory(MemoryData::new("first day of school", &["fear", "joy"], 0.6), PoolKind::LongTerm)
        .expect("fits");

    let peeked = controller.execute_action("peek", &address(id)).expect("readable");
    assert!(matches!(peeked.data, ActionData::Block(ref b) if b.access_count == 1));

    let dump = controller
        .execute_action(
            "dump",
            &ActionParams {
                emotion: Some("fear".into()),
                ..ActionParams::default()
            },
        )
        .expect("dump");
    assert!(matches!(dump.data, ActionData::Blocks(ref blocks) if blocks.len() == 1));

    controller.execute_action("protect", &address(id)).expect("exists");
    let err = controller.execute_action("free", &address(id)).expect_err("protected");
    assert!(matches!(err, PsycheError::BlockProtected(_)));

    controller.execute_action("unprotect", &address(id)).expect("exists");
    controller.execute_action("free", &address(id)).expect("freed");
    assert!(controller.ledger().is_empty());
    assert_eq!(controller.ledger().capacity().allocated, 0);
}

#[test]
fn poke_then_defragment_repairs_block() {
    let mut controller = running();
    let id = controller
        .allocate_memory(MemoryData::new("an argument", &["anger"], 0.5), PoolKind::LongTerm)
        .expect("fits");
    let params = ActionParams {
        value: Some("a misunderstanding".into()),
        ..address(id)
    };
    controller.execute_action("poke", &params).expect("writable");
    let block = controller.ledger().get(id).expect("exists");
    assert!(block.fragmented);
    assert_eq!(block.content.description, "a misunderstanding");

    controller
        .execute_action("defragment", &ActionParams::default())
        .expect("scheduled");
    assert_eq!(controller.status(), InstanceStatus::Defragmenting);
    controller.tick(1_000).expect("live");
    controller.tick(500).expect("live");
    assert_eq!(controller.status(), InstanceStatus::Running);
    assert!(!controller.ledger().get(id).expect("exists").fragmented);
}

#[test]
fn analyze_reports_debuggable_threads() {
    let mut controller = running();
    controller
        .process_emotional_input(InputRequest::new("anger", 0.95))
        .expect("accepted");
    controller.emotional_mut().destabilize_threads(0.2);
    controller.tick(100).expect("live");

    let outcome = controller
        .execute_action("analyze", &ActionParams::default())
        .expect("report");
    let ActionData::Report(report) = outcome.data else {
        panic!("analyze returns a report");
    };
    assert_eq!(report.status, InstanceStatus::Running);
    assert_eq!(report.debuggable_threads.len(), 1);
    assert_eq!(report.top_emotions.len(), 5);
    assert!(report.top_emotions.windows(2).all(|w| w[0].1 >= w[1].1));
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

fn busy_instance() -> InstanceController {
    let mut controller = running();
    controller
        .process_emotional_input(InputRequest::new("grief", 0.95))
        .expect("accepted");
    controller
        .process_emotional_input(InputRequest::new("hope", 0.4))
        .expect("accepted");
    controller
        .allocate_memory(MemoryData::new("the funeral", &["grief", "love"], 0.9), PoolKind::Traumatic)
        .expect("fits");
    controller
        .allocate_memory(MemoryData::new("breakfast", &["joy"], 0.1), PoolKind::ShortTerm)
        .expect("fits");
    let missing = ActionParams {
        pid: Some(99),
        ..ActionParams::default()
    };
    controller.execute_action("kill", &missing).expect_err("no such pid");
    assert_eq!(controller.errors().len(), 1);
    for _ in 0..5 {
        controller.step().expect("live");
    }
    controller
}

#[test]
fn snapshot_round_trips_in_every_format() {
    let controller = busy_instance();
    let snapshot = controller.capture_state();
    for format in [SnapshotFormat::Json, SnapshotFormat::Bincode, SnapshotFormat::MessagePack] {
        let bytes = snapshot.encode(format).expect("encodes");
        let decoded = InstanceSnapshot::decode(&bytes, format).expect("decodes");
        assert_eq!(decoded, snapshot, "{format:?}");
    }
}

#[test]
fn restored_instance_behaves_identically() {
    let mut original = busy_instance();
    let bytes = original
        .capture_state()
        .encode(SnapshotFormat::Bincode)
        .expect("encodes");
    let snapshot = InstanceSnapshot::decode(&bytes, SnapshotFormat::Bincode).expect("decodes");
    let mut restored = InstanceController::from_snapshot(PsycheConfig::default(), snapshot);
    assert_eq!(restored.id(), original.id());

    for _ in 0..20 {
        original.step().expect("live");
        restored.step().expect("live");
    }
    let a = original.capture_state();
    let b = restored.capture_state();
    assert_eq!(a.core, b.core);
    assert_eq!(a.emotional, b.emotional);
    assert_eq!(a.memory, b.memory);
    assert_eq!(a.processes, b.processes);
}

#[test]
fn garbage_bytes_fail_to_decode() {
    assert!(matches!(
        InstanceSnapshot::decode(b"not a snapshot", SnapshotFormat::Json),
        Err(PsycheError::Serialization(_))
    ));
}

#[test]
fn shutdown_stops_ticks_and_actions() {
    let mut controller = running();
    controller.shutdown();
    assert!(matches!(controller.tick(100), Err(PsycheError::InvalidState(_))));
    assert!(controller.execute_action("ps", &ActionParams::default()).is_err());
}
