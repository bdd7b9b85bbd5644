//! End-to-end host flows: console commands against a session wired to a
//! buffered system log and a narrative bridge.

use std::sync::Arc;
use std::time::Duration;

use psyche_core::config::PsycheConfig;
use psyche_core::log::LogCategory;
use psyche_core::narrative::events;
use psyche_core::snapshot::{InstanceSnapshot, SnapshotFormat};
use psyche_host::console::{execute, parse_command};
use psyche_host::{BufferedSystemLog, NarrativeBridge, Session, TickScheduler};

fn wired_session() -> (Arc<Session>, Arc<BufferedSystemLog>, Arc<NarrativeBridge>) {
    let log = Arc::new(BufferedSystemLog::default().quiet());
    let bridge = Arc::new(NarrativeBridge::new());
    let session = Arc::new(Session::with_collaborators(
        PsycheConfig::default(),
        log.clone(),
        bridge.clone(),
    ));
    (session, log, bridge)
}

fn run(session: &Session, id: psyche_core::InstanceId, line: &str) -> psyche_host::ConsoleOutput {
    let handle = session.get(id).expect("live instance");
    let mut controller = handle.lock();
    execute(&mut controller, parse_command(line).expect("valid command"))
}

#[test]
fn trigger_reaches_narrative_bridge() {
    let (session, log, bridge) = wired_session();
    let id = session.spawn_instance().expect("spawn");

    assert!(run(&session, id, "intensify fear 1.0").success);
    assert!(run(&session, id, "input fear 0.5").success);
    run(&session, id, "tick");

    assert_eq!(bridge.count(events::EMOTIONAL_TRIGGER), 1);
    let event = &bridge.events()[0];
    assert_eq!(event.payload["trigger"], "threat");
    assert!(!log.by_category(LogCategory::Action).is_empty());
    assert!(!log.by_category(LogCategory::Emotional).is_empty());
}

#[test]
fn snapshot_survives_save_and_load() {
    let (session, _log, _bridge) = wired_session();
    let id = session.spawn_instance().expect("spawn");
    run(&session, id, r#"remember traumatic 0.9 grief,fear "the house fire""#);
    run(&session, id, "input grief 0.95");
    run(&session, id, "tick 500");

    let snapshot = session.remove(id).expect("removed");
    let bytes = snapshot.encode(SnapshotFormat::Bincode).expect("encode");
    let loaded = InstanceSnapshot::decode(&bytes, SnapshotFormat::Bincode).expect("decode");

    let (other, _log, _bridge) = wired_session();
    let restored = other.restore_instance(loaded);
    assert_eq!(restored, id);

    let handle = other.get(id).expect("restored");
    let controller = handle.lock();
    assert_eq!(controller.now().as_millis(), 500);
    assert_eq!(controller.ledger().len(), 1);
    assert_eq!(controller.emotional().threads().count(), 1);
    let capacity = controller.ledger().capacity();
    assert_eq!(capacity.allocated + capacity.available, capacity.total);
}

#[tokio::test(start_paused = true)]
async fn scheduler_drives_threads_forward() {
    let (session, _log, _bridge) = wired_session();
    let id = session.spawn_instance().expect("spawn");
    run(&session, id, "input grief 0.95");

    let scheduler = TickScheduler::new(Arc::clone(&session)).spawn();
    tokio::time::sleep(Duration::from_millis(250)).await;
    let stats = scheduler.stop().await;
    assert_eq!(stats.ticks, 2);

    let handle = session.get(id).expect("live");
    let controller = handle.lock();
    let thread = controller.emotional().threads().next().expect("thread alive");
    assert!((thread.current_stage_progress - 0.16).abs() < 1e-5);
}
