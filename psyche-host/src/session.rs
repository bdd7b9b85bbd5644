//! A set of independent instances.
//!
//! Each character gets its own [`InstanceController`]; nothing is shared
//! between instances except the log sink and narrative bridge handed to
//! them at construction. Instances sit behind their own mutex so the
//! scheduler and console can work on different characters at once.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use psyche_core::config::PsycheConfig;
use psyche_core::instance::{ActionOutcome, ActionParams, InstanceController, TickReport};
use psyche_core::log::{null_log, SharedLog};
use psyche_core::narrative::{null_narrative, SharedNarrative};
use psyche_core::process::ProcessTable;
use psyche_core::snapshot::InstanceSnapshot;
use psyche_core::types::InstanceId;
use tracing::{info, warn};

use crate::error::{HostError, HostResult};

/// Shared handle to one instance.
pub type InstanceHandle = Arc<Mutex<InstanceController>>;

/// Every live instance of one game session.
pub struct Session {
    config: PsycheConfig,
    log: SharedLog,
    narrative: SharedNarrative,
    instances: DashMap<InstanceId, InstanceHandle>,
}

impl Session {
    /// A session whose instances discard logs and narrative events.
    #[must_use]
    pub fn new(config: PsycheConfig) -> Self {
        Self::with_collaborators(config, null_log(), null_narrative())
    }

    /// A session wiring every instance to the given collaborators.
    #[must_use]
    pub fn with_collaborators(config: PsycheConfig, log: SharedLog, narrative: SharedNarrative) -> Self {
        Self {
            config,
            log,
            narrative,
            instances: DashMap::new(),
        }
    }

    /// Configuration applied to new instances.
    #[must_use]
    pub fn config(&self) -> &PsycheConfig {
        &self.config
    }

    /// Create and initialize a new instance.
    ///
    /// # Errors
    /// Propagates initialization failures.
    pub fn spawn_instance(&self) -> HostResult<InstanceId> {
        let mut controller = InstanceController::with_collaborators(
            self.config.clone(),
            Arc::clone(&self.log),
            Arc::clone(&self.narrative),
            Box::new(ProcessTable::new()),
        );
        controller.initialize()?;
        let id = controller.id();
        self.instances.insert(id, Arc::new(Mutex::new(controller)));
        info!(instance = %id, count = self.instances.len(), "Instance spawned");
        Ok(id)
    }

    /// Rebuild an instance from a snapshot and add it to the session.
    ///
    /// Replaces any live instance with the same id.
    pub fn restore_instance(&self, snapshot: InstanceSnapshot) -> InstanceId {
        let mut controller = InstanceController::with_collaborators(
            self.config.clone(),
            Arc::clone(&self.log),
            Arc::clone(&self.narrative),
            Box::new(ProcessTable::new()),
        );
        controller.restore_state(snapshot);
        let id = controller.id();
        self.instances.insert(id, Arc::new(Mutex::new(controller)));
        info!(instance = %id, "Instance restored");
        id
    }

    /// Handle to one instance.
    ///
    /// # Errors
    /// `UnknownInstance` if the id is not in the session.
    pub fn get(&self, id: InstanceId) -> HostResult<InstanceHandle> {
        self.instances
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(HostError::UnknownInstance(id))
    }

    /// Shut down and remove an instance, returning its final snapshot.
    ///
    /// # Errors
    /// `UnknownInstance` if the id is not in the session.
    pub fn remove(&self, id: InstanceId) -> HostResult<InstanceSnapshot> {
        let (_, handle) = self.instances.remove(&id).ok_or(HostError::UnknownInstance(id))?;
        let mut controller = handle.lock();
        let snapshot = controller.capture_state();
        controller.shutdown();
        Ok(snapshot)
    }

    /// Ids of every instance.
    #[must_use]
    pub fn ids(&self) -> Vec<InstanceId> {
        self.instances.iter().map(|entry| *entry.key()).collect()
    }

    /// Number of instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Whether the session has no instances.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Tick one instance by `delta_ms`.
    ///
    /// # Errors
    /// `UnknownInstance`, or the controller's tick error.
    pub fn tick(&self, id: InstanceId, delta_ms: u64) -> HostResult<TickReport> {
        let handle = self.get(id)?;
        let report = handle.lock().tick(delta_ms)?;
        Ok(report)
    }

    /// Tick every instance by `delta_ms`. Returns how many ticked cleanly.
    ///
    /// A failing instance is logged and skipped; the others still tick.
    pub fn tick_all(&self, delta_ms: u64) -> usize {
        let handles: Vec<(InstanceId, InstanceHandle)> = self
            .instances
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();
        let mut ticked = 0;
        for (id, handle) in handles {
            match handle.lock().tick(delta_ms) {
                Ok(_) => ticked += 1,
                Err(e) => warn!(instance = %id, error = %e, "Tick skipped"),
            }
        }
        ticked
    }

    /// Execute a player action on one instance.
    ///
    /// # Errors
    /// `UnknownInstance`, or the action's error.
    pub fn execute(&self, id: InstanceId, action: &str, params: &ActionParams) -> HostResult<ActionOutcome> {
        let handle = self.get(id)?;
        let outcome = handle.lock().execute_action(action, params)?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use psyche_core::emotional::InputRequest;
    use psyche_core::error::PsycheError;
    use psyche_core::instance::InstanceStatus;

    #[test]
    fn instances_are_independent() {
        let session = Session::new(PsycheConfig::default());
        let a = session.spawn_instance().expect("spawn a");
        let b = session.spawn_instance().expect("spawn b");
        assert_ne!(a, b);
        assert_eq!(session.len(), 2);

        session
            .get(a)
            .expect("a")
            .lock()
            .process_emotional_input(InputRequest::new("grief", 0.95))
            .expect("input");

        assert_eq!(session.get(a).expect("a").lock().emotional().threads().count(), 1);
        assert_eq!(session.get(b).expect("b").lock().emotional().threads().count(), 0);
    }

    #[test]
    fn tick_all_advances_every_clock() {
        let session = Session::new(PsycheConfig::default());
        let a = session.spawn_instance().expect("spawn");
        let b = session.spawn_instance().expect("spawn");
        assert_eq!(session.tick_all(100), 2);
        assert_eq!(session.tick_all(100), 2);
        for id in [a, b] {
            assert_eq!(session.get(id).expect("live").lock().now().as_millis(), 200);
        }
    }

    #[test]
    fn remove_shuts_down_and_returns_snapshot() {
        let session = Session::new(PsycheConfig::default());
        let id = session.spawn_instance().expect("spawn");
        session.tick(id, 100).expect("tick");
        let handle = session.get(id).expect("live");

        let snapshot = session.remove(id).expect("removed");
        assert_eq!(snapshot.id, id);
        assert_eq!(snapshot.core.uptime, 100);
        assert!(session.is_empty());
        assert_eq!(handle.lock().status(), InstanceStatus::Shutdown);
        assert!(matches!(session.get(id), Err(HostError::UnknownInstance(_))));
    }

    #[test]
    fn restore_brings_instance_back() {
        let session = Session::new(PsycheConfig::default());
        let id = session.spawn_instance().expect("spawn");
        session.tick(id, 300).expect("tick");
        let snapshot = session.remove(id).expect("removed");

        let restored = session.restore_instance(snapshot);
        assert_eq!(restored, id);
        let handle = session.get(id).expect("restored");
        assert_eq!(handle.lock().now().as_millis(), 300);
        assert_eq!(handle.lock().status(), InstanceStatus::Running);
    }

    #[test]
    fn execute_surfaces_core_errors() {
        let session = Session::new(PsycheConfig::default());
        let id = session.spawn_instance().expect("spawn");
        let result = session.execute(id, "format", &ActionParams::default());
        assert!(matches!(result, Err(HostError::Core(PsycheError::UnknownAction(_)))));
        assert!(session.execute(id, "ps", &ActionParams::default()).is_ok());
    }
}
