//! Simulated processes.
//!
//! The controller talks to processes through the [`ProcessManager`] trait
//! so an embedding game can plug in its own scheduler model. [`ProcessTable`]
//! is the default: a handful of named subsystem processes with CPU, memory,
//! priority and stability figures.

use serde::{Deserialize, Serialize};

use crate::error::{PsycheError, Result};
use crate::types::{clamp_unit, ResourceUsage, SimTime, SECOND_MS};

/// Lowest (most favourable) nice value.
pub const NICE_MIN: i32 = -20;
/// Highest nice value.
pub const NICE_MAX: i32 = 19;
/// Pid that cannot be killed or suspended.
pub const INIT_PID: u32 = 1;

/// Scheduling state of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    /// Scheduled.
    Running,
    /// Paused by the player.
    Suspended,
}

/// One simulated process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessInfo {
    /// Process id.
    pub pid: u32,
    /// Process name.
    pub name: String,
    /// CPU load at nice 0 and full stability (percent).
    pub base_cpu: f32,
    /// Memory units.
    pub memory: u64,
    /// Nice value in [`NICE_MIN`, `NICE_MAX`].
    pub priority: i32,
    /// Stability in [0, 1]; unstable processes burn more CPU.
    pub stability: f32,
    /// Scheduling state.
    pub state: ProcessState,
    /// Start time.
    pub started_at: SimTime,
}

impl ProcessInfo {
    /// Effective CPU load.
    #[must_use]
    pub fn cpu(&self) -> f32 {
        if self.state == ProcessState::Suspended {
            return 0.0;
        }
        let priority_factor = 1.0 - self.priority as f32 / 40.0;
        self.base_cpu * priority_factor * (2.0 - self.stability)
    }
}

/// Serializable process table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessSnapshot {
    /// Every process, ordered by pid.
    pub processes: Vec<ProcessInfo>,
    /// Next pid to hand out.
    pub next_pid: u32,
}

/// Process subsystem contract consumed by the instance controller.
pub trait ProcessManager: Send {
    /// Advance the process model.
    fn tick(&mut self, now: SimTime, delta_ms: u64);

    /// Aggregate usage of every process.
    fn system_resource_usage(&self) -> ResourceUsage;

    /// Every process, ordered by pid.
    fn list(&self) -> Vec<ProcessInfo>;

    /// Terminate a process.
    ///
    /// # Errors
    ///
    /// `ProcessNotFound`, or `InvalidParameter` for init.
    fn kill(&mut self, pid: u32) -> Result<ProcessInfo>;

    /// Shift a process's nice value by `delta`. Returns the new value.
    ///
    /// # Errors
    ///
    /// `ProcessNotFound`.
    fn nice(&mut self, pid: u32, delta: i32) -> Result<i32>;

    /// Set a process's nice value. Returns the clamped value.
    ///
    /// # Errors
    ///
    /// `ProcessNotFound`.
    fn renice(&mut self, pid: u32, priority: i32) -> Result<i32>;

    /// Pause a process.
    ///
    /// # Errors
    ///
    /// `ProcessNotFound`, or `InvalidParameter` for init.
    fn suspend(&mut self, pid: u32) -> Result<()>;

    /// Resume a paused process.
    ///
    /// # Errors
    ///
    /// `ProcessNotFound`.
    fn resume(&mut self, pid: u32) -> Result<()>;

    /// Reduce the stability of every process.
    fn destabilize(&mut self, amount: f32);

    /// Capture the table.
    fn capture_state(&self) -> ProcessSnapshot;

    /// Replace the table.
    fn restore_state(&mut self, snapshot: ProcessSnapshot);
}

/// Stability regained per simulated second by running processes.
const STABILITY_RECOVERY_PER_SEC: f32 = 0.01;

/// The default process model.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessTable {
    processes: Vec<ProcessInfo>,
    next_pid: u32,
}

impl ProcessTable {
    /// The standard set of mind subsystems.
    #[must_use]
    pub fn new() -> Self {
        let mut table = Self {
            processes: Vec::new(),
            next_pid: INIT_PID,
        };
        for (name, cpu, memory) in [
            ("init", 1.0, 64),
            ("emotional_core", 8.0, 512),
            ("memory_daemon", 6.0, 1_024),
            ("narrative_loop", 4.0, 256),
            ("self_model", 5.0, 384),
        ] {
            table.spawn(name, cpu, memory, SimTime::ZERO);
        }
        table
    }

    /// Start a process. Returns its pid.
    pub fn spawn(&mut self, name: &str, base_cpu: f32, memory: u64, now: SimTime) -> u32 {
        let pid = self.next_pid;
        self.next_pid += 1;
        self.processes.push(ProcessInfo {
            pid,
            name: name.to_string(),
            base_cpu,
            memory,
            priority: 0,
            stability: 1.0,
            state: ProcessState::Running,
            started_at: now,
        });
        pid
    }

    /// One process.
    #[must_use]
    pub fn get(&self, pid: u32) -> Option<&ProcessInfo> {
        self.processes.iter().find(|p| p.pid == pid)
    }

    fn get_mut(&mut self, pid: u32) -> Result<&mut ProcessInfo> {
        self.processes
            .iter_mut()
            .find(|p| p.pid == pid)
            .ok_or(PsycheError::ProcessNotFound(pid))
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessManager for ProcessTable {
    fn tick(&mut self, _now: SimTime, delta_ms: u64) {
        let recovery = STABILITY_RECOVERY_PER_SEC * delta_ms as f32 / SECOND_MS as f32;
        for p in &mut self.processes {
            if p.state == ProcessState::Running {
                p.stability = clamp_unit(p.stability + recovery);
            }
        }
    }

    fn system_resource_usage(&self) -> ResourceUsage {
        let running = self
            .processes
            .iter()
            .filter(|p| p.state == ProcessState::Running)
            .count();
        ResourceUsage {
            cpu: self.processes.iter().map(ProcessInfo::cpu).sum(),
            memory: self.processes.iter().map(|p| p.memory).sum(),
            threads: u32::try_from(running).unwrap_or(u32::MAX),
        }
    }

    fn list(&self) -> Vec<ProcessInfo> {
        self.processes.clone()
    }

    fn kill(&mut self, pid: u32) -> Result<ProcessInfo> {
        if pid == INIT_PID {
            return Err(PsycheError::invalid_param("kill", "init cannot be killed"));
        }
        let idx = self
            .processes
            .iter()
            .position(|p| p.pid == pid)
            .ok_or(PsycheError::ProcessNotFound(pid))?;
        Ok(self.processes.remove(idx))
    }

    fn nice(&mut self, pid: u32, delta: i32) -> Result<i32> {
        let p = self.get_mut(pid)?;
        p.priority = (p.priority + delta).clamp(NICE_MIN, NICE_MAX);
        Ok(p.priority)
    }

    fn renice(&mut self, pid: u32, priority: i32) -> Result<i32> {
        let p = self.get_mut(pid)?;
        p.priority = priority.clamp(NICE_MIN, NICE_MAX);
        Ok(p.priority)
    }

    fn suspend(&mut self, pid: u32) -> Result<()> {
        if pid == INIT_PID {
            return Err(PsycheError::invalid_param("suspend", "init cannot be suspended"));
        }
        self.get_mut(pid)?.state = ProcessState::Suspended;
        Ok(())
    }

    fn resume(&mut self, pid: u32) -> Result<()> {
        self.get_mut(pid)?.state = ProcessState::Running;
        Ok(())
    }

    fn destabilize(&mut self, amount: f32) {
        for p in &mut self.processes {
            p.stability = clamp_unit(p.stability - amount);
        }
    }

    fn capture_state(&self) -> ProcessSnapshot {
        ProcessSnapshot {
            processes: self.processes.clone(),
            next_pid: self.next_pid,
        }
    }

    fn restore_state(&mut self, snapshot: ProcessSnapshot) {
        self.processes = snapshot.processes;
        self.next_pid = snapshot.next_pid;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_usage() {
        let table = ProcessTable::new();
        let usage = table.system_resource_usage();
        assert!((usage.cpu - 24.0).abs() < 1e-4);
        assert_eq!(usage.memory, 2_240);
        assert_eq!(usage.threads, 5);
    }

    #[test]
    fn init_is_protected() {
        let mut table = ProcessTable::new();
        assert!(table.kill(INIT_PID).is_err());
        assert!(table.suspend(INIT_PID).is_err());
        assert!(matches!(table.kill(99), Err(PsycheError::ProcessNotFound(99))));
        assert_eq!(table.kill(2).expect("exists").name, "emotional_core");
        assert!(table.get(2).is_none());
    }

    #[test]
    fn nice_clamps_and_changes_cpu() {
        let mut table = ProcessTable::new();
        let before = table.get(2).map(ProcessInfo::cpu).unwrap_or_default();
        assert_eq!(table.nice(2, 50).ok(), Some(NICE_MAX));
        assert!(table.get(2).map(ProcessInfo::cpu).unwrap_or_default() < before);
        assert_eq!(table.renice(2, -40).ok(), Some(NICE_MIN));
    }

    #[test]
    fn suspended_processes_use_no_cpu() {
        let mut table = ProcessTable::new();
        table.suspend(3).expect("exists");
        assert_eq!(table.get(3).map(ProcessInfo::cpu), Some(0.0));
        assert_eq!(table.system_resource_usage().threads, 4);
        table.resume(3).expect("exists");
        assert_eq!(table.system_resource_usage().threads, 5);
    }

    #[test]
    fn destabilized_processes_recover_over_time() {
        let mut table = ProcessTable::new();
        table.destabilize(0.2);
        let cpu = table.system_resource_usage().cpu;
        assert!(cpu > 24.0);
        table.tick(SimTime(10_000), 10_000);
        assert!(table.get(2).is_some_and(|p| (p.stability - 0.9).abs() < 1e-5));
    }
}
