//! # Instance Controller
//!
//! Composes the emotional engine, memory ledger and process manager of one
//! character into a single tick cycle, and derives the instance-wide
//! stability and corruption figures from what they report.
//!
//! ```text
//! tick ─► processes ─► emotional ─► ledger ─► usage ─► stability/corruption ─► errors ─► health
//! action ─► validate ─► snapshot ─► category handler ─► (cascade on failure) ─► health
//! ```

pub mod actions;
pub mod state;

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, info_span, warn};

use crate::config::PsycheConfig;
use crate::emotional::{EmotionalEngine, EmotionalEvent, InputReceipt, InputRequest};
use crate::error::{PsycheError, Result};
use crate::ledger::{IntensityBucket, MemoryData, MemoryEvent, MemoryLedger, PoolKind};
use crate::log::{null_log, LogCategory, LogLevel, LogRecord, SharedLog};
use crate::metrics::{spans, RuntimeCounters, TickBudgetMonitor};
use crate::narrative::{events, null_narrative, SharedNarrative};
use crate::process::{ProcessManager, ProcessTable};
use crate::snapshot::{CoreSnapshot, InstanceSnapshot};
use crate::types::{clamp_unit, Advisory, BlockId, InstanceId, ResourceUsage, Severity, SimTime, ThreadId};

pub use actions::{
    ActionCategory, ActionData, ActionOutcome, ActionParams, AnalysisReport, ThreadSummary, ACTIONS,
};
pub use state::{
    ErrorLog, ErrorRecord, HealthEvent, HealthFlags, InstanceStatus, MaintenanceKind,
    PendingMaintenance,
};

/// Below this stability the instance latches critical and refuses unforced actions.
pub const CRITICAL_STABILITY: f32 = 0.1;
/// Failed actions cascade below this stability.
pub const CASCADE_STABILITY: f32 = 0.3;
/// Failed actions cascade above this corruption.
pub const CASCADE_CORRUPTION: f32 = 0.7;

const HIGH_CPU_PCT: f32 = 80.0;
const LOW_CPU_PCT: f32 = 50.0;
const CPU_PENALTY: f32 = 0.02;
const ERROR_PENALTY: f32 = 0.005;
const MAX_ERROR_PENALTY: f32 = 0.05;
const INTENSITY_CEILING: f32 = 0.7;
const INTENSITY_PENALTY: f32 = 0.05;
const RECOVERY: f32 = 0.005;
const CORRUPTED_BLOCK_SPREAD: f32 = 0.005;

const CASCADE_PROCESS_DESTABILIZE: f32 = 0.2;
const CASCADE_BLOCK_DAMAGE: f32 = 0.3;
const CASCADE_EMOTION_BOOST: f32 = 0.1;
const CASCADE_STABILITY_COST: f32 = 0.05;

const STABILIZE_BOOST: f32 = 0.2;
const STABILIZE_CLEANSE: f32 = 0.1;

const DEFAULT_NICE_DELTA: i32 = 5;
const DUMP_LIMIT: usize = 10;
const TOP_EMOTIONS: usize = 5;

/// Stability change for one nominal tick (`instance.tick_interval_ms`).
/// The controller scales it by the elapsed time of each real tick.
///
/// Penalizes CPU above 80%, recent errors and a mean emotional intensity
/// above 0.7; recovers slightly when CPU is below 50% with no errors.
#[must_use]
pub fn stability_delta(cpu_pct: f32, error_count: usize, mean_intensity: f32) -> f32 {
    let mut delta = 0.0;
    if cpu_pct > HIGH_CPU_PCT {
        delta -= (cpu_pct - HIGH_CPU_PCT) / 20.0 * CPU_PENALTY;
    }
    if error_count > 0 {
        delta -= (ERROR_PENALTY * error_count as f32).min(MAX_ERROR_PENALTY);
    }
    if mean_intensity > INTENSITY_CEILING {
        delta -= (mean_intensity - INTENSITY_CEILING) * INTENSITY_PENALTY;
    }
    if cpu_pct < LOW_CPU_PCT && error_count == 0 {
        delta += RECOVERY;
    }
    delta
}

/// Corruption added in one nominal tick, from the pre-tick corruption and
/// stability. Scaled by elapsed time like [`stability_delta`].
#[must_use]
pub fn corruption_spread(corruption: f32, stability: f32, corrupted_blocks: usize) -> f32 {
    let multiplier = if stability < 0.3 {
        0.01
    } else if stability < 0.5 {
        0.005
    } else {
        0.001
    };
    corruption * multiplier + corrupted_blocks as f32 * CORRUPTED_BLOCK_SPREAD
}

/// What one controller tick did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Clock after the tick.
    pub now: SimTime,
    /// Emotional engine events.
    pub emotional: Vec<EmotionalEvent>,
    /// Memory ledger events.
    pub memory: Vec<MemoryEvent>,
    /// Health transitions.
    pub health: Vec<HealthEvent>,
    /// Applied stability change, before clamping.
    pub stability_delta: f32,
    /// Applied corruption change, before clamping.
    pub corruption_spread: f32,
    /// Whether a maintenance window held the subsystems.
    pub held: bool,
}

/// One character's mind runtime.
pub struct InstanceController {
    id: InstanceId,
    config: PsycheConfig,
    log: SharedLog,
    narrative: SharedNarrative,
    processes: Box<dyn ProcessManager>,
    emotional: EmotionalEngine,
    ledger: MemoryLedger,
    status: InstanceStatus,
    stability: f32,
    corruption: f32,
    uptime: u64,
    now: SimTime,
    errors: ErrorLog,
    health: HealthFlags,
    pending: Option<PendingMaintenance>,
    resources: ResourceUsage,
    last_snapshot: Option<Box<InstanceSnapshot>>,
    counters: Arc<RuntimeCounters>,
    budget: Arc<TickBudgetMonitor>,
}

impl std::fmt::Debug for InstanceController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceController")
            .field("id", &self.id)
            .field("status", &self.status)
            .field("stability", &self.stability)
            .field("corruption", &self.corruption)
            .field("now", &self.now)
            .finish_non_exhaustive()
    }
}

impl InstanceController {
    /// A controller with the default process table and discarding collaborators.
    #[must_use]
    pub fn new(config: PsycheConfig) -> Self {
        Self::with_collaborators(config, null_log(), null_narrative(), Box::new(ProcessTable::new()))
    }

    /// A controller wired to the given log sink, narrative hooks and process model.
    #[must_use]
    pub fn with_collaborators(
        config: PsycheConfig,
        log: SharedLog,
        narrative: SharedNarrative,
        processes: Box<dyn ProcessManager>,
    ) -> Self {
        let emotional = EmotionalEngine::with_log(config.emotional.clone(), Arc::clone(&log));
        let ledger = MemoryLedger::with_log(config.memory.clone(), Arc::clone(&log));
        let budget = Arc::new(TickBudgetMonitor::new(config.telemetry.tick_budget_ms));
        Self {
            id: InstanceId::new(),
            stability: clamp_unit(config.instance.initial_stability),
            config,
            log,
            narrative,
            processes,
            emotional,
            ledger,
            status: InstanceStatus::Uninitialized,
            corruption: 0.0,
            uptime: 0,
            now: SimTime::ZERO,
            errors: ErrorLog::default(),
            health: HealthFlags::default(),
            pending: None,
            resources: ResourceUsage::default(),
            last_snapshot: None,
            counters: Arc::new(RuntimeCounters::new()),
            budget,
        }
    }

    /// Bring the subsystems online.
    ///
    /// # Errors
    ///
    /// `InvalidState` if the instance was already initialized.
    pub fn initialize(&mut self) -> Result<()> {
        if self.status != InstanceStatus::Uninitialized {
            return Err(PsycheError::InvalidState(format!(
                "cannot initialize a {} instance",
                self.status
            )));
        }
        self.status = InstanceStatus::Initializing;
        self.emotional.initialize();
        self.resources = self.collect_usage();
        self.status = InstanceStatus::Running;
        info!(instance = %self.id, stability = self.stability, "Instance initialized");
        self.emit(LogLevel::Info, LogCategory::Instance, "Instance online");
        Ok(())
    }

    /// Stop accepting ticks and actions.
    pub fn shutdown(&mut self) {
        self.status = InstanceStatus::Shutdown;
        self.pending = None;
        info!(instance = %self.id, uptime_ms = self.uptime, "Instance shut down");
        self.emit(LogLevel::Info, LogCategory::Instance, "Instance shut down");
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Instance id.
    #[must_use]
    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// Configuration.
    #[must_use]
    pub fn config(&self) -> &PsycheConfig {
        &self.config
    }

    /// Lifecycle status.
    #[must_use]
    pub fn status(&self) -> InstanceStatus {
        self.status
    }

    /// Stability in [0, 1].
    #[must_use]
    pub fn stability(&self) -> f32 {
        self.stability
    }

    /// Corruption in [0, 1].
    #[must_use]
    pub fn corruption(&self) -> f32 {
        self.corruption
    }

    /// Simulated uptime (ms).
    #[must_use]
    pub fn uptime_ms(&self) -> u64 {
        self.uptime
    }

    /// Controller clock.
    #[must_use]
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Aggregate usage from the last recheck.
    #[must_use]
    pub fn resources(&self) -> ResourceUsage {
        self.resources
    }

    /// Rolling error log, oldest first.
    #[must_use]
    pub fn errors(&self) -> &[ErrorRecord] {
        self.errors.records()
    }

    /// Latched health conditions.
    #[must_use]
    pub fn health(&self) -> HealthFlags {
        self.health
    }

    /// Maintenance window in progress.
    #[must_use]
    pub fn pending_maintenance(&self) -> Option<PendingMaintenance> {
        self.pending
    }

    /// Emotional engine.
    #[must_use]
    pub fn emotional(&self) -> &EmotionalEngine {
        &self.emotional
    }

    /// Emotional engine, mutably.
    pub fn emotional_mut(&mut self) -> &mut EmotionalEngine {
        &mut self.emotional
    }

    /// Memory ledger.
    #[must_use]
    pub fn ledger(&self) -> &MemoryLedger {
        &self.ledger
    }

    /// Memory ledger, mutably.
    pub fn ledger_mut(&mut self) -> &mut MemoryLedger {
        &mut self.ledger
    }

    /// Process manager.
    #[must_use]
    pub fn processes(&self) -> &dyn ProcessManager {
        self.processes.as_ref()
    }

    /// Shared counters.
    #[must_use]
    pub fn counters(&self) -> Arc<RuntimeCounters> {
        Arc::clone(&self.counters)
    }

    /// Tick timing monitor.
    #[must_use]
    pub fn budget(&self) -> Arc<TickBudgetMonitor> {
        Arc::clone(&self.budget)
    }

    /// Whether an action snapshot is available for [`rollback`](Self::rollback).
    #[must_use]
    pub fn has_rollback(&self) -> bool {
        self.last_snapshot.is_some()
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Advance by the configured tick interval.
    ///
    /// # Errors
    ///
    /// As [`tick`](Self::tick).
    pub fn step(&mut self) -> Result<TickReport> {
        self.tick(self.config.instance.tick_interval_ms)
    }

    /// Advance the instance by `delta_ms` of simulated time.
    ///
    /// # Errors
    ///
    /// `NotInitialized` before `initialize`, `InvalidState` after shutdown.
    pub fn tick(&mut self, delta_ms: u64) -> Result<TickReport> {
        self.ensure_live()?;
        let budget = Arc::clone(&self.budget);
        let guard = budget.begin_tick();
        let span = info_span!(spans::TICK, instance = %self.id);
        let _enter = span.enter();

        let report = self.run_tick(delta_ms);
        RuntimeCounters::bump(&self.counters.ticks);

        drop(guard);
        if budget.is_over_budget() {
            warn!(
                instance = %self.id,
                tick_ms = budget.last_tick_ms(),
                budget_ms = budget.budget_ms(),
                "Tick over budget"
            );
        }
        Ok(report)
    }

    fn run_tick(&mut self, delta_ms: u64) -> TickReport {
        self.now = self.now.plus(delta_ms);
        self.uptime = self.uptime.saturating_add(delta_ms);
        let now = self.now;
        let mut report = TickReport {
            now,
            ..TickReport::default()
        };

        if let Some(pending) = self.pending {
            if now < pending.completes_at {
                self.emotional.set_time(now);
                self.ledger.set_time(now);
                self.errors.age_out(now, self.config.instance.error_ttl_ms);
                report.held = true;
                return report;
            }
            self.complete_maintenance(pending.kind);
            report.health.push(HealthEvent::MaintenanceCompleted(pending.kind));
        }

        self.processes.tick(now, delta_ms);
        report.emotional = {
            let _span = info_span!(spans::EMOTIONAL_TICK).entered();
            self.emotional.tick(now, delta_ms)
        };
        let coherence = self.emotional.state().coherence;
        report.memory = {
            let _span = info_span!(spans::LEDGER_TICK).entered();
            self.ledger.tick(now, coherence)
        };
        self.handle_emotional_events(&report.emotional);
        self.handle_memory_events(&report.memory);

        self.resources = self.collect_usage();
        let cpu_pct = self.cpu_percent();
        let ticks = self.nominal_ticks(delta_ms);
        report.stability_delta = stability_delta(
            cpu_pct,
            self.errors.len(),
            self.emotional.state().mean_intensity(),
        ) * ticks;
        report.corruption_spread =
            corruption_spread(self.corruption, self.stability, self.ledger.corrupted_count()) * ticks;
        self.stability = clamp_unit(self.stability + report.stability_delta);
        self.corruption = clamp_unit(self.corruption + report.corruption_spread);

        let aged = self.errors.age_out(now, self.config.instance.error_ttl_ms);
        if aged > 0 {
            debug!(instance = %self.id, aged, "Errors aged out");
        }
        report.health.extend(self.evaluate_health());
        report
    }

    /// `delta_ms` in units of the configured tick interval.
    fn nominal_ticks(&self, delta_ms: u64) -> f32 {
        delta_ms as f32 / self.config.instance.tick_interval_ms.max(1) as f32
    }

    fn handle_emotional_events(&mut self, emotional: &[EmotionalEvent]) {
        for event in emotional {
            match event {
                EmotionalEvent::ThreadSpawned { .. } => {
                    RuntimeCounters::bump(&self.counters.threads_spawned);
                }
                EmotionalEvent::ThreadCompleted { .. } => {
                    RuntimeCounters::bump(&self.counters.threads_completed);
                }
                EmotionalEvent::ThreadCrashed { thread, emotion } => {
                    RuntimeCounters::bump(&self.counters.threads_crashed);
                    self.record_error(
                        "thread_crash",
                        format!("{thread} crashed processing {emotion}"),
                        Severity::High,
                        None,
                    );
                    self.narrative.check_triggers(
                        events::THREAD_CRASHED,
                        &json!({ "thread": thread.0, "emotion": emotion }),
                    );
                }
                EmotionalEvent::TriggerFired {
                    trigger,
                    emotion,
                    intensity,
                } => {
                    RuntimeCounters::bump(&self.counters.triggers_fired);
                    self.narrative.check_triggers(
                        events::EMOTIONAL_TRIGGER,
                        &json!({ "trigger": trigger, "emotion": emotion, "intensity": intensity }),
                    );
                }
                EmotionalEvent::ThreadStageChanged { .. }
                | EmotionalEvent::ThreadIssueDetected { .. }
                | EmotionalEvent::RegulationCompleted { .. }
                | EmotionalEvent::DominantChanged { .. } => {}
            }
        }
    }

    fn handle_memory_events(&mut self, memory: &[MemoryEvent]) {
        for event in memory {
            match event {
                MemoryEvent::PressureRelieved(report) => {
                    let evicted = report.expired + report.low_value + report.forced;
                    RuntimeCounters::add(&self.counters.blocks_evicted, evicted as u64);
                }
                MemoryEvent::BlockCorrupted { block } => {
                    warn!(instance = %self.id, block = %block, "Memory block corrupted");
                }
                MemoryEvent::LeaksDetected { leaks } => {
                    debug!(instance = %self.id, count = leaks.len(), "Leak scan");
                }
                MemoryEvent::BlockPromoted { .. } => {}
            }
        }
    }

    fn collect_usage(&self) -> ResourceUsage {
        let limits = &self.config.instance;
        let raw = self
            .processes
            .system_resource_usage()
            .combine(self.emotional.usage())
            .combine(self.ledger.usage());
        ResourceUsage {
            cpu: raw.cpu.clamp(0.0, limits.max_cpu.max(0.0)),
            memory: raw.memory.min(limits.max_memory),
            threads: raw.threads.min(limits.max_threads),
        }
    }

    fn cpu_percent(&self) -> f32 {
        let max = self.config.instance.max_cpu;
        if max > 0.0 {
            self.resources.cpu / max * 100.0
        } else {
            0.0
        }
    }

    fn memory_exhausted(&self) -> bool {
        let capacity = self.ledger.capacity();
        capacity.allocated >= capacity.total
            || self.resources.memory >= self.config.instance.max_memory
    }

    fn evaluate_health(&mut self) -> Vec<HealthEvent> {
        let mut out = Vec::new();
        if self.stability < CRITICAL_STABILITY && !self.health.critical {
            self.health.critical = true;
            warn!(instance = %self.id, stability = self.stability, "Instance critical");
            self.emit(LogLevel::Error, LogCategory::Instance, "Stability critical");
            self.narrative.check_triggers(
                events::INSTANCE_CRITICAL,
                &json!({ "stability": self.stability }),
            );
            out.push(HealthEvent::Critical {
                stability: self.stability,
            });
        }
        if self.corruption >= 1.0 && !self.health.corrupted {
            self.health.corrupted = true;
            warn!(instance = %self.id, "Instance corrupted");
            self.emit(LogLevel::Error, LogCategory::Instance, "Instance fully corrupted");
            self.narrative.check_triggers(
                events::INSTANCE_CORRUPTED,
                &json!({ "corruption": self.corruption }),
            );
            out.push(HealthEvent::Corrupted);
        }
        if self.memory_exhausted() && !self.health.memory_exhausted {
            self.health.memory_exhausted = true;
            let memory = self.resources.memory;
            warn!(instance = %self.id, memory, "Memory exhausted");
            self.emit(LogLevel::Error, LogCategory::Memory, "Memory exhausted");
            self.narrative
                .check_triggers(events::MEMORY_EXHAUSTED, &json!({ "memory": memory }));
            out.push(HealthEvent::MemoryExhausted { memory });
        }
        out.extend(self.refresh_status());
        out
    }

    fn refresh_status(&mut self) -> Option<HealthEvent> {
        if !self.status.is_live() {
            return None;
        }
        let next = if let Some(pending) = self.pending {
            pending.kind.status()
        } else if self.health.corrupted {
            InstanceStatus::Corrupted
        } else if self.health.memory_exhausted {
            InstanceStatus::MemoryExhausted
        } else if self.health.critical {
            InstanceStatus::Critical
        } else {
            InstanceStatus::Running
        };
        if next == self.status {
            return None;
        }
        let from = std::mem::replace(&mut self.status, next);
        info!(instance = %self.id, from = %from, to = %next, "Status changed");
        Some(HealthEvent::StatusChanged { from, to: next })
    }

    // -----------------------------------------------------------------------
    // Actions
    // -----------------------------------------------------------------------

    /// Validate, snapshot and dispatch a player action.
    ///
    /// A failing handler is recorded in the error log and may trigger an
    /// error cascade before the error is returned.
    ///
    /// # Errors
    ///
    /// Validation errors (`UnknownAction`, `NotInitialized`, `TooUnstable`,
    /// `InvalidState` during maintenance) leave the instance untouched.
    /// Handler errors are returned after recording.
    pub fn execute_action(&mut self, action: &str, params: &ActionParams) -> Result<ActionOutcome> {
        let (name, category) = match self.validate_action(action, params) {
            Ok(route) => route,
            Err(e) => {
                RuntimeCounters::bump(&self.counters.actions_rejected);
                debug!(instance = %self.id, action, error = %e, "Action rejected");
                return Err(e);
            }
        };
        let span = info_span!(spans::ACTION, action = name, category = %category);
        let _enter = span.enter();

        self.last_snapshot = Some(Box::new(self.capture_state()));
        let result = match category {
            ActionCategory::Process => self.handle_process(name, params),
            ActionCategory::Memory => self.handle_memory(name, params),
            ActionCategory::Emotional => self.handle_emotional(name, params),
            ActionCategory::System => self.handle_system(name),
        };

        match result {
            Ok(outcome) => {
                RuntimeCounters::bump(&self.counters.actions_executed);
                info!(instance = %self.id, action = name, success = outcome.success, "Action executed");
                self.emit(LogLevel::Info, LogCategory::Action, format!("{name}: {}", outcome.message));
                self.resources = self.collect_usage();
                self.evaluate_health();
                Ok(outcome)
            }
            Err(e) => {
                self.fail_action(name, params, &e);
                Err(e)
            }
        }
    }

    fn validate_action(
        &self,
        action: &str,
        params: &ActionParams,
    ) -> Result<(&'static str, ActionCategory)> {
        let route = actions::lookup(action)?;
        match self.status {
            InstanceStatus::Uninitialized | InstanceStatus::Initializing => {
                return Err(PsycheError::NotInitialized("instance"));
            }
            InstanceStatus::Shutdown => {
                return Err(PsycheError::InvalidState("instance is shut down".into()));
            }
            _ => {}
        }
        if self.stability < CRITICAL_STABILITY && !params.force {
            return Err(PsycheError::TooUnstable {
                stability: self.stability,
            });
        }
        if let Some(pending) = self.pending {
            if !actions::READ_ONLY_ACTIONS.contains(&route.0) {
                return Err(PsycheError::InvalidState(format!(
                    "{} in progress",
                    pending.kind.name()
                )));
            }
        }
        Ok(route)
    }

    fn fail_action(&mut self, name: &'static str, params: &ActionParams, error: &PsycheError) {
        RuntimeCounters::bump(&self.counters.actions_failed);
        let severity = error.severity();
        warn!(instance = %self.id, action = name, error = %error, severity = %severity, "Action failed");
        self.record_error("action_execution", error.to_string(), severity, Some(name));

        if severity == Severity::Critical
            || self.stability < CASCADE_STABILITY
            || self.corruption > CASCADE_CORRUPTION
        {
            self.cascade(name, params);
        }
        self.resources = self.collect_usage();
        self.evaluate_health();
    }

    fn cascade(&mut self, source: &str, params: &ActionParams) {
        let span = info_span!(spans::CASCADE, source);
        let _enter = span.enter();
        RuntimeCounters::bump(&self.counters.cascades);

        self.processes.destabilize(CASCADE_PROCESS_DESTABILIZE);
        self.emotional.destabilize_threads(CASCADE_PROCESS_DESTABILIZE);
        if let Some(address) = params.address {
            let id = BlockId(address);
            match self.ledger.corrupt_block(id, CASCADE_BLOCK_DAMAGE) {
                Ok(corrupted) => debug!(block = %id, corrupted, "Cascade damaged block"),
                Err(e) => debug!(block = %id, error = %e, "Cascade could not reach block"),
            }
        }
        self.emotional.intensify_all(CASCADE_EMOTION_BOOST);
        self.stability = clamp_unit(self.stability - CASCADE_STABILITY_COST);

        warn!(instance = %self.id, source, stability = self.stability, "Error cascade");
        self.emit(
            LogLevel::Error,
            LogCategory::Instance,
            format!("Error cascade from {source}"),
        );
        self.narrative.check_triggers(
            events::ERROR_CASCADE,
            &json!({ "source": source, "stability": self.stability, "corruption": self.corruption }),
        );
    }

    fn handle_process(&mut self, name: &'static str, params: &ActionParams) -> Result<ActionOutcome> {
        let category = ActionCategory::Process;
        match name {
            "ps" => {
                let list = self.processes.list();
                Ok(ActionOutcome::new(name, category, format!("{} processes", list.len()))
                    .with_data(ActionData::Processes(list)))
            }
            "kill" => {
                let pid = params.require_pid(name)?;
                let info = self.processes.kill(pid)?;
                self.emit(
                    LogLevel::Warning,
                    LogCategory::Process,
                    format!("Killed {} ({pid})", info.name),
                );
                Ok(ActionOutcome::new(name, category, format!("Killed {} ({pid})", info.name)))
            }
            "nice" | "renice" => {
                let pid = params.require_pid(name)?;
                let priority = if name == "nice" {
                    self.processes
                        .nice(pid, params.priority.unwrap_or(DEFAULT_NICE_DELTA))?
                } else {
                    let value = params
                        .priority
                        .ok_or_else(|| PsycheError::invalid_param(name, "priority is required"))?;
                    self.processes.renice(pid, value)?
                };
                Ok(ActionOutcome::new(name, category, format!("{pid} now at nice {priority}"))
                    .with_data(ActionData::Priority(priority)))
            }
            "suspend" => {
                let pid = params.require_pid(name)?;
                self.processes.suspend(pid)?;
                Ok(ActionOutcome::new(name, category, format!("Suspended {pid}")))
            }
            "resume" => {
                let pid = params.require_pid(name)?;
                self.processes.resume(pid)?;
                Ok(ActionOutcome::new(name, category, format!("Resumed {pid}")))
            }
            _ => Err(PsycheError::UnknownAction(name.to_string())),
        }
    }

    fn handle_memory(&mut self, name: &'static str, params: &ActionParams) -> Result<ActionOutcome> {
        let category = ActionCategory::Memory;
        match name {
            "free" => {
                let id = params.require_address(name)?;
                let block = self.ledger.delete_memory(id)?;
                Ok(ActionOutcome::new(name, category, format!("Freed {id} ({} units)", block.size)))
            }
            "dump" => {
                let blocks = if let Some(emotion) = params.emotion.as_deref() {
                    self.ledger.retrieve_memories_by_emotion(emotion, DUMP_LIMIT)
                } else if let Some(b) = params.bucket.as_deref() {
                    let bucket = IntensityBucket::from_name(b)
                        .ok_or_else(|| PsycheError::invalid_param(name, format!("unknown bucket '{b}'")))?;
                    self.ledger.retrieve_memories_by_intensity(bucket, DUMP_LIMIT)
                } else {
                    let pool = params
                        .pool
                        .as_deref()
                        .map(|p| {
                            PoolKind::from_name(p)
                                .ok_or_else(|| PsycheError::invalid_param(name, format!("unknown pool '{p}'")))
                        })
                        .transpose()?;
                    self.ledger
                        .blocks()
                        .filter(|b| pool.is_none_or(|kind| b.pool == kind))
                        .cloned()
                        .collect()
                };
                Ok(ActionOutcome::new(name, category, format!("{} block(s)", blocks.len()))
                    .with_data(ActionData::Blocks(blocks)))
            }
            "peek" => {
                let id = params.require_address(name)?;
                let block = self.ledger.peek(id)?;
                let message = format!("{id}: {}", block.content.description);
                Ok(ActionOutcome::new(name, category, message)
                    .with_data(ActionData::Block(Box::new(block))))
            }
            "poke" => {
                let id = params.require_address(name)?;
                self.ledger.poke(id, params.value.clone())?;
                Ok(ActionOutcome::new(name, category, format!("Rewrote {id}")))
            }
            "protect" => {
                let id = params.require_address(name)?;
                self.ledger.protect(id)?;
                Ok(ActionOutcome::new(name, category, format!("Protected {id}")))
            }
            "unprotect" => {
                let id = params.require_address(name)?;
                self.ledger.unprotect(id)?;
                Ok(ActionOutcome::new(name, category, format!("Unprotected {id}")))
            }
            _ => Err(PsycheError::UnknownAction(name.to_string())),
        }
    }

    fn handle_emotional(&mut self, name: &'static str, params: &ActionParams) -> Result<ActionOutcome> {
        let emotion = params.emotion.as_deref();
        let advisory = match name {
            "calm" => match (params.strategy.as_deref(), params.duration_ms) {
                (Some(strategy), Some(duration_ms)) => {
                    let target = emotion.ok_or_else(|| {
                        PsycheError::invalid_param(name, "a timed regulation needs an emotion")
                    })?;
                    self.emotional.apply_emotional_regulation(strategy, target, duration_ms)?
                }
                (Some(strategy), None) => {
                    let targets: Vec<String> = emotion.map(str::to_string).into_iter().collect();
                    if let Some(e) = emotion {
                        if self.emotional.state().intensity(e).is_none() {
                            return Err(PsycheError::invalid_param(name, format!("unknown emotion '{e}'")));
                        }
                    }
                    self.emotional.apply_regulation_strategy(strategy, &targets)?
                }
                (None, _) => self.emotional.calm(emotion, params.amount)?,
            },
            "intensify" => self.emotional.intensify(emotion, params.amount)?,
            "balance" => self.emotional.balance()?,
            "suppress" => self.emotional.suppress(emotion, params.mechanism.as_deref())?,
            _ => return Err(PsycheError::UnknownAction(name.to_string())),
        };
        Ok(ActionOutcome::from_advisory(name, ActionCategory::Emotional, advisory))
    }

    fn handle_system(&mut self, name: &'static str) -> Result<ActionOutcome> {
        let category = ActionCategory::System;
        let limits = &self.config.instance;
        let (kind, delay) = match name {
            "reboot" => (MaintenanceKind::Reboot, limits.reboot_delay_ms),
            "stabilize" => (MaintenanceKind::Stabilize, limits.stabilize_delay_ms),
            "defragment" => (MaintenanceKind::Defragment, limits.defragment_delay_ms),
            "analyze" => {
                let report = self.analyze();
                let message = format!(
                    "{}: stability {:.2}, corruption {:.2}",
                    report.status, report.stability, report.corruption
                );
                return Ok(ActionOutcome::new(name, category, message)
                    .with_data(ActionData::Report(Box::new(report))));
            }
            _ => return Err(PsycheError::UnknownAction(name.to_string())),
        };
        self.pending = Some(PendingMaintenance {
            kind,
            started_at: self.now,
            completes_at: self.now.plus(delay),
        });
        self.refresh_status();
        Ok(ActionOutcome::new(name, category, format!("{name} scheduled ({delay}ms)")))
    }

    fn complete_maintenance(&mut self, kind: MaintenanceKind) {
        self.pending = None;
        match kind {
            MaintenanceKind::Reboot => {
                self.stability = clamp_unit(self.stability + (1.0 - self.stability) / 2.0);
                self.corruption = clamp_unit(self.corruption * 0.5);
                self.health = HealthFlags::default();
                self.errors.clear();
            }
            MaintenanceKind::Stabilize => {
                self.stability = clamp_unit(self.stability + STABILIZE_BOOST);
                self.corruption = clamp_unit(self.corruption - STABILIZE_CLEANSE);
                if self.stability >= CRITICAL_STABILITY {
                    self.health.critical = false;
                }
            }
            MaintenanceKind::Defragment => {
                self.ledger.defragment();
            }
        }
        info!(
            instance = %self.id,
            kind = kind.name(),
            stability = self.stability,
            corruption = self.corruption,
            "Maintenance complete"
        );
        self.emit(
            LogLevel::Info,
            LogCategory::Instance,
            format!("{} complete", kind.name()),
        );
    }

    /// Diagnostic report for the `analyze` action.
    #[must_use]
    pub fn analyze(&self) -> AnalysisReport {
        let mut top: Vec<(String, f32)> = self
            .emotional
            .state()
            .emotions()
            .map(|(name, value)| (name.to_string(), value))
            .collect();
        top.sort_by(|a, b| b.1.total_cmp(&a.1));
        top.truncate(TOP_EMOTIONS);

        AnalysisReport {
            status: self.status,
            stability: self.stability,
            corruption: self.corruption,
            uptime_ms: self.uptime,
            resources: self.resources,
            error_count: self.errors.len(),
            memory: *self.ledger.capacity(),
            corrupted_blocks: self.ledger.corrupted_count(),
            leaks: self.ledger.detect_leaks(),
            debuggable_threads: self
                .emotional
                .get_debuggable_threads()
                .into_iter()
                .map(|t| ThreadSummary {
                    id: t.id,
                    emotion: t.emotion.clone(),
                    stage: t.stage,
                    stability: t.stability,
                    issues: t.issues.iter().map(|i| i.kind).collect(),
                })
                .collect(),
            top_emotions: top,
            counters: self.counters.snapshot(),
        }
    }

    // -----------------------------------------------------------------------
    // Gameplay inputs
    // -----------------------------------------------------------------------

    /// Feed an emotional input to the engine.
    ///
    /// # Errors
    ///
    /// `NotInitialized` or `InvalidState` when the instance is not live,
    /// otherwise as [`EmotionalEngine::process_emotional_input`].
    pub fn process_emotional_input(&mut self, request: InputRequest) -> Result<InputReceipt> {
        self.ensure_live()?;
        self.emotional.process_emotional_input(request)
    }

    /// Store a memory.
    ///
    /// # Errors
    ///
    /// As [`MemoryLedger::allocate_memory`].
    pub fn allocate_memory(&mut self, data: MemoryData, pool: PoolKind) -> Result<BlockId> {
        let before = self.ledger.len();
        match self.ledger.allocate_memory(data, pool) {
            Ok(id) => {
                RuntimeCounters::bump(&self.counters.blocks_allocated);
                Ok(id)
            }
            Err(e) => {
                RuntimeCounters::bump(&self.counters.allocation_failures);
                let evicted = before.saturating_sub(self.ledger.len());
                RuntimeCounters::add(&self.counters.blocks_evicted, evicted as u64);
                Err(e)
            }
        }
    }

    /// Submit a player's solution for an intervention on a thread.
    pub fn intervene(&mut self, thread: ThreadId, intervention: &str, solution: &str) -> Advisory {
        if !self.status.is_live() {
            return Advisory::fail(format!("Instance is {}", self.status));
        }
        let advisory = self
            .emotional
            .apply_emotional_intervention(thread, intervention, solution);
        if advisory.success {
            RuntimeCounters::bump(&self.counters.interventions_accepted);
        } else {
            RuntimeCounters::bump(&self.counters.interventions_rejected);
        }
        advisory
    }

    // -----------------------------------------------------------------------
    // Snapshot
    // -----------------------------------------------------------------------

    /// Capture the whole instance.
    #[must_use]
    pub fn capture_state(&self) -> InstanceSnapshot {
        let _span = info_span!(spans::SNAPSHOT, instance = %self.id).entered();
        InstanceSnapshot {
            id: self.id,
            core: CoreSnapshot {
                status: self.status,
                stability: self.stability,
                corruption: self.corruption,
                uptime: self.uptime,
                errors: self.errors.records().to_vec(),
                now: self.now,
                health: self.health,
                pending: self.pending,
            },
            resources: self.resources,
            processes: self.processes.capture_state(),
            memory: self.ledger.capture_state(),
            emotional: self.emotional.capture_state(),
            timestamp: Utc::now(),
        }
    }

    /// Replace the whole instance with a snapshot.
    ///
    /// Discards any pending rollback point; it belongs to the replaced state.
    pub fn restore_state(&mut self, snapshot: InstanceSnapshot) {
        let _span = info_span!(spans::SNAPSHOT, instance = %snapshot.id).entered();
        self.last_snapshot = None;
        let core = snapshot.core;
        self.id = snapshot.id;
        self.status = core.status;
        self.stability = core.stability;
        self.corruption = core.corruption;
        self.uptime = core.uptime;
        self.errors = ErrorLog::from_records(core.errors);
        self.now = core.now;
        self.health = core.health;
        self.pending = core.pending;
        self.resources = snapshot.resources;
        self.processes.restore_state(snapshot.processes);
        self.ledger.restore_state(snapshot.memory);
        self.emotional.restore_state(snapshot.emotional);
        debug!(instance = %self.id, now = %self.now, "Instance restored");
    }

    /// Build an instance from a saved snapshot.
    #[must_use]
    pub fn from_snapshot(config: PsycheConfig, snapshot: InstanceSnapshot) -> Self {
        let mut controller = Self::new(config);
        controller.restore_state(snapshot);
        controller
    }

    /// Restore the snapshot taken before the last dispatched action.
    ///
    /// # Errors
    ///
    /// `InvalidState` when no action has been dispatched since the last rollback.
    pub fn rollback(&mut self) -> Result<()> {
        let snapshot = self
            .last_snapshot
            .take()
            .ok_or_else(|| PsycheError::InvalidState("no snapshot to roll back to".into()))?;
        self.restore_state(*snapshot);
        info!(instance = %self.id, "Rolled back last action");
        self.emit(LogLevel::Warning, LogCategory::Instance, "Rolled back last action");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn ensure_live(&self) -> Result<()> {
        match self.status {
            InstanceStatus::Uninitialized | InstanceStatus::Initializing => {
                Err(PsycheError::NotInitialized("instance"))
            }
            InstanceStatus::Shutdown => Err(PsycheError::InvalidState("instance is shut down".into())),
            _ => Ok(()),
        }
    }

    fn record_error(&mut self, kind: &str, message: String, severity: Severity, action: Option<&str>) {
        self.emit(LogLevel::Error, LogCategory::Instance, message.clone());
        self.errors.push(
            ErrorRecord {
                timestamp: self.now,
                kind: kind.to_string(),
                message,
                severity,
                action: action.map(str::to_string),
            },
            self.config.instance.max_errors,
        );
    }

    fn emit(&self, level: LogLevel, category: LogCategory, message: impl Into<String>) {
        self.log
            .record(LogRecord::new(self.now, level, category, message).with_detail(self.id.to_string()));
    }
}
