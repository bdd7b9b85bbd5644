//! Runtime metrics.
//!
//! Per-instance atomic counters with Prometheus text export, and a tick
//! budget monitor that keeps a ring buffer of recent tick durations.
//! Counters are lock-free; the monitor's history sits behind a
//! `parking_lot::Mutex` because it is only read for reports.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

/// Event counters for one instance.
pub struct RuntimeCounters {
    /// Controller ticks completed.
    pub ticks: AtomicU64,
    /// Actions that returned successfully.
    pub actions_executed: AtomicU64,
    /// Actions whose handler failed.
    pub actions_failed: AtomicU64,
    /// Actions rejected before dispatch (unknown, uninitialized, too unstable).
    pub actions_rejected: AtomicU64,
    /// Error cascades triggered.
    pub cascades: AtomicU64,
    /// Memory blocks allocated.
    pub blocks_allocated: AtomicU64,
    /// Memory blocks removed by the pressure chain.
    pub blocks_evicted: AtomicU64,
    /// Allocations rejected for capacity.
    pub allocation_failures: AtomicU64,
    /// Emotional threads spawned.
    pub threads_spawned: AtomicU64,
    /// Emotional threads that completed.
    pub threads_completed: AtomicU64,
    /// Emotional threads that crashed.
    pub threads_crashed: AtomicU64,
    /// Interventions accepted.
    pub interventions_accepted: AtomicU64,
    /// Interventions rejected.
    pub interventions_rejected: AtomicU64,
    /// Triggers forwarded to the narrative engine.
    pub triggers_fired: AtomicU64,
}

impl RuntimeCounters {
    /// Zeroed counters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
            actions_executed: AtomicU64::new(0),
            actions_failed: AtomicU64::new(0),
            actions_rejected: AtomicU64::new(0),
            cascades: AtomicU64::new(0),
            blocks_allocated: AtomicU64::new(0),
            blocks_evicted: AtomicU64::new(0),
            allocation_failures: AtomicU64::new(0),
            threads_spawned: AtomicU64::new(0),
            threads_completed: AtomicU64::new(0),
            threads_crashed: AtomicU64::new(0),
            interventions_accepted: AtomicU64::new(0),
            interventions_rejected: AtomicU64::new(0),
            triggers_fired: AtomicU64::new(0),
        }
    }

    /// Add one to a counter.
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Add `n` to a counter.
    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Read every counter.
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        CounterSnapshot {
            ticks: load(&self.ticks),
            actions_executed: load(&self.actions_executed),
            actions_failed: load(&self.actions_failed),
            actions_rejected: load(&self.actions_rejected),
            cascades: load(&self.cascades),
            blocks_allocated: load(&self.blocks_allocated),
            blocks_evicted: load(&self.blocks_evicted),
            allocation_failures: load(&self.allocation_failures),
            threads_spawned: load(&self.threads_spawned),
            threads_completed: load(&self.threads_completed),
            threads_crashed: load(&self.threads_crashed),
            interventions_accepted: load(&self.interventions_accepted),
            interventions_rejected: load(&self.interventions_rejected),
            triggers_fired: load(&self.triggers_fired),
        }
    }
}

impl Default for RuntimeCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Counter values at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    /// Ticks completed.
    pub ticks: u64,
    /// Successful actions.
    pub actions_executed: u64,
    /// Failed actions.
    pub actions_failed: u64,
    /// Rejected actions.
    pub actions_rejected: u64,
    /// Cascades.
    pub cascades: u64,
    /// Blocks allocated.
    pub blocks_allocated: u64,
    /// Blocks evicted.
    pub blocks_evicted: u64,
    /// Allocation failures.
    pub allocation_failures: u64,
    /// Threads spawned.
    pub threads_spawned: u64,
    /// Threads completed.
    pub threads_completed: u64,
    /// Threads crashed.
    pub threads_crashed: u64,
    /// Interventions accepted.
    pub interventions_accepted: u64,
    /// Interventions rejected.
    pub interventions_rejected: u64,
    /// Triggers fired.
    pub triggers_fired: u64,
}

impl CounterSnapshot {
    fn entries(&self) -> [(&'static str, &'static str, u64); 14] {
        [
            ("ticks_total", "Controller ticks completed", self.ticks),
            ("actions_executed_total", "Actions executed successfully", self.actions_executed),
            ("actions_failed_total", "Actions whose handler failed", self.actions_failed),
            ("actions_rejected_total", "Actions rejected before dispatch", self.actions_rejected),
            ("cascades_total", "Error cascades triggered", self.cascades),
            ("blocks_allocated_total", "Memory blocks allocated", self.blocks_allocated),
            ("blocks_evicted_total", "Memory blocks evicted under pressure", self.blocks_evicted),
            ("allocation_failures_total", "Allocations rejected for capacity", self.allocation_failures),
            ("threads_spawned_total", "Emotional threads spawned", self.threads_spawned),
            ("threads_completed_total", "Emotional threads completed", self.threads_completed),
            ("threads_crashed_total", "Emotional threads crashed", self.threads_crashed),
            ("interventions_accepted_total", "Interventions accepted", self.interventions_accepted),
            ("interventions_rejected_total", "Interventions rejected", self.interventions_rejected),
            ("triggers_fired_total", "Narrative triggers fired", self.triggers_fired),
        ]
    }

    /// Prometheus text exposition with every metric named `{prefix}_{name}`.
    #[must_use]
    pub fn to_prometheus(&self, prefix: &str) -> String {
        let mut out = String::new();
        for (name, help, value) in self.entries() {
            out.push_str(&format!(
                "# HELP {prefix}_{name} {help}\n# TYPE {prefix}_{name} counter\n{prefix}_{name} {value}\n"
            ));
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Tick Budget Monitor
// ---------------------------------------------------------------------------

const HISTORY_LEN: usize = 256;

/// Tracks how long controller ticks take against a budget.
pub struct TickBudgetMonitor {
    budget_ms: f64,
    history: Mutex<TickHistory>,
}

struct TickHistory {
    timings: Vec<f64>,
    write_idx: usize,
    count: u64,
    last_over_budget: bool,
}

impl TickBudgetMonitor {
    /// A monitor with a budget in milliseconds.
    #[must_use]
    pub fn new(budget_ms: f64) -> Self {
        Self {
            budget_ms,
            history: Mutex::new(TickHistory {
                timings: vec![0.0; HISTORY_LEN],
                write_idx: 0,
                count: 0,
                last_over_budget: false,
            }),
        }
    }

    /// Start timing a tick; the guard records on drop.
    pub fn begin_tick(&self) -> TickGuard<'_> {
        TickGuard {
            monitor: self,
            start: Instant::now(),
        }
    }

    /// Record one tick duration.
    pub fn record(&self, ms: f64) {
        let mut h = self.history.lock();
        let idx = h.write_idx;
        h.timings[idx] = ms;
        h.write_idx = (idx + 1) % HISTORY_LEN;
        h.count += 1;
        h.last_over_budget = ms > self.budget_ms;
    }

    /// Duration of the most recent tick.
    #[must_use]
    pub fn last_tick_ms(&self) -> f64 {
        let h = self.history.lock();
        if h.count == 0 {
            return 0.0;
        }
        h.timings[(h.write_idx + HISTORY_LEN - 1) % HISTORY_LEN]
    }

    /// Whether the most recent tick went over budget.
    #[must_use]
    pub fn is_over_budget(&self) -> bool {
        self.history.lock().last_over_budget
    }

    /// Percentiles over the recorded window.
    #[must_use]
    pub fn percentiles(&self) -> TickPercentiles {
        let h = self.history.lock();
        let n = usize::try_from(h.count).unwrap_or(usize::MAX).min(HISTORY_LEN);
        if n == 0 {
            return TickPercentiles::default();
        }
        let mut sorted = h.timings[..n].to_vec();
        sorted.sort_by(f64::total_cmp);

        let at = |q: f64| sorted[((n as f64 * q) as usize).min(n - 1)];
        let over = sorted.iter().filter(|&&t| t > self.budget_ms).count();
        TickPercentiles {
            p50: at(0.5),
            p95: at(0.95),
            p99: at(0.99),
            max: sorted[n - 1],
            over_budget_ratio: over as f64 / n as f64,
        }
    }

    /// Ticks recorded.
    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.history.lock().count
    }

    /// Configured budget.
    #[must_use]
    pub fn budget_ms(&self) -> f64 {
        self.budget_ms
    }
}

/// Records the elapsed time of one tick when dropped.
pub struct TickGuard<'a> {
    monitor: &'a TickBudgetMonitor,
    start: Instant,
}

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.monitor
            .record(self.start.elapsed().as_secs_f64() * 1000.0);
    }
}

/// Tick timing percentiles (milliseconds).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickPercentiles {
    /// Median.
    pub p50: f64,
    /// 95th percentile.
    pub p95: f64,
    /// 99th percentile.
    pub p99: f64,
    /// Slowest tick.
    pub max: f64,
    /// Share of ticks over budget.
    pub over_budget_ratio: f64,
}

impl TickPercentiles {
    /// One-line summary.
    #[must_use]
    pub fn summary(&self, budget_ms: f64) -> String {
        format!(
            "P50={:.2}ms P95={:.2}ms P99={:.2}ms Max={:.2}ms Budget={budget_ms:.1}ms Over={:.1}%",
            self.p50,
            self.p95,
            self.p99,
            self.max,
            self.over_budget_ratio * 100.0,
        )
    }
}

// ---------------------------------------------------------------------------
// Span names
// ---------------------------------------------------------------------------

/// Span names used with `tracing::span!`.
pub mod spans {
    /// One controller tick.
    pub const TICK: &str = "psyche::tick";
    /// Emotional engine tick.
    pub const EMOTIONAL_TICK: &str = "psyche::emotional::tick";
    /// Memory ledger tick.
    pub const LEDGER_TICK: &str = "psyche::ledger::tick";
    /// Action dispatch.
    pub const ACTION: &str = "psyche::action";
    /// Error cascade.
    pub const CASCADE: &str = "psyche::cascade";
    /// Snapshot capture or restore.
    pub const SNAPSHOT: &str = "psyche::snapshot";
}
