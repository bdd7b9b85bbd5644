//! External tick driver.
//!
//! Instances never tick themselves. [`TickScheduler`] owns a tokio
//! interval and advances every instance of a session by a fixed simulated
//! delta on each period, so the simulation stays deterministic no matter
//! how late the timer fires.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::session::Session;

/// Counters published by a running scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Scheduler periods elapsed.
    pub ticks: u64,
    /// Successful instance ticks across all periods.
    pub instance_ticks: u64,
}

/// Builder for the tick loop of one session.
pub struct TickScheduler {
    session: Arc<Session>,
    period: Duration,
    delta_ms: u64,
}

impl TickScheduler {
    /// Tick every `instance.tick_interval_ms`, advancing instances by the same amount.
    #[must_use]
    pub fn new(session: Arc<Session>) -> Self {
        let interval_ms = session.config().instance.tick_interval_ms;
        Self {
            session,
            period: Duration::from_millis(interval_ms),
            delta_ms: interval_ms,
        }
    }

    /// Use a different wall-clock period while keeping the simulated delta.
    ///
    /// A shorter period fast-forwards the simulation.
    #[must_use]
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Start the loop on the current tokio runtime.
    #[must_use]
    pub fn spawn(self) -> SchedulerHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let (stats_tx, stats_rx) = watch::channel(SchedulerStats::default());
        let Self {
            session,
            period,
            delta_ms,
        } = self;

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately.
            interval.tick().await;
            info!(period_ms = period.as_millis() as u64, delta_ms, "Tick scheduler started");

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let ticked = session.tick_all(delta_ms) as u64;
                        stats_tx.send_modify(|stats| {
                            stats.ticks += 1;
                            stats.instance_ticks += ticked;
                        });
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!(ticks = stats_tx.borrow().ticks, "Tick scheduler stopped");
        });

        SchedulerHandle {
            stop: stop_tx,
            stats: stats_rx,
            task,
        }
    }
}

/// Control handle for a running scheduler.
pub struct SchedulerHandle {
    stop: watch::Sender<bool>,
    stats: watch::Receiver<SchedulerStats>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Latest published counters.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        *self.stats.borrow()
    }

    /// Whether the loop has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the loop and wait for it to exit.
    pub async fn stop(self) -> SchedulerStats {
        let _ = self.stop.send(true);
        if let Err(e) = self.task.await {
            debug!(error = %e, "Tick scheduler task ended abnormally");
        }
        *self.stats.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use psyche_core::config::PsycheConfig;

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_period() {
        let session = Arc::new(Session::new(PsycheConfig::default()));
        let id = session.spawn_instance().expect("spawn");

        let handle = TickScheduler::new(Arc::clone(&session)).spawn();
        tokio::time::sleep(Duration::from_millis(350)).await;
        let stats = handle.stop().await;

        assert_eq!(stats.ticks, 3);
        assert_eq!(stats.instance_ticks, 3);
        assert_eq!(session.get(id).expect("live").lock().now().as_millis(), 300);
    }

    #[tokio::test(start_paused = true)]
    async fn shorter_period_fast_forwards() {
        let session = Arc::new(Session::new(PsycheConfig::default()));
        let id = session.spawn_instance().expect("spawn");

        let handle = TickScheduler::new(Arc::clone(&session))
            .with_period(Duration::from_millis(10))
            .spawn();
        tokio::time::sleep(Duration::from_millis(55)).await;
        let stats = handle.stop().await;

        assert_eq!(stats.ticks, 5);
        assert_eq!(session.get(id).expect("live").lock().now().as_millis(), 500);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_ends_the_task() {
        let session = Arc::new(Session::new(PsycheConfig::default()));
        let handle = TickScheduler::new(session).spawn();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(handle.stats().ticks, 1);
        let stats = handle.stop().await;
        assert_eq!(stats.instance_ticks, 0);
    }
}
