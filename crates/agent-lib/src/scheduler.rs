//! Reconcile loop
//!
//! Runs the reconciler on a fixed interval until shutdown, with an
//! on-demand trigger so a saved desired state is applied without waiting
//! for the next tick.

use crate::health::HealthRegistry;
use crate::reconciler::Reconciler;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Notify};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

/// Default reconcile interval
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

/// Requests an immediate reconcile cycle
///
/// Requests made while a cycle is running coalesce into a single follow-up
/// cycle.
#[derive(Clone, Default)]
pub struct ReconcileTrigger {
    notify: Arc<Notify>,
}

impl ReconcileTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.notify.notify_one();
    }

    async fn requested(&self) {
        self.notify.notified().await;
    }
}

/// Periodic reconcile driver (daemon mode)
pub struct ReconcileLoop {
    reconciler: Arc<Reconciler>,
    interval: Duration,
    trigger: ReconcileTrigger,
    health: Option<HealthRegistry>,
}

impl ReconcileLoop {
    pub fn new(reconciler: Arc<Reconciler>, interval: Duration, trigger: ReconcileTrigger) -> Self {
        Self {
            reconciler,
            interval,
            trigger,
            health: None,
        }
    }

    /// Run until a shutdown message arrives.
    ///
    /// The first cycle starts immediately. Shutdown is observed between
    /// cycles only, so an entry is never left half applied.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.interval.as_secs_f64(),
            "Starting reconcile loop"
        );

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cycle_count = 0u64;

        loop {
            tokio::select! {
                // Shutdown wins over a tick or trigger that is ready at the same time
                biased;

                _ = shutdown.recv() => {
                    info!("Shutting down reconcile loop");
                    break;
                }
                _ = ticker.tick() => {}
                _ = self.trigger.requested() => {
                    debug!("Reconcile requested");
                    // The triggered cycle counts as this interval's run
                    ticker.reset();
                }
            }

            let report = self.reconciler.run_cycle().await;
            cycle_count += 1;

            if let Some(health) = &self.health {
                health.record_cycle(&report).await;
            }

            debug!(
                cycle = cycle_count,
                entries = report.entries.len(),
                writes = report.writes(),
                elapsed_ms = report.duration.as_millis() as u64,
                "Reconcile cycle finished"
            );
        }
    }
}

/// Builder for creating the reconcile loop
pub struct ReconcileLoopBuilder {
    reconciler: Option<Arc<Reconciler>>,
    interval: Duration,
    trigger: Option<ReconcileTrigger>,
    health: Option<HealthRegistry>,
}

impl ReconcileLoopBuilder {
    pub fn new() -> Self {
        Self {
            reconciler: None,
            interval: DEFAULT_INTERVAL,
            trigger: None,
            health: None,
        }
    }

    pub fn reconciler(mut self, reconciler: Arc<Reconciler>) -> Self {
        self.reconciler = Some(reconciler);
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Share an existing trigger, e.g. with the control service
    pub fn trigger(mut self, trigger: ReconcileTrigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    /// Report cycle results to a health registry
    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn build(self) -> Result<ReconcileLoop> {
        let reconciler = self
            .reconciler
            .ok_or_else(|| anyhow::anyhow!("Reconciler is required"))?;
        if self.interval.is_zero() {
            anyhow::bail!("Reconcile interval must be greater than zero");
        }

        let mut reconcile_loop = ReconcileLoop::new(
            reconciler,
            self.interval,
            self.trigger.unwrap_or_default(),
        );
        reconcile_loop.health = self.health;
        Ok(reconcile_loop)
    }
}

impl Default for ReconcileLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}
