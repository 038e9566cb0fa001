//! Reconciliation of live container limits against the desired state
//!
//! One cycle loads the desired-state document, and for every entry resolves
//! the container, parses the declared limits, compares them with the live
//! values and writes an update only when they differ. Entries are
//! independent: a failure on one is recorded in its report and never stops
//! the others.

use crate::models::{
    CycleReport, DesiredLimits, DesiredState, EntryReport, LiveLimits, ReconcileOutcome,
    ResourceSpec,
};
use crate::observability::{AgentMetrics, StructuredLogger};
use crate::runtime::{ContainerRuntime, RuntimeError};
use crate::store::{DesiredStateStore, StoreError};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Default bound on a single runtime call
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Live and desired CPU shares closer than this are considered equal
pub const CPU_TOLERANCE: f64 = 0.01;

/// Reconciler settings
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Timeout applied to each runtime call
    pub call_timeout: Duration,
    /// Allowed difference between live and desired CPU cores
    pub cpu_tolerance: f64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            call_timeout: DEFAULT_CALL_TIMEOUT,
            cpu_tolerance: CPU_TOLERANCE,
        }
    }
}

/// Brings live container limits in line with the desired-state document
pub struct Reconciler {
    runtime: Arc<dyn ContainerRuntime>,
    store: DesiredStateStore,
    config: ReconcilerConfig,
    logger: StructuredLogger,
    metrics: Option<AgentMetrics>,
}

impl Reconciler {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        store: DesiredStateStore,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            runtime,
            store,
            config,
            logger: StructuredLogger::for_host(),
            metrics: None,
        }
    }

    /// Record cycle metrics
    pub fn with_metrics(mut self, metrics: AgentMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn store(&self) -> &DesiredStateStore {
        &self.store
    }

    /// Run one cycle against a fresh load of the document.
    ///
    /// A missing or malformed document reconciles as an empty state.
    pub async fn run_cycle(&self) -> CycleReport {
        let (desired, state_error) = match self.store.load_strict() {
            Ok(state) => (state, None),
            Err(StoreError::Missing { path }) => {
                debug!(path = %path.display(), "No desired-state document, nothing to reconcile");
                (DesiredState::new(), None)
            }
            Err(e) => {
                warn!(error = %e, "Desired-state document unusable, reconciling nothing this cycle");
                if let Some(metrics) = &self.metrics {
                    metrics.inc_state_load_failures();
                }
                (DesiredState::new(), Some(e.to_string()))
            }
        };

        let mut report = self.reconcile(&desired).await;
        report.state_error = state_error;
        report
    }

    /// Reconcile every entry of `desired` once
    pub async fn reconcile(&self, desired: &DesiredState) -> CycleReport {
        let start = Instant::now();
        let mut entries = Vec::with_capacity(desired.len());

        for (name, spec) in desired {
            let entry = self.reconcile_entry(name, spec).await;
            self.logger.log_entry(&entry);
            entries.push(entry);
        }

        let report = CycleReport {
            entries,
            duration: start.elapsed(),
            state_error: None,
        };

        self.logger.log_cycle(&report);
        if let Some(metrics) = &self.metrics {
            metrics.observe_cycle(&report);
        }
        report
    }

    /// Reconcile a single container
    async fn reconcile_entry(&self, name: &str, spec: &ResourceSpec) -> EntryReport {
        let mut report = EntryReport {
            name: name.to_string(),
            outcome: ReconcileOutcome::ResolveFailed,
            current: None,
            desired: None,
            detail: None,
            not_found: false,
        };

        let handle = match self
            .bounded("resolve", self.runtime.resolve(name))
            .await
        {
            Ok(handle) => handle,
            Err(e) => {
                report.not_found = e.is_not_found();
                report.detail = Some(e.to_string());
                return report;
            }
        };

        // Never fall back to a zero limit when the declaration is malformed
        let desired = match spec.desired_limits() {
            Ok(desired) => desired,
            Err(e) => {
                report.outcome = ReconcileOutcome::InvalidSpec;
                report.detail = Some(e.to_string());
                return report;
            }
        };
        report.desired = Some(desired);

        let current = match self
            .bounded("read limits", self.runtime.read_limits(&handle))
            .await
        {
            Ok(current) => current,
            Err(e) => {
                report.detail = Some(e.to_string());
                return report;
            }
        };
        report.current = Some(current);

        if self.matches(&current, &desired) {
            report.outcome = ReconcileOutcome::AlreadyCorrect;
            return report;
        }

        let update = desired.to_update();
        match self
            .bounded("apply limits", self.runtime.apply_limits(&handle, &update))
            .await
        {
            Ok(()) => report.outcome = ReconcileOutcome::Corrected,
            Err(e) => {
                report.outcome = ReconcileOutcome::ApplyFailed;
                report.detail = Some(e.to_string());
            }
        }
        report
    }

    /// True if the live limits already satisfy the desired ones
    fn matches(&self, current: &LiveLimits, desired: &DesiredLimits) -> bool {
        let memory_ok = !desired.manages_memory()
            || i64::try_from(desired.memory_bytes)
                .map(|bytes| bytes == current.memory_bytes)
                .unwrap_or(false);
        let cpu_ok = (current.effective_cpus() - desired.cpus).abs() < self.config.cpu_tolerance;
        memory_ok && cpu_ok
    }

    /// Bound a runtime call by the configured timeout
    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T, RuntimeError>>,
    ) -> Result<T, RuntimeError> {
        match tokio::time::timeout(self.config.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(RuntimeError::Timeout {
                operation,
                timeout: self.config.call_timeout,
            }),
        }
    }
}
