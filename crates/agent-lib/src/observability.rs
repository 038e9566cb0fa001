//! Observability infrastructure for the limits agent
//!
//! Provides:
//! - Prometheus metrics (cycle latency, per-outcome entry counts, desired entries)
//! - Structured JSON logging with tracing

use crate::models::{CycleReport, EntryReport, ReconcileOutcome};
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Histogram buckets for cycle duration (in seconds)
const CYCLE_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<AgentMetricsInner> = OnceLock::new();

struct AgentMetricsInner {
    cycle_duration_seconds: Histogram,
    cycles_total: IntCounter,
    entries_total: IntCounterVec,
    desired_entries: IntGauge,
    state_load_failures: IntCounter,
}

impl AgentMetricsInner {
    fn new() -> Self {
        Self {
            cycle_duration_seconds: register_histogram!(
                "limits_agent_cycle_duration_seconds",
                "Time spent on one reconcile cycle",
                CYCLE_BUCKETS.to_vec()
            )
            .expect("Failed to register cycle_duration_seconds"),

            cycles_total: register_int_counter!(
                "limits_agent_cycles_total",
                "Total number of reconcile cycles run"
            )
            .expect("Failed to register cycles_total"),

            entries_total: register_int_counter_vec!(
                "limits_agent_entries_total",
                "Desired-state entries processed, by outcome",
                &["outcome"]
            )
            .expect("Failed to register entries_total"),

            desired_entries: register_int_gauge!(
                "limits_agent_desired_entries",
                "Number of entries in the desired-state document"
            )
            .expect("Failed to register desired_entries"),

            state_load_failures: register_int_counter!(
                "limits_agent_state_load_failures_total",
                "Times the desired-state document could not be parsed"
            )
            .expect("Failed to register state_load_failures"),
        }
    }
}

/// Agent metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share it.
#[derive(Clone)]
pub struct AgentMetrics {
    _private: (),
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(AgentMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &AgentMetricsInner {
        GLOBAL_METRICS.get_or_init(AgentMetricsInner::new)
    }

    /// Record a finished cycle
    pub fn observe_cycle(&self, report: &CycleReport) {
        let inner = self.inner();
        inner
            .cycle_duration_seconds
            .observe(report.duration.as_secs_f64());
        inner.cycles_total.inc();
        inner.desired_entries.set(report.entries.len() as i64);
        for entry in &report.entries {
            inner
                .entries_total
                .with_label_values(&[entry.outcome.as_str()])
                .inc();
        }
    }

    pub fn inc_state_load_failures(&self) {
        self.inner().state_load_failures.inc();
    }

    /// Current count for one outcome label
    pub fn entries_with_outcome(&self, outcome: ReconcileOutcome) -> u64 {
        self.inner()
            .entries_total
            .with_label_values(&[outcome.as_str()])
            .get()
    }

    pub fn cycles(&self) -> u64 {
        self.inner().cycles_total.get()
    }
}

/// Structured logger for agent events
///
/// Consistent JSON-formatted records for corrections, failures and
/// lifecycle events.
#[derive(Clone)]
pub struct StructuredLogger {
    host: String,
}

impl StructuredLogger {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }

    /// Logger tagged with `$HOSTNAME`
    pub fn for_host() -> Self {
        Self::new(std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string()))
    }

    /// Log the outcome of one entry
    pub fn log_entry(&self, entry: &EntryReport) {
        let detail = entry.detail.as_deref().unwrap_or("");
        match entry.outcome {
            ReconcileOutcome::AlreadyCorrect => {
                debug!(
                    event = "limits_ok",
                    host = %self.host,
                    container = %entry.name,
                    "Container limits already match"
                );
            }
            ReconcileOutcome::Corrected => {
                let (current_memory, current_cpus) = entry
                    .current
                    .map(|c| (c.memory_bytes, c.effective_cpus()))
                    .unwrap_or_default();
                let (desired_memory, desired_cpus) = entry
                    .desired
                    .map(|d| (d.memory_bytes, d.cpus))
                    .unwrap_or_default();
                info!(
                    event = "limits_corrected",
                    host = %self.host,
                    container = %entry.name,
                    current_memory_bytes = current_memory,
                    current_cpus = current_cpus,
                    desired_memory_bytes = desired_memory,
                    desired_cpus = desired_cpus,
                    "Applied container limits"
                );
            }
            ReconcileOutcome::ResolveFailed => {
                debug!(
                    event = "container_unresolved",
                    host = %self.host,
                    container = %entry.name,
                    detail = %detail,
                    "Skipping container that could not be resolved"
                );
            }
            ReconcileOutcome::ApplyFailed => {
                warn!(
                    event = "limits_apply_failed",
                    host = %self.host,
                    container = %entry.name,
                    detail = %detail,
                    "Failed to apply container limits"
                );
            }
            ReconcileOutcome::InvalidSpec => {
                warn!(
                    event = "invalid_spec",
                    host = %self.host,
                    container = %entry.name,
                    detail = %detail,
                    "Skipping entry with invalid limits"
                );
            }
        }
    }

    /// Log a cycle summary
    pub fn log_cycle(&self, report: &CycleReport) {
        debug!(
            event = "cycle_complete",
            host = %self.host,
            entries = report.entries.len(),
            corrected = report.count(ReconcileOutcome::Corrected),
            unresolved = report.count(ReconcileOutcome::ResolveFailed),
            apply_failed = report.count(ReconcileOutcome::ApplyFailed),
            invalid = report.count(ReconcileOutcome::InvalidSpec),
            elapsed_ms = report.duration.as_millis() as u64,
            "Reconcile cycle complete"
        );
    }

    /// Log a desired-state save from the control surface
    pub fn log_state_saved(&self, saved: usize, rejected: usize) {
        info!(
            event = "desired_state_saved",
            host = %self.host,
            saved = saved,
            rejected = rejected,
            "Saved desired container limits"
        );
    }

    pub fn log_startup(&self, version: &str, config_path: &str) {
        info!(
            event = "agent_started",
            host = %self.host,
            agent_version = %version,
            config_path = %config_path,
            "Limits agent started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            host = %self.host,
            reason = %reason,
            "Limits agent shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LiveLimits;
    use std::time::Duration;

    #[test]
    fn test_agent_metrics_observe_cycle() {
        let metrics = AgentMetrics::new();
        let before_cycles = metrics.cycles();
        let before_fixed = metrics.entries_with_outcome(ReconcileOutcome::Corrected);

        let report = CycleReport {
            entries: vec![EntryReport {
                name: "svc".into(),
                outcome: ReconcileOutcome::Corrected,
                current: Some(LiveLimits::default()),
                desired: None,
                detail: None,
                not_found: false,
            }],
            duration: Duration::from_millis(3),
            ..Default::default()
        };
        metrics.observe_cycle(&report);
        metrics.inc_state_load_failures();

        // Other tests share the global registry, so only check monotonic growth
        assert!(metrics.cycles() > before_cycles);
        assert!(metrics.entries_with_outcome(ReconcileOutcome::Corrected) > before_fixed);
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("test-host");
        assert_eq!(logger.host, "test-host");
    }
}
