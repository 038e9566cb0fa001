//! Control-surface service
//!
//! [`LimitsService`] is the one object shared by the HTTP control surface
//! and the reconcile loop: it owns the runtime handle, the desired-state
//! store and the reconcile trigger.

use crate::memory::parse_memory;
use crate::models::{parse_cpus, ContainerSummary, DesiredState, ResourceSpec};
use crate::observability::StructuredLogger;
use crate::runtime::{ContainerRuntime, RuntimeError};
use crate::scheduler::ReconcileTrigger;
use crate::store::{DesiredStateStore, StoreError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// Memory limits offered to the operator
pub const MEMORY_CHOICES: &[&str] = &["32m", "64m", "128m", "256m", "512m", "1g", "2g"];

/// CPU shares offered to the operator: 0.1 to 2.0 in steps of 0.1
pub fn cpu_choices() -> Vec<String> {
    (1..=20).map(|tenths| format!("{:.1}", tenths as f64 / 10.0)).collect()
}

/// Operator's choice for one container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitSelection {
    pub name: String,
    pub memory: String,
    pub cpus: String,
}

/// Entry dropped from a submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedEntry {
    pub name: String,
    pub reason: String,
}

/// Result of validating a submission
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Submission {
    pub state: DesiredState,
    pub rejected: Vec<RejectedEntry>,
}

/// Turn operator selections into a full-replacement desired state.
///
/// An entry whose memory or cpu value does not parse is dropped as a whole.
/// Later selections for the same name replace earlier ones.
pub fn build_desired_state(selections: &[LimitSelection]) -> Submission {
    let mut submission = Submission::default();

    for selection in selections {
        let reason = if selection.name.trim().is_empty() {
            Some("container name is empty".to_string())
        } else if selection.memory.trim().is_empty() {
            Some("memory limit is required".to_string())
        } else if let Err(e) = parse_memory(&selection.memory) {
            Some(e.to_string())
        } else if let Err(e) = parse_cpus(&selection.cpus) {
            Some(e.to_string())
        } else {
            None
        };

        match reason {
            Some(reason) => {
                warn!(container = %selection.name, reason = %reason, "Dropping invalid limit selection");
                submission.rejected.push(RejectedEntry {
                    name: selection.name.clone(),
                    reason,
                });
            }
            None => {
                submission.state.insert(
                    selection.name.clone(),
                    ResourceSpec::new(selection.memory.trim(), selection.cpus.trim()),
                );
            }
        }
    }

    submission
}

/// Shared service behind the control surface
#[derive(Clone)]
pub struct LimitsService {
    runtime: Arc<dyn ContainerRuntime>,
    store: DesiredStateStore,
    trigger: ReconcileTrigger,
    logger: StructuredLogger,
}

impl LimitsService {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        store: DesiredStateStore,
        trigger: ReconcileTrigger,
    ) -> Self {
        Self {
            runtime,
            store,
            trigger,
            logger: StructuredLogger::for_host(),
        }
    }

    pub fn store(&self) -> &DesiredStateStore {
        &self.store
    }

    /// Containers the operator can choose from
    pub async fn running_containers(&self) -> Result<Vec<ContainerSummary>, RuntimeError> {
        let mut containers = self.runtime.list_containers().await?;
        containers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(containers)
    }

    /// Current desired state, empty if the document is missing or unreadable
    pub fn desired_state(&self) -> DesiredState {
        self.store.load()
    }

    /// Replace the desired state with the valid selections and reconcile now
    pub fn submit(&self, selections: &[LimitSelection]) -> Result<Submission, StoreError> {
        let submission = build_desired_state(selections);
        self.store.save(&submission.state)?;
        self.logger
            .log_state_saved(submission.state.len(), submission.rejected.len());
        self.trigger.request();
        Ok(submission)
    }

    pub fn request_reconcile(&self) {
        self.trigger.request();
    }
}
