//! In-memory runtime used by unit tests

use super::{async_trait, ContainerHandle, ContainerRuntime, RuntimeError};
use crate::models::{ContainerSummary, LimitUpdate, LiveLimits};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Mock runtime holding live limits per container name
#[derive(Default)]
pub struct MockRuntime {
    containers: Mutex<HashMap<String, LiveLimits>>,
    failing_applies: Mutex<HashSet<String>>,
    failing_reads: Mutex<HashSet<String>>,
    slow: Mutex<HashSet<String>>,
    applies: Mutex<Vec<(String, LimitUpdate)>>,
    resolve_calls: AtomicUsize,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_container(self, name: &str, live: LiveLimits) -> Self {
        self.set_container(name, live);
        self
    }

    pub fn set_container(&self, name: &str, live: LiveLimits) {
        self.containers
            .lock()
            .unwrap()
            .insert(name.to_string(), live);
    }

    pub fn fail_apply(&self, name: &str) {
        self.failing_applies.lock().unwrap().insert(name.to_string());
    }

    pub fn fail_read(&self, name: &str) {
        self.failing_reads.lock().unwrap().insert(name.to_string());
    }

    /// Make every call for this container hang for a minute
    pub fn make_slow(&self, name: &str) {
        self.slow.lock().unwrap().insert(name.to_string());
    }

    pub fn live(&self, name: &str) -> Option<LiveLimits> {
        self.containers.lock().unwrap().get(name).copied()
    }

    pub fn applies(&self) -> Vec<(String, LimitUpdate)> {
        self.applies.lock().unwrap().clone()
    }

    pub fn apply_count(&self) -> usize {
        self.applies.lock().unwrap().len()
    }

    pub fn resolve_count(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    async fn maybe_stall(&self, name: &str) {
        let slow = self.slow.lock().unwrap().contains(name);
        if slow {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
    }
}

#[async_trait]
impl ContainerRuntime for MockRuntime {
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, RuntimeError> {
        let mut names: Vec<String> = self.containers.lock().unwrap().keys().cloned().collect();
        names.sort();
        Ok(names
            .into_iter()
            .map(|name| ContainerSummary {
                id: format!("id-{}", name),
                name,
                image: Some("busybox:latest".to_string()),
                status: Some("Up 5 minutes".to_string()),
            })
            .collect())
    }

    async fn resolve(&self, name: &str) -> Result<ContainerHandle, RuntimeError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_stall(name).await;

        if self.containers.lock().unwrap().contains_key(name) {
            Ok(ContainerHandle {
                id: format!("id-{}", name),
                name: name.to_string(),
            })
        } else {
            Err(RuntimeError::NotFound {
                name: name.to_string(),
            })
        }
    }

    async fn read_limits(&self, handle: &ContainerHandle) -> Result<LiveLimits, RuntimeError> {
        if self.failing_reads.lock().unwrap().contains(&handle.name) {
            return Err(RuntimeError::Transient {
                name: handle.name.clone(),
                message: "inspect failed".to_string(),
            });
        }
        self.live(&handle.name).ok_or_else(|| RuntimeError::NotFound {
            name: handle.name.clone(),
        })
    }

    async fn apply_limits(
        &self,
        handle: &ContainerHandle,
        update: &LimitUpdate,
    ) -> Result<(), RuntimeError> {
        self.applies
            .lock()
            .unwrap()
            .push((handle.name.clone(), *update));

        if self.failing_applies.lock().unwrap().contains(&handle.name) {
            return Err(RuntimeError::Transient {
                name: handle.name.clone(),
                message: "update rejected".to_string(),
            });
        }

        let previous = self.live(&handle.name).unwrap_or_default();
        self.set_container(
            &handle.name,
            LiveLimits {
                memory_bytes: update.memory_bytes.unwrap_or(previous.memory_bytes),
                cpu_period: update.cpu_period,
                cpu_quota: update.cpu_quota,
            },
        );
        Ok(())
    }
}
