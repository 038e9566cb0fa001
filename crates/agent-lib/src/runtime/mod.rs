//! Container runtime adapters
//!
//! The reconciler only talks to the runtime through [`ContainerRuntime`]:
//! resolve a name, read the live limits, write new limits. The Docker
//! implementation lives in [`docker`].

mod docker;

#[cfg(test)]
pub(crate) mod mock;

pub use docker::DockerRuntime;

use crate::models::{ContainerSummary, LimitUpdate, LiveLimits};
use std::time::Duration;
use thiserror::Error;

pub use async_trait::async_trait;

/// Resolved reference to a live container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    /// Runtime-assigned container id
    pub id: String,
    /// Name the container was resolved from
    pub name: String,
}

/// Errors reported by a runtime adapter
#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    /// No running container has this name
    #[error("container {name} not found")]
    NotFound { name: String },

    /// The runtime call failed; the next cycle retries
    #[error("runtime error for {name}: {message}")]
    Transient { name: String, message: String },

    /// The runtime did not answer in time
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    /// The runtime could not be reached at all
    #[error("container runtime unavailable: {message}")]
    Unavailable { message: String },
}

impl RuntimeError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RuntimeError::NotFound { .. })
    }
}

/// Trait for container runtime implementations
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// List running containers
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, RuntimeError>;

    /// Resolve a container name to a live container
    async fn resolve(&self, name: &str) -> Result<ContainerHandle, RuntimeError>;

    /// Read the container's current memory and CPU configuration
    async fn read_limits(&self, handle: &ContainerHandle) -> Result<LiveLimits, RuntimeError>;

    /// Write new memory and CPU limits
    async fn apply_limits(
        &self,
        handle: &ContainerHandle,
        update: &LimitUpdate,
    ) -> Result<(), RuntimeError>;
}
