//! Agent library for declarative container resource limits
//!
//! This crate provides the core functionality for:
//! - Parsing memory sizes and CPU shares
//! - Persisting the desired limits per container name
//! - Reading and writing live limits through a container runtime
//! - Reconciling live limits against the desired state, once or periodically
//! - Health checks and observability

pub mod control;
pub mod health;
pub mod memory;
pub mod models;
pub mod observability;
pub mod reconciler;
pub mod runtime;
pub mod scheduler;
pub mod store;
pub mod watcher;

pub use control::{LimitSelection, LimitsService, Submission};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use memory::{parse_memory, MemoryParseError};
pub use models::*;
pub use observability::{AgentMetrics, StructuredLogger};
pub use reconciler::{Reconciler, ReconcilerConfig};
pub use runtime::{ContainerHandle, ContainerRuntime, DockerRuntime, RuntimeError};
pub use scheduler::{ReconcileLoop, ReconcileLoopBuilder, ReconcileTrigger};
pub use store::{DesiredStateStore, StoreError};
pub use watcher::{StateFileWatcher, WatcherHandle};
