//! Docker runtime adapter
//!
//! Talks to the Docker Engine API over its unix socket:
//! - `GET /containers/json` to list running containers
//! - `GET /containers/{name}/json` to resolve names and read `HostConfig`
//! - `POST /containers/{id}/update` to change memory and CPU limits

use super::{async_trait, ContainerHandle, ContainerRuntime, RuntimeError};
use crate::models::{ContainerSummary, LimitUpdate, LiveLimits};
use bollard::container::{InspectContainerOptions, ListContainersOptions, UpdateContainerOptions};
use bollard::errors::Error as DockerError;
use bollard::models::ContainerInspectResponse;
use bollard::Docker;
use std::path::Path;
use tracing::{debug, info};

/// Client-side timeout for Docker API requests, in seconds
const DOCKER_TIMEOUT_SECS: u64 = 120;

/// Docker Engine implementation of [`ContainerRuntime`]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect to Docker, using an explicit socket path if one is given
    /// and `DOCKER_HOST`/the platform default otherwise
    pub fn connect(socket_path: Option<&str>) -> Result<Self, RuntimeError> {
        let docker = match socket_path {
            Some(path) => {
                if !Path::new(path).exists() {
                    return Err(RuntimeError::Unavailable {
                        message: format!("Docker socket not found at {}", path),
                    });
                }
                info!(socket = %path, "Connecting to Docker daemon");
                Docker::connect_with_unix(path, DOCKER_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)
            }
            None => {
                info!("Connecting to Docker daemon with local defaults");
                Docker::connect_with_local_defaults()
            }
        }
        .map_err(|e| RuntimeError::Unavailable {
            message: e.to_string(),
        })?;

        Ok(Self { docker })
    }

    /// Check that the daemon answers
    pub async fn ping(&self) -> Result<(), RuntimeError> {
        self.docker
            .ping()
            .await
            .map(|_| ())
            .map_err(|e| RuntimeError::Unavailable {
                message: e.to_string(),
            })
    }

    async fn inspect(&self, name: &str) -> Result<ContainerInspectResponse, RuntimeError> {
        self.docker
            .inspect_container(name, None::<InspectContainerOptions>)
            .await
            .map_err(|e| map_docker_error(name, e))
    }
}

/// Map a Docker API error; 404 means the container does not exist
fn map_docker_error(name: &str, err: DockerError) -> RuntimeError {
    match err {
        DockerError::DockerResponseServerError {
            status_code: 404, ..
        } => RuntimeError::NotFound {
            name: name.to_string(),
        },
        other => RuntimeError::Transient {
            name: name.to_string(),
            message: other.to_string(),
        },
    }
}

/// Docker reports names with a leading slash
fn strip_name(name: &str) -> String {
    name.trim_start_matches('/').to_string()
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, RuntimeError> {
        let options = ListContainersOptions::<String> {
            all: false,
            ..Default::default()
        };
        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| RuntimeError::Transient {
                name: "*".to_string(),
                message: e.to_string(),
            })?;

        Ok(containers
            .into_iter()
            .filter_map(|c| {
                let id = c.id?;
                let name = c
                    .names
                    .and_then(|names| names.first().map(|n| strip_name(n)))
                    .unwrap_or_else(|| id.clone());
                Some(ContainerSummary {
                    id,
                    name,
                    image: c.image,
                    status: c.status,
                })
            })
            .collect())
    }

    async fn resolve(&self, name: &str) -> Result<ContainerHandle, RuntimeError> {
        let inspect = self.inspect(name).await?;

        let running = inspect
            .state
            .as_ref()
            .and_then(|s| s.running)
            .unwrap_or(false);
        if !running {
            debug!(container = %name, "Container exists but is not running");
            return Err(RuntimeError::NotFound {
                name: name.to_string(),
            });
        }

        let id = inspect.id.ok_or_else(|| RuntimeError::Transient {
            name: name.to_string(),
            message: "inspect response has no container id".to_string(),
        })?;

        Ok(ContainerHandle {
            id,
            name: name.to_string(),
        })
    }

    async fn read_limits(&self, handle: &ContainerHandle) -> Result<LiveLimits, RuntimeError> {
        let inspect = self.inspect(&handle.id).await?;
        let host_config = inspect.host_config.unwrap_or_default();

        Ok(LiveLimits {
            memory_bytes: host_config.memory.unwrap_or(0),
            cpu_period: host_config.cpu_period.unwrap_or(0),
            cpu_quota: host_config.cpu_quota.unwrap_or(0),
        })
    }

    async fn apply_limits(
        &self,
        handle: &ContainerHandle,
        update: &LimitUpdate,
    ) -> Result<(), RuntimeError> {
        let options = UpdateContainerOptions::<String> {
            memory: update.memory_bytes,
            memory_swap: update.memory_swap_bytes,
            cpu_period: Some(update.cpu_period),
            cpu_quota: Some(update.cpu_quota),
            ..Default::default()
        };

        self.docker
            .update_container(&handle.id, options)
            .await
            .map_err(|e| map_docker_error(&handle.name, e))
    }
}
