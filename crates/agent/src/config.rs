//! Agent configuration

use agent_lib::store::{CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH};
use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Agent configuration, read from `LIMITS_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Desired-state document location (`CONFIG_PATH` also works)
    #[serde(default = "default_config_path")]
    pub config_path: PathBuf,

    /// Port for the control surface and health/metrics endpoints
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Reconcile interval in seconds
    #[serde(default = "default_reconcile_interval")]
    pub reconcile_interval_secs: u64,

    /// Timeout for a single container runtime call in seconds
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,

    /// Docker socket path; platform default when unset
    #[serde(default)]
    pub docker_socket: Option<String>,

    /// Reconcile as soon as the document changes on disk
    #[serde(default = "default_watch_config")]
    pub watch_config: bool,
}

fn default_config_path() -> PathBuf {
    std::env::var(CONFIG_PATH_ENV)
        .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
        .into()
}

fn default_api_port() -> u16 {
    12000
}

fn default_reconcile_interval() -> u64 {
    5
}

fn default_call_timeout() -> u64 {
    10
}

fn default_watch_config() -> bool {
    true
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            config_path: default_config_path(),
            api_port: default_api_port(),
            reconcile_interval_secs: default_reconcile_interval(),
            call_timeout_secs: default_call_timeout(),
            docker_socket: None,
            watch_config: default_watch_config(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("LIMITS").try_parsing(true))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs.max(1))
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs.max(1))
    }
}
