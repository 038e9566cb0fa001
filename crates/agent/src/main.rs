//! Limits Agent - declarative container resource limits
//!
//! Runs next to the Docker daemon, re-applying the declared memory and CPU
//! limits every few seconds and whenever the desired state changes.

use agent_lib::{
    health::{components, HealthRegistry},
    observability::{AgentMetrics, StructuredLogger},
    ContainerRuntime, DesiredStateStore, DockerRuntime, LimitsService, ReconcileLoopBuilder,
    ReconcileTrigger, Reconciler, ReconcilerConfig, StateFileWatcher,
};
use anyhow::Result;
use limits_agent::{api, config::AgentConfig};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = AgentConfig::load()?;
    info!(config_path = %config.config_path.display(), "Agent configured");

    let health_registry = HealthRegistry::new();
    health_registry.register(components::RECONCILER).await;
    health_registry.register(components::RUNTIME).await;
    health_registry.register(components::STORE).await;

    let metrics = AgentMetrics::new();
    let logger = StructuredLogger::for_host();
    logger.log_startup(AGENT_VERSION, &config.config_path.display().to_string());

    // Runtime adapter first; everything else borrows it
    let docker = DockerRuntime::connect(config.docker_socket.as_deref())?;
    if let Err(e) = docker.ping().await {
        warn!(error = %e, "Docker daemon not reachable yet, cycles will retry");
        health_registry
            .set_unhealthy(components::RUNTIME, e.to_string())
            .await;
    }
    let runtime: Arc<dyn ContainerRuntime> = Arc::new(docker);

    let store = DesiredStateStore::new(&config.config_path);
    if let Some(parent) = config.config_path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!(error = %e, dir = %parent.display(), "Could not create config directory");
        }
    }

    let trigger = ReconcileTrigger::new();
    let service = LimitsService::new(runtime.clone(), store.clone(), trigger.clone());

    let reconciler = Arc::new(
        Reconciler::new(
            runtime,
            store,
            ReconcilerConfig {
                call_timeout: config.call_timeout(),
                ..Default::default()
            },
        )
        .with_metrics(metrics),
    );
    let reconcile_loop = ReconcileLoopBuilder::new()
        .reconciler(reconciler)
        .interval(config.reconcile_interval())
        .trigger(trigger.clone())
        .health(health_registry.clone())
        .build()?;

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let loop_handle = tokio::spawn(reconcile_loop.run(shutdown_tx.subscribe()));

    // Keep the handle alive for the lifetime of the process
    let _watcher = if config.watch_config {
        match StateFileWatcher::new(&config.config_path, trigger).start() {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(error = %e, "Desired-state watcher disabled, relying on the interval");
                None
            }
        }
    } else {
        None
    };

    let app_state = Arc::new(api::AppState::new(health_registry.clone(), service));
    health_registry.set_ready(true).await;

    let api_handle = tokio::spawn(api::serve(
        config.api_port,
        app_state,
        shutdown_tx.subscribe(),
    ));

    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");
    let _ = shutdown_tx.send(());

    // The loop finishes its current cycle before exiting
    loop_handle.await?;
    api_handle.await??;

    info!("Shutdown complete");
    Ok(())
}
