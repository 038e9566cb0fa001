//! Container limits check
//!
//! Reads the desired-state document once, brings every listed container in
//! line with it, prints what it did and exits.

mod output;

use agent_lib::store::DEFAULT_CONFIG_PATH;
use agent_lib::{DesiredStateStore, DockerRuntime, Reconciler, ReconcilerConfig};
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// One-shot container resource limits check
#[derive(Parser)]
#[command(name = "limits-check")]
#[command(author, version, about = "Apply declared memory and CPU limits to running containers", long_about = None)]
pub struct Cli {
    /// Desired-state document (can also be set via CONFIG_PATH env var)
    #[arg(long, env = "CONFIG_PATH", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Docker socket path (platform default if not specified)
    #[arg(long, env = "DOCKER_SOCKET")]
    pub docker_socket: Option<String>,

    /// Print a per-outcome tally at the end
    #[arg(long, short)]
    pub verbose: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Library logs go to stderr, quiet unless RUST_LOG says otherwise
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("off")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // A missing or broken document is fatal here, unlike in the daemon
    let store = DesiredStateStore::new(&cli.config);
    let desired = match store.load_strict() {
        Ok(desired) => desired,
        Err(e) => {
            output::print_error(&e.to_string());
            return Ok(ExitCode::FAILURE);
        }
    };

    if desired.is_empty() {
        return Ok(ExitCode::SUCCESS);
    }

    let runtime = match DockerRuntime::connect(cli.docker_socket.as_deref()) {
        Ok(runtime) => runtime,
        Err(e) => {
            // Only a document failure exits 1
            output::print_error(&format!("{}, no limits applied", e));
            return Ok(ExitCode::SUCCESS);
        }
    };

    let reconciler = Reconciler::new(Arc::new(runtime), store, ReconcilerConfig::default());
    let report = reconciler.reconcile(&desired).await;

    for entry in &report.entries {
        output::print_entry(entry);
    }
    if cli.verbose {
        output::print_summary(&report.entries);
    }

    Ok(ExitCode::SUCCESS)
}
