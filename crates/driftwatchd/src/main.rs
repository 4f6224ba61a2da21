//! driftwatchd — the driftwatch fleet watchdog.
//!
//! Polls the fleet directory, build registry, worker schedulers, node
//! telemetry, and gossip state on per-check cadences, and raises alerts
//! for conditions that persist.
//!
//! # Usage
//!
//! ```text
//! driftwatchd run --config /etc/driftwatch/driftwatch.toml
//! driftwatchd once --config driftwatch.toml --check version_drift
//! driftwatchd validate --config driftwatch.toml
//! ```

mod wiring;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use driftwatch_checks::{AlertCounter, AlertEmitter, CheckDriver};
use driftwatch_core::{CheckKind, WatchConfig};

const DEFAULT_FILTER: &str = "info,driftwatch=debug";

#[derive(Parser)]
#[command(name = "driftwatchd", about = "Fleet drift watchdog")]
struct Cli {
    /// Turn off logging entirely.
    #[arg(long, global = true)]
    quiet: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run every enabled check on its own interval until Ctrl-C.
    Run {
        /// Path to driftwatch.toml.
        #[arg(long, default_value = "driftwatch.toml")]
        config: PathBuf,
    },
    /// Run each enabled check once and print the tick reports as JSON.
    Once {
        #[arg(long, default_value = "driftwatch.toml")]
        config: PathBuf,

        /// Only run this check (e.g. `version_drift`, `split_brain`).
        #[arg(long)]
        check: Option<CheckKind>,
    },
    /// Load and validate a config file.
    Validate {
        #[arg(long, default_value = "driftwatch.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.log_json);

    match cli.command {
        Command::Run { config } => run(&config).await,
        Command::Once { config, check } => once(&config, check).await,
        Command::Validate { config } => validate(&config),
    }
}

fn init_tracing(quiet: bool, json: bool) {
    let filter = if quiet {
        EnvFilter::new("off")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    };
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Load the config and assemble one driver per enabled check.
fn assemble(path: &Path) -> anyhow::Result<(Vec<CheckDriver>, AlertCounter)> {
    let config = WatchConfig::from_file(path)?;
    let client = wiring::fleet_client(&config)?;
    let sink = wiring::alert_sink(&config, client.timeout());
    let emitter = AlertEmitter::new(sink);
    let drivers = wiring::build_drivers(&config, Arc::new(client), &emitter)?;
    Ok((drivers, emitter.counter().clone()))
}

async fn run(path: &Path) -> anyhow::Result<()> {
    info!(config = ?path, "driftwatch starting");
    let (drivers, counter) = assemble(path)?;
    if drivers.is_empty() {
        warn!("no checks enabled, nothing to do");
        return Ok(());
    }

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Start check drivers ────────────────────────────────────

    let mut handles = Vec::with_capacity(drivers.len());
    for driver in drivers {
        info!(check = %driver.kind(), interval = ?driver.interval(), "scheduling check");
        handles.push(tokio::spawn(driver.run(shutdown_rx.clone())));
    }

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    for handle in handles {
        let _ = handle.await;
    }

    info!(
        alerts = counter.raised(),
        diagnostics = counter.diagnostics(),
        "driftwatch stopped"
    );
    Ok(())
}

async fn once(path: &Path, only: Option<CheckKind>) -> anyhow::Result<()> {
    let (drivers, counter) = assemble(path)?;
    let drivers = wiring::select_drivers(drivers, only)?;

    let mut reports = Vec::new();
    for mut driver in drivers {
        if let Some(report) = driver.tick_at(Instant::now()).await {
            reports.push(report);
        }
    }

    println!("{}", serde_json::to_string_pretty(&reports)?);
    info!(
        alerts = counter.raised(),
        diagnostics = counter.diagnostics(),
        "single pass complete"
    );
    Ok(())
}

fn validate(path: &Path) -> anyhow::Result<()> {
    let config = WatchConfig::from_file(path)?;
    let client = Arc::new(wiring::fleet_client(&config)?);
    let emitter = AlertEmitter::new(wiring::alert_sink(&config, client.timeout()));
    let drivers = wiring::build_drivers(&config, client, &emitter)?;

    let enabled: Vec<String> = drivers.iter().map(|d| d.kind().to_string()).collect();
    println!("config OK: {} check(s) enabled [{}]", drivers.len(), enabled.join(", "));
    Ok(())
}
