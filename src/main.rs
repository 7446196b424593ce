//! AGNI-NET - headless wildfire dashboard sync core
//!
//! Polls the AGNI-NET backend, keeps the dashboard view model current, and
//! logs a one-line summary on every change until interrupted.
//!
//! ## Usage
//!
//! ```bash
//! # Sync against the default backend (http://localhost:8000/api)
//! agni
//!
//! # Point at another backend, with verbose logging
//! agni -v --api-url http://10.0.0.5:8000/api
//!
//! # Fetch spread predictions for one alert as soon as it appears
//! agni --select FIRE-001
//!
//! # Custom config file and log directory
//! agni --config ./agni.yaml --log-dir /var/log/agni
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use agni_core::{LogGuard, SyncConfig, init_logging};
use agni_sync::Dashboard;
use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};

/// AGNI-NET wildfire dashboard sync core
///
/// Keeps alerts, drones, detection and satellite data in sync with the
/// backend and logs every change.
#[derive(Parser, Debug)]
#[command(name = "agni")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging (increases log level)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Directory for log files (defaults to ~/.agni/logs/)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Config file (defaults to ~/.agni/config.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Backend API base URL
    #[arg(long)]
    api_url: Option<String>,

    /// Prediction service base URL
    #[arg(long)]
    prediction_url: Option<String>,

    /// Alert to select for spread predictions once it is loaded
    #[arg(long, value_name = "ALERT_ID")]
    select: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let _guard = match setup_logging(&cli) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return ExitCode::from(1);
        }
    };

    info!("Starting AGNI-NET sync core");

    match run(cli) {
        Ok(()) => {
            info!("AGNI-NET sync core exited normally");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("AGNI-NET sync core error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

/// Set up logging based on CLI arguments.
fn setup_logging(cli: &Cli) -> agni_core::Result<LogGuard> {
    init_logging(cli.log_dir.clone(), cli.verbose > 0)
}

/// Load the config file and apply command-line overrides.
fn load_config(cli: &Cli) -> anyhow::Result<SyncConfig> {
    let mut config = SyncConfig::load_or_default(cli.config.as_deref()).map_err(|e| match e.guidance() {
        Some(hint) => anyhow::anyhow!("{e}\n{hint}"),
        None => anyhow::Error::new(e),
    })?;

    if let Some(url) = &cli.api_url {
        config = config.with_api_base_url(url.clone());
    }
    if let Some(url) = &cli.prediction_url {
        config = config.with_prediction_base_url(url.clone());
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;

    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    runtime.block_on(run_dashboard(config, cli.select))
}

async fn run_dashboard(config: SyncConfig, select: Option<String>) -> anyhow::Result<()> {
    let mut dashboard = Dashboard::from_config(&config).context("failed to build dashboard")?;
    info!(
        api = %config.api_base_url,
        prediction = %config.prediction_base_url,
        "connecting to backend"
    );
    dashboard.start();

    let store = dashboard.store().clone();
    let monitor = dashboard.monitor().clone();
    let mut revisions = store.subscribe();
    let mut pending_select = select;
    let mut was_degraded = false;

    loop {
        tokio::select! {
            changed = revisions.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = store.snapshot();
                info!("{}", snapshot.summary());

                let degraded = monitor.uplink_degraded();
                if degraded != was_degraded {
                    if degraded {
                        warn!(sources = ?monitor.degraded_sources(), "uplink degraded");
                    } else {
                        info!("uplink restored");
                    }
                    was_degraded = degraded;
                }

                if let Some(alert_id) = pending_select.take_if(|id| store.alert(id).is_some()) {
                    info!(alert_id = %alert_id, "selecting alert");
                    // The outcome lands in the store; the next revision logs it.
                    drop(dashboard.select_alert(Some(&alert_id)));
                }
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!(error = %e, "failed to listen for Ctrl-C");
                }
                break;
            }
        }
    }

    info!("shutting down");
    dashboard.shutdown().await;
    Ok(())
}
