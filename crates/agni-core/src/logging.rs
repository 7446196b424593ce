//! Logging infrastructure for AGNI-NET.
//!
//! Structured logging using the `tracing` ecosystem:
//!
//! - JSON lines written to `~/.agni/logs/agni.log` (daily rotation)
//! - Compact human-readable output on stderr
//! - `RUST_LOG` overrides the default `agni=info` filter
//!
//! ## Example
//!
//! ```no_run
//! use agni_core::logging;
//!
//! let _guard = logging::init_logging(None, false).expect("logging init");
//!
//! tracing::info!("sync core started");
//! tracing::debug!(task = "swarm", "poll cycle settled");
//! ```

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::error::{AgniError, Result};

/// Guard that must be held to ensure log flushing on shutdown.
///
/// Keep this guard alive for the lifetime of the application.
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize the AGNI-NET logging system.
///
/// # Arguments
///
/// * `log_dir` - Optional custom log directory. Defaults to `~/.agni/logs/`
/// * `verbose` - If true, sets log level to DEBUG. Otherwise uses INFO.
pub fn init_logging(log_dir: Option<PathBuf>, verbose: bool) -> Result<LogGuard> {
    let log_dir = match log_dir {
        Some(dir) => dir,
        None => default_log_dir()?,
    };

    std::fs::create_dir_all(&log_dir).map_err(|e| AgniError::DirectoryCreation {
        path: log_dir.clone(),
        source: e,
    })?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "agni.log");
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let default_level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "agni={default_level},agni_core={default_level},agni_sync={default_level}"
        ))
    });

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .json()
        .with_span_events(FmtSpan::CLOSE)
        .with_current_span(true)
        .with_span_list(true);

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(verbose)
        .with_line_number(verbose)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| AgniError::internal(format!("tracing subscriber already set: {e}")))?;

    tracing::debug!(log_dir = %log_dir.display(), verbose, "logging initialized");

    Ok(LogGuard {
        _file_guard: Some(file_guard),
    })
}

/// Initialize minimal console-only logging for tests.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

/// Root directory for AGNI-NET state: `~/.agni/`
pub fn agni_home() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".agni"))
        .ok_or_else(|| AgniError::internal("could not determine home directory"))
}

/// Get the default log directory path: `~/.agni/logs/`
pub fn default_log_dir() -> Result<PathBuf> {
    Ok(agni_home()?.join("logs"))
}

/// Logs one synchronization event under the `agni::sync` target.
///
/// ```ignore
/// log_sync_event!("swarm", "merged");
/// log_sync_event!("prediction", "discarded", generation = 4);
/// ```
#[macro_export]
macro_rules! log_sync_event {
    ($source:expr, $event:expr) => {
        tracing::debug!(
            target: "agni::sync",
            source = $source,
            event = $event,
            "sync event"
        )
    };
    ($source:expr, $event:expr, $($field:tt)*) => {
        tracing::debug!(
            target: "agni::sync",
            source = $source,
            event = $event,
            $($field)*,
            "sync event"
        )
    };
}
