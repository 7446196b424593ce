//! # agni-core
//!
//! Core types, configuration, errors, and logging for the AGNI-NET
//! wildfire operations dashboard.
//!
//! This crate provides:
//! - [`AgniError`] - Error type for configuration, I/O, and logging setup
//! - [`logging`] - Tracing setup and log file locations
//! - [`config`] - [`SyncConfig`], loaded from `~/.agni/config.yaml`
//! - [`types`] - The view model records exchanged with the backend
//!
//! ## Example
//!
//! ```no_run
//! use agni_core::{logging, SyncConfig};
//!
//! fn main() -> agni_core::Result<()> {
//!     let _guard = logging::init_logging(None, false)?;
//!
//!     let config = SyncConfig::load_or_default(None)?;
//!     tracing::info!(api = %config.api_base_url, "configuration loaded");
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

// Re-export main types for convenience
pub use config::{CadenceConfig, SyncConfig, VerifyFailurePolicy};
pub use error::{AgniError, Result};
pub use logging::{LogGuard, init_logging};
pub use types::{
    Alert, AlertId, AlertStatus, DetectionSnapshot, Drone, DroneStatus, DroneType,
    EnvironmentalSummary, RiskEscalation, SatellitePoint, Severity, SpreadPrediction,
    TimelineEntry, Validate,
};
