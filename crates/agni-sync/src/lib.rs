//! # agni-sync
//!
//! Client-side synchronization core for the AGNI-NET wildfire dashboard.
//!
//! This crate provides:
//! - [`FetchGateway`] - Typed access to the backend API and prediction service
//! - [`PollScheduler`] - Independent fixed-delay refresh loops with teardown guards
//! - [`ViewModelStore`] - Canonical alert, drone, detection and prediction state
//! - [`VerificationCoordinator`] - Optimistic alert verification
//! - [`PredictionFetcher`] - Selection-driven, stale-safe spread predictions
//! - [`UplinkMonitor`] - Failure streaks and the "uplink degraded" signal
//! - [`Dashboard`] - Wires all of the above together
//!
//! ## Poll cadences (defaults)
//!
//! - satellite points + alerts: 5 s
//! - drone detection snapshot: 2 s
//! - drone swarm list: 3 s
//!
//! ## Example
//!
//! ```no_run
//! use agni_core::SyncConfig;
//! use agni_sync::Dashboard;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut dashboard = Dashboard::from_config(&SyncConfig::default())?;
//!     dashboard.start();
//!
//!     let outcome = dashboard.verify("FIRE-001").await;
//!     println!("{outcome:?}");
//!
//!     dashboard.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod dashboard;
pub mod error;
pub mod gateway;
pub mod health;
pub mod mock;
pub mod prediction;
pub mod scheduler;
pub mod store;
pub mod tasks;
pub mod verify;

// Re-export main types
pub use dashboard::Dashboard;
pub use error::{FetchError, FetchErrorKind, Result, SyncError};
pub use gateway::{Endpoint, FetchGateway, HttpGateway, Method, Service};
pub use health::{RecordedFailure, Source, SourceHealth, UplinkMonitor};
pub use prediction::{PredictionFetcher, PredictionOutcome};
pub use scheduler::{Liveness, PollAction, PollOutcome, PollScheduler};
pub use store::{DashboardSnapshot, FeedView, PredictionSet, ViewModelStore};
pub use tasks::{DetectionPoll, SatelliteAlertsPoll, SwarmPoll};
pub use verify::{VerificationCoordinator, VerifyFailure, VerifyOutcome};
