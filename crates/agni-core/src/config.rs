//! Configuration for the synchronization core.
//!
//! Loaded from `~/.agni/config.yaml` (or an explicit path). Every field has a
//! default, so an empty or partial file is valid:
//!
//! ```yaml
//! api_base_url: http://localhost:8000/api
//! prediction_base_url: https://fire-detection-ai-based.onrender.com
//! request_timeout_secs: 10
//! cadence:
//!   satellite_alerts_ms: 5000
//!   detection_ms: 2000
//!   swarm_ms: 3000
//! degraded_after_failures: 3
//! verify_failure_policy: keep
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AgniError, Result};
use crate::logging::agni_home;

/// Default backend API base URL.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";

/// Default fire-spread prediction service base URL.
pub const DEFAULT_PREDICTION_BASE_URL: &str = "https://fire-detection-ai-based.onrender.com";

/// Default per-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Consecutive failed cycles before a source is reported as degraded.
pub const DEFAULT_DEGRADED_AFTER_FAILURES: u32 = 3;

/// Wind speed (km/h) used when a selected alert carries no environmental data.
pub const DEFAULT_WIND_SPEED: f64 = 15.0;

/// Wind direction used when a selected alert carries no environmental data.
pub const DEFAULT_WIND_DIRECTION: &str = "N";

/// Smallest cadence accepted by [`SyncConfig::validate`].
const MIN_CADENCE_MS: u64 = 100;

/// What the verification coordinator does when the confirming request fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VerifyFailurePolicy {
    /// Keep the optimistic VERIFIED state and surface the error.
    #[default]
    Keep,
    /// Restore DETECTED after a confirmed failure.
    Revert,
}

/// Poll cadences, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CadenceConfig {
    /// Combined satellite points + alert list cycle.
    pub satellite_alerts_ms: u64,
    /// Drone detection snapshot cycle.
    pub detection_ms: u64,
    /// Drone swarm list cycle.
    pub swarm_ms: u64,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            satellite_alerts_ms: 5000,
            detection_ms: 2000,
            swarm_ms: 3000,
        }
    }
}

impl CadenceConfig {
    pub fn satellite_alerts(&self) -> Duration {
        Duration::from_millis(self.satellite_alerts_ms)
    }

    pub fn detection(&self) -> Duration {
        Duration::from_millis(self.detection_ms)
    }

    pub fn swarm(&self) -> Duration {
        Duration::from_millis(self.swarm_ms)
    }
}

/// Synchronization core configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Backend REST API base URL (alerts, drones, satellite, verify)
    pub api_base_url: String,

    /// Fire-spread prediction service base URL
    pub prediction_base_url: String,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// Poll cadences
    pub cadence: CadenceConfig,

    /// Consecutive failures before a source counts as degraded
    pub degraded_after_failures: u32,

    /// Reconciliation policy for failed verifications
    pub verify_failure_policy: VerifyFailurePolicy,

    /// Wind speed used for predictions when the alert has none
    pub default_wind_speed: f64,

    /// Wind direction used for predictions when the alert has none
    pub default_wind_direction: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            prediction_base_url: DEFAULT_PREDICTION_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            cadence: CadenceConfig::default(),
            degraded_after_failures: DEFAULT_DEGRADED_AFTER_FAILURES,
            verify_failure_policy: VerifyFailurePolicy::default(),
            default_wind_speed: DEFAULT_WIND_SPEED,
            default_wind_direction: DEFAULT_WIND_DIRECTION.to_string(),
        }
    }
}

impl SyncConfig {
    /// Default config file path: `~/.agni/config.yaml`
    pub fn default_path() -> Result<PathBuf> {
        Ok(agni_home()?.join("config.yaml"))
    }

    /// Load and validate configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AgniError::ConfigNotFound {
                    path: path.to_path_buf(),
                    source: Some(e),
                }
            } else {
                AgniError::io("reading config", path, e)
            }
        })?;

        let config = Self::parse(&content).map_err(|message| AgniError::ConfigInvalid {
            path: path.to_path_buf(),
            message,
        })?;
        config.validate()?;

        debug!(path = %path.display(), "loaded sync config");
        Ok(config)
    }

    /// Load from `path` if given, otherwise from the default path, falling
    /// back to defaults when the default file does not exist.
    ///
    /// An explicitly given path must exist.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from(path);
        }

        let default_path = Self::default_path()?;
        if !default_path.exists() {
            debug!(path = %default_path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&default_path)
    }

    /// Parse configuration from a YAML string (without validation).
    pub fn parse(content: &str) -> std::result::Result<Self, String> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| e.to_string())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        for (field, url) in [
            ("api_base_url", &self.api_base_url),
            ("prediction_base_url", &self.prediction_base_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(AgniError::config_validation(format!(
                    "{field} must be an http(s) URL, got '{url}'"
                )));
            }
        }

        if !(1..=60).contains(&self.request_timeout_secs) {
            return Err(AgniError::config_validation(format!(
                "request_timeout_secs must be between 1 and 60, got {}",
                self.request_timeout_secs
            )));
        }

        for (field, ms) in [
            ("cadence.satellite_alerts_ms", self.cadence.satellite_alerts_ms),
            ("cadence.detection_ms", self.cadence.detection_ms),
            ("cadence.swarm_ms", self.cadence.swarm_ms),
        ] {
            if ms < MIN_CADENCE_MS {
                return Err(AgniError::config_validation(format!(
                    "{field} must be >= {MIN_CADENCE_MS}, got {ms}"
                )));
            }
        }

        if self.degraded_after_failures == 0 {
            return Err(AgniError::config_validation(
                "degraded_after_failures must be >= 1",
            ));
        }

        if !self.default_wind_speed.is_finite() || self.default_wind_speed < 0.0 {
            return Err(AgniError::config_validation(format!(
                "default_wind_speed must be a non-negative number, got {}",
                self.default_wind_speed
            )));
        }

        if self.default_wind_direction.trim().is_empty() {
            return Err(AgniError::config_validation(
                "default_wind_direction must not be empty",
            ));
        }

        Ok(())
    }

    /// Request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Override the backend base URL.
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Override the prediction service base URL.
    pub fn with_prediction_base_url(mut self, url: impl Into<String>) -> Self {
        self.prediction_base_url = url.into();
        self
    }

    /// Override the verify-failure policy.
    pub fn with_verify_failure_policy(mut self, policy: VerifyFailurePolicy) -> Self {
        self.verify_failure_policy = policy;
        self
    }
}
