//! Uplink health tracking.
//!
//! [`UplinkMonitor`] is the sink every sync failure is reported to. It keeps a
//! per-source failure streak and a bounded failure history, and answers the
//! one question the presentation layer needs: has the uplink been failing for
//! long enough to show a "degraded" indicator?
//!
//! A single transient failure never flips the indicator. A source is degraded
//! once its consecutive-failure streak reaches the configured threshold, and
//! recovers on its next success.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::error::SyncError;

/// Maximum number of failures kept in history.
const MAX_FAILURE_HISTORY: usize = 50;

/// Origin of a sync result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Source {
    /// Combined satellite points + alerts poll
    SatelliteAlerts,
    /// Drone detection snapshot poll
    Detection,
    /// Drone swarm list poll
    Swarm,
    /// Alert verification requests
    Verify,
    /// Fire-spread prediction requests
    Prediction,
}

impl Source {
    /// Polling sources feed the uplink indicator; user actions do not.
    pub fn is_poll(&self) -> bool {
        matches!(self, Self::SatelliteAlerts | Self::Detection | Self::Swarm)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::SatelliteAlerts => "satellite_alerts",
            Self::Detection => "detection",
            Self::Swarm => "swarm",
            Self::Verify => "verify",
            Self::Prediction => "prediction",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A recorded failure.
#[derive(Debug, Clone)]
pub struct RecordedFailure {
    pub id: usize,
    pub source: Source,
    pub error: SyncError,
    pub at: DateTime<Utc>,
}

/// Health counters for one source.
#[derive(Debug, Clone, Default)]
pub struct SourceHealth {
    pub consecutive_failures: u32,
    pub total_failures: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    pub last_error: Option<SyncError>,
}

#[derive(Debug, Default)]
struct MonitorState {
    sources: HashMap<Source, SourceHealth>,
    history: VecDeque<RecordedFailure>,
    next_id: usize,
    stale_discards: u64,
}

/// Tracks failure streaks per source.
#[derive(Debug)]
pub struct UplinkMonitor {
    degraded_after: u32,
    state: Mutex<MonitorState>,
}

impl UplinkMonitor {
    /// Create a monitor that reports a source degraded after
    /// `degraded_after` consecutive failures.
    pub fn new(degraded_after: u32) -> Self {
        Self {
            degraded_after: degraded_after.max(1),
            state: Mutex::new(MonitorState {
                next_id: 1,
                ..Default::default()
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record a successful cycle; resets the failure streak.
    pub fn record_success(&self, source: Source) {
        let mut state = self.lock();
        let health = state.sources.entry(source).or_default();
        if health.consecutive_failures >= self.degraded_after {
            info!(%source, failures = health.consecutive_failures, "uplink recovered");
        }
        health.consecutive_failures = 0;
        health.last_success = Some(Utc::now());
    }

    /// Record a failure. Returns true when this failure made the source
    /// degraded.
    ///
    /// Stale results are counted separately and never affect health.
    pub fn record_failure(&self, source: Source, err: &SyncError) -> bool {
        if let SyncError::StaleResult { generation } = err {
            self.record_stale(*generation);
            return false;
        }

        let now = Utc::now();
        let mut state = self.lock();

        let health = state.sources.entry(source).or_default();
        health.consecutive_failures += 1;
        health.total_failures += 1;
        health.last_failure = Some(now);
        health.last_error = Some(err.clone());
        let streak = health.consecutive_failures;

        let id = state.next_id;
        state.next_id += 1;
        state.history.push_back(RecordedFailure {
            id,
            source,
            error: err.clone(),
            at: now,
        });
        while state.history.len() > MAX_FAILURE_HISTORY {
            state.history.pop_front();
        }

        let became_degraded = streak == self.degraded_after;
        if became_degraded {
            error!(%source, streak, error = %err, "uplink degraded");
        } else {
            warn!(%source, streak, error = %err, "sync failure");
        }
        became_degraded
    }

    /// Count a discarded stale result (informational only).
    pub fn record_stale(&self, generation: u64) {
        debug!(generation, "stale result discarded");
        self.lock().stale_discards += 1;
    }

    /// Whether `source` has failed at least the threshold number of times in a row.
    pub fn is_degraded(&self, source: Source) -> bool {
        self.lock()
            .sources
            .get(&source)
            .is_some_and(|h| h.consecutive_failures >= self.degraded_after)
    }

    /// Whether any polling source is degraded.
    pub fn uplink_degraded(&self) -> bool {
        !self.degraded_sources().is_empty()
    }

    /// Polling sources currently degraded, in stable order.
    pub fn degraded_sources(&self) -> Vec<Source> {
        let state = self.lock();
        let mut sources: Vec<Source> = state
            .sources
            .iter()
            .filter(|(source, h)| source.is_poll() && h.consecutive_failures >= self.degraded_after)
            .map(|(source, _)| *source)
            .collect();
        sources.sort();
        sources
    }

    /// Counters for one source.
    pub fn health(&self, source: Source) -> SourceHealth {
        self.lock().sources.get(&source).cloned().unwrap_or_default()
    }

    /// The most recent failures, newest last.
    pub fn recent_failures(&self, limit: usize) -> Vec<RecordedFailure> {
        let state = self.lock();
        let skip = state.history.len().saturating_sub(limit);
        state.history.iter().skip(skip).cloned().collect()
    }

    /// Number of stale results discarded so far.
    pub fn stale_discards(&self) -> u64 {
        self.lock().stale_discards
    }

    pub fn degraded_after(&self) -> u32 {
        self.degraded_after
    }
}

impl Default for UplinkMonitor {
    fn default() -> Self {
        Self::new(agni_core::config::DEFAULT_DEGRADED_AFTER_FAILURES)
    }
}
