//! View model store: the canonical dashboard state.
//!
//! The store is the only owner of the alert list, drone list, detection
//! snapshot, satellite points, and the prediction set for the selected alert.
//! Everything else reads cloned snapshots and mutates through the entry
//! points below:
//!
//! | Entry point | Used by |
//! |---|---|
//! | `replace_*` | poll tasks (wholesale swap, no merge against prior state) |
//! | `apply_verification` / `revert_verification` | verification coordinator |
//! | `set_prediction` / `clear_prediction` | prediction fetcher |
//!
//! Each change bumps a revision number published on a `watch` channel so the
//! presentation layer can redraw only when something changed.
//!
//! Locks are held only for the duration of a swap, never across an `.await`.

use std::sync::{PoisonError, RwLock, RwLockReadGuard};

use agni_core::{
    Alert, AlertId, AlertStatus, DetectionSnapshot, Drone, SatellitePoint, SpreadPrediction,
};
use tokio::sync::watch;
use tracing::debug;

/// Predictions for one alert.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionSet {
    pub alert_id: AlertId,
    pub predictions: Vec<SpreadPrediction>,
}

/// What the primary drone feed shows.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedView {
    pub drone: Drone,
    pub detection: DetectionSnapshot,
    pub fire_overlay: bool,
}

/// A consistent copy of the whole store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardSnapshot {
    pub alerts: Vec<Alert>,
    pub drones: Vec<Drone>,
    pub detection: DetectionSnapshot,
    pub satellite_points: Vec<SatellitePoint>,
    pub prediction: Option<PredictionSet>,
    pub revision: u64,
}

impl DashboardSnapshot {
    /// (detected, verified) alert counts.
    pub fn alert_counts(&self) -> (usize, usize) {
        let verified = self.alerts.iter().filter(|a| a.is_verified()).count();
        (self.alerts.len() - verified, verified)
    }

    /// One-line summary for logs.
    pub fn summary(&self) -> String {
        let (detected, verified) = self.alert_counts();
        format!(
            "rev {}: {} alerts ({} detected, {} verified), {} drones, {} heat points, detection: {}{}",
            self.revision,
            self.alerts.len(),
            detected,
            verified,
            self.drones.len(),
            self.satellite_points.len(),
            self.detection.message,
            match &self.prediction {
                Some(p) => format!(", {} spread rings for {}", p.predictions.len(), p.alert_id),
                None => String::new(),
            }
        )
    }
}

/// Canonical dashboard state.
#[derive(Debug)]
pub struct ViewModelStore {
    state: RwLock<DashboardSnapshot>,
    revision_tx: watch::Sender<u64>,
}

impl Default for ViewModelStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewModelStore {
    pub fn new() -> Self {
        let (revision_tx, _) = watch::channel(0);
        Self {
            state: RwLock::new(DashboardSnapshot::default()),
            revision_tx,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, DashboardSnapshot> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `f` under the write lock; bump the revision if it reports a change.
    fn mutate<R>(&self, f: impl FnOnce(&mut DashboardSnapshot) -> (R, bool)) -> R {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let (result, changed) = f(&mut state);
        if changed {
            state.revision += 1;
            self.revision_tx.send_replace(state.revision);
        }
        result
    }

    // ========================================================================
    // Poll merges
    // ========================================================================

    /// Replace the alert list wholesale.
    pub fn replace_alerts(&self, alerts: Vec<Alert>) {
        self.mutate(|s| {
            let changed = s.alerts != alerts;
            s.alerts = alerts;
            ((), changed)
        });
    }

    /// Replace the drone list wholesale.
    pub fn replace_drones(&self, drones: Vec<Drone>) {
        self.mutate(|s| {
            let changed = s.drones != drones;
            s.drones = drones;
            ((), changed)
        });
    }

    /// Replace the detection snapshot.
    pub fn replace_detection(&self, detection: DetectionSnapshot) {
        self.mutate(|s| {
            let changed = s.detection != detection;
            s.detection = detection;
            ((), changed)
        });
    }

    /// Replace the satellite point list wholesale.
    pub fn replace_satellite_points(&self, points: Vec<SatellitePoint>) {
        self.mutate(|s| {
            let changed = s.satellite_points != points;
            s.satellite_points = points;
            ((), changed)
        });
    }

    // ========================================================================
    // Optimistic verification
    // ========================================================================

    /// Mark an alert VERIFIED. Returns false (no-op) if the alert is absent
    /// or already verified.
    pub fn apply_verification(&self, alert_id: &str) -> bool {
        self.set_status(alert_id, AlertStatus::Detected, AlertStatus::Verified)
    }

    /// Restore an alert to DETECTED. Returns false if absent or not verified.
    pub fn revert_verification(&self, alert_id: &str) -> bool {
        self.set_status(alert_id, AlertStatus::Verified, AlertStatus::Detected)
    }

    fn set_status(&self, alert_id: &str, from: AlertStatus, to: AlertStatus) -> bool {
        let changed = self.mutate(|s| {
            let changed = match s.alerts.iter_mut().find(|a| a.id == alert_id) {
                Some(alert) if alert.status == from => {
                    alert.status = to;
                    true
                }
                _ => false,
            };
            (changed, changed)
        });
        if changed {
            debug!(alert_id, status = %to, "alert status set locally");
        }
        changed
    }

    // ========================================================================
    // Predictions
    // ========================================================================

    /// Replace the prediction set with predictions for `alert_id`.
    pub fn set_prediction(&self, alert_id: impl Into<AlertId>, predictions: Vec<SpreadPrediction>) {
        let set = PredictionSet {
            alert_id: alert_id.into(),
            predictions,
        };
        self.mutate(|s| {
            let changed = s.prediction.as_ref() != Some(&set);
            s.prediction = Some(set);
            ((), changed)
        });
    }

    /// Drop the prediction set. Returns true if one was present.
    pub fn clear_prediction(&self) -> bool {
        self.mutate(|s| {
            let had = s.prediction.take().is_some();
            (had, had)
        })
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Clone the full state.
    pub fn snapshot(&self) -> DashboardSnapshot {
        self.read().clone()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.read().alerts.clone()
    }

    pub fn alert(&self, alert_id: &str) -> Option<Alert> {
        self.read().alerts.iter().find(|a| a.id == alert_id).cloned()
    }

    pub fn drones(&self) -> Vec<Drone> {
        self.read().drones.clone()
    }

    /// The drone list, or a single CONNECTING placeholder while it is empty.
    pub fn drones_or_placeholder(&self) -> Vec<Drone> {
        let drones = self.drones();
        if drones.is_empty() {
            vec![Drone::connecting_placeholder()]
        } else {
            drones
        }
    }

    pub fn detection(&self) -> DetectionSnapshot {
        self.read().detection.clone()
    }

    pub fn satellite_points(&self) -> Vec<SatellitePoint> {
        self.read().satellite_points.clone()
    }

    pub fn prediction(&self) -> Option<PredictionSet> {
        self.read().prediction.clone()
    }

    /// The first drone's feed carries the detection snapshot.
    pub fn primary_feed(&self) -> FeedView {
        let state = self.read();
        let drone = state
            .drones
            .first()
            .cloned()
            .unwrap_or_else(Drone::connecting_placeholder);
        FeedView {
            drone,
            fire_overlay: state.detection.shows_fire_overlay(),
            detection: state.detection.clone(),
        }
    }

    pub fn revision(&self) -> u64 {
        self.read().revision
    }

    /// Receive the revision number after every change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision_tx.subscribe()
    }
}
