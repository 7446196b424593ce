//! Selection-driven fire-spread predictions.
//!
//! Selecting an alert fetches spread predictions for its location. Requests
//! may resolve in any order, so every selection takes a new generation
//! number. A completing request writes to the store only if its generation
//! is still current, and the check and the write happen under the same lock
//! as selection changes. A response for an alert the operator has already
//! moved away from can never be shown.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use agni_core::{Alert, AlertId, SyncConfig, log_sync_event};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::gateway::{Endpoint, FetchGateway};
use crate::health::{Source, UplinkMonitor};
use crate::store::ViewModelStore;
use crate::tasks::fetch_predictions;

/// How a selection settled.
#[derive(Debug, Clone, PartialEq)]
pub enum PredictionOutcome {
    /// Predictions were written to the store
    Applied { alert_id: AlertId, predictions: usize },
    /// A newer selection (or shutdown) superseded this one
    Stale { generation: u64 },
    /// The request failed; the store was not touched
    Failed(SyncError),
    /// Selection cleared; no request was made
    Cleared,
}

#[derive(Debug)]
struct SelectionState {
    selection: Option<AlertId>,
    generation: u64,
    alive: bool,
}

struct Inner {
    gateway: Arc<dyn FetchGateway>,
    store: Arc<ViewModelStore>,
    monitor: Arc<UplinkMonitor>,
    default_wind_speed: f64,
    default_wind_direction: String,
    state: Mutex<SelectionState>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, SelectionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Fetches predictions for the selected alert.
#[derive(Clone)]
pub struct PredictionFetcher {
    inner: Arc<Inner>,
}

impl PredictionFetcher {
    pub fn new(
        gateway: Arc<dyn FetchGateway>,
        store: Arc<ViewModelStore>,
        monitor: Arc<UplinkMonitor>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                gateway,
                store,
                monitor,
                default_wind_speed: config.default_wind_speed,
                default_wind_direction: config.default_wind_direction.clone(),
                state: Mutex::new(SelectionState {
                    selection: None,
                    generation: 0,
                    alive: true,
                }),
            }),
        }
    }

    /// Change the selection.
    ///
    /// The returned handle resolves when the request settles; dropping it
    /// does not cancel anything. Must be called from within a tokio runtime.
    pub fn select(&self, alert: Option<Alert>) -> JoinHandle<PredictionOutcome> {
        let mut state = self.inner.lock();

        if !state.alive {
            let generation = state.generation;
            return tokio::spawn(async move { PredictionOutcome::Stale { generation } });
        }

        state.generation += 1;
        let generation = state.generation;

        let Some(alert) = alert else {
            state.selection = None;
            self.inner.store.clear_prediction();
            debug!(generation, "selection cleared");
            return tokio::spawn(async { PredictionOutcome::Cleared });
        };

        if state.selection.as_deref() != Some(alert.id.as_str()) {
            // The previous set belongs to another alert.
            self.inner.store.clear_prediction();
        }
        state.selection = Some(alert.id.clone());
        drop(state);

        let endpoint = Endpoint::FireSpread {
            lat: alert.lat,
            lng: alert.lng,
            wind_speed: alert.wind_speed().unwrap_or(self.inner.default_wind_speed),
            wind_direction: alert
                .wind_direction()
                .unwrap_or(self.inner.default_wind_direction.as_str())
                .to_string(),
        };
        debug!(alert_id = %alert.id, generation, "requesting spread prediction");

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { complete(inner, alert.id, endpoint, generation).await })
    }

    /// Select by id, resolving the alert from the store. An id that is not
    /// in the store clears the selection.
    pub fn select_by_id(&self, alert_id: Option<&str>) -> JoinHandle<PredictionOutcome> {
        let alert = alert_id.and_then(|id| {
            let alert = self.inner.store.alert(id);
            if alert.is_none() {
                warn!(alert_id = id, "selected alert is not in the store");
            }
            alert
        });
        self.select(alert)
    }

    /// Supersede any in-flight request and refuse further selections.
    pub fn shutdown(&self) {
        let mut state = self.inner.lock();
        state.generation += 1;
        state.alive = false;
        info!(generation = state.generation, "prediction fetcher shut down");
    }

    pub fn current_selection(&self) -> Option<AlertId> {
        self.inner.lock().selection.clone()
    }

    pub fn generation(&self) -> u64 {
        self.inner.lock().generation
    }

    pub fn is_alive(&self) -> bool {
        self.inner.lock().alive
    }
}

async fn complete(
    inner: Arc<Inner>,
    alert_id: AlertId,
    endpoint: Endpoint,
    generation: u64,
) -> PredictionOutcome {
    let result = fetch_predictions(inner.gateway.as_ref(), &endpoint).await;

    let state = inner.lock();
    if !state.alive || state.generation != generation {
        drop(state);
        inner
            .monitor
            .record_failure(Source::Prediction, &SyncError::StaleResult { generation });
        return PredictionOutcome::Stale { generation };
    }

    match result {
        Ok(predictions) => {
            let count = predictions.len();
            inner.store.set_prediction(alert_id.clone(), predictions);
            drop(state);
            inner.monitor.record_success(Source::Prediction);
            log_sync_event!(Source::Prediction.name(), "applied", alert_id = %alert_id, generation, count);
            PredictionOutcome::Applied {
                alert_id,
                predictions: count,
            }
        }
        Err(e) => {
            drop(state);
            inner.monitor.record_failure(Source::Prediction, &e);
            PredictionOutcome::Failed(e)
        }
    }
}
