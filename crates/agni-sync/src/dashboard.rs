//! Dashboard root: wires the gateway, store, poll tasks, verification and
//! predictions together and tears them down as one unit.

use std::sync::Arc;

use agni_core::{CadenceConfig, SyncConfig};
use tokio::task::JoinHandle;
use tracing::info;

use crate::gateway::{FetchGateway, HttpGateway};
use crate::health::UplinkMonitor;
use crate::prediction::{PredictionFetcher, PredictionOutcome};
use crate::scheduler::PollScheduler;
use crate::store::ViewModelStore;
use crate::tasks::{DetectionPoll, SatelliteAlertsPoll, SwarmPoll};
use crate::verify::{VerificationCoordinator, VerifyOutcome};

/// The running sync core.
pub struct Dashboard {
    gateway: Arc<dyn FetchGateway>,
    store: Arc<ViewModelStore>,
    monitor: Arc<UplinkMonitor>,
    scheduler: PollScheduler,
    verifier: VerificationCoordinator,
    predictions: PredictionFetcher,
    cadence: CadenceConfig,
    started: bool,
}

impl Dashboard {
    /// Build a dashboard talking to the configured backend over HTTP.
    pub fn from_config(config: &SyncConfig) -> agni_core::Result<Self> {
        let gateway = HttpGateway::from_config(config)?;
        Ok(Self::with_gateway(Arc::new(gateway), config))
    }

    /// Build a dashboard on any gateway.
    pub fn with_gateway(gateway: Arc<dyn FetchGateway>, config: &SyncConfig) -> Self {
        let store = Arc::new(ViewModelStore::new());
        let monitor = Arc::new(UplinkMonitor::new(config.degraded_after_failures));

        let verifier = VerificationCoordinator::new(
            Arc::clone(&gateway),
            Arc::clone(&store),
            Arc::clone(&monitor),
            config.verify_failure_policy,
        );
        let predictions = PredictionFetcher::new(
            Arc::clone(&gateway),
            Arc::clone(&store),
            Arc::clone(&monitor),
            config,
        );

        Self {
            scheduler: PollScheduler::new(Arc::clone(&monitor)),
            gateway,
            store,
            monitor,
            verifier,
            predictions,
            cadence: config.cadence.clone(),
            started: false,
        }
    }

    /// Register the three poll tasks. Calling it again does nothing.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;

        info!(gateway = self.gateway.name(), "starting sync core");
        self.scheduler.register(
            SatelliteAlertsPoll::new(Arc::clone(&self.gateway), Arc::clone(&self.store)),
            self.cadence.satellite_alerts(),
        );
        self.scheduler.register(
            DetectionPoll::new(Arc::clone(&self.gateway), Arc::clone(&self.store)),
            self.cadence.detection(),
        );
        self.scheduler.register(
            SwarmPoll::new(Arc::clone(&self.gateway), Arc::clone(&self.store)),
            self.cadence.swarm(),
        );
    }

    pub async fn verify(&self, alert_id: &str) -> VerifyOutcome {
        self.verifier.verify(alert_id).await
    }

    /// Select an alert by id, or clear the selection with `None`.
    pub fn select_alert(&self, alert_id: Option<&str>) -> JoinHandle<PredictionOutcome> {
        self.predictions.select_by_id(alert_id)
    }

    pub fn store(&self) -> &Arc<ViewModelStore> {
        &self.store
    }

    pub fn monitor(&self) -> &Arc<UplinkMonitor> {
        &self.monitor
    }

    pub fn scheduler(&self) -> &PollScheduler {
        &self.scheduler
    }

    pub fn verifier(&self) -> &VerificationCoordinator {
        &self.verifier
    }

    pub fn predictions(&self) -> &PredictionFetcher {
        &self.predictions
    }

    /// Stop polling and silence in-flight predictions.
    pub async fn shutdown(&mut self) {
        self.predictions.shutdown();
        self.scheduler.shutdown_and_wait().await;
        info!("sync core stopped");
    }
}
