//! Poll actions and response envelopes.
//!
//! Every payload is decoded into a typed envelope and validated before it
//! reaches the store. A missing or out-of-range field fails the whole cycle
//! with [`SyncError::MalformedResponse`] and leaves the previous state intact.

use std::sync::Arc;

use agni_core::{Alert, DetectionSnapshot, Drone, SatellitePoint, SpreadPrediction, Validate};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::gateway::{Endpoint, FetchGateway};
use crate::health::Source;
use crate::scheduler::{Liveness, PollAction, PollOutcome};
use crate::store::ViewModelStore;

/// Envelope `status` value that allows a merge.
pub const STATUS_SUCCESS: &str = "success";

#[derive(Debug, Deserialize)]
struct SatelliteEnvelope {
    data: Vec<SatellitePoint>,
}

#[derive(Debug, Deserialize)]
struct AlertsEnvelope {
    alerts: Vec<Alert>,
}

#[derive(Debug, Deserialize)]
struct DetectionEnvelope {
    analysis: DetectionSnapshot,
}

#[derive(Debug, Deserialize)]
struct SwarmEnvelope {
    status: String,
    #[serde(default)]
    drones: Option<Vec<Drone>>,
}

#[derive(Debug, Deserialize)]
struct PredictionEnvelope {
    status: String,
    #[serde(default)]
    prediction: Option<Vec<SpreadPrediction>>,
}

/// Decode a JSON body into `T`, attributing failures to `endpoint`.
fn decode<T: DeserializeOwned>(endpoint: &Endpoint, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| SyncError::malformed(endpoint.label(), e.to_string()))
}

fn check<T: Validate + ?Sized>(endpoint: &Endpoint, payload: &T) -> Result<()> {
    payload
        .validate()
        .map_err(|detail| SyncError::malformed(endpoint.label(), detail))
}

/// GET `endpoint` and map transport failures.
async fn fetch(gateway: &dyn FetchGateway, endpoint: &Endpoint) -> Result<Value> {
    gateway
        .get(endpoint)
        .await
        .map_err(|e| SyncError::from_fetch(endpoint.label(), e))
}

fn require_success(endpoint: &Endpoint, status: &str) -> Result<()> {
    if status == STATUS_SUCCESS {
        Ok(())
    } else {
        Err(SyncError::Rejected {
            endpoint: endpoint.label().to_string(),
            status: status.to_string(),
        })
    }
}

pub(crate) async fn fetch_satellite_points(gateway: &dyn FetchGateway) -> Result<Vec<SatellitePoint>> {
    let endpoint = Endpoint::SatelliteData;
    let envelope: SatelliteEnvelope = decode(&endpoint, fetch(gateway, &endpoint).await?)?;
    check(&endpoint, envelope.data.as_slice())?;
    Ok(envelope.data)
}

pub(crate) async fn fetch_alerts(gateway: &dyn FetchGateway) -> Result<Vec<Alert>> {
    let endpoint = Endpoint::Alerts;
    let envelope: AlertsEnvelope = decode(&endpoint, fetch(gateway, &endpoint).await?)?;
    check(&endpoint, envelope.alerts.as_slice())?;
    Ok(envelope.alerts)
}

pub(crate) async fn fetch_detection(gateway: &dyn FetchGateway) -> Result<DetectionSnapshot> {
    let endpoint = Endpoint::DroneStatus;
    let envelope: DetectionEnvelope = decode(&endpoint, fetch(gateway, &endpoint).await?)?;
    check(&endpoint, &envelope.analysis)?;
    Ok(envelope.analysis)
}

pub(crate) async fn fetch_drones(gateway: &dyn FetchGateway) -> Result<Vec<Drone>> {
    let endpoint = Endpoint::Drones;
    let envelope: SwarmEnvelope = decode(&endpoint, fetch(gateway, &endpoint).await?)?;
    require_success(&endpoint, &envelope.status)?;
    let drones = envelope
        .drones
        .ok_or_else(|| SyncError::malformed(endpoint.label(), "missing field `drones`"))?;
    check(&endpoint, drones.as_slice())?;
    Ok(drones)
}

/// Fetch spread predictions for one location.
pub(crate) async fn fetch_predictions(
    gateway: &dyn FetchGateway,
    endpoint: &Endpoint,
) -> Result<Vec<SpreadPrediction>> {
    let envelope: PredictionEnvelope = decode(endpoint, fetch(gateway, endpoint).await?)?;
    require_success(endpoint, &envelope.status)?;
    let predictions = envelope
        .prediction
        .ok_or_else(|| SyncError::malformed(endpoint.label(), "missing field `prediction`"))?;
    check(endpoint, predictions.as_slice())?;
    Ok(predictions)
}

/// Merge through the liveness guard.
fn merge(liveness: &Liveness, f: impl FnOnce()) -> PollOutcome {
    match liveness.run_if_alive(f) {
        Some(()) => PollOutcome::Merged,
        None => PollOutcome::Discarded,
    }
}

// ============================================================================
// Poll actions
// ============================================================================

/// `/satellite-data` and `/alerts`, fetched concurrently.
pub struct SatelliteAlertsPoll {
    gateway: Arc<dyn FetchGateway>,
    store: Arc<ViewModelStore>,
}

impl SatelliteAlertsPoll {
    pub fn new(gateway: Arc<dyn FetchGateway>, store: Arc<ViewModelStore>) -> Self {
        Self { gateway, store }
    }
}

#[async_trait]
impl PollAction for SatelliteAlertsPoll {
    fn name(&self) -> &'static str {
        "satellite_alerts"
    }

    fn source(&self) -> Source {
        Source::SatelliteAlerts
    }

    async fn run(&self, liveness: &Liveness) -> Result<PollOutcome> {
        let gateway = self.gateway.as_ref();
        let (points, alerts) = tokio::join!(fetch_satellite_points(gateway), fetch_alerts(gateway));

        // Each half merges on its own; one bad feed does not hold back the other.
        let mut outcome = PollOutcome::Merged;
        let mut first_error = None;

        match points {
            Ok(points) => {
                debug!(count = points.len(), "satellite points fetched");
                if merge(liveness, || self.store.replace_satellite_points(points)) == PollOutcome::Discarded {
                    outcome = PollOutcome::Discarded;
                }
            }
            Err(e) => first_error = Some(e),
        }

        match alerts {
            Ok(alerts) => {
                debug!(count = alerts.len(), "alerts fetched");
                if merge(liveness, || self.store.replace_alerts(alerts)) == PollOutcome::Discarded {
                    outcome = PollOutcome::Discarded;
                }
            }
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) if outcome == PollOutcome::Merged => Err(e),
            _ => Ok(outcome),
        }
    }
}

/// `/drone-status`.
pub struct DetectionPoll {
    gateway: Arc<dyn FetchGateway>,
    store: Arc<ViewModelStore>,
}

impl DetectionPoll {
    pub fn new(gateway: Arc<dyn FetchGateway>, store: Arc<ViewModelStore>) -> Self {
        Self { gateway, store }
    }
}

#[async_trait]
impl PollAction for DetectionPoll {
    fn name(&self) -> &'static str {
        "detection"
    }

    fn source(&self) -> Source {
        Source::Detection
    }

    async fn run(&self, liveness: &Liveness) -> Result<PollOutcome> {
        let detection = fetch_detection(self.gateway.as_ref()).await?;
        Ok(merge(liveness, || self.store.replace_detection(detection)))
    }
}

/// `/drones`. Merges only on a `success` envelope.
pub struct SwarmPoll {
    gateway: Arc<dyn FetchGateway>,
    store: Arc<ViewModelStore>,
}

impl SwarmPoll {
    pub fn new(gateway: Arc<dyn FetchGateway>, store: Arc<ViewModelStore>) -> Self {
        Self { gateway, store }
    }
}

#[async_trait]
impl PollAction for SwarmPoll {
    fn name(&self) -> &'static str {
        "swarm"
    }

    fn source(&self) -> Source {
        Source::Swarm
    }

    async fn run(&self, liveness: &Liveness) -> Result<PollOutcome> {
        let drones = fetch_drones(self.gateway.as_ref()).await?;
        Ok(merge(liveness, || self.store.replace_drones(drones)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::mock::ScriptedGateway;
    use agni_core::{AlertStatus, Severity};
    use serde_json::json;

    fn setup() -> (ScriptedGateway, Arc<ViewModelStore>) {
        (ScriptedGateway::new(), Arc::new(ViewModelStore::new()))
    }

    fn alert_json(id: &str) -> Value {
        json!({
            "id": id,
            "lat": 28.61,
            "lng": 77.21,
            "severity": "SEVERE",
            "confidence": 92,
            "status": "DETECTED",
            "timestamp": "2025-01-01T00:00:00Z"
        })
    }

    #[tokio::test]
    async fn test_satellite_alerts_merges_both() {
        let (gw, store) = setup();
        gw.respond("/satellite-data", json!({"data": [{"lat": 28.6, "lng": 77.2, "intensity": 0.7}]}));
        gw.respond("/alerts", json!({"alerts": [alert_json("FIRE-001")]}));

        let poll = SatelliteAlertsPoll::new(Arc::new(gw), Arc::clone(&store));
        let outcome = poll.run(&Liveness::new()).await.unwrap();

        assert_eq!(outcome, PollOutcome::Merged);
        assert_eq!(store.satellite_points().len(), 1);
        let alerts = store.alerts();
        assert_eq!(alerts[0].severity, Severity::Severe);
        assert_eq!(alerts[0].status, AlertStatus::Detected);
    }

    #[tokio::test]
    async fn test_failing_satellite_feed_does_not_block_alerts() {
        let (gw, store) = setup();
        gw.fail("/satellite-data", FetchError::http_status(503, "ingest down"));
        gw.respond("/alerts", json!({"alerts": [alert_json("FIRE-001")]}));

        let poll = SatelliteAlertsPoll::new(Arc::new(gw), Arc::clone(&store));
        let err = poll.run(&Liveness::new()).await.unwrap_err();

        assert!(matches!(err, SyncError::HttpError { status: 503, .. }));
        assert_eq!(store.alerts().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_alert_keeps_previous_list() {
        let (gw, store) = setup();
        store.replace_alerts(vec![Alert::new("OLD", 1.0, 1.0, Severity::Low, 10.0)]);
        gw.respond("/satellite-data", json!({"data": []}));
        gw.respond("/alerts", json!({"alerts": [{"id": "FIRE-002", "lat": 91.0, "lng": 0.0,
            "severity": "SEVERE", "confidence": 50}]}));

        let poll = SatelliteAlertsPoll::new(Arc::new(gw), Arc::clone(&store));
        let err = poll.run(&Liveness::new()).await.unwrap_err();

        assert!(matches!(err, SyncError::MalformedResponse { ref endpoint, .. } if endpoint == "/alerts"));
        assert_eq!(store.alerts()[0].id, "OLD");
    }

    #[tokio::test]
    async fn test_detection_poll() {
        let (gw, store) = setup();
        gw.respond(
            "/drone-status",
            json!({"analysis": {"detected": true, "message": "Smoke plume", "confidence": 0.93, "bbox": [1, 2, 3, 4]}}),
        );

        let poll = DetectionPoll::new(Arc::new(gw), Arc::clone(&store));
        poll.run(&Liveness::new()).await.unwrap();

        let detection = store.detection();
        assert!(detection.detected);
        assert!(detection.shows_fire_overlay());
    }

    #[tokio::test]
    async fn test_detection_missing_analysis_is_malformed() {
        let (gw, store) = setup();
        gw.respond("/drone-status", json!({"status": "ok"}));

        let poll = DetectionPoll::new(Arc::new(gw), Arc::clone(&store));
        let err = poll.run(&Liveness::new()).await.unwrap_err();
        assert!(matches!(err, SyncError::MalformedResponse { .. }));
        assert_eq!(store.detection(), DetectionSnapshot::default());
    }

    #[tokio::test]
    async fn test_swarm_rejected_status_leaves_drones() {
        let (gw, store) = setup();
        gw.enqueue(
            "/drones",
            crate::mock::Reply::ok(json!({"status": "success", "drones": [
                {"id": "DRONE-ALPHA", "type": "VISUAL", "battery": 88, "lat": 28.6, "lng": 77.2, "status": "PATROLLING"}
            ]})),
        );
        gw.respond("/drones", json!({"status": "error"}));

        let poll = SwarmPoll::new(Arc::new(gw), Arc::clone(&store));
        poll.run(&Liveness::new()).await.unwrap();
        assert_eq!(store.drones().len(), 1);

        let err = poll.run(&Liveness::new()).await.unwrap_err();
        assert!(matches!(err, SyncError::Rejected { ref status, .. } if status == "error"));
        assert_eq!(store.drones()[0].id, "DRONE-ALPHA");
    }

    #[tokio::test]
    async fn test_dead_liveness_discards() {
        let (gw, store) = setup();
        gw.respond("/drone-status", json!({"analysis": {"detected": false, "message": "Clear"}}));

        let liveness = Liveness::new();
        liveness.kill();
        let poll = DetectionPoll::new(Arc::new(gw), Arc::clone(&store));
        assert_eq!(poll.run(&liveness).await.unwrap(), PollOutcome::Discarded);
        assert_eq!(store.revision(), 0);
    }

    #[tokio::test]
    async fn test_prediction_requires_success() {
        let gw = ScriptedGateway::new();
        let endpoint = Endpoint::FireSpread {
            lat: 28.61,
            lng: 77.21,
            wind_speed: 15.0,
            wind_direction: "N".into(),
        };
        gw.respond("/api/fire-spread", json!({"status": "error", "message": "model cold"}));
        let err = fetch_predictions(&gw, &endpoint).await.unwrap_err();
        assert!(matches!(err, SyncError::Rejected { .. }));

        gw.respond("/api/fire-spread", json!({"status": "success", "prediction": [
            {"radius_km": 0.9, "duration": 15, "risk_escalation": "MODERATE"}
        ]}));
        assert_eq!(fetch_predictions(&gw, &endpoint).await.unwrap().len(), 1);
    }
}
