//! View model records exchanged with the AGNI-NET backend.
//!
//! Field names follow the backend's JSON contract. Every record implements
//! [`Validate`], which the sync layer runs before anything is merged into the
//! store: a payload that deserializes but carries out-of-range values is
//! treated the same as one that fails to parse.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a fire alert (e.g. `FIRE-4821`).
pub type AlertId = String;

/// Detection confidence above which the primary feed shows a fire overlay.
pub const FIRE_OVERLAY_CONFIDENCE: f64 = 0.8;

/// Range checks applied to a record received from the backend.
pub trait Validate {
    /// Returns a description of the first invalid field.
    fn validate(&self) -> Result<(), String>;
}

impl<T: Validate> Validate for [T] {
    fn validate(&self) -> Result<(), String> {
        self.iter()
            .enumerate()
            .try_for_each(|(i, item)| item.validate().map_err(|e| format!("[{i}] {e}")))
    }
}

fn check_lat_lng(lat: f64, lng: f64) -> Result<(), String> {
    if !(-90.0..=90.0).contains(&lat) {
        return Err(format!("lat out of range: {lat}"));
    }
    if !(-180.0..=180.0).contains(&lng) {
        return Err(format!("lng out of range: {lng}"));
    }
    Ok(())
}

fn check_range(field: &str, value: f64, max: f64) -> Result<(), String> {
    if value.is_finite() && (0.0..=max).contains(&value) {
        Ok(())
    } else {
        Err(format!("{field} must be within 0..={max}, got {value}"))
    }
}

// ============================================================================
// Alerts
// ============================================================================

/// Fire severity classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Below the moderate threshold; the backend still reports these
    Low,
    Moderate,
    Severe,
    #[serde(alias = "MEGA FIRE")]
    MegaFire,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Moderate => write!(f, "MODERATE"),
            Self::Severe => write!(f, "SEVERE"),
            Self::MegaFire => write!(f, "MEGA_FIRE"),
        }
    }
}

/// Alert verification status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertStatus {
    #[default]
    Detected,
    Verified,
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Detected => write!(f, "DETECTED"),
            Self::Verified => write!(f, "VERIFIED"),
        }
    }
}

/// One `{time, event}` record in an alert's timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub time: String,
    pub event: String,
}

/// Environmental conditions recorded with an alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EnvironmentalSummary {
    /// Wind speed in km/h
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_speed: Option<f64>,

    /// Compass direction (N, NE, E, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_direction: Option<String>,

    /// Vegetation density (0-1)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vegetation_density: Option<f64>,
}

/// A fire alert raised by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub lat: f64,
    pub lng: f64,
    pub severity: Severity,

    /// Confidence score, 0-100
    pub confidence: f64,

    pub status: AlertStatus,

    /// ISO-8601 timestamp, with or without UTC offset
    pub timestamp: String,

    /// Factor name to contribution percentage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factors: Option<BTreeMap<String, f64>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline: Option<Vec<TimelineEntry>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environmental: Option<EnvironmentalSummary>,

    /// Named assets inside the alert's risk area
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub risk_zones: Vec<String>,
}

impl Alert {
    /// Create a DETECTED alert with no optional data.
    pub fn new(id: impl Into<AlertId>, lat: f64, lng: f64, severity: Severity, confidence: f64) -> Self {
        Self {
            id: id.into(),
            lat,
            lng,
            severity,
            confidence,
            status: AlertStatus::Detected,
            timestamp: Utc::now().to_rfc3339(),
            factors: None,
            timeline: None,
            environmental: None,
            risk_zones: Vec::new(),
        }
    }

    /// Attach environmental wind data.
    pub fn with_wind(mut self, wind_speed: f64, wind_direction: impl Into<String>) -> Self {
        let env = self.environmental.get_or_insert_with(EnvironmentalSummary::default);
        env.wind_speed = Some(wind_speed);
        env.wind_direction = Some(wind_direction.into());
        self
    }

    pub fn is_verified(&self) -> bool {
        self.status == AlertStatus::Verified
    }

    /// Wind speed recorded with this alert, if any.
    pub fn wind_speed(&self) -> Option<f64> {
        self.environmental.as_ref().and_then(|e| e.wind_speed)
    }

    /// Wind direction recorded with this alert, ignoring blank values.
    pub fn wind_direction(&self) -> Option<&str> {
        self.environmental
            .as_ref()
            .and_then(|e| e.wind_direction.as_deref())
            .filter(|d| !d.trim().is_empty())
    }

    /// Parse the timestamp. Offset-less values are taken as UTC.
    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(&self.timestamp) {
            return Some(ts.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(&self.timestamp, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }
}

impl Validate for Alert {
    fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("alert id is empty".to_string());
        }
        check_lat_lng(self.lat, self.lng).map_err(|e| format!("alert {}: {e}", self.id))?;
        check_range("confidence", self.confidence, 100.0)
            .map_err(|e| format!("alert {}: {e}", self.id))?;
        if self.parsed_timestamp().is_none() {
            return Err(format!(
                "alert {}: timestamp is not ISO-8601: '{}'",
                self.id, self.timestamp
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Drones
// ============================================================================

/// Drone payload type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DroneType {
    Visual,
    Thermal,
    Relay,
}

/// Operational status of a drone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DroneStatus {
    Patrolling,
    Idle,
    Returning,
    Dispatched,
    /// Client-side placeholder while the fleet list is empty
    Connecting,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for DroneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Patrolling => "PATROLLING",
            Self::Idle => "IDLE",
            Self::Returning => "RETURNING",
            Self::Dispatched => "DISPATCHED",
            Self::Connecting => "CONNECTING",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(label)
    }
}

/// A drone in the swarm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drone {
    pub id: String,

    #[serde(rename = "type")]
    pub drone_type: DroneType,

    /// Battery percentage, 0-100
    pub battery: f64,

    pub lat: f64,
    pub lng: f64,
    pub status: DroneStatus,

    /// Video feed kind (optical, thermal, none)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed_type: Option<String>,
}

impl Drone {
    /// The placeholder shown in place of an empty fleet.
    pub fn connecting_placeholder() -> Self {
        Self {
            id: "SEARCHING...".to_string(),
            drone_type: DroneType::Visual,
            battery: 0.0,
            lat: 0.0,
            lng: 0.0,
            status: DroneStatus::Connecting,
            feed_type: Some("none".to_string()),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.status == DroneStatus::Connecting
    }
}

impl Validate for Drone {
    fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("drone id is empty".to_string());
        }
        check_range("battery", self.battery, 100.0).map_err(|e| format!("drone {}: {e}", self.id))?;
        check_lat_lng(self.lat, self.lng).map_err(|e| format!("drone {}: {e}", self.id))
    }
}

// ============================================================================
// Detection snapshot
// ============================================================================

/// The most recent drone AI analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionSnapshot {
    pub detected: bool,
    pub message: String,

    /// Detection confidence, 0-1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    /// Bounding box `[x, y, w, h]` in frame pixels
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bbox: Vec<u32>,
}

impl Default for DetectionSnapshot {
    fn default() -> Self {
        Self {
            detected: false,
            message: "Initializing...".to_string(),
            confidence: None,
            bbox: Vec::new(),
        }
    }
}

impl DetectionSnapshot {
    /// Whether the primary feed should draw the fire overlay.
    pub fn shows_fire_overlay(&self) -> bool {
        self.detected && self.confidence.is_some_and(|c| c > FIRE_OVERLAY_CONFIDENCE)
    }
}

impl Validate for DetectionSnapshot {
    fn validate(&self) -> Result<(), String> {
        if let Some(confidence) = self.confidence {
            check_range("detection confidence", confidence, 1.0)?;
        }
        if !self.bbox.is_empty() && self.bbox.len() != 4 {
            return Err(format!("bbox must have 4 elements, got {}", self.bbox.len()));
        }
        Ok(())
    }
}

// ============================================================================
// Satellite points
// ============================================================================

/// A satellite heat anomaly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SatellitePoint {
    pub lat: f64,
    pub lng: f64,

    /// Heat intensity, 0-1
    pub intensity: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_speed: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_direction: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vegetation: Option<f64>,
}

impl SatellitePoint {
    pub fn new(lat: f64, lng: f64, intensity: f64) -> Self {
        Self {
            lat,
            lng,
            intensity,
            wind_speed: None,
            wind_direction: None,
            vegetation: None,
        }
    }
}

impl Validate for SatellitePoint {
    fn validate(&self) -> Result<(), String> {
        check_lat_lng(self.lat, self.lng)?;
        check_range("intensity", self.intensity, 1.0)
    }
}

// ============================================================================
// Spread predictions
// ============================================================================

/// Risk escalation of a predicted spread ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskEscalation {
    High,
    Moderate,
}

/// Predicted fire extent after `duration` minutes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpreadPrediction {
    pub radius_km: f64,

    /// Minutes from now
    pub duration: u32,

    pub risk_escalation: RiskEscalation,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spread_direction: Option<String>,
}

impl Validate for SpreadPrediction {
    fn validate(&self) -> Result<(), String> {
        if !self.radius_km.is_finite() || self.radius_km < 0.0 {
            return Err(format!("radius_km must be non-negative, got {}", self.radius_km));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn alert_json() -> serde_json::Value {
        json!({
            "id": "FIRE-4821",
            "lat": 28.6139,
            "lng": 77.2090,
            "severity": "MEGA FIRE",
            "confidence": 92.4,
            "factors": {"Heat Anomaly": 100.0, "Smoke Detection": 100.0},
            "environmental": {"wind_speed": 22.5, "wind_direction": "NE", "vegetation_density": 0.61},
            "timeline": [{"time": "12:00:01", "event": "Heat anomaly detected by Sat-1"}],
            "timestamp": "2026-10-19T12:00:01.123456",
            "status": "DETECTED",
            "risk_zones": ["Village Alpha"]
        })
    }

    #[test]
    fn test_alert_from_backend_json() {
        let alert: Alert = serde_json::from_value(alert_json()).unwrap();
        assert_eq!(alert.severity, Severity::MegaFire);
        assert_eq!(alert.status, AlertStatus::Detected);
        assert_eq!(alert.wind_speed(), Some(22.5));
        assert_eq!(alert.wind_direction(), Some("NE"));
        assert_eq!(alert.risk_zones, vec!["Village Alpha".to_string()]);
        assert!(alert.parsed_timestamp().is_some());
        assert!(alert.validate().is_ok());
    }

    #[test]
    fn test_alert_minimal_fields() {
        let alert: Alert = serde_json::from_value(json!({
            "id": "FIRE-001",
            "lat": 28.61,
            "lng": 77.21,
            "severity": "SEVERE",
            "confidence": 92,
            "status": "VERIFIED",
            "timestamp": "2026-10-19T12:00:00Z"
        }))
        .unwrap();
        assert!(alert.is_verified());
        assert!(alert.environmental.is_none());
        assert_eq!(alert.wind_speed(), None);
        assert!(alert.validate().is_ok());
    }

    #[test]
    fn test_alert_missing_required_field() {
        let mut value = alert_json();
        value.as_object_mut().unwrap().remove("status");
        assert!(serde_json::from_value::<Alert>(value).is_err());
    }

    #[test]
    fn test_alert_validation_rejects_out_of_range() {
        let mut alert = Alert::new("FIRE-9", 28.6, 77.2, Severity::Moderate, 140.0);
        assert!(alert.validate().unwrap_err().contains("confidence"));

        alert.confidence = 60.0;
        alert.lat = 95.0;
        assert!(alert.validate().unwrap_err().contains("lat"));

        alert.lat = 28.6;
        alert.timestamp = "yesterday".to_string();
        assert!(alert.validate().unwrap_err().contains("timestamp"));
    }

    #[test]
    fn test_blank_wind_direction_is_absent() {
        let alert = Alert::new("FIRE-1", 0.0, 0.0, Severity::Low, 10.0).with_wind(5.0, " ");
        assert_eq!(alert.wind_direction(), None);
        assert_eq!(alert.wind_speed(), Some(5.0));
    }

    #[test]
    fn test_drone_unknown_status() {
        let drone: Drone = serde_json::from_value(json!({
            "id": "DRONE-ALPHA",
            "type": "VISUAL",
            "status": "CHARGING",
            "battery": 86.7,
            "lat": 28.62,
            "lng": 77.22,
            "feed_type": "optical"
        }))
        .unwrap();
        assert_eq!(drone.status, DroneStatus::Unknown);
        assert_eq!(drone.drone_type, DroneType::Visual);
        assert!(drone.validate().is_ok());
    }

    #[test]
    fn test_drone_battery_validation() {
        let mut drone = Drone::connecting_placeholder();
        drone.battery = 101.0;
        assert!(drone.validate().is_err());
    }

    #[test]
    fn test_connecting_placeholder() {
        let drone = Drone::connecting_placeholder();
        assert!(drone.is_placeholder());
        assert_eq!(drone.status.to_string(), "CONNECTING");
    }

    #[test]
    fn test_detection_overlay_threshold() {
        let mut snapshot = DetectionSnapshot::default();
        assert!(!snapshot.shows_fire_overlay());
        assert_eq!(snapshot.message, "Initializing...");

        snapshot.detected = true;
        snapshot.confidence = Some(0.8);
        assert!(!snapshot.shows_fire_overlay());

        snapshot.confidence = Some(0.93);
        assert!(snapshot.shows_fire_overlay());
    }

    #[test]
    fn test_detection_validation() {
        let snapshot: DetectionSnapshot = serde_json::from_value(json!({
            "detected": true,
            "confidence": 1.4,
            "bbox": [1, 2, 3, 4],
            "message": "Fire confirmed by drone AI"
        }))
        .unwrap();
        assert!(snapshot.validate().is_err());
    }

    #[test]
    fn test_slice_validation_reports_index() {
        let points = vec![
            SatellitePoint::new(28.6, 77.2, 0.5),
            SatellitePoint::new(28.6, 77.2, 1.5),
        ];
        let err = points.validate().unwrap_err();
        assert!(err.starts_with("[1]"));
    }

    #[test]
    fn test_prediction_from_json() {
        let prediction: SpreadPrediction = serde_json::from_value(json!({
            "duration": 60,
            "radius_km": 3.12,
            "spread_direction": "N",
            "risk_escalation": "HIGH"
        }))
        .unwrap();
        assert_eq!(prediction.risk_escalation, RiskEscalation::High);
        assert_eq!(prediction.duration, 60);
        assert!(prediction.validate().is_ok());
    }
}
