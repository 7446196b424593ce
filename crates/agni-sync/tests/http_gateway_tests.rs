//! HTTP gateway tests against a wiremock server.
//!
//! Covers error classification at the gateway boundary and one end-to-end
//! run of the dashboard over real HTTP.

use std::time::Duration;

use agni_core::{AlertStatus, SyncConfig};
use agni_sync::{Dashboard, Endpoint, FetchError, FetchGateway, HttpGateway, Method};
use serde_json::{Value, json};
use wiremock::{Mock, MockServer, ResponseTemplate, matchers};

fn gateway(server: &MockServer, timeout: Duration) -> HttpGateway {
    HttpGateway::new(&format!("{}/api", server.uri()), &server.uri(), timeout).unwrap()
}

fn alert_json(id: &str) -> Value {
    json!({
        "id": id,
        "lat": 28.61,
        "lng": 77.21,
        "severity": "MEGA FIRE",
        "confidence": 97.5,
        "status": "DETECTED",
        "timestamp": "2025-01-01T12:00:00",
        "factors": {"thermal_signature": 45.0, "smoke_detection": 30.0},
        "environmental": {"wind_speed": 18.0, "wind_direction": "NE", "vegetation_density": 0.8},
        "risk_zones": ["Pine Ridge School"]
    })
}

#[cfg(test)]
mod classification {
    use super::*;

    #[tokio::test]
    async fn test_success_returns_json() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("GET"))
            .and(matchers::path("/api/alerts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"alerts": []})))
            .mount(&server)
            .await;

        let gw = gateway(&server, Duration::from_secs(5));
        let body = gw.get(&Endpoint::Alerts).await.unwrap();
        assert_eq!(body, json!({"alerts": []}));
    }

    #[tokio::test]
    async fn test_non_success_status_is_http_status() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("GET"))
            .and(matchers::path("/api/drones"))
            .respond_with(ResponseTemplate::new(503).set_body_string("fleet controller offline"))
            .mount(&server)
            .await;

        let gw = gateway(&server, Duration::from_secs(5));
        let err = gw.get(&Endpoint::Drones).await.unwrap_err();
        assert_eq!(
            err,
            FetchError::http_status(503, "fleet controller offline")
        );
    }

    #[tokio::test]
    async fn test_invalid_json_is_decode() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("GET"))
            .and(matchers::path("/api/drone-status"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"analysis\": "))
            .mount(&server)
            .await;

        let gw = gateway(&server, Duration::from_secs(5));
        let err = gw.get(&Endpoint::DroneStatus).await.unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_verify_post_with_empty_body() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .and(matchers::path("/api/verify/FIRE-001"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let gw = gateway(&server, Duration::from_secs(5));
        let body = gw
            .request(&Endpoint::Verify("FIRE-001".into()), Method::Post, None)
            .await
            .unwrap();
        assert_eq!(body, Value::Null);
    }

    #[tokio::test]
    async fn test_slow_response_is_network_timeout() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("GET"))
            .and(matchers::path("/api/satellite-data"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"data": []}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let gw = gateway(&server, Duration::from_secs(1));
        let err = gw.get(&Endpoint::SatelliteData).await.unwrap_err();
        assert!(matches!(err, FetchError::Network { .. }), "got {err:?}");
        assert!(err.detail().contains("timed out"));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network() {
        // Nothing listens on port 9 on the loopback interface in CI.
        let gw = HttpGateway::new("http://127.0.0.1:9/api", "http://127.0.0.1:9", Duration::from_secs(2))
            .unwrap();
        let err = gw.get(&Endpoint::Alerts).await.unwrap_err();
        assert!(matches!(err, FetchError::Network { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn test_fire_spread_goes_to_prediction_service() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("GET"))
            .and(matchers::path("/api/fire-spread"))
            .and(matchers::query_param("lat", "28.61"))
            .and(matchers::query_param("lng", "77.21"))
            .and(matchers::query_param("wind_speed", "15"))
            .and(matchers::query_param("wind_direction", "N"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "prediction": [{"radius_km": 0.9, "duration": 15, "risk_escalation": "MODERATE"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let gw = gateway(&server, Duration::from_secs(5));
        let body = gw
            .get(&Endpoint::FireSpread {
                lat: 28.61,
                lng: 77.21,
                wind_speed: 15.0,
                wind_direction: "N".into(),
            })
            .await
            .unwrap();
        assert_eq!(body["status"], "success");
    }
}

#[cfg(test)]
mod end_to_end {
    use super::*;

    async fn mount_backend(server: &MockServer) {
        Mock::given(matchers::method("GET"))
            .and(matchers::path("/api/satellite-data"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"lat": 28.6, "lng": 77.2, "intensity": 0.85, "wind_speed": 12.0}]
            })))
            .mount(server)
            .await;
        Mock::given(matchers::method("GET"))
            .and(matchers::path("/api/alerts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "alerts": [alert_json("FIRE-001")]
            })))
            .mount(server)
            .await;
        Mock::given(matchers::method("GET"))
            .and(matchers::path("/api/drone-status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "analysis": {"detected": true, "message": "Active flame front", "confidence": 0.92}
            })))
            .mount(server)
            .await;
        Mock::given(matchers::method("GET"))
            .and(matchers::path("/api/drones"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "drones": [{"id": "DRONE-ALPHA", "type": "THERMAL", "battery": 76,
                            "lat": 28.62, "lng": 77.22, "status": "DISPATCHED", "feed_type": "thermal"}]
            })))
            .mount(server)
            .await;
        Mock::given(matchers::method("POST"))
            .and(matchers::path("/api/verify/FIRE-001"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "verified"})))
            .mount(server)
            .await;
        Mock::given(matchers::method("GET"))
            .and(matchers::path("/api/fire-spread"))
            .and(matchers::query_param("wind_speed", "18"))
            .and(matchers::query_param("wind_direction", "NE"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "prediction": [
                    {"radius_km": 1.2, "duration": 15, "risk_escalation": "HIGH", "spread_direction": "NE"},
                    {"radius_km": 2.4, "duration": 30, "risk_escalation": "HIGH", "spread_direction": "NE"}
                ]
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_dashboard_over_http() {
        agni_core::logging::init_test_logging();
        let server = MockServer::start().await;
        mount_backend(&server).await;

        let config = SyncConfig::default()
            .with_api_base_url(format!("{}/api", server.uri()))
            .with_prediction_base_url(server.uri());
        let mut dashboard = Dashboard::from_config(&config).unwrap();
        dashboard.start();

        let mut revisions = dashboard.store().subscribe();
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let snapshot = dashboard.store().snapshot();
                if !snapshot.alerts.is_empty()
                    && !snapshot.drones.is_empty()
                    && !snapshot.satellite_points.is_empty()
                    && snapshot.detection.detected
                {
                    break;
                }
                let _ = revisions.changed().await;
            }
        })
        .await
        .expect("store never filled");

        assert!(dashboard.store().primary_feed().fire_overlay);
        assert!(dashboard.verify("FIRE-001").await.is_confirmed());
        assert_eq!(
            dashboard.store().alert("FIRE-001").unwrap().status,
            AlertStatus::Verified
        );

        let outcome = dashboard.select_alert(Some("FIRE-001")).await.unwrap();
        assert!(matches!(outcome, agni_sync::PredictionOutcome::Applied { predictions: 2, .. }));

        dashboard.shutdown().await;
        assert!(!dashboard.monitor().uplink_degraded());
    }
}
