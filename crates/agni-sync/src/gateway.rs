//! Fetch gateway: typed access to the backend API and the prediction service.
//!
//! The [`FetchGateway`] trait is the only way the rest of the sync core talks
//! to the network. It never panics and never lets a transport error escape
//! as anything other than a [`FetchError`].
//!
//! ## Implementations
//!
//! - [`HttpGateway`] - reqwest client with a bounded per-request timeout
//! - [`ScriptedGateway`](crate::mock::ScriptedGateway) - in-memory test double
//!
//! ## Example
//!
//! ```no_run
//! use agni_core::SyncConfig;
//! use agni_sync::gateway::{Endpoint, FetchGateway, HttpGateway};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let gateway = HttpGateway::from_config(&SyncConfig::default())?;
//! let alerts = gateway.get(&Endpoint::Alerts).await?;
//! println!("{alerts}");
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::time::Duration;

use agni_core::{AgniError, AlertId, SyncConfig};
use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use tracing::debug;

use crate::error::FetchError;

/// Which remote service an endpoint lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    /// Alert store, drone fleet, satellite ingestion
    Backend,
    /// External fire-spread prediction model
    Prediction,
}

/// HTTP method used by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
        }
    }
}

/// Every remote resource the sync core touches.
#[derive(Debug, Clone, PartialEq)]
pub enum Endpoint {
    SatelliteData,
    Alerts,
    DroneStatus,
    Drones,
    Verify(AlertId),
    FireSpread {
        lat: f64,
        lng: f64,
        wind_speed: f64,
        wind_direction: String,
    },
}

impl Endpoint {
    pub fn service(&self) -> Service {
        match self {
            Self::FireSpread { .. } => Service::Prediction,
            _ => Service::Backend,
        }
    }

    /// Path segments relative to the service base URL.
    pub fn segments(&self) -> Vec<&str> {
        match self {
            Self::SatelliteData => vec!["satellite-data"],
            Self::Alerts => vec!["alerts"],
            Self::DroneStatus => vec!["drone-status"],
            Self::Drones => vec!["drones"],
            Self::Verify(id) => vec!["verify", id.as_str()],
            Self::FireSpread { .. } => vec!["api", "fire-spread"],
        }
    }

    /// Query parameters, in request order.
    pub fn query(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::FireSpread {
                lat,
                lng,
                wind_speed,
                wind_direction,
            } => vec![
                ("lat", lat.to_string()),
                ("lng", lng.to_string()),
                ("wind_speed", wind_speed.to_string()),
                ("wind_direction", wind_direction.clone()),
            ],
            _ => Vec::new(),
        }
    }

    /// Stable label for logs and error attribution (no ids).
    pub fn label(&self) -> &'static str {
        match self {
            Self::SatelliteData => "/satellite-data",
            Self::Alerts => "/alerts",
            Self::DroneStatus => "/drone-status",
            Self::Drones => "/drones",
            Self::Verify(_) => "/verify",
            Self::FireSpread { .. } => "/api/fire-spread",
        }
    }
}

/// Typed request surface shared by the real client and test doubles.
#[async_trait]
pub trait FetchGateway: Send + Sync {
    /// Issue one request and decode its JSON body.
    ///
    /// An empty successful body decodes to [`Value::Null`].
    async fn request(
        &self,
        endpoint: &Endpoint,
        method: Method,
        body: Option<&Value>,
    ) -> Result<Value, FetchError>;

    /// Shorthand for a GET without body.
    async fn get(&self, endpoint: &Endpoint) -> Result<Value, FetchError> {
        self.request(endpoint, Method::Get, None).await
    }

    /// Name for logging.
    fn name(&self) -> &str;
}

/// reqwest-backed gateway.
pub struct HttpGateway {
    client: reqwest::Client,
    api_base: Url,
    prediction_base: Url,
    timeout_secs: u64,
}

impl HttpGateway {
    /// Create a gateway for the two base URLs with a bounded request timeout.
    pub fn new(
        api_base_url: &str,
        prediction_base_url: &str,
        timeout: Duration,
    ) -> agni_core::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AgniError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base: parse_base("api_base_url", api_base_url)?,
            prediction_base: parse_base("prediction_base_url", prediction_base_url)?,
            timeout_secs: timeout.as_secs(),
        })
    }

    /// Create a gateway from the sync configuration.
    pub fn from_config(config: &SyncConfig) -> agni_core::Result<Self> {
        Self::new(
            &config.api_base_url,
            &config.prediction_base_url,
            config.request_timeout(),
        )
    }

    /// Resolve the full URL for an endpoint. Path segments are percent-encoded.
    pub fn endpoint_url(&self, endpoint: &Endpoint) -> Url {
        let mut url = match endpoint.service() {
            Service::Backend => self.api_base.clone(),
            Service::Prediction => self.prediction_base.clone(),
        };

        // Bases are checked in `parse_base`, so the URL can always carry segments.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(endpoint.segments());
        }

        let query = endpoint.query();
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        url
    }
}

fn parse_base(field: &str, raw: &str) -> agni_core::Result<Url> {
    let url = Url::parse(raw)
        .map_err(|e| AgniError::config_validation(format!("{field} '{raw}' is not a URL: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(AgniError::config_validation(format!(
            "{field} '{raw}' cannot be used as a base URL"
        )));
    }
    Ok(url)
}

#[async_trait]
impl FetchGateway for HttpGateway {
    async fn request(
        &self,
        endpoint: &Endpoint,
        method: Method,
        body: Option<&Value>,
    ) -> Result<Value, FetchError> {
        let url = self.endpoint_url(endpoint);
        debug!(%method, %url, "gateway request");

        let mut builder = match method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
        };
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(&e, self.timeout_secs))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(&e, self.timeout_secs))?;

        if !status.is_success() {
            let detail: String = String::from_utf8_lossy(&bytes).chars().take(200).collect();
            return Err(FetchError::http_status(status.as_u16(), detail));
        }

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }

        serde_json::from_slice(&bytes).map_err(|e| FetchError::decode(e.to_string()))
    }

    fn name(&self) -> &str {
        "http"
    }
}
