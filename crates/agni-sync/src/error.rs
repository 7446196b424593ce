//! Error types for the synchronization core.
//!
//! Two layers:
//! - [`FetchError`] is what the gateway returns. It only knows about the
//!   transport: the network, the HTTP status, or the body encoding.
//! - [`SyncError`] is what poll tasks, the verification coordinator, and the
//!   prediction fetcher report. It adds payload validation and stale-result
//!   suppression on top of the transport failures.

use thiserror::Error;

/// Coarse classification of a gateway failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchErrorKind {
    Network,
    HttpStatus,
    Decode,
}

impl std::fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network => write!(f, "NETWORK"),
            Self::HttpStatus => write!(f, "HTTP_STATUS"),
            Self::Decode => write!(f, "DECODE"),
        }
    }
}

/// A failed gateway request.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    /// Connection refused, DNS failure, timeout, or reset
    #[error("network error: {detail}")]
    Network { detail: String },

    /// The server answered with a non-success status
    #[error("HTTP {status}: {detail}")]
    HttpStatus { status: u16, detail: String },

    /// The body was not valid JSON
    #[error("decode error: {detail}")]
    Decode { detail: String },
}

impl FetchError {
    pub fn network(detail: impl Into<String>) -> Self {
        Self::Network {
            detail: detail.into(),
        }
    }

    pub fn http_status(status: u16, detail: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            detail: detail.into(),
        }
    }

    pub fn decode(detail: impl Into<String>) -> Self {
        Self::Decode {
            detail: detail.into(),
        }
    }

    pub fn kind(&self) -> FetchErrorKind {
        match self {
            Self::Network { .. } => FetchErrorKind::Network,
            Self::HttpStatus { .. } => FetchErrorKind::HttpStatus,
            Self::Decode { .. } => FetchErrorKind::Decode,
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            Self::Network { detail } | Self::HttpStatus { detail, .. } | Self::Decode { detail } => {
                detail
            }
        }
    }

    /// Classify a reqwest error.
    pub fn from_reqwest(err: &reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            Self::network(format!("request timed out after {timeout_secs}s"))
        } else if err.is_decode() {
            Self::decode(err.to_string())
        } else if let Some(status) = err.status() {
            Self::http_status(status.as_u16(), err.to_string())
        } else {
            Self::network(err.to_string())
        }
    }
}

/// Synchronization failures, as reported to the uplink monitor.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SyncError {
    /// The backend could not be reached
    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),

    /// The backend answered with a non-success HTTP status
    #[error("HTTP error {status}: {detail}")]
    HttpError { status: u16, detail: String },

    /// Required fields were missing or invalid
    #[error("malformed response from {endpoint}: {detail}")]
    MalformedResponse { endpoint: String, detail: String },

    /// Well-formed envelope whose `status` was not "success"
    #[error("{endpoint} reported status '{status}'")]
    Rejected { endpoint: String, status: String },

    /// Result discarded because a newer request superseded it
    #[error("stale result for generation {generation} discarded")]
    StaleResult { generation: u64 },
}

impl SyncError {
    pub fn malformed(endpoint: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::MalformedResponse {
            endpoint: endpoint.into(),
            detail: detail.into(),
        }
    }

    /// Map a gateway failure, attributing decode errors to `endpoint`.
    pub fn from_fetch(endpoint: &str, err: FetchError) -> Self {
        match err {
            FetchError::Network { detail } => Self::NetworkUnavailable(detail),
            FetchError::HttpStatus { status, detail } => Self::HttpError { status, detail },
            FetchError::Decode { detail } => Self::malformed(endpoint, detail),
        }
    }

    /// Whether the next poll cycle can reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NetworkUnavailable(_) | Self::Rejected { .. } => true,
            Self::HttpError { status, .. } => *status == 408 || *status == 429 || *status >= 500,
            Self::MalformedResponse { .. } | Self::StaleResult { .. } => false,
        }
    }

    /// Stale results are informational and never shown to the operator.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, Self::StaleResult { .. })
    }

    /// Short operator-facing message.
    pub fn friendly_message(&self) -> String {
        match self {
            Self::NetworkUnavailable(_) => "Uplink unavailable. Showing last known data.".to_string(),
            Self::HttpError { status, .. } if *status == 404 => {
                "The backend no longer knows this record.".to_string()
            }
            Self::HttpError { status, .. } => format!("Backend error ({status}). Retrying."),
            Self::MalformedResponse { endpoint, .. } => {
                format!("Unreadable data from {endpoint}. Showing last known data.")
            }
            Self::Rejected { endpoint, .. } => format!("{endpoint} is not ready. Retrying."),
            Self::StaleResult { .. } => "Superseded by a newer request.".to_string(),
        }
    }
}

impl From<FetchError> for SyncError {
    fn from(err: FetchError) -> Self {
        Self::from_fetch("gateway", err)
    }
}

/// Result type for synchronization operations.
pub type Result<T> = std::result::Result<T, SyncError>;
