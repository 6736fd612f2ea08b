//! Viewer core error types

use thiserror::Error;

/// Maximum response body size accepted from the proxy (1 MB).
/// SDP answers and token bundles are a few kilobytes at most.
pub const MAX_RESPONSE_SIZE: usize = 1024 * 1024;

/// Failure of one of the stream-control or device-list HTTP calls.
///
/// Transport failures (`Network`) are kept apart from application-level
/// rejections (`Unauthorized`, `Forbidden`, `Http`) so callers can tell an
/// expired session from a timeout.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("HTTP error {status} for {url}")]
    Http { status: reqwest::StatusCode, url: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Missing field in response: {0}")]
    MissingField(&'static str),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Response too large ({size} bytes, max {max})", max = MAX_RESPONSE_SIZE)]
    ResponseTooLarge { size: u64 },
}

impl TransportError {
    /// Whether the remote side rejected our credentials
    #[must_use]
    pub const fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Unauthorized(_) | Self::Forbidden(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Failure reported by a platform peer-connection backend
#[derive(Debug, Error)]
pub enum PeerError {
    #[error("Failed to create peer connection: {0}")]
    Create(String),

    #[error("Failed to add transceiver: {0}")]
    Transceiver(String),

    #[error("Failed to create data channel: {0}")]
    DataChannel(String),

    #[error("SDP error: {0}")]
    Sdp(String),

    #[error("Failed to close peer connection: {0}")]
    Close(String),
}

/// Failure of a stream session operation
#[derive(Debug, Error)]
pub enum SessionError {
    /// Offer/answer exchange failed locally
    #[error("Negotiation failed: {0}")]
    Negotiation(String),

    #[error("Stream request failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Invalid session state: {0}")]
    InvalidState(String),

    /// `stop()` arrived while negotiation was in flight
    #[error("Negotiation cancelled by stop")]
    Cancelled,
}

impl From<PeerError> for SessionError {
    fn from(err: PeerError) -> Self {
        Self::Negotiation(err.to_string())
    }
}
