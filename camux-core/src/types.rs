//! Common types used throughout the viewer core

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Opaque identifier of a camera device.
///
/// This is the last path segment of the upstream device name
/// (`enterprises/{project}/devices/{id}`), which is what the stream
/// endpoints expect in their path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CameraId(String);

impl CameraId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive the identifier from a fully-qualified device name.
    ///
    /// A name without any `/` is taken as the identifier itself.
    #[must_use]
    pub fn from_device_name(name: &str) -> Self {
        let id = name.rsplit('/').next().unwrap_or(name);
        Self(id.to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for CameraId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CameraId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of a received media track
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TrackId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Tokens returned by a successful extend call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantRenewal {
    /// Replacement stream token, when the upstream issued a new one
    pub stream_token: Option<String>,
    pub stream_extension_token: String,
    pub expires_at: Option<String>,
}

/// Authorization for one live camera feed.
///
/// Created by a successful generate call, renewed by extend, consumed by stop.
/// The upstream treats a grant as valid for about five minutes after issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamGrant {
    pub answer_sdp: String,
    pub stream_token: String,
    pub stream_extension_token: String,
    /// Upstream-reported expiry (RFC 3339), informational only
    pub expires_at: Option<String>,
    pub issued_at: Instant,
}

impl StreamGrant {
    pub fn new(
        answer_sdp: impl Into<String>,
        stream_token: impl Into<String>,
        stream_extension_token: impl Into<String>,
    ) -> Self {
        Self {
            answer_sdp: answer_sdp.into(),
            stream_token: stream_token.into(),
            stream_extension_token: stream_extension_token.into(),
            expires_at: None,
            issued_at: Instant::now(),
        }
    }

    /// Replace the tokens with the ones from an extend response
    pub fn renew(&mut self, renewal: GrantRenewal) {
        if let Some(stream_token) = renewal.stream_token {
            self.stream_token = stream_token;
        }
        self.stream_extension_token = renewal.stream_extension_token;
        self.expires_at = renewal.expires_at;
        self.issued_at = Instant::now();
    }
}
