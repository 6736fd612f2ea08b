//! Smart Device Management command client
//!
//! Only the three `CameraLiveStream` commands are issued. The caller's
//! access token is forwarded as-is; this client never refreshes tokens.

use std::time::Duration;

use camux_core::error::{TransportError, MAX_RESPONSE_SIZE};
use camux_core::transport::read_limited;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use thiserror::Error;
use url::Url;

pub const GENERATE_WEBRTC_STREAM: &str =
    "sdm.devices.commands.CameraLiveStream.GenerateWebRtcStream";
pub const EXTEND_WEBRTC_STREAM: &str = "sdm.devices.commands.CameraLiveStream.ExtendWebRtcStream";
pub const STOP_WEBRTC_STREAM: &str = "sdm.devices.commands.CameraLiveStream.StopWebRtcStream";

#[derive(Debug, Error)]
pub enum SdmError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("SDM rejected credentials: {0}")]
    Unauthorized(String),

    #[error("SDM denied access: {0}")]
    Forbidden(String),

    #[error("SDM error {status}: {message}")]
    Http { status: StatusCode, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Response too large ({size} bytes, max {max})", max = MAX_RESPONSE_SIZE)]
    ResponseTooLarge { size: u64 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<reqwest::Error> for SdmError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<serde_json::Error> for SdmError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<TransportError> for SdmError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Network(message) => Self::Network(message),
            TransportError::ResponseTooLarge { size } => Self::ResponseTooLarge { size },
            other => Self::Parse(other.to_string()),
        }
    }
}

/// Google error envelopes carry `error.message`
fn error_message(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    value
        .get("error")?
        .get("message")?
        .as_str()
        .map(ToString::to_string)
}

/// SDM `executeCommand` client for one Device Access project
#[derive(Clone)]
pub struct SdmClient {
    base_url: Url,
    project_id: String,
    client: Client,
}

impl SdmClient {
    pub fn new(
        base_url: &str,
        project_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SdmError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| SdmError::InvalidConfig(format!("sdm_base_url: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(SdmError::InvalidConfig(format!(
                "sdm_base_url is not a base URL: {base_url}"
            )));
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| SdmError::InvalidConfig(format!("HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            project_id: project_id.into(),
            client,
        })
    }

    /// Fully-qualified device name for a device identifier
    #[must_use]
    pub fn device_name(&self, device_id: &str) -> String {
        format!("enterprises/{}/devices/{}", self.project_id, device_id)
    }

    /// `{base}/enterprises/{project}/devices/{id}:executeCommand`, each
    /// segment percent-encoded
    pub fn command_url(&self, device_id: &str) -> Url {
        let command = format!("{device_id}:executeCommand");
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend([
                "enterprises",
                self.project_id.as_str(),
                "devices",
                command.as_str(),
            ]);
        }
        url
    }

    /// Execute a device command and return the raw SDM response body
    pub async fn execute_command(
        &self,
        access_token: &str,
        device_id: &str,
        command: &str,
        params: Value,
    ) -> Result<Value, SdmError> {
        let url = self.command_url(device_id);

        tracing::debug!(device = %self.device_name(device_id), command, "Executing SDM command");

        let response = self
            .client
            .post(url)
            .bearer_auth(access_token)
            .json(&json!({ "command": command, "params": params }))
            .send()
            .await?;

        let status = response.status();
        let body = read_limited(response).await?;

        if !status.is_success() {
            let message = error_message(&body).unwrap_or_else(|| status.to_string());
            return Err(match status {
                StatusCode::UNAUTHORIZED => SdmError::Unauthorized(message),
                StatusCode::FORBIDDEN => SdmError::Forbidden(message),
                _ => SdmError::Http { status, message },
            });
        }

        if body.is_empty() {
            return Ok(json!({}));
        }
        serde_json::from_slice(&body).map_err(Into::into)
    }

    pub async fn generate_stream(
        &self,
        access_token: &str,
        device_id: &str,
        offer_sdp: &str,
    ) -> Result<Value, SdmError> {
        self.execute_command(
            access_token,
            device_id,
            GENERATE_WEBRTC_STREAM,
            json!({ "offerSdp": offer_sdp }),
        )
        .await
    }

    pub async fn extend_stream(
        &self,
        access_token: &str,
        device_id: &str,
        stream_extension_token: &str,
    ) -> Result<Value, SdmError> {
        self.execute_command(
            access_token,
            device_id,
            EXTEND_WEBRTC_STREAM,
            json!({ "streamExtensionToken": stream_extension_token }),
        )
        .await
    }

    pub async fn stop_stream(
        &self,
        access_token: &str,
        device_id: &str,
        stream_token: &str,
    ) -> Result<(), SdmError> {
        self.execute_command(
            access_token,
            device_id,
            STOP_WEBRTC_STREAM,
            json!({ "streamToken": stream_token }),
        )
        .await?;
        Ok(())
    }
}
