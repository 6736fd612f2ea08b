//! HTTP client for the stream-control proxy

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use url::Url;

use super::envelope::GenerateResponse;
use super::StreamTransport;
use crate::error::{TransportError, MAX_RESPONSE_SIZE};
use crate::types::{CameraId, GrantRenewal, StreamGrant};

/// Thin JSON client for the proxy's `/api` surface.
///
/// Keeps a cookie store so a browser-style session cookie issued by the
/// proxy is replayed, and sends a bearer token when one is configured.
#[derive(Clone, Debug)]
pub struct ProxyClient {
    base_url: Url,
    bearer_token: Option<String>,
    client: Client,
}

impl ProxyClient {
    pub fn new(
        base_url: &str,
        bearer_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| TransportError::InvalidConfig(format!("api_base_url: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(TransportError::InvalidConfig(format!(
                "api_base_url is not a base URL: {base_url}"
            )));
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .cookie_store(true)
            .build()
            .map_err(|e| TransportError::InvalidConfig(format!("HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            bearer_token,
            client,
        })
    }

    /// Build `{base}/seg1/seg2/...`, percent-encoding each segment
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.bearer_token {
            Some(ref token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// POST a JSON body and decode a JSON response
    pub async fn post_json<B, T>(&self, segments: &[&str], body: &B) -> Result<T, TransportError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(segments);
        tracing::debug!(url = %url, "POST");
        let response = self
            .authorize(self.client.post(url))
            .json(body)
            .send()
            .await?;
        let response = check_response(response).await?;
        json_with_limit(response).await
    }

    /// POST a JSON body, ignoring any response body
    pub async fn post_unit<B>(&self, segments: &[&str], body: &B) -> Result<(), TransportError>
    where
        B: Serialize + ?Sized,
    {
        let url = self.endpoint(segments);
        tracing::debug!(url = %url, "POST");
        let response = self
            .authorize(self.client.post(url))
            .json(body)
            .send()
            .await?;
        check_response(response).await?;
        Ok(())
    }

    /// GET and decode a JSON response
    pub async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, TransportError> {
        let url = self.endpoint(segments);
        tracing::debug!(url = %url, "GET");
        let response = self.authorize(self.client.get(url)).send().await?;
        let response = check_response(response).await?;
        json_with_limit(response).await
    }
}

/// Read a response body, rejecting anything over `MAX_RESPONSE_SIZE`.
pub async fn read_limited(response: reqwest::Response) -> Result<Vec<u8>, TransportError> {
    if let Some(cl) = response.content_length() {
        if cl as usize > MAX_RESPONSE_SIZE {
            return Err(TransportError::ResponseTooLarge { size: cl });
        }
    }
    let bytes = response.bytes().await?;
    if bytes.len() > MAX_RESPONSE_SIZE {
        return Err(TransportError::ResponseTooLarge {
            size: bytes.len() as u64,
        });
    }
    Ok(bytes.to_vec())
}

/// Read a response body with size limit and deserialize as JSON.
pub async fn json_with_limit<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, TransportError> {
    let body = read_limited(response).await?;
    serde_json::from_slice(&body).map_err(Into::into)
}

/// Map non-success statuses to errors, keeping auth failures distinct.
///
/// For 401/403 the proxy's `{"error": "..."}` message is surfaced when present.
pub async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            let message = error_message(response)
                .await
                .unwrap_or_else(|| status.to_string());
            if status == StatusCode::UNAUTHORIZED {
                Err(TransportError::Unauthorized(message))
            } else {
                Err(TransportError::Forbidden(message))
            }
        }
        _ => Err(TransportError::Http { status, url }),
    }
}

async fn error_message(response: reqwest::Response) -> Option<String> {
    let body: serde_json::Value = json_with_limit(response).await.ok()?;
    body.get("error")?.as_str().map(ToString::to_string)
}

/// `StreamTransport` over the proxy's `/api/stream/{id}/...` routes
#[derive(Clone)]
pub struct HttpStreamTransport {
    client: ProxyClient,
}

impl HttpStreamTransport {
    #[must_use]
    pub const fn new(client: ProxyClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StreamTransport for HttpStreamTransport {
    async fn generate(
        &self,
        camera: &CameraId,
        offer_sdp: &str,
    ) -> Result<StreamGrant, TransportError> {
        let response: GenerateResponse = self
            .client
            .post_json(
                &["api", "stream", camera.as_str(), "generate"],
                &json!({ "offerSdp": offer_sdp }),
            )
            .await?;
        response.into_grant()
    }

    async fn extend(
        &self,
        camera: &CameraId,
        extension_token: &str,
    ) -> Result<GrantRenewal, TransportError> {
        let response: GenerateResponse = self
            .client
            .post_json(
                &["api", "stream", camera.as_str(), "extend"],
                &json!({ "streamExtensionToken": extension_token }),
            )
            .await?;
        response.into_renewal()
    }

    async fn stop(&self, camera: &CameraId, stream_token: &str) -> Result<(), TransportError> {
        self.client
            .post_unit(
                &["api", "stream", camera.as_str(), "stop"],
                &json!({ "streamToken": stream_token }),
            )
            .await
    }
}
