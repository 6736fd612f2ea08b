//! Stream-control endpoints
//!
//! Each route forwards one `CameraLiveStream` command for the device in
//! the path, using the caller's bearer token against SDM.

use axum::{
    extract::{FromRequestParts, Path, State},
    http::request::Parts,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{AppError, AppResult, AppState};

/// Stream routes, nested under `/stream`
pub fn create_stream_router() -> Router<AppState> {
    Router::new()
        .route("/{device_id}/generate", post(generate_stream))
        .route("/{device_id}/extend", post(extend_stream))
        .route("/{device_id}/stop", post(stop_stream))
}

/// Upstream access token from `Authorization: Bearer ...`
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .ok_or_else(|| AppError::unauthorized("Authentication required"))?;

        let value = header
            .to_str()
            .map_err(|e| AppError::unauthorized(format!("Invalid Authorization header: {e}")))?;

        let token = value
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::unauthorized("Authentication required"))?;

        Ok(Self(token.to_string()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(default)]
    pub offer_sdp: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendRequest {
    #[serde(default)]
    pub stream_extension_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopRequest {
    #[serde(default)]
    pub stream_token: Option<String>,
}

fn required(value: Option<String>, field: &str) -> AppResult<String> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::bad_request(format!("{field} is required")))
}

/// Exchange an SDP offer for an answer. The SDM body is returned unchanged.
pub async fn generate_stream(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    BearerToken(token): BearerToken,
    Json(req): Json<GenerateRequest>,
) -> AppResult<Json<Value>> {
    let offer_sdp = required(req.offer_sdp, "offerSdp")?;

    let response = state
        .sdm
        .generate_stream(&token, &device_id, &offer_sdp)
        .await
        .map_err(|e| AppError::from_sdm(e, "Failed to generate camera stream"))?;

    tracing::info!(device_id = %device_id, "Generated camera stream");
    Ok(Json(response))
}

pub async fn extend_stream(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    BearerToken(token): BearerToken,
    Json(req): Json<ExtendRequest>,
) -> AppResult<Json<Value>> {
    let extension_token = required(req.stream_extension_token, "streamExtensionToken")?;

    let response = state
        .sdm
        .extend_stream(&token, &device_id, &extension_token)
        .await
        .map_err(|e| AppError::from_sdm(e, "Failed to extend camera stream"))?;

    tracing::debug!(device_id = %device_id, "Extended camera stream");
    Ok(Json(response))
}

pub async fn stop_stream(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    BearerToken(token): BearerToken,
    Json(req): Json<StopRequest>,
) -> AppResult<Json<Value>> {
    let stream_token = required(req.stream_token, "streamToken")?;

    state
        .sdm
        .stop_stream(&token, &device_id, &stream_token)
        .await
        .map_err(|e| AppError::from_sdm(e, "Failed to stop camera stream"))?;

    tracing::info!(device_id = %device_id, "Stopped camera stream");
    Ok(Json(json!({ "success": true })))
}
