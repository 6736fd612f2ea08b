// Module: http
// JSON API consumed by viewers: stream control and health

pub mod error;
pub mod health;
pub mod stream;

use std::sync::Arc;

use anyhow::Context;
use axum::http::{header, HeaderValue, Method};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::sdm::SdmClient;

pub use error::{AppError, AppResult};

/// SDP offers are a few kilobytes; anything near this is not a stream request
const MAX_REQUEST_BODY: usize = 256 * 1024;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub sdm: Arc<SdmClient>,
}

/// Create the HTTP router with all routes
///
/// CORS admits only `frontend_url`, with credentials.
pub fn create_router(state: AppState, frontend_url: &str) -> anyhow::Result<Router> {
    let origin = HeaderValue::from_str(frontend_url.trim_end_matches('/'))
        .with_context(|| format!("Invalid frontend_url: {frontend_url}"))?;

    let api = Router::new()
        .nest("/stream", stream::create_stream_router())
        .merge(health::create_health_router());

    let router = Router::new()
        .nest("/api", api)
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY))
        .layer(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_credentials(true)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
        )
        .layer(TraceLayer::new_for_http());

    // Apply state to all routes (must be last)
    Ok(router.with_state(state))
}
