//! Thin stream-control proxy in front of the Smart Device Management API
//!
//! Exposes `/api/stream/{deviceId}/{generate,extend,stop}` and
//! `/api/health`. The caller's bearer token is forwarded to SDM unchanged.

pub mod config;
pub mod http;
pub mod sdm;

pub use config::{load_config, ProxyConfig};
pub use http::{create_router, AppState};
pub use sdm::{SdmClient, SdmError};
