//! Stream-control transport
//!
//! Three request/response calls drive a camera stream: generate (offer in,
//! answer and tokens out), extend (renew the grant) and stop. The trait is
//! the seam between sessions and the wire so tests can substitute a fake.

mod envelope;
mod http;

pub use envelope::{GenerateResponse, GrantFields};
pub use http::{read_limited, HttpStreamTransport, ProxyClient};

use crate::error::TransportError;
use crate::types::{CameraId, GrantRenewal, StreamGrant};
use async_trait::async_trait;

/// Stream-control operations for one upstream
#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// Exchange an SDP offer for a stream grant
    async fn generate(
        &self,
        camera: &CameraId,
        offer_sdp: &str,
    ) -> Result<StreamGrant, TransportError>;

    /// Renew a grant using its current extension token
    async fn extend(
        &self,
        camera: &CameraId,
        extension_token: &str,
    ) -> Result<GrantRenewal, TransportError>;

    /// Release a grant
    async fn stop(&self, camera: &CameraId, stream_token: &str) -> Result<(), TransportError>;
}
