//! Platform peer-connection capability
//!
//! Sessions drive negotiation through these traits and never touch a
//! WebRTC stack directly. The webrtc-rs backend lives in [`rtc`]; tests
//! substitute a recording fake.

pub mod rtc;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::PeerError;
use crate::media::{MediaTrack, TrackKind};
use crate::types::CameraId;

pub use self::rtc::WebRtcConnector;

/// Label of the data channel the upstream expects in every offer
pub const DATA_CHANNEL_LABEL: &str = "dataSendChannel";

/// Opens peer connections for cameras
#[async_trait]
pub trait PeerConnector: Send + Sync {
    /// Create a peer connection with no ICE servers configured
    async fn open(&self, camera: &CameraId) -> Result<OpenedPeer, PeerError>;
}

/// A freshly created peer connection and the feed of tracks it will receive
pub struct OpenedPeer {
    pub link: Arc<dyn PeerLink>,
    pub tracks: mpsc::UnboundedReceiver<MediaTrack>,
}

/// Operations on one peer connection
#[async_trait]
pub trait PeerLink: Send + Sync {
    async fn add_recvonly_transceiver(&self, kind: TrackKind) -> Result<(), PeerError>;

    async fn create_data_channel(&self, label: &str, ordered: bool) -> Result<(), PeerError>;

    /// Create an offer, apply it as the local description and return its SDP
    async fn create_offer(&self) -> Result<String, PeerError>;

    /// Apply the remote answer SDP
    async fn apply_answer(&self, sdp: String) -> Result<(), PeerError>;

    async fn close(&self) -> Result<(), PeerError>;
}

/// Receives media from enabled tracks for rendering or recording
pub trait MediaSink: Send + Sync {
    fn deliver(&self, camera: &CameraId, track: &MediaTrack, payload: &[u8]);
}

/// Lay out the media sections and return the local offer.
///
/// The upstream rejects any offer whose m-lines are not exactly audio,
/// video, application in that order.
pub async fn prepare_offer(link: &dyn PeerLink) -> Result<String, PeerError> {
    link.add_recvonly_transceiver(TrackKind::Audio).await?;
    link.add_recvonly_transceiver(TrackKind::Video).await?;
    link.create_data_channel(DATA_CHANNEL_LABEL, true).await?;
    link.create_offer().await
}

/// The upstream encoder sometimes drops the final newline of its answer
#[must_use]
pub fn ensure_trailing_newline(mut sdp: String) -> String {
    if !sdp.ends_with('\n') {
        sdp.push('\n');
    }
    sdp
}
