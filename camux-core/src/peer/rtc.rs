//! webrtc-rs backed peer connections

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::{APIBuilder, API};
use webrtc::data_channel::data_channel_init::RTCDataChannelInit;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::{RTCRtpTransceiver, RTCRtpTransceiverInit};
use webrtc::track::track_remote::TrackRemote;

use super::{MediaSink, OpenedPeer, PeerConnector, PeerLink};
use crate::error::PeerError;
use crate::media::{MediaTrack, TrackKind};
use crate::types::CameraId;

const fn track_kind(codec: RTPCodecType) -> Option<TrackKind> {
    match codec {
        RTPCodecType::Audio => Some(TrackKind::Audio),
        RTPCodecType::Video => Some(TrackKind::Video),
        _ => None,
    }
}

const fn codec_type(kind: TrackKind) -> RTPCodecType {
    match kind {
        TrackKind::Audio => RTPCodecType::Audio,
        TrackKind::Video => RTPCodecType::Video,
    }
}

/// Creates webrtc-rs peer connections sharing one media engine
pub struct WebRtcConnector {
    api: API,
    sink: Option<Arc<dyn MediaSink>>,
}

impl WebRtcConnector {
    pub fn new(sink: Option<Arc<dyn MediaSink>>) -> Result<Self, PeerError> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| PeerError::Create(format!("Failed to register codecs: {e}")))?;

        let registry = register_default_interceptors(Registry::new(), &mut media_engine)
            .map_err(|e| PeerError::Create(format!("Failed to register interceptors: {e}")))?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        Ok(Self { api, sink })
    }
}

#[async_trait]
impl PeerConnector for WebRtcConnector {
    async fn open(&self, camera: &CameraId) -> Result<OpenedPeer, PeerError> {
        // Direct, server-less ICE: the camera end rejects relayed candidates
        let config = RTCConfiguration {
            ice_servers: vec![],
            ..Default::default()
        };

        let pc = Arc::new(
            self.api
                .new_peer_connection(config)
                .await
                .map_err(|e| PeerError::Create(e.to_string()))?,
        );

        let state_camera = camera.clone();
        pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
            let camera = state_camera.clone();
            Box::pin(async move {
                match state {
                    RTCPeerConnectionState::Failed => {
                        warn!(camera_id = %camera, "Peer connection failed");
                    }
                    _ => debug!(camera_id = %camera, state = %state, "Peer connection state changed"),
                }
            })
        }));

        let (tx, rx) = mpsc::unbounded_channel();
        let track_camera = camera.clone();
        let sink = self.sink.clone();
        pc.on_track(Box::new(
            move |remote: Arc<TrackRemote>, _receiver: Arc<RTCRtpReceiver>, _transceiver: Arc<RTCRtpTransceiver>| {
                let camera = track_camera.clone();
                let sink = sink.clone();
                let tx = tx.clone();
                Box::pin(async move {
                    let Some(kind) = track_kind(remote.kind()) else {
                        warn!(camera_id = %camera, "Ignoring track of unspecified kind");
                        return;
                    };
                    let track = MediaTrack::new(remote.id().as_str(), kind);
                    info!(camera_id = %camera, track_id = %track.id(), kind = kind.as_str(), "Track received");

                    if tx.send(track.clone()).is_err() {
                        debug!(camera_id = %camera, "Session gone, dropping track");
                        return;
                    }

                    tokio::spawn(forward_rtp(camera, remote, track, sink));
                })
            },
        ));

        Ok(OpenedPeer {
            link: Arc::new(WebRtcLink { pc }),
            tracks: rx,
        })
    }
}

/// Read RTP until the track ends, delivering packets of enabled tracks
async fn forward_rtp(
    camera: CameraId,
    remote: Arc<TrackRemote>,
    track: MediaTrack,
    sink: Option<Arc<dyn MediaSink>>,
) {
    loop {
        let (packet, _attributes) = match remote.read_rtp().await {
            Ok(read) => read,
            Err(e) => {
                debug!(camera_id = %camera, track_id = %track.id(), error = %e, "RTP read ended");
                break;
            }
        };

        if track.record_packet(packet.payload.len()) {
            if let Some(ref sink) = sink {
                sink.deliver(&camera, &track, &packet.payload);
            }
        }
    }
}

struct WebRtcLink {
    pc: Arc<RTCPeerConnection>,
}

#[async_trait]
impl PeerLink for WebRtcLink {
    async fn add_recvonly_transceiver(&self, kind: TrackKind) -> Result<(), PeerError> {
        self.pc
            .add_transceiver_from_kind(
                codec_type(kind),
                Some(RTCRtpTransceiverInit {
                    direction: RTCRtpTransceiverDirection::Recvonly,
                    send_encodings: vec![],
                }),
            )
            .await
            .map_err(|e| PeerError::Transceiver(e.to_string()))?;
        Ok(())
    }

    async fn create_data_channel(&self, label: &str, ordered: bool) -> Result<(), PeerError> {
        let init = RTCDataChannelInit {
            ordered: Some(ordered),
            ..Default::default()
        };
        self.pc
            .create_data_channel(label, Some(init))
            .await
            .map_err(|e| PeerError::DataChannel(e.to_string()))?;
        Ok(())
    }

    async fn create_offer(&self) -> Result<String, PeerError> {
        let offer = self
            .pc
            .create_offer(None)
            .await
            .map_err(|e| PeerError::Sdp(format!("Failed to create offer: {e}")))?;

        self.pc
            .set_local_description(offer)
            .await
            .map_err(|e| PeerError::Sdp(format!("Failed to set local description: {e}")))?;

        let local = self
            .pc
            .local_description()
            .await
            .ok_or_else(|| PeerError::Sdp("No local description after setting offer".to_string()))?;
        Ok(local.sdp)
    }

    async fn apply_answer(&self, sdp: String) -> Result<(), PeerError> {
        let answer = RTCSessionDescription::answer(sdp)
            .map_err(|e| PeerError::Sdp(format!("Invalid answer: {e}")))?;
        self.pc
            .set_remote_description(answer)
            .await
            .map_err(|e| PeerError::Sdp(format!("Failed to set remote description: {e}")))
    }

    async fn close(&self) -> Result<(), PeerError> {
        self.pc
            .close()
            .await
            .map_err(|e| PeerError::Close(e.to_string()))
    }
}
