//! Received media tracks and the per-camera collected stream
//!
//! Tracks arrive asynchronously from the peer-connection backend. Each
//! track carries an `enabled` flag which the backend consults before
//! handing packets to the rendering sink, so disabling a track silences it
//! without renegotiating.

use crate::types::TrackId;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Media track kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

impl TrackKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

struct TrackInner {
    id: TrackId,
    kind: TrackKind,
    enabled: AtomicBool,
    packets_received: AtomicU64,
    bytes_received: AtomicU64,
    packets_delivered: AtomicU64,
}

/// Handle to one received audio or video track.
///
/// Cloning shares the underlying flag and counters.
#[derive(Clone)]
pub struct MediaTrack {
    inner: Arc<TrackInner>,
}

impl MediaTrack {
    pub fn new(id: impl Into<TrackId>, kind: TrackKind) -> Self {
        Self {
            inner: Arc::new(TrackInner {
                id: id.into(),
                kind,
                enabled: AtomicBool::new(true),
                packets_received: AtomicU64::new(0),
                bytes_received: AtomicU64::new(0),
                packets_delivered: AtomicU64::new(0),
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> &TrackId {
        &self.inner.id
    }

    #[must_use]
    pub fn kind(&self) -> TrackKind {
        self.inner.kind
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.store(enabled, Ordering::Release);
    }

    /// Count a received packet. Returns whether it should be delivered.
    pub fn record_packet(&self, size: usize) -> bool {
        self.inner.packets_received.fetch_add(1, Ordering::Relaxed);
        self.inner.bytes_received.fetch_add(size as u64, Ordering::Relaxed);
        let deliver = self.is_enabled();
        if deliver {
            self.inner.packets_delivered.fetch_add(1, Ordering::Relaxed);
        }
        deliver
    }

    #[must_use]
    pub fn stats(&self) -> TrackStats {
        TrackStats {
            track_id: self.inner.id.as_str().to_string(),
            kind: self.inner.kind,
            enabled: self.is_enabled(),
            packets_received: self.inner.packets_received.load(Ordering::Relaxed),
            bytes_received: self.inner.bytes_received.load(Ordering::Relaxed),
            packets_delivered: self.inner.packets_delivered.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for MediaTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaTrack")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// Track statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackStats {
    pub track_id: String,
    pub kind: TrackKind,
    pub enabled: bool,
    pub packets_received: u64,
    pub bytes_received: u64,
    pub packets_delivered: u64,
}

/// Tracks collected from one camera's peer connection
#[derive(Debug, Clone, Default)]
pub struct MediaStream {
    tracks: Vec<MediaTrack>,
}

impl MediaStream {
    pub fn add_track(&mut self, track: MediaTrack) {
        if self.tracks.iter().any(|t| t.id() == track.id()) {
            return;
        }
        self.tracks.push(track);
    }

    #[must_use]
    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Audio)
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Video)
    }

    /// Both an audio and a video track have arrived
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.audio_tracks().next().is_some() && self.video_tracks().next().is_some()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Set the `enabled` flag on every track of `kind`
    pub fn set_kind_enabled(&self, kind: TrackKind, enabled: bool) {
        for track in self.tracks.iter().filter(|t| t.kind() == kind) {
            track.set_enabled(enabled);
        }
    }
}
