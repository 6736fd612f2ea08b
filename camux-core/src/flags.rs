//! Group-wide video/audio enablement
//!
//! One `MediaFlags` value is shared by every session of a viewer. Writes
//! come only from explicit group toggles; sessions subscribe to the watch
//! channel and re-apply the flags to their tracks on every change.

use crate::media::{MediaStream, MediaTrack, TrackKind};
use tokio::sync::watch;

/// Snapshot of the two group flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaFlagsState {
    pub video_enabled: bool,
    pub audio_enabled: bool,
}

impl Default for MediaFlagsState {
    fn default() -> Self {
        Self {
            video_enabled: true,
            audio_enabled: true,
        }
    }
}

impl MediaFlagsState {
    #[must_use]
    pub const fn enabled_for(&self, kind: TrackKind) -> bool {
        match kind {
            TrackKind::Audio => self.audio_enabled,
            TrackKind::Video => self.video_enabled,
        }
    }

    pub fn apply_to_track(&self, track: &MediaTrack) {
        track.set_enabled(self.enabled_for(track.kind()));
    }

    pub fn apply_to_stream(&self, stream: &MediaStream) {
        stream.set_kind_enabled(TrackKind::Audio, self.audio_enabled);
        stream.set_kind_enabled(TrackKind::Video, self.video_enabled);
    }
}

/// Observable, shareable group media flags
#[derive(Clone)]
pub struct MediaFlags {
    tx: watch::Sender<MediaFlagsState>,
}

impl Default for MediaFlags {
    fn default() -> Self {
        Self::new(MediaFlagsState::default())
    }
}

impl MediaFlags {
    #[must_use]
    pub fn new(initial: MediaFlagsState) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    #[must_use]
    pub fn current(&self) -> MediaFlagsState {
        *self.tx.borrow()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<MediaFlagsState> {
        self.tx.subscribe()
    }

    pub fn set_video_enabled(&self, enabled: bool) {
        self.tx.send_if_modified(|state| {
            let changed = state.video_enabled != enabled;
            state.video_enabled = enabled;
            changed
        });
    }

    pub fn set_audio_enabled(&self, enabled: bool) {
        self.tx.send_if_modified(|state| {
            let changed = state.audio_enabled != enabled;
            state.audio_enabled = enabled;
            changed
        });
    }

    /// Flip video enablement, returning the new value
    pub fn toggle_video(&self) -> bool {
        let mut now = false;
        self.tx.send_modify(|state| {
            state.video_enabled = !state.video_enabled;
            now = state.video_enabled;
        });
        now
    }

    /// Flip audio enablement, returning the new value
    pub fn toggle_audio(&self) -> bool {
        let mut now = false;
        self.tx.send_modify(|state| {
            state.audio_enabled = !state.audio_enabled;
            now = state.audio_enabled;
        });
        now
    }
}
