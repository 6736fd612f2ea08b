//! Media sink for a headless viewer: nothing is rendered, the first
//! delivered packet of each track is logged

use dashmap::DashSet;
use tracing::info;

use camux_core::{CameraId, MediaSink, MediaTrack, TrackId};

#[derive(Default)]
pub struct MediaLog {
    flowing: DashSet<(CameraId, TrackId)>,
}

impl MediaLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `track` has delivered at least one packet for `camera`
    #[must_use]
    pub fn is_flowing(&self, camera: &CameraId, track: &TrackId) -> bool {
        self.flowing.contains(&(camera.clone(), track.clone()))
    }
}

impl MediaSink for MediaLog {
    fn deliver(&self, camera: &CameraId, track: &MediaTrack, payload: &[u8]) {
        if self.flowing.insert((camera.clone(), track.id().clone())) {
            info!(
                camera_id = %camera,
                track_id = %track.id(),
                kind = track.kind().as_str(),
                bytes = payload.len(),
                "Media flowing"
            );
        }
    }
}
