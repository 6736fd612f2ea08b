//! Concurrent start/stop across selected cameras
//!
//! Every selected camera gets its own session and negotiates independently.
//! A camera that fails does not affect the others; the outcome of a group
//! operation is just the list of per-camera outcomes.

use std::sync::Arc;
use std::time::Duration;

use dashmap::{DashMap, DashSet};
use futures::future::join_all;
use tracing::info;

use crate::error::SessionError;
use crate::flags::MediaFlags;
use crate::peer::PeerConnector;
use crate::selection::SelectionRegistry;
use crate::session::{SessionState, StreamSession};
use crate::transport::StreamTransport;
use crate::types::CameraId;

/// Result of one camera within a group operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraOutcome {
    pub camera_id: CameraId,
    /// `Err` carries the message shown on the camera's tile
    pub result: Result<(), String>,
}

/// Per-camera outcomes of a group start or stop
#[derive(Debug, Clone, Default)]
pub struct GroupReport {
    pub outcomes: Vec<CameraOutcome>,
}

impl GroupReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &CameraId> {
        self.outcomes
            .iter()
            .filter(|o| o.result.is_ok())
            .map(|o| &o.camera_id)
    }

    pub fn failed(&self) -> impl Iterator<Item = (&CameraId, &str)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (&o.camera_id, e.as_str())))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Removes a camera from the loading set when its start settles,
/// including when the start future is dropped.
struct LoadingGuard<'a> {
    loading: &'a DashSet<CameraId>,
    camera: CameraId,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.loading.remove(&self.camera);
    }
}

pub struct GroupController {
    transport: Arc<dyn StreamTransport>,
    connector: Arc<dyn PeerConnector>,
    flags: MediaFlags,
    selection: SelectionRegistry,
    extension_interval: Duration,
    sessions: DashMap<CameraId, Arc<StreamSession>>,
    loading: DashSet<CameraId>,
}

impl GroupController {
    pub fn new(
        transport: Arc<dyn StreamTransport>,
        connector: Arc<dyn PeerConnector>,
        flags: MediaFlags,
        selection: SelectionRegistry,
        extension_interval: Duration,
    ) -> Self {
        Self {
            transport,
            connector,
            flags,
            selection,
            extension_interval,
            sessions: DashMap::new(),
            loading: DashSet::new(),
        }
    }

    #[must_use]
    pub const fn flags(&self) -> &MediaFlags {
        &self.flags
    }

    #[must_use]
    pub const fn selection(&self) -> &SelectionRegistry {
        &self.selection
    }

    /// Get or create the session for `camera`
    pub fn register(&self, camera: CameraId) -> Arc<StreamSession> {
        let key = camera.clone();
        self.sessions
            .entry(camera)
            .or_insert_with(|| {
                StreamSession::new(
                    key,
                    Arc::clone(&self.transport),
                    Arc::clone(&self.connector),
                    self.flags.clone(),
                    self.extension_interval,
                )
            })
            .value()
            .clone()
    }

    /// Stop and forget a camera, dropping it from the selection too
    pub async fn unregister(&self, camera: &CameraId) {
        self.selection.deselect(camera);
        if let Some((_, session)) = self.sessions.remove(camera) {
            session.stop().await;
        }
    }

    #[must_use]
    pub fn session(&self, camera: &CameraId) -> Option<Arc<StreamSession>> {
        self.sessions.get(camera).map(|s| Arc::clone(s.value()))
    }

    /// Registered camera identifiers in stable order
    #[must_use]
    pub fn camera_ids(&self) -> Vec<CameraId> {
        let mut ids: Vec<CameraId> = self.sessions.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Select every registered camera
    pub fn select_all(&self) {
        self.selection.select_all(self.camera_ids());
    }

    /// Cameras whose start has not settled yet
    #[must_use]
    pub fn loading(&self) -> Vec<CameraId> {
        let mut ids: Vec<CameraId> = self.loading.iter().map(|id| id.key().clone()).collect();
        ids.sort();
        ids
    }

    #[must_use]
    pub fn is_loading(&self, camera: &CameraId) -> bool {
        self.loading.contains(camera)
    }

    #[must_use]
    pub fn is_any_loading(&self) -> bool {
        !self.loading.is_empty()
    }

    /// Cameras currently Active
    #[must_use]
    pub fn streaming(&self) -> Vec<CameraId> {
        let mut ids: Vec<CameraId> = self
            .sessions
            .iter()
            .filter(|e| e.value().state() == SessionState::Active)
            .map(|e| e.key().clone())
            .collect();
        ids.sort();
        ids
    }

    #[must_use]
    pub fn is_any_streaming(&self) -> bool {
        self.sessions
            .iter()
            .any(|e| e.value().state() == SessionState::Active)
    }

    /// Start one camera, tracking it in the loading set until it settles
    pub async fn start_one(&self, camera: &CameraId) -> Result<(), SessionError> {
        let session = self.register(camera.clone());
        self.loading.insert(camera.clone());
        let _guard = LoadingGuard {
            loading: &self.loading,
            camera: camera.clone(),
        };
        session.start().await
    }

    pub async fn stop_one(&self, camera: &CameraId) {
        if let Some(session) = self.session(camera) {
            session.stop().await;
        }
    }

    /// Start every selected camera concurrently
    pub async fn start_selected(&self) -> GroupReport {
        let selected = self.selection.selected();
        info!(count = selected.len(), "Starting selected cameras");

        let results = join_all(selected.iter().map(|id| self.start_one(id))).await;

        let outcomes = selected
            .into_iter()
            .zip(results)
            .map(|(camera_id, result)| CameraOutcome {
                camera_id,
                result: result.map_err(|e| e.to_string()),
            })
            .collect();
        GroupReport { outcomes }
    }

    /// Stop every selected camera concurrently and wait for all of them
    pub async fn stop_selected(&self) -> GroupReport {
        let selected = self.selection.selected();
        info!(count = selected.len(), "Stopping selected cameras");
        self.stop_many(selected).await
    }

    /// Stop every registered camera regardless of selection
    pub async fn stop_all(&self) -> GroupReport {
        self.stop_many(self.camera_ids()).await
    }

    async fn stop_many(&self, cameras: Vec<CameraId>) -> GroupReport {
        join_all(cameras.iter().map(|id| self.stop_one(id))).await;
        GroupReport {
            outcomes: cameras
                .into_iter()
                .map(|camera_id| CameraOutcome {
                    camera_id,
                    result: Ok(()),
                })
                .collect(),
        }
    }

    pub fn toggle_video(&self) -> bool {
        self.flags.toggle_video()
    }

    pub fn toggle_audio(&self) -> bool {
        self.flags.toggle_audio()
    }

    pub fn set_video_enabled(&self, enabled: bool) {
        self.flags.set_video_enabled(enabled);
    }

    pub fn set_audio_enabled(&self, enabled: bool) {
        self.flags.set_audio_enabled(enabled);
    }
}
