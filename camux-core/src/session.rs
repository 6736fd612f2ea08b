//! Per-camera stream lifecycle
//!
//! A session walks `Idle -> Negotiating -> Active -> Stopping -> Idle`.
//! Negotiation suspends at the peer and transport boundaries without
//! holding the state lock, so `stop()` may run at any point. Each `start`
//! captures an epoch and `stop` bumps it; a negotiation that finishes under
//! a stale epoch closes what it created and reports `Cancelled` instead of
//! resurrecting the session.
//!
//! While Active an extension task renews the grant on a fixed period. A
//! failed renewal stops the session. The extension task and the track
//! collector hold only a `Weak` reference and are cancelled through
//! `CancellationToken`s, never aborted, since `stop()` may itself run on
//! the extension task.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::flags::{MediaFlags, MediaFlagsState};
use crate::media::{MediaStream, MediaTrack, TrackKind};
use crate::peer::{ensure_trailing_newline, prepare_offer, PeerConnector, PeerLink};
use crate::transport::StreamTransport;
use crate::types::{CameraId, StreamGrant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Negotiating,
    Active,
    Stopping,
}

impl SessionState {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Negotiating => "negotiating",
            Self::Active => "active",
            Self::Stopping => "stopping",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a UI needs to render one camera tile
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub stream: MediaStream,
    pub last_error: Option<String>,
}

struct Inner {
    state: SessionState,
    epoch: u64,
    link: Option<Arc<dyn PeerLink>>,
    grant: Option<StreamGrant>,
    stream: MediaStream,
    last_error: Option<String>,
    extension: Option<CancellationToken>,
    collector: Option<CancellationToken>,
}

impl Inner {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            stream: self.stream.clone(),
            last_error: self.last_error.clone(),
        }
    }
}

/// Lifecycle of one camera's live stream
pub struct StreamSession {
    camera: CameraId,
    transport: Arc<dyn StreamTransport>,
    connector: Arc<dyn PeerConnector>,
    flags: MediaFlags,
    extension_interval: Duration,
    inner: Mutex<Inner>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl StreamSession {
    pub fn new(
        camera: CameraId,
        transport: Arc<dyn StreamTransport>,
        connector: Arc<dyn PeerConnector>,
        flags: MediaFlags,
        extension_interval: Duration,
    ) -> Arc<Self> {
        let inner = Inner {
            state: SessionState::Idle,
            epoch: 0,
            link: None,
            grant: None,
            stream: MediaStream::default(),
            last_error: None,
            extension: None,
            collector: None,
        };
        let (snapshot_tx, _rx) = watch::channel(inner.snapshot());

        Arc::new(Self {
            camera,
            transport,
            connector,
            flags,
            extension_interval,
            inner: Mutex::new(inner),
            snapshot_tx,
        })
    }

    #[must_use]
    pub fn camera_id(&self) -> &CameraId {
        &self.camera
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.inner.lock().last_error.clone()
    }

    /// Tracks collected so far
    #[must_use]
    pub fn stream(&self) -> MediaStream {
        self.inner.lock().stream.clone()
    }

    /// The grant currently held, if any
    #[must_use]
    pub fn grant(&self) -> Option<StreamGrant> {
        self.inner.lock().grant.clone()
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.lock().snapshot()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    fn publish(&self, inner: &Inner) {
        self.snapshot_tx.send_replace(inner.snapshot());
    }

    /// Negotiate a stream and become Active.
    ///
    /// Only valid from Idle. On failure the session returns to Idle with the
    /// error recorded; if `stop()` interrupted negotiation the result is
    /// `SessionError::Cancelled`.
    pub async fn start(self: &Arc<Self>) -> Result<(), SessionError> {
        let epoch = {
            let mut inner = self.inner.lock();
            if inner.state != SessionState::Idle {
                return Err(SessionError::InvalidState(format!(
                    "cannot start camera {} while {}",
                    self.camera, inner.state
                )));
            }
            inner.state = SessionState::Negotiating;
            inner.last_error = None;
            inner.stream = MediaStream::default();
            self.publish(&inner);
            inner.epoch
        };

        info!(camera_id = %self.camera, "Starting stream");

        match self.negotiate(epoch).await {
            Ok(()) => {
                info!(camera_id = %self.camera, "Stream active");
                Ok(())
            }
            Err(SessionError::Cancelled) => {
                debug!(camera_id = %self.camera, "Negotiation cancelled by stop");
                Err(SessionError::Cancelled)
            }
            Err(e) => self.fail(epoch, e).await,
        }
    }

    async fn negotiate(self: &Arc<Self>, epoch: u64) -> Result<(), SessionError> {
        let opened = self.connector.open(&self.camera).await?;
        let link = opened.link;

        let registered = {
            let mut inner = self.inner.lock();
            if inner.epoch == epoch {
                inner.link = Some(Arc::clone(&link));

                let token = CancellationToken::new();
                inner.collector = Some(token.clone());
                tokio::spawn(collect_tracks(
                    Arc::downgrade(self),
                    opened.tracks,
                    self.flags.subscribe(),
                    token,
                ));
                true
            } else {
                false
            }
        };
        if !registered {
            self.close_link(&link).await;
            return Err(SessionError::Cancelled);
        }

        let offer = prepare_offer(link.as_ref()).await?;
        debug!(camera_id = %self.camera, offer_len = offer.len(), "Offer created");

        let grant = self.transport.generate(&self.camera, &offer).await?;

        if self.is_stale(epoch) {
            self.release_grant(&grant).await;
            return Err(SessionError::Cancelled);
        }

        let answer = ensure_trailing_newline(grant.answer_sdp.clone());
        if let Err(e) = link.apply_answer(answer).await {
            self.release_grant(&grant).await;
            return Err(e.into());
        }

        let rejected = {
            let mut inner = self.inner.lock();
            if inner.epoch == epoch {
                inner.grant = Some(grant);
                inner.state = SessionState::Active;

                // The first renewal is due one period after becoming Active
                let first_tick = tokio::time::Instant::now() + self.extension_interval;
                let token = CancellationToken::new();
                inner.extension = Some(token.clone());
                tokio::spawn(run_extension_timer(
                    Arc::downgrade(self),
                    token,
                    first_tick,
                    self.extension_interval,
                    epoch,
                ));

                self.publish(&inner);
                None
            } else {
                Some(grant)
            }
        };

        match rejected {
            None => Ok(()),
            Some(grant) => {
                self.release_grant(&grant).await;
                Err(SessionError::Cancelled)
            }
        }
    }

    /// Record a start failure and tear down whatever negotiation created
    async fn fail(&self, epoch: u64, error: SessionError) -> Result<(), SessionError> {
        let link = {
            let mut inner = self.inner.lock();
            if inner.epoch != epoch {
                // A stop already owns the teardown
                return Err(SessionError::Cancelled);
            }
            if let Some(token) = inner.collector.take() {
                token.cancel();
            }
            inner.state = SessionState::Idle;
            inner.stream = MediaStream::default();
            inner.last_error = Some(error.to_string());
            self.publish(&inner);
            inner.link.take()
        };

        warn!(camera_id = %self.camera, error = %error, "Failed to start stream");

        if let Some(link) = link {
            self.close_link(&link).await;
        }
        Err(error)
    }

    fn is_stale(&self, epoch: u64) -> bool {
        self.inner.lock().epoch != epoch
    }

    async fn close_link(&self, link: &Arc<dyn PeerLink>) {
        if let Err(e) = link.close().await {
            warn!(camera_id = %self.camera, error = %e, "Failed to close peer connection");
        }
    }

    /// Best-effort remote stop for a grant this session will not keep
    async fn release_grant(&self, grant: &StreamGrant) {
        if let Err(e) = self.transport.stop(&self.camera, &grant.stream_token).await {
            debug!(camera_id = %self.camera, error = %e, "Ignoring remote stop failure");
        }
    }

    /// Tear the session down. Idempotent and infallible.
    ///
    /// The extension timer is cancelled before anything else. A remote stop
    /// is issued only when a grant is held, and its failure is swallowed.
    /// A call that finds another stop in progress returns once that stop
    /// has settled.
    pub async fn stop(&self) {
        let teardown = {
            let mut inner = self.inner.lock();
            if let Some(token) = inner.extension.take() {
                token.cancel();
            }
            match inner.state {
                SessionState::Idle => return,
                SessionState::Stopping => None,
                SessionState::Negotiating | SessionState::Active => {
                    inner.epoch = inner.epoch.wrapping_add(1);
                    if let Some(token) = inner.collector.take() {
                        token.cancel();
                    }
                    inner.state = SessionState::Stopping;
                    self.publish(&inner);
                    Some((inner.link.take(), inner.grant.take()))
                }
            }
        };

        let Some((link, grant)) = teardown else {
            self.wait_until_stopped().await;
            return;
        };

        info!(camera_id = %self.camera, "Stopping stream");

        if let Some(link) = link {
            self.close_link(&link).await;
        }
        if let Some(grant) = grant {
            self.release_grant(&grant).await;
        }

        let mut inner = self.inner.lock();
        inner.state = SessionState::Idle;
        inner.stream = MediaStream::default();
        self.publish(&inner);
    }

    async fn wait_until_stopped(&self) {
        let mut rx = self.snapshot_tx.subscribe();
        let _ = rx
            .wait_for(|snapshot| snapshot.state != SessionState::Stopping)
            .await;
    }

    /// Renew the grant with its current extension token
    async fn extend(&self, epoch: u64) {
        let extension_token = {
            let inner = self.inner.lock();
            if inner.epoch != epoch || inner.state != SessionState::Active {
                return;
            }
            match inner.grant {
                Some(ref grant) => grant.stream_extension_token.clone(),
                None => return,
            }
        };

        match self.transport.extend(&self.camera, &extension_token).await {
            Ok(renewal) => {
                let mut inner = self.inner.lock();
                if inner.epoch != epoch {
                    return;
                }
                if let Some(ref mut grant) = inner.grant {
                    grant.renew(renewal);
                    debug!(camera_id = %self.camera, expires_at = ?grant.expires_at, "Stream extended");
                }
            }
            Err(e) => {
                warn!(camera_id = %self.camera, error = %e, "Stream extension failed, stopping");
                self.stop().await;
            }
        }
    }

    /// Enable or disable this session's video tracks. No-op unless Active.
    pub fn set_video_enabled(&self, enabled: bool) {
        self.set_kind_enabled(TrackKind::Video, enabled);
    }

    /// Enable or disable this session's audio tracks. No-op unless Active.
    pub fn set_audio_enabled(&self, enabled: bool) {
        self.set_kind_enabled(TrackKind::Audio, enabled);
    }

    fn set_kind_enabled(&self, kind: TrackKind, enabled: bool) {
        let inner = self.inner.lock();
        if inner.state == SessionState::Active {
            inner.stream.set_kind_enabled(kind, enabled);
        }
    }

    fn add_track(&self, track: MediaTrack) {
        let mut inner = self.inner.lock();
        self.flags.current().apply_to_track(&track);
        debug!(
            camera_id = %self.camera,
            track_id = %track.id(),
            kind = track.kind().as_str(),
            enabled = track.is_enabled(),
            "Track collected"
        );
        inner.stream.add_track(track);
        if inner.stream.is_complete() {
            debug!(camera_id = %self.camera, "Audio and video tracks present");
        }
        self.publish(&inner);
    }

    fn apply_flags(&self, flags: MediaFlagsState) {
        let inner = self.inner.lock();
        flags.apply_to_stream(&inner.stream);
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        for token in [inner.extension.take(), inner.collector.take()]
            .into_iter()
            .flatten()
        {
            token.cancel();
        }
    }
}

async fn run_extension_timer(
    session: Weak<StreamSession>,
    token: CancellationToken,
    first_tick: tokio::time::Instant,
    period: Duration,
    epoch: u64,
) {
    let mut interval = tokio::time::interval_at(first_tick, period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => break,
            _ = interval.tick() => {}
        }

        let Some(session) = session.upgrade() else {
            break;
        };
        session.extend(epoch).await;
    }
}

async fn collect_tracks(
    session: Weak<StreamSession>,
    mut tracks: mpsc::UnboundedReceiver<MediaTrack>,
    mut flags: watch::Receiver<MediaFlagsState>,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => break,
            Some(track) = tracks.recv() => {
                let Some(session) = session.upgrade() else { break };
                session.add_track(track);
            }
            Ok(()) = flags.changed() => {
                let state = *flags.borrow_and_update();
                let Some(session) = session.upgrade() else { break };
                session.apply_flags(state);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PeerError, TransportError};
    use crate::peer::OpenedPeer;
    use crate::types::GrantRenewal;
    use async_trait::async_trait;
    use tokio::sync::Notify;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Open,
        Transceiver(TrackKind),
        DataChannel(String, bool),
        Offer,
        Answer(String),
        Close,
        Generate(String),
        Extend(String),
        Stop(String),
    }

    type Log = Arc<Mutex<Vec<Call>>>;

    #[derive(Default)]
    struct FakeTransport {
        log: Log,
        answer: Mutex<String>,
        fail_generate: Mutex<bool>,
        fail_extend: Mutex<bool>,
        extend_count: Mutex<u32>,
        generate_gate: Option<Arc<Notify>>,
        stop_gate: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl StreamTransport for FakeTransport {
        async fn generate(
            &self,
            _camera: &CameraId,
            offer_sdp: &str,
        ) -> Result<StreamGrant, TransportError> {
            self.log.lock().push(Call::Generate(offer_sdp.to_string()));
            if let Some(ref gate) = self.generate_gate {
                gate.notified().await;
            }
            if *self.fail_generate.lock() {
                return Err(TransportError::Unauthorized("expired".to_string()));
            }
            Ok(StreamGrant::new(self.answer.lock().clone(), "stream-0", "ext-0"))
        }

        async fn extend(
            &self,
            _camera: &CameraId,
            extension_token: &str,
        ) -> Result<GrantRenewal, TransportError> {
            self.log.lock().push(Call::Extend(extension_token.to_string()));
            if *self.fail_extend.lock() {
                return Err(TransportError::Network("timeout".to_string()));
            }
            let mut count = self.extend_count.lock();
            *count += 1;
            Ok(GrantRenewal {
                stream_token: Some(format!("stream-{count}")),
                stream_extension_token: format!("ext-{count}"),
                expires_at: None,
            })
        }

        async fn stop(&self, _camera: &CameraId, stream_token: &str) -> Result<(), TransportError> {
            self.log.lock().push(Call::Stop(stream_token.to_string()));
            if let Some(ref gate) = self.stop_gate {
                gate.notified().await;
            }
            Err(TransportError::Network("stop is best effort".to_string()))
        }
    }

    struct FakeLink {
        log: Log,
    }

    #[async_trait]
    impl PeerLink for FakeLink {
        async fn add_recvonly_transceiver(&self, kind: TrackKind) -> Result<(), PeerError> {
            self.log.lock().push(Call::Transceiver(kind));
            Ok(())
        }

        async fn create_data_channel(&self, label: &str, ordered: bool) -> Result<(), PeerError> {
            self.log.lock().push(Call::DataChannel(label.to_string(), ordered));
            Ok(())
        }

        async fn create_offer(&self) -> Result<String, PeerError> {
            self.log.lock().push(Call::Offer);
            Ok("offer-sdp".to_string())
        }

        async fn apply_answer(&self, sdp: String) -> Result<(), PeerError> {
            self.log.lock().push(Call::Answer(sdp));
            Ok(())
        }

        async fn close(&self) -> Result<(), PeerError> {
            self.log.lock().push(Call::Close);
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeConnector {
        log: Log,
        track_tx: Mutex<Option<mpsc::UnboundedSender<MediaTrack>>>,
    }

    #[async_trait]
    impl PeerConnector for FakeConnector {
        async fn open(&self, _camera: &CameraId) -> Result<OpenedPeer, PeerError> {
            self.log.lock().push(Call::Open);
            let (tx, rx) = mpsc::unbounded_channel();
            *self.track_tx.lock() = Some(tx);
            Ok(OpenedPeer {
                link: Arc::new(FakeLink {
                    log: Arc::clone(&self.log),
                }),
                tracks: rx,
            })
        }
    }

    struct Harness {
        log: Log,
        transport: Arc<FakeTransport>,
        connector: Arc<FakeConnector>,
        flags: MediaFlags,
        session: Arc<StreamSession>,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_transport(FakeTransport::default())
        }

        fn with_generate_gate(gate: Arc<Notify>) -> Self {
            Self::with_transport(FakeTransport {
                generate_gate: Some(gate),
                ..FakeTransport::default()
            })
        }

        fn with_stop_gate(gate: Arc<Notify>) -> Self {
            Self::with_transport(FakeTransport {
                stop_gate: Some(gate),
                ..FakeTransport::default()
            })
        }

        fn with_transport(transport: FakeTransport) -> Self {
            let log: Log = Arc::clone(&transport.log);
            *transport.answer.lock() = "v=0\r\na=answer".to_string();
            let transport = Arc::new(transport);
            let connector = Arc::new(FakeConnector {
                log: Arc::clone(&log),
                track_tx: Mutex::new(None),
            });
            let flags = MediaFlags::default();
            let session = StreamSession::new(
                CameraId::from("cam-a"),
                transport.clone(),
                connector.clone(),
                flags.clone(),
                Duration::from_secs(240),
            );
            Self {
                log,
                transport,
                connector,
                flags,
                session,
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.log.lock().clone()
        }

        fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
            self.log.lock().iter().filter(|c| pred(c)).count()
        }

        fn send_track(&self, id: &str, kind: TrackKind) {
            let tx = self.connector.track_tx.lock().clone().unwrap();
            tx.send(MediaTrack::new(id, kind)).unwrap();
        }
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_stop_on_idle_is_noop() {
        let h = Harness::new();
        h.session.stop().await;
        h.session.stop().await;
        assert_eq!(h.session.state(), SessionState::Idle);
        assert!(h.calls().is_empty());
    }

    #[tokio::test]
    async fn test_negotiation_order() {
        let h = Harness::new();
        h.session.start().await.unwrap();

        assert_eq!(
            h.calls(),
            vec![
                Call::Open,
                Call::Transceiver(TrackKind::Audio),
                Call::Transceiver(TrackKind::Video),
                Call::DataChannel("dataSendChannel".to_string(), true),
                Call::Offer,
                Call::Generate("offer-sdp".to_string()),
                Call::Answer("v=0\r\na=answer\n".to_string()),
            ]
        );
        assert_eq!(h.session.state(), SessionState::Active);
        assert_eq!(h.session.grant().unwrap().stream_token, "stream-0");
    }

    #[tokio::test]
    async fn test_answer_with_newline_unchanged() {
        let h = Harness::new();
        *h.transport.answer.lock() = "v=0\r\n".to_string();
        h.session.start().await.unwrap();
        assert_eq!(h.count(|c| *c == Call::Answer("v=0\r\n".to_string())), 1);
    }

    #[tokio::test]
    async fn test_start_requires_idle() {
        let h = Harness::new();
        h.session.start().await.unwrap();
        let err = h.session.start().await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidState(_)));
        assert_eq!(h.session.state(), SessionState::Active);
    }

    #[tokio::test]
    async fn test_start_failure_records_error() {
        let h = Harness::new();
        *h.transport.fail_generate.lock() = true;

        let err = h.session.start().await.unwrap_err();
        assert!(matches!(err, SessionError::Transport(ref e) if e.is_auth_failure()));

        assert_eq!(h.session.state(), SessionState::Idle);
        assert_eq!(
            h.session.last_error().as_deref(),
            Some("Stream request failed: Unauthorized: expired")
        );
        assert!(h.session.grant().is_none());
        assert_eq!(h.count(|c| *c == Call::Close), 1);
        assert_eq!(h.count(|c| matches!(c, Call::Stop(_))), 0);

        // A later successful start clears the error
        *h.transport.fail_generate.lock() = false;
        h.session.start().await.unwrap();
        assert!(h.session.last_error().is_none());
    }

    #[tokio::test]
    async fn test_stop_during_start_never_active() {
        let gate = Arc::new(Notify::new());
        let h = Harness::with_generate_gate(Arc::clone(&gate));

        let session = Arc::clone(&h.session);
        let start = tokio::spawn(async move { session.start().await });

        // Wait until generate is in flight
        while h.count(|c| matches!(c, Call::Generate(_))) == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(h.session.state(), SessionState::Negotiating);

        h.session.stop().await;
        assert_eq!(h.session.state(), SessionState::Idle);

        gate.notify_one();
        let result = start.await.unwrap();
        assert!(matches!(result, Err(SessionError::Cancelled)));

        assert_eq!(h.session.state(), SessionState::Idle);
        assert!(h.session.grant().is_none());
        // The peer was closed by stop and the late grant released remotely
        assert_eq!(h.count(|c| *c == Call::Close), 1);
        assert_eq!(h.count(|c| *c == Call::Stop("stream-0".to_string())), 1);
        assert_eq!(h.count(|c| matches!(c, Call::Answer(_))), 0);
    }

    #[tokio::test]
    async fn test_stop_releases_grant_and_swallows_error() {
        let h = Harness::new();
        h.session.start().await.unwrap();
        h.session.stop().await;

        assert_eq!(h.session.state(), SessionState::Idle);
        assert!(h.session.grant().is_none());
        assert_eq!(h.count(|c| *c == Call::Stop("stream-0".to_string())), 1);
        assert_eq!(h.count(|c| *c == Call::Close), 1);

        h.session.stop().await;
        assert_eq!(h.count(|c| matches!(c, Call::Stop(_))), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_extension_timer_period_and_cancel() {
        let h = Harness::new();
        h.session.start().await.unwrap();

        tokio::time::advance(Duration::from_secs(239)).await;
        settle().await;
        assert_eq!(h.count(|c| matches!(c, Call::Extend(_))), 0);

        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(h.count(|c| *c == Call::Extend("ext-0".to_string())), 1);

        // Second renewal uses the replaced extension token
        tokio::time::advance(Duration::from_secs(240)).await;
        settle().await;
        assert_eq!(h.count(|c| *c == Call::Extend("ext-1".to_string())), 1);
        assert_eq!(h.session.grant().unwrap().stream_token, "stream-2");

        h.session.stop().await;
        tokio::time::advance(Duration::from_secs(240 * 3)).await;
        settle().await;
        assert_eq!(h.count(|c| matches!(c, Call::Extend(_))), 2);
    }

    #[tokio::test]
    async fn test_concurrent_stop_waits_for_teardown() {
        let gate = Arc::new(Notify::new());
        let h = Harness::with_stop_gate(Arc::clone(&gate));
        h.session.start().await.unwrap();

        let session = Arc::clone(&h.session);
        let first = tokio::spawn(async move { session.stop().await });
        while h.count(|c| matches!(c, Call::Stop(_))) == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(h.session.state(), SessionState::Stopping);

        let session = Arc::clone(&h.session);
        let second = tokio::spawn(async move { session.stop().await });
        settle().await;
        assert!(!second.is_finished());

        gate.notify_one();
        second.await.unwrap();
        assert_eq!(h.session.state(), SessionState::Idle);
        first.await.unwrap();
        assert_eq!(h.count(|c| matches!(c, Call::Stop(_))), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_renewal_due_one_period_after_active() {
        let h = Harness::new();
        h.session.start().await.unwrap();

        tokio::time::advance(Duration::from_secs(240)).await;
        settle().await;
        assert_eq!(h.count(|c| *c == Call::Extend("ext-0".to_string())), 1);
        assert_eq!(h.session.grant().unwrap().stream_token, "stream-1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_extension_failure_stops_with_current_token() {
        let h = Harness::new();
        h.session.start().await.unwrap();

        tokio::time::advance(Duration::from_secs(240)).await;
        settle().await;
        assert_eq!(h.session.grant().unwrap().stream_token, "stream-1");

        *h.transport.fail_extend.lock() = true;
        tokio::time::advance(Duration::from_secs(240)).await;
        settle().await;

        assert_eq!(h.session.state(), SessionState::Idle);
        assert!(h.session.grant().is_none());
        assert_eq!(h.count(|c| matches!(c, Call::Stop(_))), 1);
        assert_eq!(h.count(|c| *c == Call::Stop("stream-1".to_string())), 1);

        // No further renewals after teardown
        tokio::time::advance(Duration::from_secs(240 * 2)).await;
        settle().await;
        assert_eq!(h.count(|c| matches!(c, Call::Extend(_))), 2);
    }

    #[tokio::test]
    async fn test_tracks_follow_flags() {
        let h = Harness::new();
        h.flags.set_video_enabled(false);
        h.session.start().await.unwrap();

        h.send_track("a0", TrackKind::Audio);
        h.send_track("v0", TrackKind::Video);
        settle().await;

        let stream = h.session.stream();
        assert!(stream.is_complete());
        assert!(stream.video_tracks().all(|t| !t.is_enabled()));
        assert!(stream.audio_tracks().all(MediaTrack::is_enabled));

        h.flags.set_video_enabled(true);
        h.flags.set_audio_enabled(false);
        settle().await;
        let stream = h.session.stream();
        assert!(stream.video_tracks().all(MediaTrack::is_enabled));
        assert!(stream.audio_tracks().all(|t| !t.is_enabled()));
    }

    #[tokio::test]
    async fn test_session_setters_only_when_active() {
        let h = Harness::new();
        h.session.set_audio_enabled(false);
        h.session.start().await.unwrap();
        h.send_track("a0", TrackKind::Audio);
        settle().await;
        assert!(h.session.stream().audio_tracks().all(MediaTrack::is_enabled));

        h.session.set_audio_enabled(false);
        assert!(h.session.stream().audio_tracks().all(|t| !t.is_enabled()));
    }

    #[tokio::test]
    async fn test_snapshots_published() {
        let h = Harness::new();
        let mut rx = h.session.subscribe();
        assert_eq!(rx.borrow_and_update().state, SessionState::Idle);

        h.session.start().await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().state, SessionState::Active);

        h.session.stop().await;
        assert_eq!(rx.borrow_and_update().state, SessionState::Idle);
    }
}
