//! Multi-camera live view core
//!
//! One [`StreamSession`] per camera owns the WebRTC negotiation, the grant
//! renewal timer and teardown. A [`GroupController`] starts and stops the
//! sessions of every selected camera concurrently, and a shared
//! [`MediaFlags`] value mutes audio or hides video across all of them.
//!
//! The three stream-control calls go through [`StreamTransport`]; the
//! WebRTC stack sits behind [`PeerConnector`].

pub mod config;
pub mod devices;
pub mod error;
pub mod flags;
pub mod group;
pub mod logging;
pub mod media;
pub mod peer;
pub mod selection;
pub mod session;
pub mod transport;
pub mod types;

pub use config::{LoggingConfig, ViewerConfig};
pub use devices::{Camera, DeviceDirectory, DeviceList};
pub use error::{PeerError, SessionError, TransportError};
pub use flags::{MediaFlags, MediaFlagsState};
pub use group::{CameraOutcome, GroupController, GroupReport};
pub use media::{MediaStream, MediaTrack, TrackKind, TrackStats};
pub use peer::{MediaSink, PeerConnector, PeerLink, WebRtcConnector};
pub use selection::SelectionRegistry;
pub use session::{SessionSnapshot, SessionState, StreamSession};
pub use transport::{HttpStreamTransport, ProxyClient, StreamTransport};
pub use types::{CameraId, GrantRenewal, StreamGrant, TrackId};
