//! Interface to the real-time media transport.

use async_trait::async_trait;
use audio_io::SampleTap;
use room_core::{Error, SessionEvent, TrackKind, TrackSid};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// A track this client publishes into the session.
#[derive(Clone)]
pub struct LocalPublication {
    pub sid: TrackSid,
    pub kind: TrackKind,
    pub muted: bool,
    /// Raw samples of the published signal, when the transport exposes them
    pub tap: Option<Arc<dyn SampleTap>>,
}

impl fmt::Debug for LocalPublication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalPublication")
            .field("sid", &self.sid)
            .field("kind", &self.kind)
            .field("muted", &self.muted)
            .field("tap", &self.tap.is_some())
            .finish()
    }
}

/// A connection to the media server.
///
/// `connect` hands back the session's event stream. Events arrive in
/// transport order; the stream ends when the connection is gone.
#[cfg_attr(any(test, feature = "test_utils"), mockall::automock)]
#[async_trait]
pub trait Transport: Send {
    async fn connect(
        &mut self,
        url: &str,
        token: &str,
    ) -> Result<mpsc::UnboundedReceiver<SessionEvent>, Error>;

    async fn disconnect(&mut self) -> Result<(), Error>;

    /// Publish (first call) or unmute/mute the local microphone.
    async fn set_microphone_enabled(&mut self, enabled: bool) -> Result<(), Error>;

    fn local_publication(&self, kind: TrackKind) -> Option<LocalPublication>;
}
