//! In-process stand-in for a media server.
//!
//! Joins a scripted roster of remote agents, publishes one video and one audio
//! track per agent, rotates the active speaker and gives the local client a
//! microphone tap. Lets the client run end to end without a backend, and lets
//! tests inject failures on each step of a connection attempt.

use crate::transport::{LocalPublication, Transport};
use async_trait::async_trait;
use audio_io::{SampleTap, ToneTap};
use log::{debug, info, warn};
use room_core::{Error, Participant, RemoteTrack, SessionEvent, TrackKind, TrackSid};
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const LOCAL_MICROPHONE_SID: &str = "TR_LOCAL_MIC";

/// Pacing of the scripted session.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationTiming {
    /// Delay before each roster member joins
    pub join_delay: Duration,
    /// How long each agent holds the floor
    pub speaker_interval: Duration,
    /// End the session from the server side after this long
    pub session_length: Option<Duration>,
}

impl Default for SimulationTiming {
    fn default() -> Self {
        Self {
            join_delay: Duration::from_millis(400),
            speaker_interval: Duration::from_secs(3),
            session_length: None,
        }
    }
}

/// How the simulated microphone should fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MicrophoneFailure {
    PermissionDenied,
    NotFound,
    Other(String),
}

impl MicrophoneFailure {
    fn to_error(&self) -> Error {
        match self {
            MicrophoneFailure::PermissionDenied => {
                Error::MicrophonePermission("NotAllowedError: permission denied".to_string())
            }
            MicrophoneFailure::NotFound => {
                Error::MicrophoneNotFound("NotFoundError: no input device".to_string())
            }
            MicrophoneFailure::Other(detail) => Error::Microphone(detail.clone()),
        }
    }
}

/// An opened microphone: the tap plus whatever must stay alive to feed it.
pub struct MicrophoneSource {
    pub tap: Arc<dyn SampleTap>,
    keep_alive: Option<Box<dyn Any + Send>>,
}

impl MicrophoneSource {
    pub fn new(tap: Arc<dyn SampleTap>) -> Self {
        Self {
            tap,
            keep_alive: None,
        }
    }

    /// Hold `guard` (a capture stream, say) for as long as the source lives.
    pub fn keep_alive(mut self, guard: impl Any + Send) -> Self {
        self.keep_alive = Some(Box::new(guard));
        self
    }
}

type MicrophoneOpener = Box<dyn FnMut() -> Result<MicrophoneSource, Error> + Send>;

struct Connection {
    cancel: CancellationToken,
    script: JoinHandle<()>,
}

pub struct SimulatedRoom {
    roster: Vec<String>,
    timing: SimulationTiming,
    open_microphone: MicrophoneOpener,
    transport_failure: Option<String>,
    microphone_failure: Option<MicrophoneFailure>,
    connection: Option<Connection>,
    microphone: Option<MicrophoneSource>,
    microphone_muted: bool,
}

impl SimulatedRoom {
    /// A room where `roster` joins in order once the client connects.
    pub fn new(roster: Vec<String>) -> Self {
        Self {
            roster,
            timing: SimulationTiming::default(),
            open_microphone: Box::new(|| Ok(MicrophoneSource::new(Arc::new(ToneTap::default())))),
            transport_failure: None,
            microphone_failure: None,
            connection: None,
            microphone: None,
            microphone_muted: false,
        }
    }

    pub fn with_timing(mut self, timing: SimulationTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Replace the synthetic microphone with another source.
    pub fn with_microphone<F>(mut self, opener: F) -> Self
    where
        F: FnMut() -> Result<MicrophoneSource, Error> + Send + 'static,
    {
        self.open_microphone = Box::new(opener);
        self
    }

    /// Refuse the next connection attempts with `reason`.
    pub fn fail_transport(mut self, reason: impl Into<String>) -> Self {
        self.transport_failure = Some(reason.into());
        self
    }

    pub fn fail_microphone(mut self, failure: MicrophoneFailure) -> Self {
        self.microphone_failure = Some(failure);
        self
    }

    pub fn roster(&self) -> &[String] {
        &self.roster
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    fn close(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.cancel.cancel();
            connection.script.abort();
        }
        self.microphone = None;
        self.microphone_muted = false;
    }
}

#[async_trait]
impl Transport for SimulatedRoom {
    async fn connect(
        &mut self,
        url: &str,
        token: &str,
    ) -> Result<mpsc::UnboundedReceiver<SessionEvent>, Error> {
        if let Some(reason) = &self.transport_failure {
            warn!("Simulated transport refusing connection to {}: {}", url, reason);
            return Err(Error::Transport(reason.clone()));
        }
        if token.is_empty() {
            return Err(Error::Transport("empty access token".to_string()));
        }
        if self
            .connection
            .as_ref()
            .is_some_and(|connection| connection.cancel.is_cancelled())
        {
            debug!("Previous simulated session already ended, releasing it");
            self.close();
        }
        if self.connection.is_some() {
            return Err(Error::InvalidState("already connected".to_string()));
        }

        info!(
            "Simulated room at {} opening with {} remote participants",
            url,
            self.roster.len()
        );
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let script = tokio::spawn(run_script(
            self.roster.clone(),
            self.timing.clone(),
            event_tx,
            cancel.clone(),
        ));
        self.connection = Some(Connection { cancel, script });
        Ok(event_rx)
    }

    async fn disconnect(&mut self) -> Result<(), Error> {
        if self.connection.is_none() {
            debug!("Simulated room already closed");
        }
        self.close();
        Ok(())
    }

    async fn set_microphone_enabled(&mut self, enabled: bool) -> Result<(), Error> {
        if self.connection.is_none() {
            return Err(Error::InvalidState("not connected".to_string()));
        }
        if enabled && self.microphone.is_none() {
            if let Some(failure) = &self.microphone_failure {
                return Err(failure.to_error());
            }
            self.microphone = Some((self.open_microphone)()?);
            info!("Local microphone published as {}", LOCAL_MICROPHONE_SID);
        }
        self.microphone_muted = !enabled;
        debug!("Local microphone {}", if enabled { "unmuted" } else { "muted" });
        Ok(())
    }

    fn local_publication(&self, kind: TrackKind) -> Option<LocalPublication> {
        match kind {
            TrackKind::Audio => self.microphone.as_ref().map(|source| LocalPublication {
                sid: TrackSid::new(LOCAL_MICROPHONE_SID),
                kind: TrackKind::Audio,
                muted: self.microphone_muted,
                tap: Some(source.tap.clone()),
            }),
            TrackKind::Video => None,
        }
    }
}

impl Drop for SimulatedRoom {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_script(
    roster: Vec<String>,
    timing: SimulationTiming,
    events: mpsc::UnboundedSender<SessionEvent>,
    cancel: CancellationToken,
) {
    let started = tokio::time::Instant::now();

    for (index, identity) in roster.iter().enumerate() {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(timing.join_delay) => {}
        }
        let participant = Participant::remote(identity.clone());
        let joined = [
            SessionEvent::ParticipantConnected(participant.clone()),
            SessionEvent::TrackSubscribed {
                track: RemoteTrack::new(format!("TR_V{}", index + 1), TrackKind::Video)
                    .with_name(format!("{}-camera", identity)),
                participant: participant.clone(),
            },
            SessionEvent::TrackSubscribed {
                track: RemoteTrack::new(format!("TR_A{}", index + 1), TrackKind::Audio)
                    .with_name(format!("{}-voice", identity)),
                participant,
            },
        ];
        for event in joined {
            if events.send(event).is_err() {
                debug!("Session event receiver dropped, ending simulation");
                return;
            }
        }
        debug!("Simulated participant {} joined", identity);
    }

    if roster.is_empty() {
        cancel.cancelled().await;
        return;
    }

    let mut speaker = 0usize;
    let mut rotation = tokio::time::interval(timing.speaker_interval);
    loop {
        if let Some(length) = timing.session_length {
            if started.elapsed() >= length {
                info!("Simulated session reached its end");
                // Marked ended before the client hears about it
                cancel.cancel();
                let _ = events.send(SessionEvent::Disconnected {
                    reason: Some("session ended by server".to_string()),
                });
                return;
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = rotation.tick() => {}
        }

        let current = Participant::remote(roster[speaker % roster.len()].clone());
        if events
            .send(SessionEvent::ActiveSpeakersChanged(vec![current]))
            .is_err()
        {
            return;
        }
        speaker += 1;
    }
}
