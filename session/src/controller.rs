use crate::{Session, SessionNotice};
use log::{debug, error, info, trace, warn};
use network::{TokenProvider, Transport};
use room::TrackRouter;
use room_core::{ConnectionState, Error, RoomEvent, SessionEvent, TrackKind};
use tokio::sync::{mpsc, watch};
use visualization::{Scene, VisualizationPipeline};

/// Drives the connection state machine and routes session events.
///
/// `Idle -> Connecting -> Connected -> Disconnected`, with `Error` reachable
/// from `Connecting`. There is at most one live [`Session`] at a time.
pub struct SessionController<T: Transport, P: TokenProvider> {
    transport: T,
    tokens: P,
    router: TrackRouter,
    visualization: VisualizationPipeline,
    room: String,
    identity: String,
    state_tx: watch::Sender<ConnectionState>,
    notices: mpsc::UnboundedSender<SessionNotice>,
    session: Option<Session>,
}

impl<T: Transport, P: TokenProvider> SessionController<T, P> {
    /// Create a controller joining `room` as `identity`, and the receiver for
    /// its notices.
    pub fn new(
        transport: T,
        tokens: P,
        router: TrackRouter,
        visualization: VisualizationPipeline,
        room: impl Into<String>,
        identity: impl Into<String>,
    ) -> (Self, mpsc::UnboundedReceiver<SessionNotice>) {
        let (state_tx, _) = watch::channel(ConnectionState::Idle);
        let (notices, notice_rx) = mpsc::unbounded_channel();
        let controller = Self {
            transport,
            tokens,
            router,
            visualization,
            room: room.into(),
            identity: identity.into(),
            state_tx,
            notices,
            session: None,
        };
        (controller, notice_rx)
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Receiver for connection state changes.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Receiver for the live visualization canvas.
    pub fn watch_scene(&self) -> watch::Receiver<Scene> {
        self.visualization.subscribe()
    }

    pub fn router(&self) -> &TrackRouter {
        &self.router
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    /// Start a new session.
    ///
    /// Allowed from `Idle`, `Disconnected` and `Error`. On failure the state
    /// becomes `Error` with a message naming the cause, and nothing stays open.
    pub async fn connect(&mut self) -> Result<(), Error> {
        let state = self.state();
        if !state.can_connect() {
            warn!("Ignoring connect while {}", state);
            return Err(Error::InvalidState(format!("cannot connect while {}", state)));
        }

        info!("Connecting to room {} as {}", self.room, self.identity);
        self.set_state(ConnectionState::Connecting, None);

        let session = match self.open_session().await {
            Ok(session) => session,
            Err(e) => {
                error!("Connection attempt failed: {}", e);
                self.set_state(ConnectionState::Error, Some(e.user_message()));
                return Err(e);
            }
        };
        info!("Session {} connected", session.id());
        self.session = Some(session);
        self.set_state(ConnectionState::Connected, None);

        let tap = self
            .transport
            .local_publication(TrackKind::Audio)
            .and_then(|publication| publication.tap);
        let handle = self.visualization.start(tap, self.state_tx.subscribe());
        if let Some(session) = self.session.as_mut() {
            session.visualization = handle;
        }
        Ok(())
    }

    async fn open_session(&mut self) -> Result<Session, Error> {
        let credentials = self.tokens.fetch(&self.room, &self.identity).await?;
        let events = self
            .transport
            .connect(&credentials.url, &credentials.token)
            .await?;

        if let Err(e) = self.transport.set_microphone_enabled(true).await {
            warn!("Microphone could not be enabled, closing transport");
            if let Err(close_err) = self.transport.disconnect().await {
                warn!("Transport close after microphone failure failed: {}", close_err);
            }
            return Err(e);
        }
        Ok(Session::new(events))
    }

    /// Leave the session and return the room to its empty state.
    pub async fn disconnect(&mut self) -> Result<(), Error> {
        let Some(session) = self.session.take() else {
            debug!("Disconnect requested without a live session");
            return Ok(());
        };
        info!("Disconnecting session {}", session.id());
        if let Err(e) = self.transport.disconnect().await {
            warn!("Transport disconnect failed: {}", e);
        }
        self.teardown(session, None).await;
        Ok(())
    }

    /// Mute or unmute the microphone; returns the new enabled flag.
    ///
    /// A transport failure leaves the flag where it was. Never changes the
    /// connection state.
    pub async fn toggle_microphone(&mut self) -> Result<bool, Error> {
        let Some(session) = self.session.as_mut() else {
            return Err(Error::InvalidState("no live session".to_string()));
        };
        let enabled = !session.microphone_enabled;
        session.microphone_enabled = enabled;

        if let Err(e) = self.transport.set_microphone_enabled(enabled).await {
            warn!("Microphone toggle failed: {}", e);
            if let Some(session) = self.session.as_mut() {
                session.microphone_enabled = !enabled;
            }
            return Err(e);
        }
        info!("Microphone {}", if enabled { "enabled" } else { "muted" });
        Ok(enabled)
    }

    /// Wait for the next transport event of the live session.
    ///
    /// Returns `None` without a session. A stream that ends without saying
    /// why reads as a `Disconnected` event.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        let session = self.session.as_mut()?;
        let events = session.events.as_mut()?;
        match events.recv().await {
            Some(event) => Some(event),
            None => {
                session.events = None;
                Some(SessionEvent::Disconnected {
                    reason: Some("transport closed".to_string()),
                })
            }
        }
    }

    /// Apply one transport event.
    pub async fn dispatch(&mut self, event: SessionEvent) {
        if self.session.is_none() {
            debug!("Dropping {} without a live session", event.name());
            return;
        }
        trace!("Dispatching {}", event.name());

        let room_events = match event {
            SessionEvent::TrackSubscribed { track, participant } => {
                self.router.on_track_subscribed(&track, &participant)
            }
            SessionEvent::TrackUnsubscribed { track, participant } => {
                self.router.on_track_unsubscribed(&track, &participant)
            }
            SessionEvent::ParticipantConnected(participant) => {
                self.router.on_participant_connected(&participant)
            }
            SessionEvent::ParticipantDisconnected(participant) => {
                self.router.on_participant_disconnected(&participant)
            }
            SessionEvent::ActiveSpeakersChanged(speakers) => {
                self.router.on_active_speakers(&speakers)
            }
            SessionEvent::Disconnected { reason } => {
                if let Some(session) = self.session.take() {
                    info!(
                        "Transport ended session {}: {}",
                        session.id(),
                        reason.as_deref().unwrap_or("no reason given")
                    );
                    // The remote end is gone but the microphone and the
                    // local handle are still ours to release
                    if let Err(e) = self.transport.disconnect().await {
                        warn!("Releasing transport after remote disconnect failed: {}", e);
                    }
                    self.teardown(session, reason).await;
                }
                return;
            }
        };
        self.publish(room_events);
    }

    /// Dispatch events until the session ends.
    pub async fn run_session(&mut self) {
        while let Some(event) = self.next_event().await {
            self.dispatch(event).await;
        }
    }

    async fn teardown(&mut self, mut session: Session, reason: Option<String>) {
        self.set_state(ConnectionState::Disconnected, reason);
        if let Some(handle) = session.visualization.take() {
            handle.stop();
            handle.join().await;
        }
        let room_events = self.router.reset();
        self.publish(room_events);
        debug!("Session {} torn down", session.id());
    }

    fn set_state(&self, state: ConnectionState, message: Option<String>) {
        let previous = self.state_tx.send_replace(state);
        debug!("Connection state {} -> {}", previous, state);
        self.notify(SessionNotice::ConnectionChanged { state, message });
    }

    fn publish(&self, room_events: Vec<RoomEvent>) {
        for event in room_events {
            self.notify(SessionNotice::Room(event));
        }
    }

    fn notify(&self, notice: SessionNotice) {
        if self.notices.send(notice).is_err() {
            trace!("No listener for session notices");
        }
    }
}
