use crate::{Participant, PresenceStatus, RemoteTrack, SlotId};

/// Lifecycle events emitted by the transport for the live session.
///
/// Delivered in transport order through a single channel and dispatched one at
/// a time, so two handlers for the same track never interleave.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A remote track is now subscribed and can be rendered
    TrackSubscribed {
        track: RemoteTrack,
        participant: Participant,
    },

    /// A previously subscribed track went away
    TrackUnsubscribed {
        track: RemoteTrack,
        participant: Participant,
    },

    /// A participant joined the session
    ParticipantConnected(Participant),

    /// A participant left the session
    ParticipantDisconnected(Participant),

    /// The set of currently speaking participants changed
    ActiveSpeakersChanged(Vec<Participant>),

    /// The transport dropped the session (remote end or network)
    Disconnected {
        /// Optional reason reported by the transport
        reason: Option<String>,
    },
}

impl SessionEvent {
    /// Short name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::TrackSubscribed { .. } => "TrackSubscribed",
            SessionEvent::TrackUnsubscribed { .. } => "TrackUnsubscribed",
            SessionEvent::ParticipantConnected(_) => "ParticipantConnected",
            SessionEvent::ParticipantDisconnected(_) => "ParticipantDisconnected",
            SessionEvent::ActiveSpeakersChanged(_) => "ActiveSpeakersChanged",
            SessionEvent::Disconnected { .. } => "Disconnected",
        }
    }
}

/// Changes to the rendered room, reported to the UI shell
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    /// A slot's presence indicator changed
    PresenceChanged { slot: SlotId, status: PresenceStatus },
    /// A slot's render target switched between placeholder and video
    SlotContentChanged(SlotId),
    /// The off-screen audio sink gained or lost elements
    AudioSinkChanged {
        /// Number of audio elements now attached
        elements: usize,
    },
}
