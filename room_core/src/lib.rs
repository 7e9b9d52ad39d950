//! Shared domain types for mentor_room
//!
//! Identifiers, slot and presence enums, the connection state machine's
//! states and the error taxonomy used by every other crate.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Server-assigned identifier of a published track.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct TrackSid(String);

impl TrackSid {
    pub fn new(sid: impl Into<String>) -> Self {
        Self(sid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackSid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of media carried by a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackKind {
    Audio,
    Video,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Audio => write!(f, "audio"),
            TrackKind::Video => write!(f, "video"),
        }
    }
}

/// A peer in the session, local or remote.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Participant {
    /// Opaque identity string issued with the participant's token
    pub identity: String,
    /// Whether this is the participant running this client
    pub is_local: bool,
}

impl Participant {
    pub fn remote(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            is_local: false,
        }
    }

    pub fn local(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            is_local: true,
        }
    }
}

/// A subscribed media track as announced by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrack {
    pub sid: TrackSid,
    pub kind: TrackKind,
    /// Publisher-chosen track name, informational only
    pub name: String,
}

impl RemoteTrack {
    pub fn new(sid: impl Into<String>, kind: TrackKind) -> Self {
        let sid = TrackSid::new(sid);
        Self {
            name: format!("{}-{}", kind, sid),
            sid,
            kind,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Logical on-screen bucket a participant's media is routed to.
///
/// `Agent` is the only slot of the single-agent layout; the other five make up
/// the mentor panel (one host plus four specialists).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum SlotId {
    Agent,
    Host,
    Marketing,
    Finance,
    Product,
    Legal,
}

impl SlotId {
    /// The five panel slots in display order.
    pub const PANEL: [SlotId; 5] = [
        SlotId::Host,
        SlotId::Marketing,
        SlotId::Finance,
        SlotId::Product,
        SlotId::Legal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SlotId::Agent => "agent",
            SlotId::Host => "host",
            SlotId::Marketing => "marketing",
            SlotId::Finance => "finance",
            SlotId::Product => "product",
            SlotId::Legal => "legal",
        }
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-slot presence indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PresenceStatus {
    #[default]
    Offline,
    Online,
    Speaking,
}

impl fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PresenceStatus::Offline => write!(f, "offline"),
            PresenceStatus::Online => write!(f, "online"),
            PresenceStatus::Speaking => write!(f, "speaking"),
        }
    }
}

/// Connection state of the one live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Connected,
    Disconnected,
    Error,
}

impl ConnectionState {
    /// Whether `connect` may start a new attempt from this state.
    pub fn can_connect(&self) -> bool {
        matches!(
            self,
            ConnectionState::Idle | ConnectionState::Disconnected | ConnectionState::Error
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Idle => write!(f, "Idle"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Error => write!(f, "Error"),
        }
    }
}

/// Unified error type for the application.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Token error: {0}")]
    Token(String),

    #[error("Microphone permission denied: {0}")]
    MicrophonePermission(String),

    #[error("Microphone not found: {0}")]
    MicrophoneNotFound(String),

    #[error("Microphone error: {0}")]
    Microphone(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Status text shown to the user when a connection attempt fails.
    pub fn user_message(&self) -> String {
        match self {
            Error::Token(detail) => format!("Could not get a session token: {}", detail),
            Error::MicrophonePermission(_) => {
                "Microphone access was denied. Allow microphone access and try again.".to_string()
            }
            Error::MicrophoneNotFound(_) => {
                "No microphone was found. Connect a microphone and try again.".to_string()
            }
            Error::Microphone(detail) => format!("Could not start the microphone: {}", detail),
            Error::Transport(detail) => format!("Connection failed: {}", detail),
            other => format!("Error: {}", other),
        }
    }

    pub fn is_microphone(&self) -> bool {
        matches!(
            self,
            Error::MicrophonePermission(_) | Error::MicrophoneNotFound(_) | Error::Microphone(_)
        )
    }
}

pub mod events;

pub use events::{RoomEvent, SessionEvent};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_display() {
        assert_eq!(format!("{}", SlotId::Marketing), "marketing");
        assert_eq!(SlotId::PANEL.len(), 5);
        assert!(!SlotId::PANEL.contains(&SlotId::Agent));
    }

    #[test]
    fn remote_track_default_name() {
        let track = RemoteTrack::new("TR_1", TrackKind::Video);
        assert_eq!(track.name, "video-TR_1");
        assert_eq!(track.sid.as_str(), "TR_1");
    }

    #[test]
    fn connect_allowed_states() {
        assert!(ConnectionState::Idle.can_connect());
        assert!(ConnectionState::Disconnected.can_connect());
        assert!(ConnectionState::Error.can_connect());
        assert!(!ConnectionState::Connecting.can_connect());
        assert!(!ConnectionState::Connected.can_connect());
    }

    #[test]
    fn microphone_messages_are_distinct() {
        let denied = Error::MicrophonePermission("NotAllowedError".into());
        let missing = Error::MicrophoneNotFound("NotFoundError".into());
        let other = Error::Microphone("device busy".into());

        assert!(denied.is_microphone() && missing.is_microphone() && other.is_microphone());
        assert_ne!(denied.user_message(), missing.user_message());
        assert_ne!(missing.user_message(), other.user_message());
        assert!(other.user_message().contains("device busy"));
    }

    #[test]
    fn error_display() {
        let io_err = Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "file not found",
        ));
        assert!(format!("{}", io_err).contains("I/O error: file not found"));

        let token_err = Error::Token("quota exceeded".to_string());
        assert!(format!("{}", token_err).contains("Token error: quota exceeded"));
        assert!(!token_err.is_microphone());

        let anyhow_err = Error::Other(anyhow::anyhow!("Something went wrong"));
        assert!(format!("{}", anyhow_err).contains("Something went wrong"));
    }
}
