//! Session lifecycle for mentor_room
//!
//! The [`SessionController`] owns the one live [`Session`]: it fetches a
//! token, opens the transport, publishes the microphone, feeds transport
//! events to the track router and starts the visualization once connected.

use log::debug;
use room_core::{ConnectionState, RoomEvent, SessionEvent};
use tokio::sync::mpsc;
use uuid::Uuid;
use visualization::VisualizationHandle;

pub mod controller;

pub use controller::SessionController;

/// What the UI shell hears from the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotice {
    /// The connection state changed; `message` is user-facing status text
    ConnectionChanged {
        state: ConnectionState,
        message: Option<String>,
    },
    /// The rendered room changed
    Room(RoomEvent),
}

/// One connected session.
pub struct Session {
    id: Uuid,
    microphone_enabled: bool,
    events: Option<mpsc::UnboundedReceiver<SessionEvent>>,
    visualization: Option<VisualizationHandle>,
}

impl Session {
    fn new(events: mpsc::UnboundedReceiver<SessionEvent>) -> Self {
        let id = Uuid::new_v4();
        debug!("Session {} created", id);
        Self {
            id,
            microphone_enabled: true,
            events: Some(events),
            visualization: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn microphone_enabled(&self) -> bool {
        self.microphone_enabled
    }

    pub fn is_visualizing(&self) -> bool {
        self.visualization
            .as_ref()
            .map(|handle| handle.is_active())
            .unwrap_or(false)
    }
}
