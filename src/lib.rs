//! mentor_room: track routing and live visualization for a multi-agent
//! media session.
//!
//! The functionality lives in the workspace crates; this crate re-exports them
//! under one name and hosts the end-to-end tests.

pub use audio_io;
pub use network;
pub use room;
pub use room_core;
pub use session;
pub use settings_manager;
pub use visualization;

pub use room_core::{ConnectionState, Error, PresenceStatus, RoomEvent, SessionEvent, SlotId};
pub use session::{SessionController, SessionNotice};
