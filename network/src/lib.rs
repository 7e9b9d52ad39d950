//! Collaborator interfaces for mentor_room
//!
//! The session controller talks to two outside services: a token backend that
//! issues room credentials and a real-time media transport. This crate holds
//! both interfaces, an HTTP token client, and a simulated room that can stand
//! in for the media server.

pub mod simulated;
pub mod token;
pub mod transport;

pub use simulated::{MicrophoneFailure, MicrophoneSource, SimulatedRoom, SimulationTiming};
pub use token::{
    parse_token_response, random_participant_name, Credentials, HttpTokenProvider,
    StaticTokenProvider, TokenProvider,
};
pub use transport::{LocalPublication, Transport};

#[cfg(any(test, feature = "test_utils"))]
pub use token::MockTokenProvider;
#[cfg(any(test, feature = "test_utils"))]
pub use transport::MockTransport;
