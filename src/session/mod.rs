//! Lobby session state machine
//!
//! This module owns the locally known view of "the lobby I am in", drives
//! periodic refresh against the lobby service, and emits lifecycle
//! notifications on the event bus.

pub mod machine;
pub mod state;

// Re-export commonly used types
pub use machine::{ExitConfirmation, LobbySession, SessionHandle};
pub use state::{SessionPhase, SessionState};
