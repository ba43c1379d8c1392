//! Green Room - Lobby coordination client for HTTP matchmaking services
//!
//! This crate provides a typed lobby API client, a polling session state
//! machine, and a match handoff layer, with a notification bus decoupling
//! the core from its presentation consumers.

pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod handoff;
pub mod session;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{is_not_found, LobbyError, Result};
pub use types::*;

// Re-export key components
pub use api::{HttpLobbyApi, LobbyApi};
pub use events::{EventBus, Notification};
pub use handoff::{ConnectionDescriptor, GameTransport, LaunchRole};
pub use session::{LobbySession, SessionHandle, SessionPhase};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
