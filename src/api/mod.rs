//! Lobby API client
//!
//! This module defines the typed operations against the remote lobby service
//! and the HTTP implementation used in production.

pub mod client;

// Re-export commonly used types
pub use client::{HttpLobbyApi, LobbyApi};
