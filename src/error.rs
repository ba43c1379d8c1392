//! Error types for the lobby coordination client
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the crate.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific lobby coordination scenarios
#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    #[error("Lobby not found: {lobby_id}")]
    LobbyNotFound { lobby_id: String },

    #[error("Transport failure: {message}")]
    TransportFailure { message: String },

    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal client error: {message}")]
    InternalError { message: String },
}

/// Check whether an error is a `LobbyNotFound` from the lobby service.
///
/// The session machine reacts to a vanished lobby differently from a
/// transport failure (forced teardown instead of a retryable error).
pub fn is_not_found(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<LobbyError>(),
        Some(LobbyError::LobbyNotFound { .. })
    )
}
