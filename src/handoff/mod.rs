//! Match handoff to the game-session transport
//!
//! Once a lobby has started and the server has issued the local player's own
//! authorization token, the connection parameters are extracted from the
//! lobby assignment and handed to the external transport layer exactly once.

use crate::error::{LobbyError, Result};
use crate::types::{Assignment, AuthToken, Lobby, LobbyId, Player};
use async_trait::async_trait;
use tracing::info;

/// Port role carrying client traffic
pub const CLIENT_PORT_ROLE: &str = "client";
/// Port role carrying server traffic
pub const SERVER_PORT_ROLE: &str = "server";

/// Everything the transport layer needs to connect to a game session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    pub ip: String,
    pub client_port: u16,
    pub server_port: u16,
    pub session_id: LobbyId,
    pub server_token: AuthToken,
    pub client_token: AuthToken,
}

/// Whether the local player starts the session as host or as client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchRole {
    Host,
    Client,
}

impl LaunchRole {
    /// Derive the launch role from the local player's host flag
    pub fn for_player(player: &Player) -> Self {
        if player.is_host {
            LaunchRole::Host
        } else {
            LaunchRole::Client
        }
    }
}

/// External game-session transport invoked at handoff
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GameTransport: Send + Sync {
    /// Start the session transport with the given connection parameters
    async fn launch(&self, descriptor: ConnectionDescriptor, role: LaunchRole) -> Result<()>;
}

fn required_port(assignment: &Assignment, role: &str) -> Result<u16> {
    assignment
        .port_for_role(role)
        .map(|p| p.port)
        .ok_or_else(|| {
            LobbyError::ConfigurationError {
                message: format!("Assignment has no '{}' port", role),
            }
            .into()
        })
}

/// Build the connection descriptor for a started lobby.
///
/// Fails with a configuration error when the assignment is missing, the
/// local player has no token yet, or an expected port role is absent.
pub fn connection_descriptor(lobby: &Lobby, player: &Player) -> Result<ConnectionDescriptor> {
    let assignment = lobby.assignment.as_ref().ok_or_else(|| LobbyError::ConfigurationError {
        message: format!("Lobby {} has no assignment", lobby.lobby_id),
    })?;

    let client_token =
        player
            .authorization_token
            .ok_or_else(|| LobbyError::ConfigurationError {
                message: format!("Player '{}' has no authorization token", player.id),
            })?;

    Ok(ConnectionDescriptor {
        ip: assignment.ip.clone(),
        client_port: required_port(assignment, CLIENT_PORT_ROLE)?,
        server_port: required_port(assignment, SERVER_PORT_ROLE)?,
        session_id: lobby.lobby_id.clone(),
        server_token: assignment.authorization_token,
        client_token,
    })
}

/// Transport stand-in that only logs the descriptor it receives.
///
/// Used by the CLI; real integrations implement [`GameTransport`] against
/// their own networking stack.
#[derive(Debug, Default)]
pub struct LoggingTransport;

#[async_trait]
impl GameTransport for LoggingTransport {
    async fn launch(&self, descriptor: ConnectionDescriptor, role: LaunchRole) -> Result<()> {
        info!(
            "Launching session {} as {:?}: {}:{} (client) / {}:{} (server)",
            descriptor.session_id,
            role,
            descriptor.ip,
            descriptor.client_port,
            descriptor.ip,
            descriptor.server_port
        );
        Ok(())
    }
}
