//! Wire types shared with the remote lobby service
//!
//! Field names are exactly what the service sends and expects; the client
//! holds read-only snapshots of server-owned data and never merges partial
//! updates into them.

use crate::error::{LobbyError, Result};
use serde::{Deserialize, Serialize};

/// Unique identifier for lobbies, issued by the server
pub type LobbyId = String;

/// Display/join identity for players, supplied by the caller
pub type PlayerId = String;

/// Session authorization token, numeric on the wire
pub type AuthToken = u32;

/// A player as represented by the lobby service.
///
/// `authorization_token` stays null until the server assigns one after the
/// lobby starts, and is only ever populated on the local player's own entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    #[serde(default)]
    pub authorization_token: Option<AuthToken>,
    pub id: PlayerId,
    pub is_host: bool,
}

impl Player {
    /// Create the host entry used when creating a lobby
    pub fn host(id: impl Into<PlayerId>) -> Self {
        Self {
            authorization_token: None,
            id: id.into(),
            is_host: true,
        }
    }

    /// Create a guest entry used when joining an existing lobby
    pub fn guest(id: impl Into<PlayerId>) -> Self {
        Self {
            authorization_token: None,
            id: id.into(),
            is_host: false,
        }
    }
}

/// Opaque key/value pair attached to a lobby at creation time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub inject: bool,
    pub key: String,
    pub value: String,
}

/// One named port inside an assignment ("client", "server", ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub name: String,
    pub port: u16,
    pub protocol: String,
}

/// Server-issued connection parameters, present once a lobby has started
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub authorization_token: AuthToken,
    pub host: String,
    pub ip: String,
    pub ports: Vec<Port>,
}

impl Assignment {
    /// Look up a port by its logical role name
    pub fn port_for_role(&self, role: &str) -> Option<&Port> {
        self.ports.iter().find(|p| p.name == role)
    }
}

/// A lobby snapshot as reported by the service.
///
/// Invariants maintained server-side: `player_count == players.len()`, and
/// `is_started` implies `assignment` is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lobby {
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub assignment: Option<Assignment>,
    pub capacity: usize,
    pub is_joinable: bool,
    pub is_started: bool,
    pub lobby_id: LobbyId,
    pub name: String,
    pub player_count: usize,
    #[serde(default)]
    pub players: Vec<Player>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Lobby {
    /// Find a player entry by id
    pub fn find_player(&self, player_id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == player_id)
    }

    /// The host entry, if the server has reported one
    pub fn host(&self) -> Option<&Player> {
        self.players.iter().find(|p| p.is_host)
    }

    /// Whether the lobby is at capacity
    pub fn is_full(&self) -> bool {
        self.player_count >= self.capacity
    }
}

/// Response shape of the lobby collection endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyList {
    pub count: usize,
    pub data: Vec<Lobby>,
}

/// Request body for creating a lobby.
///
/// Capacity below 2 is a caller-side precondition; the client passes the
/// value through as-is and leaves enforcement to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLobbyRequest {
    pub annotations: Vec<Annotation>,
    pub capacity: usize,
    pub is_joinable: bool,
    pub name: String,
    pub player: Player,
    pub tags: Vec<String>,
}

impl CreateLobbyRequest {
    /// Create a request with empty annotations/tags and `is_joinable` true
    pub fn new(capacity: usize, name: impl Into<String>, host: Player) -> Self {
        Self {
            annotations: Vec::new(),
            capacity,
            is_joinable: true,
            name: name.into(),
            player: host,
            tags: Vec::new(),
        }
    }

    /// Attach annotations to inject into the created lobby
    pub fn with_annotations(mut self, annotations: Vec<Annotation>) -> Self {
        self.annotations = annotations;
        self
    }

    /// Attach tags to the created lobby
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Override whether the lobby accepts joins
    pub fn joinable(mut self, is_joinable: bool) -> Self {
        self.is_joinable = is_joinable;
        self
    }
}

/// Shared request body for the join and leave membership actions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembershipRequest {
    pub lobby_id: LobbyId,
    pub player: Player,
}

/// Request body for starting a lobby
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRequest {
    pub lobby_id: LobbyId,
}

/// Validate a player identity before it is sent to the service
pub fn validate_player(player: &Player) -> Result<()> {
    if player.id.is_empty() {
        return Err(LobbyError::InvalidRequest {
            reason: "Player id cannot be empty".to_string(),
        }
        .into());
    }
    Ok(())
}

/// Validate a create request before it is sent to the service
pub fn validate_create_request(request: &CreateLobbyRequest) -> Result<()> {
    if request.name.is_empty() {
        return Err(LobbyError::InvalidRequest {
            reason: "Lobby name cannot be empty".to_string(),
        }
        .into());
    }
    validate_player(&request.player)
}
