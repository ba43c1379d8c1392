//! Client-local session state
//!
//! A `SessionState` is created when the local actor successfully creates or
//! joins a lobby and torn down exactly once, either by explicit exit or by
//! detecting that the lobby no longer exists server-side.

use crate::types::{Lobby, LobbyId, Player};
use crate::utils::current_timestamp;
use chrono::{DateTime, Utc};

/// Phases of a lobby session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No active lobby
    Idle,
    /// A create or join call is in flight
    Joining,
    /// Holding a lobby snapshot, polling for changes
    Active,
    /// Lobby observed started; awaiting the local authorization token
    Starting,
    /// Transport launched; terminal until the next session
    Handoff,
}

/// The locally known view of the lobby the local player is in.
///
/// The lobby snapshot is server-owned and replaced wholesale on every
/// refresh; there is no field-level merging.
#[derive(Debug)]
pub struct SessionState {
    pub(crate) phase: SessionPhase,
    pub(crate) lobby: Option<Lobby>,
    pub(crate) local_player: Option<Player>,
    /// Set once the handoff has been attempted, so it never runs twice
    pub(crate) ready: bool,
    pub(crate) joined_at: Option<DateTime<Utc>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Idle,
            lobby: None,
            local_player: None,
            ready: false,
            joined_at: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn lobby(&self) -> Option<&Lobby> {
        self.lobby.as_ref()
    }

    pub fn local_player(&self) -> Option<&Player> {
        self.local_player.as_ref()
    }

    pub fn lobby_id(&self) -> Option<LobbyId> {
        self.lobby.as_ref().map(|l| l.lobby_id.clone())
    }

    pub fn is_host(&self) -> bool {
        self.local_player.as_ref().map(|p| p.is_host).unwrap_or(false)
    }

    pub fn joined_at(&self) -> Option<DateTime<Utc>> {
        self.joined_at
    }

    /// Store the first snapshot and the local identity on entering a lobby
    pub fn enter(&mut self, lobby: Lobby, local_player: Player) {
        self.local_player = Some(local_player);
        self.ready = false;
        self.joined_at = Some(current_timestamp());
        self.apply_snapshot(lobby);
    }

    /// Replace the snapshot wholesale and rescan the local player entry.
    ///
    /// The local entry is only replaced when the server still lists it;
    /// a snapshot that momentarily misses the player keeps the prior view.
    pub fn apply_snapshot(&mut self, lobby: Lobby) {
        if let Some(local) = &self.local_player {
            if let Some(entry) = lobby.find_player(&local.id) {
                self.local_player = Some(entry.clone());
            }
        }
        self.lobby = Some(lobby);
    }

    /// The local token has arrived and the handoff has not been attempted yet
    pub fn handoff_due(&self) -> bool {
        !self.ready
            && self
                .local_player
                .as_ref()
                .and_then(|p| p.authorization_token)
                .is_some()
    }

    /// Tear the session down
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
