//! HTTP implementation of the lobby service operations
//!
//! One outbound HTTP call per operation, JSON bodies, 2xx required. The
//! client never retries; error classification is left to the caller so that
//! a vanished lobby can be told apart from a transport failure.

use crate::config::ApiSettings;
use crate::error::{LobbyError, Result};
use crate::types::{
    validate_create_request, validate_player, CreateLobbyRequest, Lobby, LobbyList,
    MembershipRequest, Player, StartRequest,
};
use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use std::time::Duration;
use tracing::debug;

/// Typed operations exposed by the remote lobby service.
///
/// All operations are fallible and network-bound. Implementations issue a
/// single attempt per call; idempotency of start is the server's problem.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LobbyApi: Send + Sync {
    /// List all lobbies known to the service
    async fn list_lobbies(&self) -> Result<LobbyList>;

    /// Fetch a single lobby snapshot by id
    async fn get_lobby(&self, lobby_id: &str) -> Result<Lobby>;

    /// Create a new lobby; the caller-supplied player becomes its host
    async fn create_lobby(&self, request: CreateLobbyRequest) -> Result<Lobby>;

    /// Ask the service to start a lobby
    async fn start_lobby(&self, lobby_id: &str) -> Result<()>;

    /// Add a player to a lobby
    async fn join_lobby(&self, lobby_id: &str, player: Player) -> Result<()>;

    /// Remove a player from a lobby
    async fn leave_lobby(&self, lobby_id: &str, player: Player) -> Result<()>;

    /// Delete a lobby; used only by the host
    async fn delete_lobby(&self, lobby_id: &str) -> Result<()>;
}

/// Action discriminator for the shared membership endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MembershipAction {
    Join,
    Leave,
}

impl MembershipAction {
    fn as_str(self) -> &'static str {
        match self {
            MembershipAction::Join => "join",
            MembershipAction::Leave => "leave",
        }
    }
}

/// Map a non-success status to the error taxonomy.
///
/// Operations addressed to a specific lobby id classify 404 as
/// `LobbyNotFound`; everything else is a transport failure.
fn status_error(status: StatusCode, lobby_id: Option<&str>) -> anyhow::Error {
    if status == StatusCode::NOT_FOUND {
        if let Some(lobby_id) = lobby_id {
            return LobbyError::LobbyNotFound {
                lobby_id: lobby_id.to_string(),
            }
            .into();
        }
    }
    LobbyError::TransportFailure {
        message: format!("Server returned {}", status),
    }
    .into()
}

fn check_status(response: Response, lobby_id: Option<&str>) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(status_error(status, lobby_id))
    }
}

fn transport_failure(err: reqwest::Error) -> anyhow::Error {
    LobbyError::TransportFailure {
        message: err.to_string(),
    }
    .into()
}

/// Production `LobbyApi` implementation over HTTP with JSON bodies
pub struct HttpLobbyApi {
    http: reqwest::Client,
    base_url: String,
}

impl HttpLobbyApi {
    /// Create a client against the given base URL with a per-request timeout
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let base_url: String = base_url.into();
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| LobbyError::TransportFailure {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create a client from API settings
    pub fn from_settings(settings: &ApiSettings) -> Result<Self> {
        Self::new(settings.base_url.clone(), settings.request_timeout())
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn membership(
        &self,
        action: MembershipAction,
        lobby_id: &str,
        player: Player,
    ) -> Result<()> {
        validate_player(&player)?;
        debug!(
            "Sending {} for player '{}' in lobby {}",
            action.as_str(),
            player.id,
            lobby_id
        );

        let body = MembershipRequest {
            lobby_id: lobby_id.to_string(),
            player,
        };
        let response = self
            .http
            .post(self.url(&format!("lobbies:{}", action.as_str())))
            .json(&body)
            .send()
            .await
            .map_err(transport_failure)?;

        check_status(response, Some(lobby_id))?;
        Ok(())
    }
}

#[async_trait]
impl LobbyApi for HttpLobbyApi {
    async fn list_lobbies(&self) -> Result<LobbyList> {
        debug!("Fetching lobbies");
        let response = self
            .http
            .get(self.url("lobbies"))
            .send()
            .await
            .map_err(transport_failure)?;

        let response = check_status(response, None)?;
        response.json::<LobbyList>().await.map_err(transport_failure)
    }

    async fn get_lobby(&self, lobby_id: &str) -> Result<Lobby> {
        debug!("Fetching lobby {}", lobby_id);
        let response = self
            .http
            .get(self.url(&format!("lobbies/{}", lobby_id)))
            .send()
            .await
            .map_err(transport_failure)?;

        let response = check_status(response, Some(lobby_id))?;
        response.json::<Lobby>().await.map_err(transport_failure)
    }

    async fn create_lobby(&self, request: CreateLobbyRequest) -> Result<Lobby> {
        validate_create_request(&request)?;
        debug!(
            "Creating lobby '{}' with capacity {}",
            request.name, request.capacity
        );

        let response = self
            .http
            .post(self.url("lobbies"))
            .json(&request)
            .send()
            .await
            .map_err(transport_failure)?;

        let response = check_status(response, None)?;
        response.json::<Lobby>().await.map_err(transport_failure)
    }

    async fn start_lobby(&self, lobby_id: &str) -> Result<()> {
        debug!("Starting lobby {}", lobby_id);
        let body = StartRequest {
            lobby_id: lobby_id.to_string(),
        };
        let response = self
            .http
            .post(self.url("lobbies:start"))
            .json(&body)
            .send()
            .await
            .map_err(transport_failure)?;

        check_status(response, Some(lobby_id))?;
        Ok(())
    }

    async fn join_lobby(&self, lobby_id: &str, player: Player) -> Result<()> {
        self.membership(MembershipAction::Join, lobby_id, player).await
    }

    async fn leave_lobby(&self, lobby_id: &str, player: Player) -> Result<()> {
        self.membership(MembershipAction::Leave, lobby_id, player).await
    }

    async fn delete_lobby(&self, lobby_id: &str) -> Result<()> {
        debug!("Deleting lobby {}", lobby_id);
        let response = self
            .http
            .delete(self.url(&format!("lobbies/{}", lobby_id)))
            .send()
            .await
            .map_err(transport_failure)?;

        check_status(response, Some(lobby_id))?;
        Ok(())
    }
}
