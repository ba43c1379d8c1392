//! Test fixtures and scripted implementations for integration testing

use async_trait::async_trait;
use green_room::error::{LobbyError, Result};
use green_room::events::Notification;
use green_room::handoff::{ConnectionDescriptor, GameTransport, LaunchRole};
use green_room::types::{Assignment, CreateLobbyRequest, Lobby, LobbyList, Player, Port};
use green_room::LobbyApi;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{broadcast, Notify};

/// Scripted response for lobby fetches
#[derive(Debug, Clone)]
pub enum Scripted {
    Lobby(Lobby),
    NotFound(String),
    Failure(String),
}

impl Scripted {
    fn into_result(self) -> Result<Lobby> {
        match self {
            Scripted::Lobby(lobby) => Ok(lobby),
            Scripted::NotFound(lobby_id) => Err(LobbyError::LobbyNotFound { lobby_id }.into()),
            Scripted::Failure(message) => Err(LobbyError::TransportFailure { message }.into()),
        }
    }
}

/// Scripted lobby API that serves canned responses and records traffic
#[derive(Default)]
pub struct ScriptedLobbyApi {
    create_response: Mutex<Option<Scripted>>,
    /// Responses for get_lobby; the last one repeats once the queue drains
    get_responses: Mutex<VecDeque<Scripted>>,
    delete_fails: AtomicBool,
    hold_get: AtomicBool,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub get_calls: AtomicUsize,
    pub start_calls: AtomicUsize,
    pub join_calls: AtomicUsize,
    pub leave_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    /// Released by the test to let a held get_lobby call proceed
    pub release: Notify,
}

impl ScriptedLobbyApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_create(&self, response: Scripted) {
        *self.create_response.lock().unwrap() = Some(response);
    }

    pub fn push_get(&self, response: Scripted) {
        self.get_responses.lock().unwrap().push_back(response);
    }

    /// Make the next get_lobby call block until [`Self::release`] is notified
    pub fn hold_next_get(&self) {
        self.hold_get.store(true, Ordering::SeqCst);
    }

    /// Make every delete call fail with a transport error
    pub fn fail_deletes(&self) {
        self.delete_fails.store(true, Ordering::SeqCst);
    }

    fn next_get(&self) -> Scripted {
        let mut queue = self.get_responses.lock().unwrap();
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue
                .front()
                .cloned()
                .expect("no scripted get_lobby response")
        }
    }
}

#[async_trait]
impl LobbyApi for ScriptedLobbyApi {
    async fn list_lobbies(&self) -> Result<LobbyList> {
        let data: Vec<Lobby> = self
            .get_responses
            .lock()
            .unwrap()
            .iter()
            .filter_map(|r| match r {
                Scripted::Lobby(lobby) => Some(lobby.clone()),
                _ => None,
            })
            .collect();
        Ok(LobbyList {
            count: data.len(),
            data,
        })
    }

    async fn get_lobby(&self, _lobby_id: &str) -> Result<Lobby> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        self.get_calls.fetch_add(1, Ordering::SeqCst);

        if self.hold_get.swap(false, Ordering::SeqCst) {
            self.release.notified().await;
        }

        let response = self.next_get();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        response.into_result()
    }

    async fn create_lobby(&self, _request: CreateLobbyRequest) -> Result<Lobby> {
        self.create_response
            .lock()
            .unwrap()
            .clone()
            .expect("no scripted create_lobby response")
            .into_result()
    }

    async fn start_lobby(&self, _lobby_id: &str) -> Result<()> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn join_lobby(&self, _lobby_id: &str, _player: Player) -> Result<()> {
        self.join_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn leave_lobby(&self, _lobby_id: &str, _player: Player) -> Result<()> {
        self.leave_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete_lobby(&self, _lobby_id: &str) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.delete_fails.load(Ordering::SeqCst) {
            return Err(LobbyError::TransportFailure {
                message: "connection reset".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// Transport that records every launch it receives
#[derive(Default)]
pub struct RecordingTransport {
    launches: Mutex<Vec<(ConnectionDescriptor, LaunchRole)>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn launch_count(&self) -> usize {
        self.launches.lock().unwrap().len()
    }

    pub fn last_launch(&self) -> Option<(ConnectionDescriptor, LaunchRole)> {
        self.launches.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl GameTransport for RecordingTransport {
    async fn launch(&self, descriptor: ConnectionDescriptor, role: LaunchRole) -> Result<()> {
        self.launches.lock().unwrap().push((descriptor, role));
        Ok(())
    }
}

/// A lobby that has not started yet
pub fn waiting_lobby(lobby_id: &str, name: &str, capacity: usize, players: Vec<Player>) -> Lobby {
    Lobby {
        annotations: vec![],
        assignment: None,
        capacity,
        is_joinable: true,
        is_started: false,
        lobby_id: lobby_id.to_string(),
        name: name.to_string(),
        player_count: players.len(),
        players,
        tags: vec![],
    }
}

/// A started lobby with an assignment carrying client/server ports
pub fn started_lobby(
    lobby_id: &str,
    name: &str,
    capacity: usize,
    players: Vec<Player>,
    client_port: u16,
    server_port: u16,
) -> Lobby {
    Lobby {
        annotations: vec![],
        assignment: Some(Assignment {
            authorization_token: 555,
            host: "game.example".to_string(),
            ip: "10.1.2.3".to_string(),
            ports: vec![
                Port {
                    name: "client".to_string(),
                    port: client_port,
                    protocol: "UDP".to_string(),
                },
                Port {
                    name: "server".to_string(),
                    port: server_port,
                    protocol: "UDP".to_string(),
                },
            ],
        }),
        capacity,
        is_joinable: false,
        is_started: true,
        lobby_id: lobby_id.to_string(),
        name: name.to_string(),
        player_count: players.len(),
        players,
        tags: vec![],
    }
}

/// A player entry with a server-assigned authorization token
pub fn player_with_token(id: &str, is_host: bool, token: u32) -> Player {
    Player {
        authorization_token: Some(token),
        id: id.to_string(),
        is_host,
    }
}

/// Receive notifications until one matches the predicate
pub async fn wait_for<F>(
    rx: &mut broadcast::Receiver<Notification>,
    mut pred: F,
) -> Notification
where
    F: FnMut(&Notification) -> bool,
{
    loop {
        let notification = tokio::time::timeout(Duration::from_secs(30), rx.recv())
            .await
            .expect("timed out waiting for a notification")
            .expect("event bus closed");
        if pred(&notification) {
            return notification;
        }
    }
}
