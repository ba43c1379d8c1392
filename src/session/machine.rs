//! The session actor driving the lobby lifecycle
//!
//! A single task owns the `SessionState`; user intents arrive as commands on
//! an mpsc channel and polling is driven by a deadline that is re-armed only
//! after the previous refresh completes, so at most one refresh is ever in
//! flight and no two mutations can race.

use crate::api::LobbyApi;
use crate::config::SessionSettings;
use crate::error::{is_not_found, LobbyError, Result};
use crate::events::{EventBus, Notification};
use crate::handoff::{connection_descriptor, GameTransport, LaunchRole};
use crate::session::state::{SessionPhase, SessionState};
use crate::types::{CreateLobbyRequest, Lobby, Player};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// User intents accepted by the session actor
#[derive(Debug)]
enum Command {
    Create {
        name: String,
        capacity: usize,
        player_id: String,
    },
    Join {
        lobby_id: String,
        player_id: String,
    },
    Start,
    Refresh,
    RequestExit,
    ConfirmExit {
        generation: u64,
    },
    Shutdown,
}

/// Continuation carried by [`Notification::ExitRequested`].
///
/// The destructive part of an exit only happens when the consumer invokes
/// this; a confirmation from a session that has since ended is dropped.
#[derive(Debug, Clone)]
pub struct ExitConfirmation {
    commands: mpsc::UnboundedSender<Command>,
    generation: u64,
}

impl ExitConfirmation {
    /// Confirm the exit and let the session issue the delete/leave call
    pub fn confirm(&self) {
        let _ = self.commands.send(Command::ConfirmExit {
            generation: self.generation,
        });
    }
}

/// Handle through which the presentation layer submits intents.
///
/// Cheap to clone. Dropping every handle shuts the session down with a
/// best-effort exit.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    phase: watch::Receiver<SessionPhase>,
}

impl SessionHandle {
    fn send(&self, command: Command) -> Result<()> {
        self.commands.send(command).map_err(|_| {
            LobbyError::InternalError {
                message: "Session task is no longer running".to_string(),
            }
            .into()
        })
    }

    /// Create a new lobby with the local player as its host
    pub fn create_lobby(
        &self,
        name: impl Into<String>,
        capacity: usize,
        player_id: impl Into<String>,
    ) -> Result<()> {
        self.send(Command::Create {
            name: name.into(),
            capacity,
            player_id: player_id.into(),
        })
    }

    /// Join an existing lobby as a guest
    pub fn join_lobby(
        &self,
        lobby_id: impl Into<String>,
        player_id: impl Into<String>,
    ) -> Result<()> {
        self.send(Command::Join {
            lobby_id: lobby_id.into(),
            player_id: player_id.into(),
        })
    }

    /// Ask the service to start the current lobby (host only)
    pub fn start_lobby(&self) -> Result<()> {
        self.send(Command::Start)
    }

    /// Request an immediate refresh of the current lobby
    pub fn refresh_lobby(&self) -> Result<()> {
        self.send(Command::Refresh)
    }

    /// Ask to exit the current lobby; completes only after confirmation
    pub fn request_exit(&self) -> Result<()> {
        self.send(Command::RequestExit)
    }

    /// Stop the session task, exiting the current lobby best-effort
    pub fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown)
    }

    /// Current phase of the session
    pub fn phase(&self) -> SessionPhase {
        *self.phase.borrow()
    }

    /// Watch channel following every phase change
    pub fn phase_watch(&self) -> watch::Receiver<SessionPhase> {
        self.phase.clone()
    }
}

fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(60 * 60 * 24)
}

/// The session actor. Construct with [`LobbySession::spawn`].
pub struct LobbySession {
    api: Arc<dyn LobbyApi>,
    transport: Arc<dyn GameTransport>,
    bus: EventBus,
    poll_interval: Duration,
    commands: mpsc::UnboundedReceiver<Command>,
    commands_tx: mpsc::UnboundedSender<Command>,
    phase_tx: watch::Sender<SessionPhase>,
    state: SessionState,
    /// Deadline of the next refresh; `None` while polling is suspended
    next_poll: Option<Instant>,
    /// Session epoch; bumped on entry and teardown to invalidate stale intents
    generation: u64,
}

impl LobbySession {
    /// Spawn the actor task and return the intent handle
    pub fn spawn(
        api: Arc<dyn LobbyApi>,
        transport: Arc<dyn GameTransport>,
        bus: EventBus,
        settings: SessionSettings,
    ) -> (SessionHandle, JoinHandle<()>) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (phase_tx, phase_rx) = watch::channel(SessionPhase::Idle);

        let session = Self {
            api,
            transport,
            bus,
            poll_interval: settings.poll_interval(),
            commands: commands_rx,
            commands_tx: commands_tx.clone(),
            phase_tx,
            state: SessionState::new(),
            next_poll: None,
            generation: 0,
        };
        let task = tokio::spawn(session.run());

        (
            SessionHandle {
                commands: commands_tx,
                phase: phase_rx,
            },
            task,
        )
    }

    async fn run(mut self) {
        debug!("Session actor started");
        loop {
            let poll_at = self.next_poll.unwrap_or_else(far_future);
            tokio::select! {
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        // Every handle is gone; exit best-effort and stop
                        self.best_effort_exit().await;
                        break;
                    };
                    if self.dispatch(command).await {
                        break;
                    }
                }
                _ = tokio::time::sleep_until(poll_at), if self.next_poll.is_some() => {
                    self.next_poll = None;
                    self.refresh().await;
                }
            }
        }
        debug!("Session actor stopped");
    }

    /// Handle one command; returns true when the actor should stop
    async fn dispatch(&mut self, command: Command) -> bool {
        match command {
            Command::Create {
                name,
                capacity,
                player_id,
            } => self.create(name, capacity, player_id).await,
            Command::Join {
                lobby_id,
                player_id,
            } => self.join(lobby_id, player_id).await,
            Command::Start => self.start().await,
            Command::Refresh => {
                self.next_poll = None;
                self.refresh().await;
            }
            Command::RequestExit => self.request_exit(),
            Command::ConfirmExit { generation } => self.confirm_exit(generation).await,
            Command::Shutdown => {
                self.best_effort_exit().await;
                return true;
            }
        }
        false
    }

    fn set_phase(&mut self, phase: SessionPhase) {
        self.state.phase = phase;
        self.phase_tx.send_replace(phase);
    }

    fn in_lobby(&self) -> bool {
        matches!(
            self.state.phase(),
            SessionPhase::Active | SessionPhase::Starting
        )
    }

    fn polling_enabled(&self) -> bool {
        self.in_lobby()
    }

    fn publish_error(&self, message: String) {
        warn!("{}", message);
        self.bus.publish(Notification::DisplayError { message });
    }

    async fn create(&mut self, name: String, capacity: usize, player_id: String) {
        if self.state.phase() != SessionPhase::Idle {
            self.publish_error("Already in a lobby".to_string());
            return;
        }

        let host = Player::host(player_id);
        let request = CreateLobbyRequest::new(capacity, name, host.clone());
        self.set_phase(SessionPhase::Joining);
        info!("Creating lobby '{}'...", request.name);

        match self.api.create_lobby(request).await {
            Ok(lobby) => self.enter_lobby(lobby, host),
            Err(err) => {
                self.set_phase(SessionPhase::Idle);
                self.publish_error(format!("Request failed; {}", err));
            }
        }
    }

    async fn join(&mut self, lobby_id: String, player_id: String) {
        if self.state.phase() != SessionPhase::Idle {
            self.publish_error("Already in a lobby".to_string());
            return;
        }

        let guest = Player::guest(player_id);
        self.set_phase(SessionPhase::Joining);
        info!("Joining lobby {}...", lobby_id);

        // The join call returns an empty body, so a successful join is
        // followed by one GET to seed the first snapshot.
        let result = match self.api.join_lobby(&lobby_id, guest.clone()).await {
            Ok(()) => self.api.get_lobby(&lobby_id).await,
            Err(err) => Err(err),
        };

        match result {
            Ok(lobby) => self.enter_lobby(lobby, guest),
            Err(err) if is_not_found(&err) => {
                // No session existed yet: a plain error, not a disconnect
                self.set_phase(SessionPhase::Idle);
                self.publish_error("This lobby cannot be found".to_string());
            }
            Err(err) => {
                self.set_phase(SessionPhase::Idle);
                self.publish_error(format!("Unable to join this lobby; {}", err));
            }
        }
    }

    fn enter_lobby(&mut self, lobby: Lobby, local: Player) {
        self.generation += 1;
        let lobby_id = lobby.lobby_id.clone();
        let name = lobby.name.clone();
        let is_host = local.is_host;

        self.state.enter(lobby.clone(), local);
        self.set_phase(SessionPhase::Active);
        info!(
            "Entered lobby {} ('{}') as {}",
            lobby_id,
            name,
            if is_host { "host" } else { "guest" }
        );

        self.bus.publish(Notification::LobbyJoined {
            lobby_id,
            name,
            is_host,
        });
        self.bus.publish(Notification::LobbyRefreshed { lobby });

        // First refresh right away; later ones follow the poll interval
        self.next_poll = Some(Instant::now());
    }

    async fn start(&mut self) {
        if !self.in_lobby() {
            self.publish_error("Not in a lobby".to_string());
            return;
        }
        if !self.state.is_host() {
            self.publish_error("You may not start a lobby you are not the host of".to_string());
            return;
        }
        let Some(lobby_id) = self.state.lobby_id() else {
            return;
        };

        info!("Requesting start for lobby {}", lobby_id);
        match self.api.start_lobby(&lobby_id).await {
            Ok(()) => debug!("Start accepted; awaiting next refresh"),
            Err(err) if is_not_found(&err) => self.force_disconnect(),
            Err(err) => self.publish_error(format!("Request failed; {}", err)),
        }
    }

    /// One refresh cycle. Re-arms the poll deadline only after completion,
    /// and only while the session still wants polling.
    async fn refresh(&mut self) {
        let Some(lobby_id) = self.state.lobby_id() else {
            return;
        };
        if !self.polling_enabled() {
            return;
        }

        debug!("Fetching lobby {} info", lobby_id);
        match self.api.get_lobby(&lobby_id).await {
            Ok(lobby) => self.apply_snapshot(lobby).await,
            Err(err) if is_not_found(&err) => {
                self.force_disconnect();
                return;
            }
            Err(err) => self.publish_error(format!("Request failed; {}", err)),
        }

        if self.polling_enabled() {
            self.next_poll = Some(Instant::now() + self.poll_interval);
        }
    }

    async fn apply_snapshot(&mut self, lobby: Lobby) {
        self.state.apply_snapshot(lobby.clone());
        self.bus.publish(Notification::LobbyRefreshed {
            lobby: lobby.clone(),
        });

        if lobby.is_started && self.state.phase() == SessionPhase::Active {
            info!("Lobby {} started", lobby.lobby_id);
            self.set_phase(SessionPhase::Starting);
            self.bus.publish(Notification::LobbyStarting {
                lobby_id: lobby.lobby_id.clone(),
            });
        }

        if self.state.phase() == SessionPhase::Starting && self.state.handoff_due() {
            // Flag first so a failed attempt is never repeated
            self.state.ready = true;
            self.perform_handoff().await;
        }
    }

    async fn perform_handoff(&mut self) {
        let Some(lobby) = self.state.lobby().cloned() else {
            return;
        };
        let Some(player) = self.state.local_player().cloned() else {
            return;
        };

        match connection_descriptor(&lobby, &player) {
            Ok(descriptor) => {
                let role = LaunchRole::for_player(&player);
                let lobby_id = descriptor.session_id.clone();
                info!("Handing session {} off to the transport", lobby_id);

                match self.transport.launch(descriptor, role).await {
                    Ok(()) => {
                        self.set_phase(SessionPhase::Handoff);
                        self.next_poll = None;
                        self.bus.publish(Notification::MatchLaunched { lobby_id });
                    }
                    Err(err) => {
                        self.publish_error(format!("Failed to launch session; {}", err))
                    }
                }
            }
            Err(err) => self.publish_error(format!("An error occurred; {}", err)),
        }
    }

    fn request_exit(&mut self) {
        if !self.in_lobby() {
            self.publish_error("Not in a lobby".to_string());
            return;
        }

        let message = if self.state.is_host() {
            "Do you really want to exit this lobby? If you leave, this lobby will be \
             deleted and everyone else will be disconnected."
                .to_string()
        } else {
            "Do you really want to exit this lobby?".to_string()
        };

        let confirmation = ExitConfirmation {
            commands: self.commands_tx.clone(),
            generation: self.generation,
        };
        self.bus.publish(Notification::ExitRequested {
            message,
            confirmation,
        });
    }

    async fn confirm_exit(&mut self, generation: u64) {
        if generation != self.generation || !self.in_lobby() {
            debug!("Ignoring stale exit confirmation");
            return;
        }
        self.exit_lobby().await;
    }

    /// Best-effort exit: polling stops immediately and local teardown always
    /// completes, even when the delete/leave call fails.
    async fn exit_lobby(&mut self) {
        self.next_poll = None;
        let Some(lobby_id) = self.state.lobby_id() else {
            return;
        };

        let result = if self.state.is_host() {
            info!("Deleting lobby {}...", lobby_id);
            self.api.delete_lobby(&lobby_id).await
        } else {
            info!("Leaving lobby {}...", lobby_id);
            match self.state.local_player().cloned() {
                Some(player) => self.api.leave_lobby(&lobby_id, player).await,
                None => Ok(()),
            }
        };

        match result {
            Ok(()) => {}
            Err(err) if is_not_found(&err) => {
                self.force_disconnect();
                return;
            }
            Err(err) => self.publish_error(format!("Request failed; {}", err)),
        }

        self.teardown();
        self.bus.publish(Notification::LobbyExited { lobby_id });
    }

    /// The lobby vanished server-side: tear down and tell the user once
    fn force_disconnect(&mut self) {
        if let Some(lobby_id) = self.state.lobby_id() {
            warn!("Lobby {} no longer exists; disconnecting", lobby_id);
        }
        self.teardown();
        self.bus.publish(Notification::Disconnected {
            message: "This lobby no longer exists; you have been disconnected".to_string(),
        });
    }

    fn teardown(&mut self) {
        self.state.reset();
        self.next_poll = None;
        self.generation += 1;
        self.set_phase(SessionPhase::Idle);
    }

    async fn best_effort_exit(&mut self) {
        if self.in_lobby() {
            self.exit_lobby().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::MockLobbyApi;
    use crate::handoff::MockGameTransport;
    use crate::types::{Assignment, Port};
    use tokio::sync::broadcast;
    use tokio::time::{advance, timeout};

    fn test_lobby(started: bool, token: Option<u32>) -> Lobby {
        Lobby {
            annotations: vec![],
            assignment: started.then(|| Assignment {
                authorization_token: 555,
                host: "host.example".to_string(),
                ip: "10.1.2.3".to_string(),
                ports: vec![
                    Port {
                        name: "client".to_string(),
                        port: 7000,
                        protocol: "UDP".to_string(),
                    },
                    Port {
                        name: "server".to_string(),
                        port: 7001,
                        protocol: "UDP".to_string(),
                    },
                ],
            }),
            capacity: 4,
            is_joinable: !started,
            is_started: started,
            lobby_id: "L1".to_string(),
            name: "Alpha".to_string(),
            player_count: 1,
            players: vec![Player {
                authorization_token: token,
                id: "host1".to_string(),
                is_host: true,
            }],
            tags: vec![],
        }
    }

    fn settings() -> SessionSettings {
        SessionSettings {
            poll_interval_seconds: 5,
        }
    }

    async fn next_notification(
        rx: &mut broadcast::Receiver<Notification>,
    ) -> Notification {
        timeout(Duration::from_secs(30), rx.recv())
            .await
            .expect("timed out waiting for a notification")
            .expect("event bus closed")
    }

    fn spawn_session(
        api: MockLobbyApi,
        transport: MockGameTransport,
    ) -> (
        SessionHandle,
        JoinHandle<()>,
        broadcast::Receiver<Notification>,
    ) {
        let bus = EventBus::default();
        let rx = bus.subscribe();
        let (handle, task) =
            LobbySession::spawn(Arc::new(api), Arc::new(transport), bus, settings());
        (handle, task, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_enters_active_with_host_identity() {
        let mut api = MockLobbyApi::new();
        api.expect_create_lobby()
            .times(1)
            .returning(|_| Ok(test_lobby(false, None)));
        api.expect_get_lobby()
            .returning(|_| Ok(test_lobby(false, None)));
        api.expect_delete_lobby().times(1).returning(|_| Ok(()));

        let (handle, task, mut rx) = spawn_session(api, MockGameTransport::new());
        handle.create_lobby("Alpha", 4, "host1").unwrap();

        match next_notification(&mut rx).await {
            Notification::LobbyJoined {
                lobby_id,
                name,
                is_host,
            } => {
                assert_eq!(lobby_id, "L1");
                assert_eq!(name, "Alpha");
                assert!(is_host);
            }
            other => panic!("expected LobbyJoined, got {:?}", other),
        }
        assert!(matches!(
            next_notification(&mut rx).await,
            Notification::LobbyRefreshed { .. }
        ));

        let mut phases = handle.phase_watch();
        timeout(Duration::from_secs(5), async {
            while *phases.borrow() != SessionPhase::Active {
                phases.changed().await.unwrap();
            }
        })
        .await
        .unwrap();

        handle.shutdown().unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_failure_returns_to_idle() {
        let mut api = MockLobbyApi::new();
        api.expect_create_lobby().times(1).returning(|_| {
            Err(LobbyError::TransportFailure {
                message: "connection refused".to_string(),
            }
            .into())
        });

        let (handle, task, mut rx) = spawn_session(api, MockGameTransport::new());
        handle.create_lobby("Alpha", 4, "host1").unwrap();

        assert!(matches!(
            next_notification(&mut rx).await,
            Notification::DisplayError { .. }
        ));
        assert_eq!(handle.phase(), SessionPhase::Idle);

        handle.shutdown().unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_not_found_is_plain_error() {
        let mut api = MockLobbyApi::new();
        api.expect_join_lobby().times(1).returning(|_, _| {
            Err(LobbyError::LobbyNotFound {
                lobby_id: "L1".to_string(),
            }
            .into())
        });

        let (handle, task, mut rx) = spawn_session(api, MockGameTransport::new());
        handle.join_lobby("L1", "guest1").unwrap();

        match next_notification(&mut rx).await {
            Notification::DisplayError { message } => {
                assert!(message.contains("cannot be found"));
            }
            other => panic!("expected DisplayError, got {:?}", other),
        }
        assert_eq!(handle.phase(), SessionPhase::Idle);

        handle.shutdown().unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_host_cannot_start() {
        let mut api = MockLobbyApi::new();
        api.expect_join_lobby().times(1).returning(|_, _| Ok(()));
        api.expect_get_lobby()
            .returning(|_| Ok(test_lobby(false, None)));
        api.expect_leave_lobby().times(1).returning(|_, _| Ok(()));
        // No expect_start_lobby: a start request must never reach the API

        let (handle, task, mut rx) = spawn_session(api, MockGameTransport::new());
        handle.join_lobby("L1", "guest1").unwrap();

        assert!(matches!(
            next_notification(&mut rx).await,
            Notification::LobbyJoined { is_host: false, .. }
        ));

        handle.start_lobby().unwrap();
        loop {
            match next_notification(&mut rx).await {
                Notification::DisplayError { message } => {
                    assert!(message.contains("not the host"));
                    break;
                }
                Notification::LobbyRefreshed { .. } => continue,
                other => panic!("unexpected notification {:?}", other),
            }
        }

        handle.shutdown().unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_not_found_disconnects_and_stops_polling() {
        let mut api = MockLobbyApi::new();
        api.expect_create_lobby()
            .times(1)
            .returning(|_| Ok(test_lobby(false, None)));
        // Exactly one poll: the not-found response must stop the ticker
        api.expect_get_lobby().times(1).returning(|_| {
            Err(LobbyError::LobbyNotFound {
                lobby_id: "L1".to_string(),
            }
            .into())
        });

        let (handle, task, mut rx) = spawn_session(api, MockGameTransport::new());
        handle.create_lobby("Alpha", 4, "host1").unwrap();

        loop {
            match next_notification(&mut rx).await {
                Notification::Disconnected { message } => {
                    assert!(message.contains("no longer exists"));
                    break;
                }
                Notification::LobbyJoined { .. } | Notification::LobbyRefreshed { .. } => continue,
                other => panic!("unexpected notification {:?}", other),
            }
        }
        assert_eq!(handle.phase(), SessionPhase::Idle);

        // Long idle stretch: with polling stopped no further request is made
        advance(Duration::from_secs(60)).await;

        handle.shutdown().unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_handoff_fires_exactly_once() {
        let mut api = MockLobbyApi::new();
        api.expect_create_lobby()
            .times(1)
            .returning(|_| Ok(test_lobby(false, None)));
        api.expect_get_lobby()
            .returning(|_| Ok(test_lobby(true, Some(777))));

        let mut transport = MockGameTransport::new();
        transport
            .expect_launch()
            .times(1)
            .withf(|descriptor, role| {
                descriptor.client_port == 7000
                    && descriptor.server_port == 7001
                    && descriptor.session_id == "L1"
                    && descriptor.server_token == 555
                    && descriptor.client_token == 777
                    && *role == LaunchRole::Host
            })
            .returning(|_, _| Ok(()));

        let (handle, task, mut rx) = spawn_session(api, transport);
        handle.create_lobby("Alpha", 4, "host1").unwrap();

        loop {
            if matches!(
                next_notification(&mut rx).await,
                Notification::MatchLaunched { .. }
            ) {
                break;
            }
        }
        assert_eq!(handle.phase(), SessionPhase::Handoff);

        // Extra manual refreshes after handoff must not launch again
        handle.refresh_lobby().unwrap();
        handle.refresh_lobby().unwrap();
        advance(Duration::from_secs(60)).await;

        handle.shutdown().unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_exit_confirmation_is_dropped() {
        let mut api = MockLobbyApi::new();
        api.expect_create_lobby()
            .times(1)
            .returning(|_| Ok(test_lobby(false, None)));
        api.expect_get_lobby()
            .returning(|_| Ok(test_lobby(false, None)));
        // The exit must be performed exactly once despite two confirmations
        api.expect_delete_lobby().times(1).returning(|_| Ok(()));

        let (handle, task, mut rx) = spawn_session(api, MockGameTransport::new());
        handle.create_lobby("Alpha", 4, "host1").unwrap();
        handle.request_exit().unwrap();

        let confirmation = loop {
            match next_notification(&mut rx).await {
                Notification::ExitRequested {
                    message,
                    confirmation,
                } => {
                    assert!(message.contains("deleted"));
                    break confirmation;
                }
                _ => continue,
            }
        };

        confirmation.confirm();
        loop {
            if matches!(
                next_notification(&mut rx).await,
                Notification::LobbyExited { .. }
            ) {
                break;
            }
        }
        assert_eq!(handle.phase(), SessionPhase::Idle);

        // Session generation moved on; this confirmation is stale now
        confirmation.confirm();
        advance(Duration::from_secs(10)).await;
        assert_eq!(handle.phase(), SessionPhase::Idle);

        handle.shutdown().unwrap();
        task.await.unwrap();
    }
}
