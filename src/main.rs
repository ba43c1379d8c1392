//! Main entry point for the green-room lobby client
//!
//! A thin command line harness over the library: one-shot API commands for
//! poking a lobby service, plus `host` and `join` commands that run a full
//! coordination session against it.

use anyhow::Result;
use clap::{Parser, Subcommand};
use green_room::config::AppConfig;
use green_room::handoff::LoggingTransport;
use green_room::session::{LobbySession, SessionHandle};
use green_room::utils::generate_player_id;
use green_room::{
    CreateLobbyRequest, EventBus, HttpLobbyApi, LobbyApi, Notification, Player,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Green Room Lobby Client - coordination against an HTTP matchmaking service
#[derive(Parser)]
#[command(
    name = "green-room",
    version,
    about = "A lobby coordination client for HTTP matchmaking services",
    long_about = "Green Room talks to a remote lobby service over HTTP, keeps a local \
                  view of the lobby you are in through polling, and hands confirmed \
                  matches off to a game-session transport."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Lobby service base URL override
    #[arg(long, value_name = "URL", help = "Override the lobby service base URL")]
    base_url: Option<String>,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// Player id to act as (generated when omitted)
    #[arg(short, long, value_name = "ID")]
    player: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all lobbies
    List,
    /// Get a lobby by id
    Get { lobby_id: String },
    /// Create a lobby and print it
    Create {
        name: String,
        #[arg(long, default_value_t = 4)]
        capacity: usize,
    },
    /// Ask the service to start a lobby
    Start { lobby_id: String },
    /// Delete a lobby
    Delete { lobby_id: String },
    /// Create a lobby and run a session as its host
    Host {
        name: String,
        #[arg(long, default_value_t = 4)]
        capacity: usize,
        /// Request start automatically once the lobby is full
        #[arg(long)]
        start_when_full: bool,
    },
    /// Join a lobby and run a session as a guest
    Join { lobby_id: String },
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Drive a running session from the terminal until it ends.
///
/// Ctrl-c requests an exit; the confirmation prompt the core raises is
/// answered immediately since there is no dialog to show.
async fn run_session(
    handle: SessionHandle,
    mut notifications: broadcast::Receiver<Notification>,
    start_when_full: bool,
) -> Result<()> {
    let mut start_requested = false;

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Interrupt received; leaving lobby");
                handle.request_exit()?;
            }
            notification = notifications.recv() => match notification {
                Ok(Notification::LobbyJoined { lobby_id, name, is_host }) => {
                    info!(
                        "Entered lobby {} ('{}') as {}",
                        lobby_id,
                        name,
                        if is_host { "host" } else { "guest" }
                    );
                }
                Ok(Notification::LobbyRefreshed { lobby }) => {
                    info!(
                        "Lobby '{}': {}/{} players",
                        lobby.name, lobby.player_count, lobby.capacity
                    );
                    if start_when_full && !start_requested && lobby.is_full() && !lobby.is_started {
                        info!("Lobby is full; requesting start");
                        start_requested = true;
                        handle.start_lobby()?;
                    }
                }
                Ok(Notification::LobbyStarting { lobby_id }) => {
                    info!("Lobby {} started; waiting for the session token", lobby_id);
                }
                Ok(Notification::MatchLaunched { lobby_id }) => {
                    info!("Session {} handed off to the transport", lobby_id);
                    break;
                }
                Ok(Notification::ExitRequested { message, confirmation }) => {
                    info!("{}", message);
                    confirmation.confirm();
                }
                Ok(Notification::LobbyExited { lobby_id }) => {
                    info!("Left lobby {}", lobby_id);
                    break;
                }
                Ok(Notification::Disconnected { message }) => {
                    warn!("{}", message);
                    break;
                }
                Ok(Notification::DisplayError { message }) => {
                    error!("{}", message);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Dropped {} notifications", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    handle.shutdown().ok();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::from_env()?,
    };
    if let Some(base_url) = args.base_url {
        config.api.base_url = base_url;
    }
    if let Some(log_level) = args.log_level {
        config.service.log_level = log_level;
    }

    init_logging(&config.service.log_level)?;
    info!(
        "green-room {} against {}",
        green_room::VERSION,
        config.api.base_url
    );

    let api = Arc::new(HttpLobbyApi::from_settings(&config.api)?);
    let player_id = args.player.unwrap_or_else(generate_player_id);

    match args.command {
        Commands::List => {
            let lobbies = api.list_lobbies().await?;
            println!("{}", serde_json::to_string_pretty(&lobbies)?);
        }
        Commands::Get { lobby_id } => {
            let lobby = api.get_lobby(&lobby_id).await?;
            println!("{}", serde_json::to_string_pretty(&lobby)?);
        }
        Commands::Create { name, capacity } => {
            let request = CreateLobbyRequest::new(capacity, name, Player::host(player_id.as_str()));
            let lobby = api.create_lobby(request).await?;
            println!("{}", serde_json::to_string_pretty(&lobby)?);
        }
        Commands::Start { lobby_id } => {
            api.start_lobby(&lobby_id).await?;
            info!("Start requested for lobby {}", lobby_id);
        }
        Commands::Delete { lobby_id } => {
            api.delete_lobby(&lobby_id).await?;
            info!("Deleted lobby {}", lobby_id);
        }
        Commands::Host {
            name,
            capacity,
            start_when_full,
        } => {
            let bus = EventBus::default();
            let notifications = bus.subscribe();
            let (handle, task) = LobbySession::spawn(
                api,
                Arc::new(LoggingTransport),
                bus,
                config.session.clone(),
            );

            handle.create_lobby(name, capacity, player_id)?;
            run_session(handle, notifications, start_when_full).await?;
            task.await?;
        }
        Commands::Join { lobby_id } => {
            let bus = EventBus::default();
            let notifications = bus.subscribe();
            let (handle, task) = LobbySession::spawn(
                api,
                Arc::new(LoggingTransport),
                bus,
                config.session.clone(),
            );

            handle.join_lobby(lobby_id, player_id)?;
            run_session(handle, notifications, false).await?;
            task.await?;
        }
    }

    Ok(())
}
