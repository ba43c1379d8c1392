//! Typed notification bus between the session core and the presentation layer
//!
//! Publish is fire-and-forget to all current subscribers; there is no
//! buffering for subscribers that have not joined yet, so a late subscriber
//! misses prior notifications.

use crate::session::ExitConfirmation;
use crate::types::{Lobby, LobbyId};
use tokio::sync::broadcast;
use tracing::debug;

/// Default capacity of a subscriber's notification buffer
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Notifications emitted by the session core.
///
/// This is the sole channel through which the core informs the presentation
/// layer; confirmed intents travel back through the session handle (or the
/// continuation carried by [`Notification::ExitRequested`]).
#[derive(Debug, Clone)]
pub enum Notification {
    /// The local player entered a lobby, as host (create) or guest (join)
    LobbyJoined {
        lobby_id: LobbyId,
        name: String,
        is_host: bool,
    },
    /// A fresh lobby snapshot replaced the local one
    LobbyRefreshed { lobby: Lobby },
    /// The lobby was observed started; awaiting the local session token
    LobbyStarting { lobby_id: LobbyId },
    /// The match handoff completed and the transport has been launched
    MatchLaunched { lobby_id: LobbyId },
    /// The local player asked to exit; invoke the confirmation to proceed
    ExitRequested {
        message: String,
        confirmation: ExitConfirmation,
    },
    /// The session was torn down after an explicit exit
    LobbyExited { lobby_id: LobbyId },
    /// The lobby no longer exists server-side; the session was torn down
    Disconnected { message: String },
    /// A failure the user should see; the session continues
    DisplayError { message: String },
}

/// Multi-subscriber notification channel.
///
/// Cheap to clone; all clones publish into the same set of subscribers.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Notification>,
}

impl EventBus {
    /// Create a bus whose subscribers buffer up to `capacity` notifications
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to all notifications published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    /// Publish a notification to all current subscribers.
    ///
    /// Publishing with no live subscribers is not an error.
    pub fn publish(&self, notification: Notification) {
        if self.sender.send(notification).is_err() {
            debug!("Notification published with no subscribers");
        }
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
