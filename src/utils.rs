//! Utility functions for the lobby client

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Generate a throwaway player id for callers that did not supply one
pub fn generate_player_id() -> String {
    let id = Uuid::new_v4();
    format!("player-{}", &id.simple().to_string()[..8])
}
