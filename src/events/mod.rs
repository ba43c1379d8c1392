//! Event/notification bus
//!
//! This module decouples the session state machine from its presentation
//! consumers through a typed publish/subscribe channel.

pub mod bus;

// Re-export commonly used types
pub use bus::{EventBus, Notification, DEFAULT_EVENT_CAPACITY};
