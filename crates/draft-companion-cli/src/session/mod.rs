//! Session management for the companion snapshot.

pub mod manager;

pub use manager::{CompanionSession, PLAYER_TAG_KEY};
