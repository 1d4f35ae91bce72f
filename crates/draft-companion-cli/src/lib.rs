//! Draft companion CLI — snapshot session, tier list and star drop commands.

pub mod config;
pub mod output;
pub mod repl;
pub mod session;
pub mod types;

pub use config::{resolve_api_url, resolve_snapshot_path};
pub use session::CompanionSession;
