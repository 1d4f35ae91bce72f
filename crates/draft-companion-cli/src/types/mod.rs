//! Types shared by the CLI commands.

pub mod error;

pub use error::*;

use draft_companion::Suggestion;
use serde::Serialize;

/// Outcome of a catalog and tier data sync.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub brawlers: usize,
    pub maps: usize,
    pub tier_maps: usize,
    pub version: Option<String>,
    /// Maps whose tier data could not be fetched.
    pub failed: Vec<String>,
}

/// Backend advice for one draft board.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DraftAdvice {
    pub suggestions: Vec<Suggestion>,
    /// Predicted win rate of team A in percent, once both teams are full.
    pub win_rate: Option<f64>,
    /// Whether suggestions were limited to an account's brawlers.
    pub account_filtered: bool,
}
