//! Pick/ban draft board.
//!
//! The board only enforces who may go where: two teams of three, up to six
//! bans, and no brawler in more than one place. Suggestions and win-rate
//! predictions come from the backend; [`DraftBoard::draft_request`] and
//! [`DraftBoard::win_rate_request`] build the bodies it expects.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Brawler, CompanionError, CompanionResult};

/// Picks per team.
pub const TEAM_SIZE: usize = 3;

/// Largest ban list.
pub const MAX_BANS: usize = 6;

/// One of the two drafting teams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    A,
    B,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::A => write!(f, "Team A"),
            Side::B => write!(f, "Team B"),
        }
    }
}

/// Where a brawler currently sits on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Team(Side),
    Banned,
    Available,
}

/// Board change made by [`DraftBoard::select`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftMove {
    Picked(Side),
    Unpicked(Side),
    Banned,
    Unbanned,
}

/// A selection the board refused.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DraftError {
    #[error("Select a map first")]
    NoMap,

    #[error("{0} already has {} brawlers", TEAM_SIZE)]
    TeamFull(Side),

    #[error("You can only ban up to {} brawlers", MAX_BANS)]
    BanLimit,

    #[error("{0} is banned, unban it first")]
    IsBanned(String),

    #[error("{name} is already picked by {side}")]
    Taken { name: String, side: Side },
}

/// Draft state: map, both teams, bans and the ban-mode toggle.
///
/// Brawlers are matched by name, ignoring case.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DraftBoard {
    map: Option<String>,
    team_a: Vec<Brawler>,
    team_b: Vec<Brawler>,
    bans: Vec<Brawler>,
    ban_mode: bool,
}

impl DraftBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map(&self) -> Option<&str> {
        self.map.as_deref()
    }

    pub fn set_map(&mut self, map: impl Into<String>) {
        self.map = Some(map.into());
    }

    pub fn team(&self, side: Side) -> &[Brawler] {
        match side {
            Side::A => &self.team_a,
            Side::B => &self.team_b,
        }
    }

    pub fn bans(&self) -> &[Brawler] {
        &self.bans
    }

    pub fn ban_mode(&self) -> bool {
        self.ban_mode
    }

    /// Flip ban mode and return the new state.
    pub fn toggle_ban_mode(&mut self) -> bool {
        self.ban_mode = !self.ban_mode;
        self.ban_mode
    }

    pub fn set_ban_mode(&mut self, on: bool) {
        self.ban_mode = on;
    }

    pub fn slot_of(&self, name: &str) -> Slot {
        if contains(&self.team_a, name) {
            Slot::Team(Side::A)
        } else if contains(&self.team_b, name) {
            Slot::Team(Side::B)
        } else if contains(&self.bans, name) {
            Slot::Banned
        } else {
            Slot::Available
        }
    }

    /// Both teams are full, so a win rate can be predicted.
    pub fn is_complete(&self) -> bool {
        self.team_a.len() == TEAM_SIZE && self.team_b.len() == TEAM_SIZE
    }

    /// Apply a click on `brawler` for `side`.
    ///
    /// In ban mode the side is ignored and the brawler is banned or unbanned.
    /// Otherwise a brawler already on `side` is removed, and an available one
    /// is added if the team has room.
    pub fn select(&mut self, brawler: &Brawler, side: Side) -> Result<DraftMove, DraftError> {
        if self.map.is_none() {
            return Err(DraftError::NoMap);
        }
        let slot = self.slot_of(&brawler.name);

        if self.ban_mode {
            return match slot {
                Slot::Banned => {
                    remove(&mut self.bans, &brawler.name);
                    Ok(DraftMove::Unbanned)
                }
                _ if self.bans.len() >= MAX_BANS => Err(DraftError::BanLimit),
                Slot::Team(side) => Err(DraftError::Taken {
                    name: brawler.name.clone(),
                    side,
                }),
                Slot::Available => {
                    self.bans.push(brawler.clone());
                    Ok(DraftMove::Banned)
                }
            };
        }

        match slot {
            Slot::Banned => Err(DraftError::IsBanned(brawler.name.clone())),
            Slot::Team(current) if current == side => {
                remove(self.team_mut(side), &brawler.name);
                Ok(DraftMove::Unpicked(side))
            }
            Slot::Team(other) => Err(DraftError::Taken {
                name: brawler.name.clone(),
                side: other,
            }),
            Slot::Available => {
                let team = self.team_mut(side);
                if team.len() >= TEAM_SIZE {
                    return Err(DraftError::TeamFull(side));
                }
                team.push(brawler.clone());
                Ok(DraftMove::Picked(side))
            }
        }
    }

    /// Clear the map, both teams and the bans, and leave ban mode.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Body for `/simulate_draft`. Fails without a map.
    pub fn draft_request(&self, available: Option<Vec<String>>) -> CompanionResult<DraftRequest> {
        let map = self
            .map
            .clone()
            .ok_or_else(|| CompanionError::InvalidInput("no map selected".to_string()))?;
        Ok(DraftRequest {
            available_brawlers: available,
            map,
            excluded_brawlers: names(&self.bans),
            initial_team: names(&self.team_a),
            initial_opponent: names(&self.team_b),
        })
    }

    /// Body for `/predict_winrate`, once both teams are full.
    pub fn win_rate_request(&self) -> Option<WinRateRequest> {
        if !self.is_complete() {
            return None;
        }
        Some(WinRateRequest {
            initial_team: names(&self.team_a),
            initial_opponent: names(&self.team_b),
            map: self.map.clone()?,
        })
    }

    fn team_mut(&mut self, side: Side) -> &mut Vec<Brawler> {
        match side {
            Side::A => &mut self.team_a,
            Side::B => &mut self.team_b,
        }
    }
}

fn contains(list: &[Brawler], name: &str) -> bool {
    list.iter().any(|b| b.name.eq_ignore_ascii_case(name))
}

fn remove(list: &mut Vec<Brawler>, name: &str) {
    list.retain(|b| !b.name.eq_ignore_ascii_case(name));
}

fn names(list: &[Brawler]) -> Vec<String> {
    list.iter().map(|b| b.name.clone()).collect()
}

/// `/simulate_draft` request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DraftRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_brawlers: Option<Vec<String>>,
    pub map: String,
    pub excluded_brawlers: Vec<String>,
    pub initial_team: Vec<String>,
    pub initial_opponent: Vec<String>,
}

/// `/predict_winrate` request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WinRateRequest {
    pub initial_team: Vec<String>,
    pub initial_opponent: Vec<String>,
    pub map: String,
}

/// A recommended pick. Arrives as `[[name, score], imageUrl]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SuggestionRepr")]
pub struct Suggestion {
    pub name: String,
    pub score: f64,
    pub image_url: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SuggestionRepr {
    Pair((String, f64), String),
    Object {
        name: String,
        score: f64,
        #[serde(default, alias = "imageUrl")]
        image_url: String,
    },
}

impl From<SuggestionRepr> for Suggestion {
    fn from(repr: SuggestionRepr) -> Self {
        match repr {
            SuggestionRepr::Pair((name, score), image_url)
            | SuggestionRepr::Object {
                name,
                score,
                image_url,
            } => Self {
                name,
                score,
                image_url,
            },
        }
    }
}

/// How a predicted win rate (in percent) reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WinRateBand {
    Dominant,
    Favorable,
    SlightlyFavorable,
    Balanced,
    Even,
    SlightDisadvantage,
    Challenging,
}

impl WinRateBand {
    pub fn of(rate: f64) -> Self {
        match rate {
            r if r > 54.0 => Self::Dominant,
            r if r > 52.0 => Self::Favorable,
            r if r > 50.5 => Self::SlightlyFavorable,
            r if r > 49.5 => Self::Balanced,
            r if r > 48.0 => Self::Even,
            r if r > 45.0 => Self::SlightDisadvantage,
            _ => Self::Challenging,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::Dominant => {
                "Dominant matchup: strong advantage. Stay focused and capitalize on your lead."
            }
            Self::Favorable => {
                "Favorable matchup: your team has the edge. Play confidently but stay sharp."
            }
            Self::SlightlyFavorable => {
                "Slightly favorable: small advantage. Stick to solid plays and avoid risks."
            }
            Self::Balanced => {
                "Balanced matchup: a close game ahead. Good teamwork will make the difference."
            }
            Self::Even => "Even matchup: could go either way. Adapt and play smart!",
            Self::SlightDisadvantage => {
                "Slight disadvantage: play carefully and look for openings to turn the tide."
            }
            Self::Challenging => {
                "Challenging matchup: tough battle ahead. Stay resilient and work with your team!"
            }
        }
    }
}

/// Message shown when the backend has no prediction.
pub const NO_WIN_RATE_MESSAGE: &str = "Win rate data unavailable, focus on playing your best!";

/// Colour class of a predicted win rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outlook {
    Good,
    Close,
    Poor,
}

impl Outlook {
    pub fn of(rate: f64) -> Self {
        if rate >= 52.0 {
            Self::Good
        } else if rate >= 48.0 {
            Self::Close
        } else {
            Self::Poor
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outlook::Good => "good",
            Outlook::Close => "close",
            Outlook::Poor => "poor",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brawler(name: &str) -> Brawler {
        Brawler {
            id: None,
            name: name.to_string(),
            image_url: format!("https://cdn/{}.png", name.to_lowercase()),
        }
    }

    fn board_on_map() -> DraftBoard {
        let mut board = DraftBoard::new();
        board.set_map("Hard Rock Mine");
        board
    }

    #[test]
    fn test_select_requires_map() {
        let mut board = DraftBoard::new();
        assert_eq!(board.select(&brawler("Shelly"), Side::A), Err(DraftError::NoMap));
    }

    #[test]
    fn test_pick_and_click_again_to_remove() {
        let mut board = board_on_map();
        let shelly = brawler("Shelly");

        assert_eq!(board.select(&shelly, Side::A), Ok(DraftMove::Picked(Side::A)));
        assert_eq!(board.slot_of("SHELLY"), Slot::Team(Side::A));
        assert_eq!(board.select(&shelly, Side::A), Ok(DraftMove::Unpicked(Side::A)));
        assert_eq!(board.slot_of("Shelly"), Slot::Available);
    }

    #[test]
    fn test_brawler_on_one_team_only() {
        let mut board = board_on_map();
        let colt = brawler("Colt");
        board.select(&colt, Side::A).unwrap();

        assert_eq!(
            board.select(&colt, Side::B),
            Err(DraftError::Taken {
                name: "Colt".to_string(),
                side: Side::A
            })
        );
        assert!(board.team(Side::B).is_empty());
    }

    #[test]
    fn test_team_holds_three() {
        let mut board = board_on_map();
        for name in ["Shelly", "Colt", "Bull"] {
            board.select(&brawler(name), Side::B).unwrap();
        }
        assert_eq!(
            board.select(&brawler("Piper"), Side::B),
            Err(DraftError::TeamFull(Side::B))
        );
        assert_eq!(board.team(Side::B).len(), TEAM_SIZE);
        assert!(!board.is_complete());
    }

    #[test]
    fn test_ban_mode_rules() {
        let mut board = board_on_map();
        board.select(&brawler("Shelly"), Side::A).unwrap();
        assert!(board.toggle_ban_mode());

        assert!(matches!(
            board.select(&brawler("Shelly"), Side::B),
            Err(DraftError::Taken { .. })
        ));
        for name in ["Colt", "Bull", "Brock", "Rico", "Spike", "Crow"] {
            assert_eq!(board.select(&brawler(name), Side::A), Ok(DraftMove::Banned));
        }
        assert_eq!(board.select(&brawler("Leon"), Side::A), Err(DraftError::BanLimit));

        // Clicking a banned brawler unbans it even at the limit.
        assert_eq!(board.select(&brawler("crow"), Side::A), Ok(DraftMove::Unbanned));
        assert_eq!(board.bans().len(), MAX_BANS - 1);

        assert!(!board.toggle_ban_mode());
        assert_eq!(
            board.select(&brawler("Colt"), Side::A),
            Err(DraftError::IsBanned("Colt".to_string()))
        );
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut board = board_on_map();
        board.select(&brawler("Shelly"), Side::A).unwrap();
        board.set_ban_mode(true);
        board.select(&brawler("Colt"), Side::A).unwrap();

        board.reset();
        assert_eq!(board.map(), None);
        assert!(board.team(Side::A).is_empty());
        assert!(board.bans().is_empty());
        assert!(!board.ban_mode());
    }

    #[test]
    fn test_requests_carry_board_names() {
        let mut board = board_on_map();
        assert!(board.win_rate_request().is_none());

        for (name, side) in [
            ("Shelly", Side::A),
            ("Colt", Side::A),
            ("Bull", Side::A),
            ("Piper", Side::B),
            ("Brock", Side::B),
            ("Rico", Side::B),
        ] {
            board.select(&brawler(name), side).unwrap();
        }
        board.set_ban_mode(true);
        board.select(&brawler("Spike"), Side::A).unwrap();

        let draft = board.draft_request(None).unwrap();
        let body = serde_json::to_value(&draft).unwrap();
        assert_eq!(body["map"], "Hard Rock Mine");
        assert_eq!(body["excluded_brawlers"], serde_json::json!(["Spike"]));
        assert_eq!(body["initial_opponent"][2], "Rico");
        assert!(body.get("available_brawlers").is_none());

        let win = board.win_rate_request().unwrap();
        assert_eq!(win.initial_team, ["Shelly", "Colt", "Bull"]);

        board.reset();
        assert!(board.draft_request(None).is_err());
    }

    #[test]
    fn test_suggestion_from_nested_pair() {
        let parsed: Vec<Suggestion> =
            serde_json::from_str(r#"[[["SHELLY", 0.61], "https://cdn/shelly.png"]]"#).unwrap();
        assert_eq!(parsed[0].name, "SHELLY");
        assert_eq!(parsed[0].score, 0.61);
        assert_eq!(parsed[0].image_url, "https://cdn/shelly.png");
    }

    #[test]
    fn test_win_rate_bands() {
        assert_eq!(WinRateBand::of(60.0), WinRateBand::Dominant);
        assert_eq!(WinRateBand::of(54.0), WinRateBand::Favorable);
        assert_eq!(WinRateBand::of(52.0), WinRateBand::SlightlyFavorable);
        assert_eq!(WinRateBand::of(50.0), WinRateBand::Balanced);
        assert_eq!(WinRateBand::of(49.5), WinRateBand::Even);
        assert_eq!(WinRateBand::of(46.0), WinRateBand::SlightDisadvantage);
        assert_eq!(WinRateBand::of(45.0), WinRateBand::Challenging);

        assert_eq!(Outlook::of(52.0), Outlook::Good);
        assert_eq!(Outlook::of(48.0), Outlook::Close);
        assert_eq!(Outlook::of(47.9), Outlook::Poor);
    }
}
