//! Player accounts: tag validation and upgrade recommendations.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{CompanionError, CompanionResult};

const TAG_LEN: usize = 9;

/// A validated in-game player tag, stored with its leading `#`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlayerTag(String);

impl PlayerTag {
    /// Accept an optional `#` followed by exactly nine ASCII letters or digits.
    pub fn parse(raw: &str) -> CompanionResult<Self> {
        let body = raw.trim();
        let body = body.strip_prefix('#').unwrap_or(body);
        if body.len() != TAG_LEN || !body.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(CompanionError::InvalidInput(format!(
                "player tag must be '#' and {TAG_LEN} letters or digits, got '{raw}'"
            )));
        }
        Ok(Self(format!("#{body}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PlayerTag {
    type Error = CompanionError;

    fn try_from(raw: String) -> CompanionResult<Self> {
        Self::parse(&raw)
    }
}

impl From<PlayerTag> for String {
    fn from(tag: PlayerTag) -> Self {
        tag.0
    }
}

/// One brawler row from `/account-upgrade-helper`.
///
/// `score` is null for brawlers the backend cannot rate. Any extra numeric
/// columns are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpgradeCandidate {
    pub name: String,
    pub score: Option<f64>,
    #[serde(default)]
    pub total_power_points: f64,
    #[serde(default)]
    pub total_coins: f64,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl UpgradeCandidate {
    /// Value of a sortable column; `None` sorts last.
    pub fn field(&self, field: &str) -> Option<f64> {
        match field {
            "score" => self.score,
            "total_power_points" => Some(self.total_power_points),
            "total_coins" => Some(self.total_coins),
            other => self.extra.get(other).and_then(serde_json::Value::as_f64),
        }
    }
}

/// Sort rows by `field`, nulls last in either direction.
pub fn sort_candidates(rows: &mut [UpgradeCandidate], field: &str, descending: bool) {
    rows.sort_by(|a, b| match (a.field(field), b.field(field)) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => {
            let ord = x.partial_cmp(&y).unwrap_or(Ordering::Equal);
            if descending {
                ord.reverse()
            } else {
                ord
            }
        }
    });
}

/// The best rated rows, highest score first.
pub fn top_upgrades(rows: &[UpgradeCandidate], count: usize) -> Vec<UpgradeCandidate> {
    let mut rated: Vec<UpgradeCandidate> =
        rows.iter().filter(|r| r.score.is_some()).cloned().collect();
    sort_candidates(&mut rated, "score", true);
    rated.truncate(count);
    rated
}

/// Colour band of an upgrade score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBand {
    Excellent,
    Good,
    Fair,
    Low,
    Unrated,
}

impl ScoreBand {
    pub fn of(score: Option<f64>) -> Self {
        match score {
            None => Self::Unrated,
            Some(s) if s > 60.0 => Self::Excellent,
            Some(s) if s > 40.0 => Self::Good,
            Some(s) if s > 20.0 => Self::Fair,
            Some(_) => Self::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreBand::Excellent => "excellent",
            ScoreBand::Good => "good",
            ScoreBand::Fair => "fair",
            ScoreBand::Low => "low",
            ScoreBand::Unrated => "unrated",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<UpgradeCandidate> {
        serde_json::from_value(serde_json::json!([
            { "name": "SHELLY", "score": 35.0, "total_power_points": 1440, "total_coins": 2800 },
            { "name": "COLT", "score": null, "total_power_points": 0, "total_coins": 0 },
            { "name": "BULL", "score": 72.5, "total_power_points": 550, "total_coins": 1000, "gadgets": 1 }
        ]))
        .unwrap()
    }

    #[test]
    fn test_player_tag_validation() {
        assert_eq!(PlayerTag::parse("2PP0GQJ8L").unwrap().as_str(), "#2PP0GQJ8L");
        assert_eq!(PlayerTag::parse(" #2pp0gqj8l ").unwrap().as_str(), "#2pp0gqj8l");
        assert!(PlayerTag::parse("#2PP").is_err());
        assert!(PlayerTag::parse("#2PP0GQJ8L1").is_err());
        assert!(PlayerTag::parse("#2PP-GQJ8L").is_err());
        assert!(serde_json::from_str::<PlayerTag>(r#""bad""#).is_err());
    }

    #[test]
    fn test_rows_keep_extra_columns() {
        let rows = rows();
        assert_eq!(rows[2].field("gadgets"), Some(1.0));
        assert_eq!(rows[1].field("score"), None);
        assert_eq!(rows[0].field("total_coins"), Some(2800.0));
    }

    #[test]
    fn test_sort_puts_nulls_last_both_ways() {
        let mut rows = rows();
        sort_candidates(&mut rows, "score", false);
        let names: Vec<_> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["SHELLY", "BULL", "COLT"]);

        sort_candidates(&mut rows, "score", true);
        let names: Vec<_> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["BULL", "SHELLY", "COLT"]);
    }

    #[test]
    fn test_top_upgrades_skip_unrated() {
        let top = top_upgrades(&rows(), 5);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].name, "BULL");
        assert_eq!(top_upgrades(&rows(), 1).len(), 1);
    }

    #[test]
    fn test_score_bands() {
        assert_eq!(ScoreBand::of(Some(72.5)), ScoreBand::Excellent);
        assert_eq!(ScoreBand::of(Some(60.0)), ScoreBand::Good);
        assert_eq!(ScoreBand::of(Some(35.0)), ScoreBand::Fair);
        assert_eq!(ScoreBand::of(Some(20.0)), ScoreBand::Low);
        assert_eq!(ScoreBand::of(None), ScoreBand::Unrated);
    }
}
