//! Core data types shared across the companion library.

use serde::{Deserialize, Serialize};

/// A named entity with an upstream performance score.
///
/// Upstream tier endpoints send `[name, score]` pairs; the object form
/// `{"name": .., "score": ..}` is accepted as well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ScoredEntityRepr")]
pub struct ScoredEntity {
    pub name: String,
    pub score: f64,
}

impl ScoredEntity {
    pub fn new(name: impl Into<String>, score: f64) -> Self {
        Self {
            name: name.into(),
            score,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScoredEntityRepr {
    Pair(String, f64),
    Object { name: String, score: f64 },
}

impl From<ScoredEntityRepr> for ScoredEntity {
    fn from(repr: ScoredEntityRepr) -> Self {
        match repr {
            ScoredEntityRepr::Pair(name, score) | ScoredEntityRepr::Object { name, score } => {
                Self { name, score }
            }
        }
    }
}

/// A playable character in the roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Brawler {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub name: String,
    pub image_url: String,
}

/// A map in the rotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameMap {
    pub name: String,
    #[serde(default)]
    pub game_mode: String,
    #[serde(default)]
    pub image_url: String,
}

/// A balance patch as reported by the upstream service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameVersion {
    pub version: String,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub ranked_maps: Vec<String>,
}

/// Errors that can occur in the companion library.
#[derive(thiserror::Error, Debug)]
pub enum CompanionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream returned {status} for {endpoint}")]
    Upstream { endpoint: String, status: u16 },

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Convenience result type.
pub type CompanionResult<T> = Result<T, CompanionError>;
