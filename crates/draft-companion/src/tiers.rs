//! Statistical tier banding for scored entities.
//!
//! Scores are partitioned around the mean in units of the population
//! standard deviation, so the resulting tiers read the same regardless of the
//! absolute scale the upstream service reports.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Brawler, ScoredEntity};

/// Lower bounds of S..E in standard deviations from the mean. F is unbounded.
const TIER_OFFSETS: [f64; 6] = [1.5, 0.8, 0.3, -0.3, -0.8, -1.5];

/// Letter tier, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    S,
    A,
    B,
    C,
    D,
    E,
    F,
}

impl Tier {
    /// All tiers from highest to lowest.
    pub const ALL: [Tier; 7] = [Tier::S, Tier::A, Tier::B, Tier::C, Tier::D, Tier::E, Tier::F];

    pub fn label(self) -> &'static str {
        match self {
            Tier::S => "S",
            Tier::A => "A",
            Tier::B => "B",
            Tier::C => "C",
            Tier::D => "D",
            Tier::E => "E",
            Tier::F => "F",
        }
    }

    /// Display colour of the tier row.
    pub fn color(self) -> &'static str {
        match self {
            Tier::S => "#ef4444",
            Tier::A => "#f97316",
            Tier::B => "#eab308",
            Tier::C => "#22c55e",
            Tier::D => "#3b82f6",
            Tier::E => "#6366f1",
            Tier::F => "#6b7280",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Members of one tier, sorted by descending score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierBucket {
    pub tier: Tier,
    pub members: Vec<ScoredEntity>,
}

/// The full seven-tier partition of an input list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierList {
    pub buckets: Vec<TierBucket>,
    pub mean: f64,
    pub std_dev: f64,
}

/// A tier member joined with its roster entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierRow {
    pub tier: Tier,
    pub name: String,
    pub score: f64,
    pub image_url: String,
}

impl TierList {
    fn empty() -> Self {
        Self {
            buckets: Tier::ALL
                .iter()
                .map(|&tier| TierBucket {
                    tier,
                    members: Vec::new(),
                })
                .collect(),
            mean: 0.0,
            std_dev: 0.0,
        }
    }

    pub fn bucket(&self, tier: Tier) -> &TierBucket {
        &self.buckets[tier.index()]
    }

    /// Buckets with at least one member, in tier order.
    pub fn non_empty(&self) -> impl Iterator<Item = &TierBucket> {
        self.buckets.iter().filter(|b| !b.members.is_empty())
    }

    /// Tier of the first member with the given name.
    pub fn tier_of(&self, name: &str) -> Option<Tier> {
        self.buckets
            .iter()
            .find(|b| b.members.iter().any(|m| m.name == name))
            .map(|b| b.tier)
    }

    /// Total number of classified entities.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(|b| b.members.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Join members to roster entries by case-insensitive name.
    ///
    /// Members without a roster entry are skipped.
    pub fn with_roster(&self, roster: &[Brawler]) -> Vec<TierRow> {
        self.buckets
            .iter()
            .flat_map(|bucket| {
                bucket.members.iter().filter_map(move |member| {
                    roster
                        .iter()
                        .find(|b| b.name.eq_ignore_ascii_case(&member.name))
                        .map(|b| TierRow {
                            tier: bucket.tier,
                            name: member.name.clone(),
                            score: member.score,
                            image_url: b.image_url.clone(),
                        })
                })
            })
            .collect()
    }

    /// Image sources of every member found in the roster, in display order.
    pub fn image_sources(&self, roster: &[Brawler]) -> Vec<String> {
        self.with_roster(roster)
            .into_iter()
            .map(|row| row.image_url)
            .collect()
    }
}

/// Partition `entities` into the seven letter tiers.
///
/// Entities are stably sorted by descending score and each one is placed in
/// the highest tier whose lower bound it meets. With zero spread every entity
/// sits at the mean and is placed in C.
pub fn classify(entities: &[ScoredEntity]) -> TierList {
    let mut list = TierList::empty();
    if entities.is_empty() {
        return list;
    }

    let spread = Spread::of(entities);
    list.mean = spread.mean * spread.scale;
    list.std_dev = spread.std_dev * spread.scale;

    let mut sorted: Vec<&ScoredEntity> = entities.iter().collect();
    sorted.sort_by(|a, b| descending(a.score, b.score));

    let bounds = TIER_OFFSETS.map(|k| spread.mean + k * spread.std_dev);

    for entity in sorted {
        let tier = if entity.score.is_nan() {
            Tier::F
        } else if spread.std_dev == 0.0 {
            Tier::C
        } else {
            let score = entity.score / spread.scale;
            bounds
                .iter()
                .position(|&bound| score >= bound)
                .map_or(Tier::F, |i| Tier::ALL[i])
        };
        list.buckets[tier.index()].members.push(entity.clone());
    }

    list
}

/// Population mean and standard deviation of the non-NaN scores.
///
/// Both are kept in units of `scale`, a power of two near the largest
/// magnitude, so huge scores neither overflow the sum nor the squared
/// deviations. Dividing by a power of two is exact.
struct Spread {
    mean: f64,
    std_dev: f64,
    scale: f64,
}

impl Spread {
    fn of(entities: &[ScoredEntity]) -> Self {
        let scores: Vec<f64> = entities
            .iter()
            .map(|e| e.score)
            .filter(|s| !s.is_nan())
            .collect();
        let Some(&first) = scores.first() else {
            return Self::flat(0.0);
        };
        // Summing equal values can leave a rounding residue in the mean.
        if scores.iter().all(|&s| s == first) {
            return Self::flat(first);
        }

        let max_abs = scores.iter().fold(0.0_f64, |m, s| m.max(s.abs()));
        let scale = if max_abs.is_finite() && max_abs > 0.0 {
            2f64.powi((max_abs.log2().ceil() as i32).clamp(-1022, 1023))
        } else {
            1.0
        };

        let n = scores.len() as f64;
        let mean = scores.iter().map(|s| s / scale).sum::<f64>() / n;
        let variance = scores
            .iter()
            .map(|s| (s / scale - mean).powi(2))
            .sum::<f64>()
            / n;
        Self {
            mean,
            std_dev: variance.sqrt(),
            scale,
        }
    }

    fn flat(mean: f64) -> Self {
        Self {
            mean,
            std_dev: 0.0,
            scale: 1.0,
        }
    }
}

/// Descending order with NaN last.
fn descending(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}
