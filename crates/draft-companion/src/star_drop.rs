//! Star drop loot simulation.
//!
//! A drop first picks a rarity by cumulative chance, then a reward within that
//! rarity. Reward probabilities are normalised per rarity, so a table whose
//! rewards do not sum exactly to one still behaves as a distribution.

use std::collections::BTreeMap;
use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::types::{CompanionError, CompanionResult};

/// Tolerance for chance tables that should sum to one.
const SUM_TOLERANCE: f64 = 1e-3;

/// Icon used for items missing from the image table.
pub const UNKNOWN_ITEM_IMAGE: &str = "notfound.png";

/// Drop rarity. Ordered from most to least valuable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Rarity {
    Legendary,
    Mythic,
    Epic,
    #[serde(rename = "Super Rare")]
    SuperRare,
    Rare,
}

impl Rarity {
    pub fn name(self) -> &'static str {
        match self {
            Rarity::Legendary => "Legendary",
            Rarity::Mythic => "Mythic",
            Rarity::Epic => "Epic",
            Rarity::SuperRare => "Super Rare",
            Rarity::Rare => "Rare",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Rarity::Legendary => "#fff12c",
            Rarity::Mythic => "#fe5e72",
            Rarity::Epic => "#c13bf3",
            Rarity::SuperRare => "#65bb5c",
            Rarity::Rare => "#5eb6e6",
        }
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reward {
    pub item: String,
    pub probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RarityTable {
    pub rarity: Rarity,
    pub chance: f64,
    pub rewards: Vec<Reward>,
}

/// One opened drop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StarDrop {
    pub id: String,
    pub rarity: Rarity,
    pub reward: String,
}

/// Aggregated counts over many drops.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DropSummary {
    pub total: usize,
    pub by_rarity: BTreeMap<Rarity, usize>,
    pub by_reward: BTreeMap<Rarity, BTreeMap<String, usize>>,
}

impl DropSummary {
    pub fn record(&mut self, drop: &StarDrop) {
        self.total += 1;
        *self.by_rarity.entry(drop.rarity).or_default() += 1;
        *self
            .by_reward
            .entry(drop.rarity)
            .or_default()
            .entry(drop.reward.clone())
            .or_default() += 1;
    }

    /// Share of drops that landed in `rarity`.
    pub fn rate(&self, rarity: Rarity) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.by_rarity.get(&rarity).copied().unwrap_or(0) as f64 / self.total as f64
    }
}

/// The full rarity and reward table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropTable {
    pub rarities: Vec<RarityTable>,
}

impl DropTable {
    /// The in-game star drop odds.
    pub fn standard() -> Self {
        fn table(rarity: Rarity, chance: f64, rewards: &[(&str, f64)]) -> RarityTable {
            RarityTable {
                rarity,
                chance,
                rewards: rewards
                    .iter()
                    .map(|(item, probability)| Reward {
                        item: item.to_string(),
                        probability: *probability,
                    })
                    .collect(),
            }
        }

        Self {
            rarities: vec![
                table(
                    Rarity::Rare,
                    0.50,
                    &[
                        ("50 Coins", 0.419),
                        ("25 Power Points", 0.326),
                        ("100 XP Doublers", 0.209),
                        ("20 Bling", 0.023),
                        ("10 Credits", 0.023),
                    ],
                ),
                table(
                    Rarity::SuperRare,
                    0.28,
                    &[
                        ("100 Coins", 0.4238),
                        ("50 Power Points", 0.3311),
                        ("30 Credits", 0.0331),
                        ("50 Bling", 0.0331),
                        ("Random Common Pin", 0.0331),
                        ("Random Spray", 0.0132),
                        ("XP Doubler", 0.1325),
                    ],
                ),
                table(
                    Rarity::Epic,
                    0.15,
                    &[
                        ("200 Coins", 0.2105),
                        ("100 Power Points", 0.2105),
                        ("Random Rare Skin", 0.0526),
                        ("Random Rare Brawler", 0.0526),
                        ("Random Common Pin", 0.1579),
                        ("Random Rare Pin", 0.0526),
                        ("Random Spray", 0.1579),
                    ],
                ),
                table(
                    Rarity::Mythic,
                    0.05,
                    &[
                        ("500 Coins", 0.0949),
                        ("200 Power Points", 0.1899),
                        ("Random Gadget", 0.1582),
                        ("Random Rare Skin", 0.1582),
                        ("Random Super Rare Brawler", 0.0949),
                        ("Random Epic Brawler", 0.0633),
                        ("Random Mythic Brawler", 0.019),
                        ("Random Common Pin", 0.1579),
                        ("Random Rare Pin", 0.0633),
                        ("Random Epic Pin", 0.0316),
                        ("Random Spray", 0.0633),
                        ("Random Profile Picture", 0.0633),
                    ],
                ),
                table(
                    Rarity::Legendary,
                    0.02,
                    &[
                        ("Random Star Power", 0.2717),
                        ("Random Hypercharge", 0.1630),
                        ("Random Epic Skin", 0.0217),
                        ("Random Super Rare Skin", 0.3587),
                        ("Random Epic Brawler", 0.1087),
                        ("Random Mythic Brawler", 0.0543),
                        ("Random Legendary Brawler", 0.0217),
                    ],
                ),
            ],
        }
    }

    /// Check that the table can be rolled: rarity chances sum to one and every
    /// rarity has at least one positively weighted reward.
    pub fn validate(&self) -> CompanionResult<()> {
        if self.rarities.is_empty() {
            return Err(CompanionError::InvalidInput(
                "drop table has no rarities".to_string(),
            ));
        }

        let total: f64 = self.rarities.iter().map(|r| r.chance).sum();
        if (total - 1.0).abs() > SUM_TOLERANCE {
            return Err(CompanionError::InvalidInput(format!(
                "rarity chances sum to {total}, expected 1"
            )));
        }

        for table in &self.rarities {
            let weight: f64 = table.rewards.iter().map(|r| r.probability).sum();
            if weight <= 0.0 {
                return Err(CompanionError::InvalidInput(format!(
                    "{} has no rewards",
                    table.rarity
                )));
            }
        }

        Ok(())
    }

    /// Open one drop.
    ///
    /// A roll past the last cumulative bound (floating-point shortfall) lands
    /// in the last rarity or reward.
    pub fn roll<R: Rng>(&self, rng: &mut R) -> CompanionResult<StarDrop> {
        let roll: f64 = rng.gen();
        let mut cumulative = 0.0;
        let table = self
            .rarities
            .iter()
            .find(|t| {
                cumulative += t.chance;
                roll < cumulative
            })
            .or_else(|| self.rarities.last())
            .ok_or_else(|| CompanionError::InvalidInput("drop table has no rarities".to_string()))?;

        let total: f64 = table.rewards.iter().map(|r| r.probability).sum();
        if total <= 0.0 {
            return Err(CompanionError::InvalidInput(format!(
                "{} has no rewards",
                table.rarity
            )));
        }

        let roll: f64 = rng.gen();
        let mut cumulative = 0.0;
        let reward = table
            .rewards
            .iter()
            .find(|r| {
                cumulative += r.probability / total;
                roll < cumulative
            })
            .or_else(|| table.rewards.last())
            .ok_or_else(|| {
                CompanionError::InvalidInput(format!("{} has no rewards", table.rarity))
            })?;

        Ok(StarDrop {
            id: uuid::Uuid::new_v4().to_string(),
            rarity: table.rarity,
            reward: reward.item.clone(),
        })
    }

    /// Open `count` drops and aggregate the results.
    pub fn simulate<R: Rng>(&self, count: usize, rng: &mut R) -> CompanionResult<DropSummary> {
        self.validate()?;
        let mut summary = DropSummary::default();
        for _ in 0..count {
            summary.record(&self.roll(rng)?);
        }
        tracing::debug!("Simulated {count} star drops");
        Ok(summary)
    }
}

impl Default for DropTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// Icon file for a reward item.
pub fn reward_image(item: &str) -> &'static str {
    match item {
        "50 Coins" | "100 Coins" | "200 Coins" | "500 Coins" => "coin.png",
        "25 Power Points" | "50 Power Points" | "100 Power Points" | "200 Power Points" => {
            "power_points.png"
        }
        "100 XP Doublers" | "XP Doubler" => "xp_doubler.png",
        "20 Bling" | "50 Bling" => "blings.png",
        "10 Credits" | "30 Credits" => "credits.png",
        "Random Common Pin" | "Random Rare Pin" | "Random Epic Pin" => "pin.png",
        "Random Spray" => "spray.png",
        "Random Rare Skin" | "Random Super Rare Skin" => "rare_skin.png",
        "Random Epic Skin" => "epic_skin.png",
        "Random Rare Brawler" | "Random Super Rare Brawler" => "rare_brawler.png",
        "Random Epic Brawler" => "epic_brawler.png",
        "Random Mythic Brawler" => "mythic_brawler.png",
        "Random Legendary Brawler" => "legendary_brawler.png",
        "Random Gadget" => "gadget.png",
        "Random Star Power" => "star_power.png",
        "Random Hypercharge" => "hypercharge.png",
        "Random Profile Picture" => "profil_icon.png",
        _ => UNKNOWN_ITEM_IMAGE,
    }
}
