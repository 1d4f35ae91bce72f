//! Roster and map catalog as shown to the user.

use serde::{Deserialize, Serialize};

use crate::types::{Brawler, GameMap};

/// Brawlers hidden from every view.
const EXCLUDED_BRAWLERS: &[&str] = &["Lumi"];

/// Upstream names replaced by their display name.
const RENAMED_BRAWLERS: &[(&str, &str)] = &[("LARRY & LAWRIE", "Larry")];

/// Normalised brawler roster and map list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub brawlers: Vec<Brawler>,
    pub maps: Vec<GameMap>,
}

impl Catalog {
    /// Build a catalog from raw upstream lists.
    ///
    /// Excluded brawlers are dropped, renamed ones get their display name,
    /// brawlers are sorted by name and maps by game mode then name.
    pub fn normalise(brawlers: Vec<Brawler>, maps: Vec<GameMap>) -> Self {
        let mut brawlers: Vec<Brawler> = brawlers
            .into_iter()
            .filter(|b| !EXCLUDED_BRAWLERS.contains(&b.name.as_str()))
            .map(|mut b| {
                if let Some((_, display)) = RENAMED_BRAWLERS.iter().find(|(raw, _)| *raw == b.name) {
                    b.name = display.to_string();
                }
                b
            })
            .collect();
        brawlers.sort_by(|a, b| a.name.cmp(&b.name));

        let mut maps = maps;
        maps.sort_by(|a, b| {
            a.game_mode
                .cmp(&b.game_mode)
                .then_with(|| a.name.cmp(&b.name))
        });

        Self { brawlers, maps }
    }

    /// Case-insensitive brawler lookup.
    pub fn find_brawler(&self, name: &str) -> Option<&Brawler> {
        self.brawlers
            .iter()
            .find(|b| b.name.eq_ignore_ascii_case(name))
    }

    pub fn find_map(&self, name: &str) -> Option<&GameMap> {
        self.maps.iter().find(|m| m.name.eq_ignore_ascii_case(name))
    }

    /// Every brawler and map image, skipping blanks.
    pub fn image_sources(&self) -> Vec<String> {
        self.brawlers
            .iter()
            .map(|b| b.image_url.clone())
            .chain(self.maps.iter().map(|m| m.image_url.clone()))
            .filter(|url| !url.is_empty())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.brawlers.is_empty() && self.maps.is_empty()
    }
}
