//! Companion session lifecycle: snapshot file I/O, the shared image cache and
//! the upstream client.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};

use draft_companion::{
    classify, Brawler, CacheConfig, CompanionApi, DraftBoard, ImageCache, PlayerTag,
    PreloadReport, ScoredEntity, Side, Slot, Snapshot, SnapshotReader, SnapshotWriter, TierList,
    UpgradeCandidate,
};

use crate::types::{CliError, CliResult, DraftAdvice, SyncReport};

const DEFAULT_AUTO_SAVE_SECS: u64 = 30;

/// Snapshot entry holding the remembered account tag.
pub const PLAYER_TAG_KEY: &str = "player_tag";

/// Tier list requests kept in flight at once during a sync.
const SYNC_CONCURRENCY: usize = 4;

/// Owns the snapshot, the single image cache and the backend client.
pub struct CompanionSession {
    snapshot: Snapshot,
    cache: ImageCache,
    api: CompanionApi,
    file_path: PathBuf,
    dirty: bool,
    last_save: Instant,
    auto_save_interval: Duration,
}

impl CompanionSession {
    /// Open or create a snapshot file at the given path.
    pub fn open(path: &str, api_url: &str, cache_config: CacheConfig) -> CliResult<Self> {
        let file_path = PathBuf::from(path);

        let snapshot = if file_path.exists() {
            tracing::info!("Opening existing snapshot: {}", file_path.display());
            SnapshotReader::read_from_file(&file_path)?
        } else {
            tracing::info!("Creating new snapshot: {}", file_path.display());
            Snapshot::new()
        };

        let api = CompanionApi::new(api_url, cache_config.timeout)?;
        let cache = ImageCache::new(cache_config)?;

        tracing::info!(
            "Session ready. Snapshot has {} brawlers, {} maps, tier data for {} maps. Backend: {}",
            snapshot.catalog.brawlers.len(),
            snapshot.catalog.maps.len(),
            snapshot.tier_data.len(),
            api.base_url()
        );

        Ok(Self {
            snapshot,
            cache,
            api,
            file_path,
            dirty: false,
            last_save: Instant::now(),
            auto_save_interval: Duration::from_secs(DEFAULT_AUTO_SAVE_SECS),
        })
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// The process-wide image cache.
    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    pub fn api(&self) -> &CompanionApi {
        &self.api
    }

    pub fn file_path(&self) -> &PathBuf {
        &self.file_path
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Refresh the catalog, latest version and tier data from upstream.
    ///
    /// With an empty `maps` every catalog map is refreshed. A failed tier list
    /// is reported in the result and keeps its previously cached data.
    pub async fn sync(&mut self, maps: &[String]) -> CliResult<SyncReport> {
        let catalog = self.api.catalog().await?;
        let latest = match self.api.latest_version().await {
            Ok(version) => version,
            Err(e) => {
                tracing::warn!("Could not fetch game versions: {e}");
                self.snapshot.latest_version.clone()
            }
        };

        let targets: Vec<String> = if maps.is_empty() {
            catalog.maps.iter().map(|m| m.name.clone()).collect()
        } else {
            maps.iter()
                .map(|m| {
                    catalog
                        .find_map(m)
                        .map(|found| found.name.clone())
                        .unwrap_or_else(|| m.clone())
                })
                .collect()
        };

        let api = self.api.clone();
        let results: Vec<(String, _)> = stream::iter(targets)
            .map(|map| {
                let api = api.clone();
                async move {
                    let result = api.tier_list(&map).await;
                    (map, result)
                }
            })
            .buffered(SYNC_CONCURRENCY)
            .collect()
            .await;

        let mut report = SyncReport {
            brawlers: catalog.brawlers.len(),
            maps: catalog.maps.len(),
            version: latest.as_ref().map(|v| v.version.clone()),
            ..Default::default()
        };
        for (map, result) in results {
            match result {
                Ok(scores) => {
                    self.snapshot.tier_data.insert(map, scores);
                    report.tier_maps += 1;
                }
                Err(e) => {
                    tracing::warn!("Tier data for {map} failed: {e}");
                    report.failed.push(map);
                }
            }
        }

        self.snapshot.catalog = catalog;
        self.snapshot.latest_version = latest;
        self.dirty = true;
        self.maybe_auto_save()?;

        tracing::info!(
            "Synced {} brawlers, {} maps, tier data for {} maps ({} failed)",
            report.brawlers,
            report.maps,
            report.tier_maps,
            report.failed.len()
        );
        Ok(report)
    }

    /// Classified tier list for `map`, fetched upstream when not cached or
    /// when `refresh` is set.
    pub async fn tier_list(&mut self, map: &str, refresh: bool) -> CliResult<TierList> {
        if map.trim().is_empty() {
            return Err(CliError::InvalidArgs("map name is empty".to_string()));
        }

        let cached = if refresh {
            None
        } else {
            self.snapshot.tier_data_for(map).map(|s| s.to_vec())
        };

        let scores = match cached {
            Some(scores) => scores,
            None => self.fetch_tier_data(map).await?,
        };
        Ok(classify(&scores))
    }

    async fn fetch_tier_data(&mut self, map: &str) -> CliResult<Vec<ScoredEntity>> {
        let name = self.resolve_map(map)?;
        let scores = self.api.tier_list(&name).await?;
        self.snapshot.tier_data.insert(name, scores.clone());
        self.dirty = true;
        self.maybe_auto_save()?;
        Ok(scores)
    }

    /// Catalog spelling of `map`. Any name passes while the catalog is empty.
    pub fn resolve_map(&self, map: &str) -> CliResult<String> {
        if map.trim().is_empty() {
            return Err(CliError::InvalidArgs("map name is empty".to_string()));
        }
        match self.snapshot.catalog.find_map(map) {
            Some(found) => Ok(found.name.clone()),
            None if self.snapshot.catalog.maps.is_empty() => Ok(map.to_string()),
            None => Err(CliError::UnknownMap(map.to_string())),
        }
    }

    /// Roster entry for `name`, ignoring case.
    pub fn brawler(&self, name: &str) -> CliResult<Brawler> {
        self.snapshot
            .catalog
            .find_brawler(name)
            .cloned()
            .ok_or_else(|| CliError::UnknownBrawler(name.to_string()))
    }

    /// Board for `map` with the named picks and bans, all looked up in the
    /// catalog. Bans are placed first.
    pub fn build_board(
        &self,
        map: &str,
        team_a: &[String],
        team_b: &[String],
        bans: &[String],
    ) -> CliResult<DraftBoard> {
        let mut board = DraftBoard::new();
        board.set_map(self.resolve_map(map)?);

        board.set_ban_mode(true);
        for name in bans {
            self.place(&mut board, name, Side::A)?;
        }
        board.set_ban_mode(false);

        for (side, names) in [(Side::A, team_a), (Side::B, team_b)] {
            for name in names {
                self.place(&mut board, name, side)?;
            }
        }
        Ok(board)
    }

    /// Select `name` once; naming it again is an error rather than an undo.
    fn place(&self, board: &mut DraftBoard, name: &str, side: Side) -> CliResult<()> {
        let brawler = self.brawler(name)?;
        let repeated = match board.slot_of(&brawler.name) {
            Slot::Banned => board.ban_mode(),
            Slot::Team(current) => current == side && !board.ban_mode(),
            Slot::Available => false,
        };
        if repeated {
            return Err(CliError::InvalidArgs(format!("{} is listed twice", brawler.name)));
        }
        board.select(&brawler, side)?;
        Ok(())
    }

    /// The remembered account tag, if one is stored and still valid.
    pub fn player_tag(&self) -> Option<PlayerTag> {
        self.recall(PLAYER_TAG_KEY)
            .and_then(|raw| PlayerTag::parse(raw).ok())
    }

    /// Validate and remember an account tag.
    pub fn set_player_tag(&mut self, raw: &str) -> CliResult<PlayerTag> {
        let tag = PlayerTag::parse(raw)?;
        self.remember(PLAYER_TAG_KEY, tag.as_str())?;
        Ok(tag)
    }

    /// Ask the backend for pick suggestions and, when both teams are full, a
    /// win rate.
    ///
    /// With a tag, suggestions are limited to that account's brawlers. An
    /// account lookup failure only drops the filter.
    pub async fn advise(
        &self,
        board: &DraftBoard,
        tag: Option<&PlayerTag>,
    ) -> CliResult<DraftAdvice> {
        let available = match tag {
            Some(tag) => match self.api.account_brawlers(tag).await {
                Ok(names) => Some(names),
                Err(e) => {
                    tracing::warn!("Could not load account {tag}, suggesting from the full roster: {e}");
                    None
                }
            },
            None => None,
        };
        let account_filtered = available.is_some();

        let request = board.draft_request(available)?;
        let suggestions = self.api.simulate_draft(&request).await?;
        let win_rate = match board.win_rate_request() {
            Some(request) => self.api.predict_win_rate(&request).await?,
            None => None,
        };

        tracing::debug!(
            "Draft on {}: {} suggestions, win rate {:?}",
            request.map,
            suggestions.len(),
            win_rate
        );
        Ok(DraftAdvice {
            suggestions,
            win_rate,
            account_filtered,
        })
    }

    /// Upgrade recommendations for an account.
    pub async fn upgrades(&self, tag: &PlayerTag) -> CliResult<Vec<UpgradeCandidate>> {
        Ok(self.api.upgrade_helper(tag).await?)
    }

    /// Warm the cache with every brawler and map image.
    pub async fn preload_roster(&self) -> PreloadReport {
        let sources = self.snapshot.catalog.image_sources();
        tracing::info!("Preloading {} catalog images", sources.len());
        self.cache.preload_all(sources).await
    }

    /// Warm the cache with the images shown for `tiers`.
    pub async fn preload_tiers(&self, tiers: &TierList) -> PreloadReport {
        self.cache
            .preload_all(tiers.image_sources(&self.snapshot.catalog.brawlers))
            .await
    }

    /// Remember a free-form value across runs.
    pub fn remember(&mut self, key: &str, value: &str) -> CliResult<()> {
        self.snapshot.set(key, value);
        self.dirty = true;
        self.maybe_auto_save()
    }

    pub fn recall(&self, key: &str) -> Option<&str> {
        self.snapshot.get(key)
    }

    /// Save the snapshot to file.
    pub fn save(&mut self) -> CliResult<()> {
        if !self.dirty {
            return Ok(());
        }

        self.snapshot.saved_at = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        SnapshotWriter::write_to_file(&self.snapshot, &self.file_path)?;

        self.dirty = false;
        self.last_save = Instant::now();
        tracing::debug!("Saved snapshot: {}", self.file_path.display());
        Ok(())
    }

    fn maybe_auto_save(&mut self) -> CliResult<()> {
        if self.dirty && self.last_save.elapsed() >= self.auto_save_interval {
            self.save()?;
        }
        Ok(())
    }
}

impl Drop for CompanionSession {
    fn drop(&mut self) {
        if self.dirty {
            if let Err(e) = self.save() {
                tracing::error!("Failed to save on drop: {e}");
            }
        }
    }
}
