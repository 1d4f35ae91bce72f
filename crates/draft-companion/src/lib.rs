//! Draft companion — image caching, tier classification, the pick/ban board,
//! loot simulation and the local data cache behind the draft simulator
//! companion.

pub mod account;
pub mod api;
pub mod catalog;
pub mod draft;
pub mod image_cache;
pub mod snapshot;
pub mod star_drop;
pub mod tiers;
pub mod types;

pub use account::{PlayerTag, ScoreBand, UpgradeCandidate};
pub use api::{CompanionApi, DEFAULT_API_URL};
pub use catalog::Catalog;
pub use draft::{DraftBoard, DraftError, DraftMove, Side, Slot, Suggestion, WinRateBand};
pub use image_cache::{
    AssetFetcher, CacheConfig, CacheStats, FetchedAsset, ImageCache, LoadError, LocalAsset,
    PreloadReport, ResolvedRef, SourceFetcher,
};
pub use snapshot::{Snapshot, SnapshotReader, SnapshotWriter};
pub use star_drop::{DropSummary, DropTable, Rarity, StarDrop};
pub use tiers::{classify, Tier, TierBucket, TierList, TierRow};
pub use types::*;
