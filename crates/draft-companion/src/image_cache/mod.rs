//! De-duplicating image cache.
//!
//! Many views ask for the same image independently and at the same time. The
//! cache keeps one shared load per source, retains finished assets behind an
//! object URL handle, and never surfaces a failed load as an error to the
//! soft-failing entry points: those resolve to the original source instead,
//! so a consumer can still hand it to its own native loader.
//!
//! The cache is an explicit object. Construct it once at startup and pass
//! clones around; all clones share the same maps.

mod asset;
mod fetch;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::channel::oneshot;
use futures::future::{join_all, FutureExt, Shared};
use parking_lot::Mutex;

use crate::types::CompanionResult;

pub use asset::{is_object_url, LocalAsset, OBJECT_URL_PREFIX};
pub use fetch::{AssetFetcher, FetchedAsset, LoadError, SourceFetcher};

/// Locally usable reference to a loaded asset: an object URL on success, or
/// the original source after a soft failure.
pub type ResolvedRef = String;

type LoadChannel = Shared<oneshot::Receiver<Result<ResolvedRef, LoadError>>>;

/// Default per-asset size limit.
const DEFAULT_MAX_ASSET_BYTES: usize = 16 * 1024 * 1024;

/// Default fetch timeout.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Tuning for asset loads.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub timeout: Duration,
    pub max_asset_bytes: usize,
    pub user_agent: String,
    /// Fully decode every asset and treat decode errors as load failures.
    pub verify_decode: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_asset_bytes: DEFAULT_MAX_ASSET_BYTES,
            user_agent: format!("draft-companion/{}", env!("CARGO_PKG_VERSION")),
            verify_decode: true,
        }
    }
}

/// Point-in-time view of the cache contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct CacheStats {
    pub resolved: usize,
    pub in_flight: usize,
    pub retained_bytes: usize,
}

/// Outcome of [`ImageCache::preload_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct PreloadReport {
    pub requested: usize,
    pub resolved: usize,
    pub fell_back: usize,
}

#[derive(Default)]
struct CacheState {
    /// Bumped by `clear` so loads started earlier do not repopulate the maps.
    generation: u64,
    /// source -> retained asset
    resolved: HashMap<String, Arc<LocalAsset>>,
    /// object URL -> retained asset
    handles: HashMap<String, Arc<LocalAsset>>,
    /// source -> pending load shared by every waiting caller
    in_flight: HashMap<String, LoadChannel>,
}

struct Inner {
    config: CacheConfig,
    fetcher: Arc<dyn AssetFetcher>,
    state: Mutex<CacheState>,
}

/// Process-wide image cache handle.
#[derive(Clone)]
pub struct ImageCache {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ImageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (resolved, in_flight) = self
            .inner
            .state
            .try_lock()
            .map(|s| (s.resolved.len(), s.in_flight.len()))
            .unwrap_or_default();
        f.debug_struct("ImageCache")
            .field("config", &self.inner.config)
            .field("resolved", &resolved)
            .field("in_flight", &in_flight)
            .finish()
    }
}

impl ImageCache {
    /// Create a cache that fetches with the default [`SourceFetcher`].
    pub fn new(config: CacheConfig) -> CompanionResult<Self> {
        let fetcher = Arc::new(SourceFetcher::new(&config)?);
        Ok(Self::with_fetcher(config, fetcher))
    }

    /// Create a cache with a custom fetcher.
    pub fn with_fetcher(config: CacheConfig, fetcher: Arc<dyn AssetFetcher>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                fetcher,
                state: Mutex::new(CacheState::default()),
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Load `source`, falling back to `source` itself if the load fails.
    pub async fn request_load(&self, source: &str) -> ResolvedRef {
        match self.try_load(source).await {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::warn!("Image load failed for {source}, using original source: {e}");
                source.to_string()
            }
        }
    }

    /// Load `source` and report failures.
    ///
    /// Concurrent calls for the same source share a single fetch. The load
    /// runs on its own task, so dropping the returned future does not cancel
    /// it. Must be polled within a tokio runtime.
    pub async fn try_load(&self, source: &str) -> Result<ResolvedRef, LoadError> {
        let channel = {
            let mut state = self.inner.state.lock();
            if let Some(asset) = state.resolved.get(source) {
                return Ok(asset.object_url.clone());
            }
            let pending = state.in_flight.get(source).cloned();
            match pending {
                Some(channel) => {
                    tracing::trace!("Attaching to in-flight load: {source}");
                    channel
                }
                None => self.spawn_load(&mut state, source),
            }
        };

        match channel.await {
            Ok(result) => result,
            Err(oneshot::Canceled) => Err(LoadError::Cancelled),
        }
    }

    /// Synchronous lookup: the resolved reference if cached, else `source`.
    pub fn peek(&self, source: &str) -> ResolvedRef {
        self.inner
            .state
            .lock()
            .resolved
            .get(source)
            .map(|asset| asset.object_url.clone())
            .unwrap_or_else(|| source.to_string())
    }

    /// Whether `source` has finished loading successfully.
    pub fn is_ready(&self, source: &str) -> bool {
        self.inner.state.lock().resolved.contains_key(source)
    }

    /// Look up a retained asset by object URL or by original source.
    pub fn open(&self, reference: &str) -> Option<Arc<LocalAsset>> {
        let state = self.inner.state.lock();
        state
            .handles
            .get(reference)
            .or_else(|| state.resolved.get(reference))
            .cloned()
    }

    /// Load every source concurrently and wait until all have settled.
    pub async fn preload_all<I, S>(&self, sources: I) -> PreloadReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let sources: Vec<S> = sources.into_iter().collect();
        let results = join_all(sources.iter().map(|s| self.try_load(s.as_ref()))).await;

        let mut report = PreloadReport {
            requested: sources.len(),
            ..Default::default()
        };
        for (source, result) in sources.iter().zip(results) {
            match result {
                Ok(_) => report.resolved += 1,
                Err(e) => {
                    tracing::warn!("Preload failed for {}: {e}", source.as_ref());
                    report.fell_back += 1;
                }
            }
        }

        tracing::debug!(
            "Preloaded {} images ({} fell back to source)",
            report.requested,
            report.fell_back
        );
        report
    }

    /// Revoke every handle and forget all resolved and in-flight entries.
    ///
    /// Returns the number of released handles. Loads still running finish on
    /// their own but are not published into the cleared cache.
    pub fn clear(&self) -> usize {
        let mut state = self.inner.state.lock();
        state.generation += 1;
        let released = state.handles.len();
        state.handles.clear();
        state.resolved.clear();
        state.in_flight.clear();
        tracing::debug!("Image cache cleared, released {released} handles");
        released
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.inner.state.lock();
        CacheStats {
            resolved: state.resolved.len(),
            in_flight: state.in_flight.len(),
            retained_bytes: state.resolved.values().map(|a| a.len()).sum(),
        }
    }

    /// Start a load for `source` and register it as in flight.
    ///
    /// Must be called with the state lock held so no second load for the same
    /// key can be registered in between.
    fn spawn_load(&self, state: &mut CacheState, source: &str) -> LoadChannel {
        let (sender, receiver) = oneshot::channel();
        let channel = receiver.shared();
        state
            .in_flight
            .insert(source.to_string(), channel.clone());

        let token = InFlightToken {
            inner: Arc::clone(&self.inner),
            source: source.to_string(),
            generation: state.generation,
            sender: Some(sender),
        };

        tracing::debug!("Loading image: {source}");
        tokio::spawn(async move {
            let loaded = token.inner.load(&token.source).await;
            token.settle(loaded);
        });

        channel
    }
}

impl Inner {
    async fn load(&self, source: &str) -> Result<LocalAsset, LoadError> {
        let timeout = self.config.timeout;
        let fetched = tokio::time::timeout(timeout, self.fetcher.fetch(source))
            .await
            .map_err(|_| LoadError::Timeout(timeout))??;

        // Custom fetchers and data URLs are only checked here.
        let max = self.config.max_asset_bytes;
        if fetched.bytes.len() > max {
            return Err(LoadError::TooLarge {
                size: fetched.bytes.len(),
                max,
            });
        }

        let source = source.to_string();
        let verify_decode = self.config.verify_decode;
        tokio::task::spawn_blocking(move || {
            LocalAsset::from_fetched(&source, fetched, verify_decode)
        })
        .await
        .map_err(|e| LoadError::Decode(format!("decode task failed: {e}")))?
    }
}

/// Owns the in-flight entry and the result sender of one load.
///
/// Dropping an unsettled token removes the entry before waiters see
/// `Cancelled`, so a load task that panics or is dropped with its runtime
/// does not leave the source stuck behind a dead channel.
struct InFlightToken {
    inner: Arc<Inner>,
    source: String,
    generation: u64,
    sender: Option<oneshot::Sender<Result<ResolvedRef, LoadError>>>,
}

impl InFlightToken {
    fn settle(mut self, loaded: Result<LocalAsset, LoadError>) {
        let result = self.publish(loaded);
        if let Some(sender) = self.sender.take() {
            sender.send(result).ok();
        }
    }

    /// Move a finished load out of the in-flight map. Removal and insertion
    /// happen under one lock so callers either attach to the pending channel
    /// or find the resolved entry.
    fn publish(&self, loaded: Result<LocalAsset, LoadError>) -> Result<ResolvedRef, LoadError> {
        let mut state = self.inner.state.lock();
        if state.generation != self.generation {
            return Err(LoadError::Cleared);
        }
        state.in_flight.remove(&self.source);

        let asset = Arc::new(loaded?);
        let object_url = asset.object_url.clone();
        state
            .handles
            .insert(object_url.clone(), Arc::clone(&asset));
        state.resolved.insert(self.source.clone(), asset);
        tracing::debug!("Image ready: {} -> {object_url}", self.source);
        Ok(object_url)
    }
}

impl Drop for InFlightToken {
    fn drop(&mut self) {
        let Some(sender) = self.sender.take() else {
            return;
        };
        {
            let mut state = self.inner.state.lock();
            if state.generation == self.generation {
                state.in_flight.remove(&self.source);
            }
        }
        tracing::warn!("Image load for {} ended without a result", self.source);
        sender.send(Err(LoadError::Cancelled)).ok();
    }
}
