//! Integration tests for the de-duplicating image cache.
//!
//! Covers request sharing, soft failure, clearing and preloading against a
//! gated fake fetcher, then the same paths end to end over data URLs, files
//! and HTTP.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use futures::future::join_all;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use draft_companion::image_cache::is_object_url;
use draft_companion::{AssetFetcher, CacheConfig, FetchedAsset, ImageCache, LoadError};

// ─────────────────────── helpers ───────────────────────

fn make_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::DynamicImage::new_rgb8(width, height);
    let mut buf = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut buf);
    img.write_with_encoder(encoder).unwrap();
    buf
}

/// Fake fetcher that counts calls per source and can hold every fetch until
/// the test opens the gate.
struct GatedFetcher {
    calls: Mutex<HashMap<String, usize>>,
    failing: HashSet<String>,
    gate: Option<Semaphore>,
}

impl GatedFetcher {
    fn open() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(HashMap::new()),
            failing: HashSet::new(),
            gate: None,
        })
    }

    fn gated() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(HashMap::new()),
            failing: HashSet::new(),
            gate: Some(Semaphore::new(0)),
        })
    }

    fn failing_on(sources: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(HashMap::new()),
            failing: sources.iter().map(|s| s.to_string()).collect(),
            gate: None,
        })
    }

    fn calls(&self, source: &str) -> usize {
        self.calls.lock().get(source).copied().unwrap_or(0)
    }

    fn release(&self, permits: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(permits);
        }
    }
}

#[async_trait]
impl AssetFetcher for GatedFetcher {
    async fn fetch(&self, source: &str) -> Result<FetchedAsset, LoadError> {
        *self.calls.lock().entry(source.to_string()).or_default() += 1;

        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }

        if self.failing.contains(source) {
            return Err(LoadError::Status(404));
        }

        Ok(FetchedAsset {
            bytes: Bytes::from(make_png(2, 2)),
            content_type: Some("image/png".to_string()),
        })
    }
}

/// Fetcher that panics on its first call and succeeds afterwards.
#[derive(Default)]
struct PanicOnceFetcher {
    calls: Mutex<usize>,
}

#[async_trait]
impl AssetFetcher for PanicOnceFetcher {
    async fn fetch(&self, _source: &str) -> Result<FetchedAsset, LoadError> {
        let call = {
            let mut calls = self.calls.lock();
            *calls += 1;
            *calls
        };
        if call == 1 {
            panic!("fetcher blew up");
        }
        Ok(FetchedAsset {
            bytes: Bytes::from(make_png(2, 2)),
            content_type: None,
        })
    }
}

fn cache_with(fetcher: Arc<GatedFetcher>) -> ImageCache {
    ImageCache::with_fetcher(CacheConfig::default(), fetcher)
}

/// Poll `cond` until it holds, failing the test after two seconds.
async fn wait_for(mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !cond() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

// ─────────────────────── fake fetcher ───────────────────────

#[tokio::test]
async fn test_01_concurrent_requests_share_one_fetch() {
    let fetcher = GatedFetcher::gated();
    let cache = cache_with(fetcher.clone());

    let loads = join_all((0..10).map(|_| cache.request_load("https://cdn/shelly.png")));
    let opener = async {
        wait_for(|| fetcher.calls("https://cdn/shelly.png") == 1).await;
        assert_eq!(cache.stats().in_flight, 1);
        fetcher.release(1);
    };
    let (results, ()) = tokio::join!(loads, opener);

    assert_eq!(fetcher.calls("https://cdn/shelly.png"), 1);
    assert!(results.iter().all(|r| r == &results[0]));
    assert!(is_object_url(&results[0]));
    assert_eq!(cache.stats().in_flight, 0);
    println!("TEST 01 — concurrent requests share one fetch: PASS");
}

#[tokio::test]
async fn test_02_peek_before_and_after_load() {
    let fetcher = GatedFetcher::open();
    let cache = cache_with(fetcher.clone());
    let source = "https://cdn/colt.png";

    assert_eq!(cache.peek(source), source);
    assert!(!cache.is_ready(source));
    assert!(cache.open(source).is_none());

    let resolved = cache.request_load(source).await;
    assert_ne!(resolved, source);
    assert_eq!(cache.peek(source), resolved);
    assert!(cache.is_ready(source));

    let asset = cache.open(&resolved).unwrap();
    assert_eq!(asset.source, source);
    assert_eq!((asset.width, asset.height), (2, 2));
    assert_eq!(cache.open(source).unwrap().object_url, resolved);

    // Cached: no second fetch.
    assert_eq!(cache.request_load(source).await, resolved);
    assert_eq!(fetcher.calls(source), 1);
    println!("TEST 02 — peek before and after load: PASS");
}

#[tokio::test]
async fn test_03_failure_falls_back_and_is_not_cached() {
    let fetcher = GatedFetcher::failing_on(&["https://cdn/missing.png"]);
    let cache = cache_with(fetcher.clone());
    let source = "https://cdn/missing.png";

    assert_eq!(cache.request_load(source).await, source);
    assert_eq!(cache.peek(source), source);
    assert_eq!(cache.stats().resolved, 0);
    assert_eq!(cache.stats().in_flight, 0);

    assert_eq!(cache.try_load(source).await, Err(LoadError::Status(404)));
    assert_eq!(fetcher.calls(source), 2);
    println!("TEST 03 — failure falls back and is retried: PASS");
}

#[tokio::test]
async fn test_04_clear_revokes_handles() {
    let fetcher = GatedFetcher::open();
    let cache = cache_with(fetcher.clone());

    let a = cache.request_load("a.png").await;
    let b = cache.request_load("b.png").await;
    assert_eq!(cache.stats().resolved, 2);
    assert!(cache.stats().retained_bytes > 0);

    assert_eq!(cache.clear(), 2);
    assert_eq!(cache.peek("a.png"), "a.png");
    assert!(cache.open(&a).is_none());
    assert!(cache.open(&b).is_none());
    assert!(!cache.is_ready("b.png"));
    assert_eq!(cache.stats().retained_bytes, 0);

    // A fresh load fetches again and issues a new handle.
    let again = cache.request_load("a.png").await;
    assert_ne!(again, a);
    assert_eq!(fetcher.calls("a.png"), 2);
    assert_eq!(cache.clear(), 1);
    assert_eq!(cache.clear(), 0);
    println!("TEST 04 — clear revokes handles: PASS");
}

#[tokio::test]
async fn test_05_clear_during_load_does_not_repopulate() {
    let fetcher = GatedFetcher::gated();
    let cache = cache_with(fetcher.clone());
    let source = "https://cdn/bull.png";

    let pending = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.try_load(source).await })
    };
    wait_for(|| fetcher.calls(source) == 1).await;

    assert_eq!(cache.clear(), 0);
    assert_eq!(cache.stats().in_flight, 0);
    fetcher.release(1);

    assert_eq!(pending.await.unwrap(), Err(LoadError::Cleared));
    assert_eq!(cache.peek(source), source);
    assert_eq!(cache.stats().resolved, 0);
    println!("TEST 05 — clear during load does not repopulate: PASS");
}

#[tokio::test]
async fn test_06_request_after_clear_starts_new_load() {
    let fetcher = GatedFetcher::gated();
    let cache = cache_with(fetcher.clone());
    let source = "https://cdn/poco.png";

    let stale = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.request_load(source).await })
    };
    wait_for(|| fetcher.calls(source) == 1).await;
    cache.clear();

    let fresh = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.request_load(source).await })
    };
    wait_for(|| fetcher.calls(source) == 2).await;
    fetcher.release(2);

    assert_eq!(stale.await.unwrap(), source);
    let fresh = fresh.await.unwrap();
    assert!(is_object_url(&fresh));
    assert_eq!(cache.peek(source), fresh);
    println!("TEST 06 — request after clear starts a new load: PASS");
}

#[tokio::test]
async fn test_07_preload_all_settles_everything() {
    let fetcher = GatedFetcher::failing_on(&["bad.png"]);
    let cache = cache_with(fetcher.clone());

    let report = cache
        .preload_all(["good.png", "bad.png", "good.png", "other.png"])
        .await;
    assert_eq!(report.requested, 4);
    assert_eq!(report.resolved, 3);
    assert_eq!(report.fell_back, 1);
    assert_eq!(fetcher.calls("good.png"), 1);
    assert!(cache.is_ready("other.png"));
    assert!(!cache.is_ready("bad.png"));

    let empty = cache.preload_all(Vec::<String>::new()).await;
    assert_eq!(empty.requested, 0);
    println!("TEST 07 — preload_all settles everything: PASS");
}

#[tokio::test]
async fn test_08_aborted_caller_does_not_cancel_load() {
    let fetcher = GatedFetcher::gated();
    let cache = cache_with(fetcher.clone());
    let source = "https://cdn/piper.png";

    let caller = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.request_load(source).await })
    };
    wait_for(|| fetcher.calls(source) == 1).await;
    caller.abort();
    fetcher.release(1);

    wait_for(|| cache.is_ready(source)).await;
    assert_eq!(fetcher.calls(source), 1);
    println!("TEST 08 — aborted caller does not cancel load: PASS");
}

#[tokio::test]
async fn test_09_slow_fetch_times_out() {
    let fetcher = GatedFetcher::gated();
    let config = CacheConfig {
        timeout: Duration::from_millis(50),
        ..Default::default()
    };
    let cache = ImageCache::with_fetcher(config, fetcher);

    let result = cache.try_load("slow.png").await;
    assert_eq!(result, Err(LoadError::Timeout(Duration::from_millis(50))));
    assert_eq!(cache.request_load("slow.png").await, "slow.png");
    println!("TEST 09 — slow fetch times out: PASS");
}

// ─────────────────────── default fetcher ───────────────────────

#[tokio::test]
async fn test_10_data_url_and_file_sources() {
    let cache = ImageCache::new(CacheConfig::default()).unwrap();
    let png = make_png(4, 3);

    let data_url = format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(&png)
    );
    let resolved = cache.request_load(&data_url).await;
    assert!(is_object_url(&resolved));
    assert_eq!(cache.open(&resolved).unwrap().width, 4);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("icon.png");
    std::fs::write(&path, &png).unwrap();
    let source = path.to_str().unwrap();
    let resolved = cache.request_load(source).await;
    let asset = cache.open(&resolved).unwrap();
    assert_eq!(asset.bytes.len(), png.len());
    assert_eq!(asset.mime.as_deref(), Some("image/png"));

    let missing = dir.path().join("missing.png");
    let missing = missing.to_str().unwrap();
    assert_eq!(cache.request_load(missing).await, missing);
    println!("TEST 10 — data URL and file sources: PASS");
}

#[tokio::test]
async fn test_11_http_requests_deduplicated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/brawlers/shelly.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(make_png(8, 8))
                .insert_header("content-type", "image/png")
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let cache = ImageCache::new(CacheConfig::default()).unwrap();
    let url = format!("{}/brawlers/shelly.png", server.uri());
    let results = join_all((0..5).map(|_| cache.request_load(&url))).await;

    assert!(results.iter().all(|r| r == &results[0]));
    assert!(is_object_url(&results[0]));
    assert_eq!(cache.open(&url).unwrap().height, 8);
    println!("TEST 11 — HTTP requests de-duplicated: PASS");
}

#[tokio::test]
async fn test_12_http_failures_fall_back() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page.png"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/huge.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(make_png(64, 64)))
        .mount(&server)
        .await;

    let config = CacheConfig {
        max_asset_bytes: 32,
        ..Default::default()
    };
    let cache = ImageCache::new(config).unwrap();

    let missing = format!("{}/missing.png", server.uri());
    assert_eq!(cache.try_load(&missing).await, Err(LoadError::Status(404)));
    assert_eq!(cache.request_load(&missing).await, missing);

    let page = format!("{}/page.png", server.uri());
    assert!(matches!(cache.try_load(&page).await, Err(LoadError::Decode(_))));

    let huge = format!("{}/huge.png", server.uri());
    assert!(matches!(
        cache.try_load(&huge).await,
        Err(LoadError::TooLarge { max: 32, .. })
    ));

    assert_eq!(cache.stats().resolved, 0);
    println!("TEST 12 — HTTP failures fall back: PASS");
}

#[tokio::test]
async fn test_13_panicking_load_is_retried() {
    let fetcher = Arc::new(PanicOnceFetcher::default());
    let cache = ImageCache::with_fetcher(CacheConfig::default(), fetcher.clone());

    assert_eq!(cache.try_load("x.png").await, Err(LoadError::Cancelled));
    assert_eq!(cache.stats().in_flight, 0);
    assert_eq!(cache.peek("x.png"), "x.png");

    let resolved = cache.try_load("x.png").await.unwrap();
    assert!(is_object_url(&resolved));
    assert_eq!(*fetcher.calls.lock(), 2);
    assert_eq!(cache.stats().in_flight, 0);
    println!("TEST 13 — panicking load is retried: PASS");
}

#[tokio::test]
async fn test_14_oversized_http_body_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/banner.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 64 * 1024]))
        .mount(&server)
        .await;

    let config = CacheConfig {
        max_asset_bytes: 1024,
        ..Default::default()
    };
    let cache = ImageCache::new(config).unwrap();
    let url = format!("{}/banner.png", server.uri());

    match cache.try_load(&url).await {
        Err(LoadError::TooLarge { size, max }) => {
            assert_eq!(max, 1024);
            assert!(size > max);
        }
        other => panic!("expected size rejection, got {other:?}"),
    }
    assert_eq!(cache.request_load(&url).await, url);
    assert_eq!(cache.stats().retained_bytes, 0);
    println!("TEST 14 — oversized HTTP body not cached: PASS");
}
