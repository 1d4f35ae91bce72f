//! Configuration loading and resolution.

use std::path::PathBuf;
use std::time::Duration;

use draft_companion::{CacheConfig, DEFAULT_API_URL};

/// Env var naming the snapshot file.
pub const SNAPSHOT_ENV: &str = "DRAFT_COMPANION_SNAPSHOT";

/// Env var overriding the backend base URL.
pub const API_URL_ENV: &str = "DRAFT_COMPANION_API_URL";

/// Env var overriding the fetch timeout, in whole seconds.
pub const FETCH_TIMEOUT_ENV: &str = "DRAFT_COMPANION_FETCH_TIMEOUT_SECS";

/// Resolve the snapshot file path.
pub fn resolve_snapshot_path(explicit: Option<&str>) -> String {
    if let Some(path) = explicit {
        return path.to_string();
    }

    if let Ok(env_path) = std::env::var(SNAPSHOT_ENV) {
        return env_path;
    }

    let cwd_snapshot = PathBuf::from(".draft-companion/snapshot.dcsn");
    if cwd_snapshot.exists() {
        return cwd_snapshot.display().to_string();
    }

    resolve_default_snapshot_path()
}

fn resolve_default_snapshot_path() -> String {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());

    format!("{home}/.draft-companion/snapshot.dcsn")
}

/// Resolve the backend base URL, without a trailing slash.
pub fn resolve_api_url(explicit: Option<&str>) -> String {
    let url = explicit
        .map(str::to_string)
        .or_else(|| std::env::var(API_URL_ENV).ok())
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());
    url.trim_end_matches('/').to_string()
}

/// Cache settings from the environment.
pub fn cache_config_from_env() -> CacheConfig {
    cache_config_with_timeout(std::env::var(FETCH_TIMEOUT_ENV).ok().as_deref())
}

/// Cache settings with an optional timeout override in seconds. Unparsable
/// or zero values keep the default.
pub fn cache_config_with_timeout(timeout_secs: Option<&str>) -> CacheConfig {
    let mut config = CacheConfig::default();
    if let Some(raw) = timeout_secs {
        match raw.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => config.timeout = Duration::from_secs(secs),
            _ => tracing::warn!("Ignoring invalid {FETCH_TIMEOUT_ENV}={raw}"),
        }
    }
    config
}
