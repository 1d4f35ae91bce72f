//! Asset fetching for the image cache.
//!
//! [`SourceFetcher`] resolves a source string by scheme: `http(s)://` over
//! reqwest, `data:` URLs decoded in place, anything else as a local path.

use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::io::AsyncReadExt;

use super::CacheConfig;
use crate::types::CompanionResult;

/// Why a single asset load failed.
///
/// Cloneable so one failed load can be handed to every waiting caller.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Asset too large: {size} bytes exceeds {max} bytes")]
    TooLarge { size: usize, max: usize },

    #[error("Decode failed: {0}")]
    Decode(String),

    #[error("Invalid source: {0}")]
    InvalidSource(String),

    #[error("Cache was cleared while loading")]
    Cleared,

    #[error("Load task ended without a result")]
    Cancelled,
}

/// Raw bytes of a fetched asset.
#[derive(Debug, Clone)]
pub struct FetchedAsset {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

/// Retrieves the bytes behind a source string.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn fetch(&self, source: &str) -> Result<FetchedAsset, LoadError>;
}

/// Default fetcher dispatching on the source scheme.
///
/// HTTP bodies and files are read up to `max_asset_bytes`; anything larger
/// is rejected without buffering the rest.
#[derive(Clone)]
pub struct SourceFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl SourceFetcher {
    pub fn new(config: &CacheConfig) -> CompanionResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            max_bytes: config.max_asset_bytes,
        })
    }

    async fn fetch_http(&self, url: &str) -> Result<FetchedAsset, LoadError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| LoadError::Fetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if let Some(len) = response.content_length() {
            check_size(len, self.max_bytes)?;
        }

        let mut body = BytesMut::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| LoadError::Fetch(e.to_string()))?
        {
            append_limited(&mut body, &chunk, self.max_bytes)?;
        }

        Ok(FetchedAsset {
            bytes: body.freeze(),
            content_type,
        })
    }

    async fn fetch_file(&self, path: &str) -> Result<FetchedAsset, LoadError> {
        let file_err = |e: std::io::Error| LoadError::Fetch(format!("{path}: {e}"));

        let file = tokio::fs::File::open(path).await.map_err(file_err)?;
        let len = file.metadata().await.map_err(file_err)?.len();
        check_size(len, self.max_bytes)?;

        // The file may grow between the metadata call and the read.
        let mut bytes = Vec::with_capacity(len as usize);
        file.take(self.max_bytes as u64 + 1)
            .read_to_end(&mut bytes)
            .await
            .map_err(file_err)?;
        check_size(bytes.len() as u64, self.max_bytes)?;

        Ok(FetchedAsset {
            bytes: Bytes::from(bytes),
            content_type: None,
        })
    }
}

fn check_size(size: u64, max: usize) -> Result<(), LoadError> {
    if size > max as u64 {
        return Err(LoadError::TooLarge {
            size: usize::try_from(size).unwrap_or(usize::MAX),
            max,
        });
    }
    Ok(())
}

/// Append one body chunk, failing as soon as the running total passes `max`.
fn append_limited(body: &mut BytesMut, chunk: &[u8], max: usize) -> Result<(), LoadError> {
    let size = body.len() + chunk.len();
    if size > max {
        return Err(LoadError::TooLarge { size, max });
    }
    body.extend_from_slice(chunk);
    Ok(())
}

#[async_trait]
impl AssetFetcher for SourceFetcher {
    async fn fetch(&self, source: &str) -> Result<FetchedAsset, LoadError> {
        if source.is_empty() {
            return Err(LoadError::InvalidSource("empty source".to_string()));
        }

        if source.starts_with("http://") || source.starts_with("https://") {
            self.fetch_http(source).await
        } else if let Some(rest) = source.strip_prefix("data:") {
            decode_data_url(rest)
        } else {
            let path = source.strip_prefix("file://").unwrap_or(source);
            self.fetch_file(path).await
        }
    }
}

/// Decode the part of a `data:` URL after the scheme. Only base64 payloads
/// are supported.
fn decode_data_url(rest: &str) -> Result<FetchedAsset, LoadError> {
    use base64::Engine;

    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| LoadError::InvalidSource("data URL without payload".to_string()))?;

    let mime = meta
        .strip_suffix(";base64")
        .ok_or_else(|| LoadError::InvalidSource("data URL is not base64".to_string()))?;

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| LoadError::InvalidSource(format!("Invalid base64: {e}")))?;

    Ok(FetchedAsset {
        bytes: Bytes::from(bytes),
        content_type: (!mime.is_empty()).then(|| mime.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_data_url() {
        let asset = decode_data_url("image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(&asset.bytes[..], b"hello");
        assert_eq!(asset.content_type.as_deref(), Some("image/png"));
    }

    #[test]
    fn test_decode_data_url_rejects_plain_text() {
        assert!(matches!(
            decode_data_url("text/plain,hello"),
            Err(LoadError::InvalidSource(_))
        ));
        assert!(matches!(
            decode_data_url("image/png;base64"),
            Err(LoadError::InvalidSource(_))
        ));
        assert!(matches!(
            decode_data_url("image/png;base64,@@@"),
            Err(LoadError::InvalidSource(_))
        ));
    }

    #[test]
    fn test_append_limited_stops_at_max() {
        let mut body = BytesMut::new();
        append_limited(&mut body, &[0; 6], 10).unwrap();
        append_limited(&mut body, &[0; 4], 10).unwrap();
        assert_eq!(body.len(), 10);

        let err = append_limited(&mut body, &[0; 1], 10).unwrap_err();
        assert_eq!(err, LoadError::TooLarge { size: 11, max: 10 });
        assert_eq!(body.len(), 10);
    }

    #[tokio::test]
    async fn test_missing_file_fails() {
        let fetcher = SourceFetcher::new(&CacheConfig::default()).unwrap();
        let result = fetcher.fetch("/definitely/not/here.png").await;
        assert!(matches!(result, Err(LoadError::Fetch(_))));
    }

    #[tokio::test]
    async fn test_oversized_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.bin");
        std::fs::write(&path, vec![7u8; 100]).unwrap();

        let config = CacheConfig {
            max_asset_bytes: 64,
            ..Default::default()
        };
        let fetcher = SourceFetcher::new(&config).unwrap();
        let result = fetcher.fetch(path.to_str().unwrap()).await;
        assert_eq!(result.unwrap_err(), LoadError::TooLarge { size: 100, max: 64 });

        std::fs::write(&path, vec![7u8; 64]).unwrap();
        let asset = fetcher.fetch(path.to_str().unwrap()).await.unwrap();
        assert_eq!(asset.bytes.len(), 64);
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/big.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 4096]))
            .mount(&server)
            .await;

        let config = CacheConfig {
            max_asset_bytes: 1024,
            ..Default::default()
        };
        let fetcher = SourceFetcher::new(&config).unwrap();
        let result = fetcher.fetch(&format!("{}/big.png", server.uri())).await;
        assert!(matches!(
            result,
            Err(LoadError::TooLarge { size, max: 1024 }) if size > 1024
        ));
    }

    #[tokio::test]
    async fn test_empty_source_is_invalid() {
        let fetcher = SourceFetcher::new(&CacheConfig::default()).unwrap();
        assert!(matches!(
            fetcher.fetch("").await,
            Err(LoadError::InvalidSource(_))
        ));
    }
}
