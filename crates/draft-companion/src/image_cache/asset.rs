//! Locally retained assets and their object URL handles.

use std::io::Cursor;

use bytes::Bytes;
use image::{GenericImageView, ImageFormat};

use super::fetch::{FetchedAsset, LoadError};

/// Scheme prefix of every handle issued by the cache.
pub const OBJECT_URL_PREFIX: &str = "blob:draft-companion/";

/// An asset held in memory after a successful load.
#[derive(Debug, Clone)]
pub struct LocalAsset {
    /// The source string the asset was requested by.
    pub source: String,
    /// Handle naming this asset while the cache retains it.
    pub object_url: String,
    pub bytes: Bytes,
    pub mime: Option<String>,
    pub width: u32,
    pub height: u32,
}

impl LocalAsset {
    /// Build a retained asset from fetched bytes.
    ///
    /// With `verify_decode` the full image is decoded so corrupt payloads are
    /// rejected; otherwise only the header is read for dimensions.
    pub(crate) fn from_fetched(
        source: &str,
        fetched: FetchedAsset,
        verify_decode: bool,
    ) -> Result<Self, LoadError> {
        let format = image::guess_format(&fetched.bytes).ok();
        let mime = format
            .map(|f| f.to_mime_type().to_string())
            .or(fetched.content_type);

        let (width, height) = if verify_decode {
            decode_dimensions(&fetched.bytes, format)?
        } else {
            header_dimensions(&fetched.bytes).unwrap_or((0, 0))
        };

        Ok(Self {
            source: source.to_string(),
            object_url: new_object_url(),
            bytes: fetched.bytes,
            mime,
            width,
            height,
        })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Whether `reference` is a handle issued by the cache.
pub fn is_object_url(reference: &str) -> bool {
    reference.starts_with(OBJECT_URL_PREFIX)
}

fn new_object_url() -> String {
    format!("{OBJECT_URL_PREFIX}{}", uuid::Uuid::new_v4())
}

fn decode_dimensions(bytes: &[u8], format: Option<ImageFormat>) -> Result<(u32, u32), LoadError> {
    let img = match format {
        Some(fmt) => image::load_from_memory_with_format(bytes, fmt),
        None => image::load_from_memory(bytes),
    }
    .map_err(|e| LoadError::Decode(e.to_string()))?;
    Ok(img.dimensions())
}

fn header_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}
