// Image loading: turns an image reference into a decoded raster

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use image::RgbaImage;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::errors::DecodeError;

/// A decoded image with known pixel dimensions.
#[derive(Debug, Clone)]
pub struct Raster {
    image: RgbaImage,
}

impl Raster {
    pub fn new(image: RgbaImage) -> Self {
        Raster { image }
    }

    pub fn pixel_width(&self) -> u32 {
        self.image.width()
    }

    pub fn pixel_height(&self) -> u32 {
        self.image.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.image
    }
}

/// Anything that can resolve an image reference to a raster.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn load(&self, reference: &str) -> Result<Raster, DecodeError>;
}

/// Loads data URLs, http(s) URLs, `file://` URLs and filesystem paths.
pub struct ImageLoader {
    asset_root: PathBuf,
    client: reqwest::Client,
}

impl ImageLoader {
    /// `asset_root` resolves site-absolute references like `/templates/x.png`.
    pub fn new(asset_root: impl Into<PathBuf>) -> Self {
        ImageLoader {
            asset_root: asset_root.into(),
            client: reqwest::Client::new(),
        }
    }

    async fn fetch(&self, reference: &str) -> Result<Vec<u8>, DecodeError> {
        let fetch_error = |reason: String| DecodeError::Fetch {
            reference: reference.to_string(),
            reason,
        };

        let response = self
            .client
            .get(reference)
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?
            .error_for_status()
            .map_err(|e| fetch_error(e.to_string()))?;

        let body = response
            .bytes()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;
        Ok(body.to_vec())
    }

    async fn read_file(&self, reference: &str) -> Result<Vec<u8>, DecodeError> {
        let path = self.resolve_path(reference);
        debug!("Reading image from {:?}", path);
        tokio::fs::read(&path).await.map_err(|source| DecodeError::Read {
            reference: reference.to_string(),
            source,
        })
    }

    fn resolve_path(&self, reference: &str) -> PathBuf {
        let raw = reference.strip_prefix("file://").unwrap_or(reference);
        // Drop cache busters like `?t=1712345678`
        let raw = raw.split(['?', '#']).next().unwrap_or(raw);

        if let Some(relative) = raw.strip_prefix('/') {
            let candidate = self.asset_root.join(relative);
            if candidate.exists() {
                return candidate;
            }
        }
        Path::new(raw).to_path_buf()
    }
}

#[async_trait]
impl ImageSource for ImageLoader {
    async fn load(&self, reference: &str) -> Result<Raster, DecodeError> {
        let bytes = if reference.starts_with("data:") {
            decode_data_url(reference)?
        } else if reference.starts_with("http://") || reference.starts_with("https://") {
            self.fetch(reference).await?
        } else if reference.is_empty() {
            return Err(DecodeError::UnsupportedReference {
                reference: reference.to_string(),
            });
        } else {
            self.read_file(reference).await?
        };

        decode_bytes(describe(reference), bytes).await
    }
}

/// Decode encoded image bytes on the blocking pool.
pub async fn decode_bytes(reference: String, bytes: Vec<u8>) -> Result<Raster, DecodeError> {
    let label = reference.clone();
    tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
        .await
        .map_err(|e| DecodeError::Corrupt {
            reference: label,
            reason: format!("decode task failed: {}", e),
        })?
        .map(|decoded| Raster::new(decoded.to_rgba8()))
        .map_err(|e| DecodeError::Corrupt {
            reference,
            reason: e.to_string(),
        })
}

/// Extract the payload of a `data:` URL.
pub fn decode_data_url(reference: &str) -> Result<Vec<u8>, DecodeError> {
    let rest = reference
        .strip_prefix("data:")
        .ok_or_else(|| DecodeError::InvalidDataUrl("missing data: prefix".to_string()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| DecodeError::InvalidDataUrl("missing ',' separator".to_string()))?;

    if header.split(';').any(|part| part.eq_ignore_ascii_case("base64")) {
        BASE64_STANDARD
            .decode(payload.trim())
            .map_err(|e| DecodeError::InvalidDataUrl(e.to_string()))
    } else {
        Ok(payload.as_bytes().to_vec())
    }
}

// Data URLs can be megabytes long; keep error messages readable
fn describe(reference: &str) -> String {
    if reference.starts_with("data:") {
        let header = reference.split(',').next().unwrap_or("data:");
        format!("{},…", header)
    } else {
        reference.to_string()
    }
}
