//! Media download and upload
//!
//! Downloads a media file (falling back to its thumbnail when the original is
//! unavailable), classifies it as image or generic file, records the pixel
//! size of images as blob metadata, stores it and counts it.

use crate::blob::{BlobMetadata, BlobStore};
use crate::crawler::dimensions::{image_dimensions, Dimensions};
use crate::crawler::fetcher::HttpClient;
use crate::metrics::{record_best_effort, MetricsSink};
use crate::model::{MediaKind, MediaRef, Site};
use crate::Result;
use bytes::Bytes;
use std::sync::Arc;

const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "gif", "bmp", "webp"];

/// Outcome of storing one media file
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMedia {
    pub key: String,
    pub is_image: bool,
    pub dimensions: Option<Dimensions>,
    pub size: usize,
}

/// Whether a blob key names an image by its extension
pub fn is_image_key(key: &str) -> bool {
    key.rsplit_once('.')
        .map(|(_, ext)| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// Blob metadata recording the pixel size of an image
pub fn dimension_metadata(dimensions: Dimensions) -> BlobMetadata {
    let mut metadata = BlobMetadata::new();
    metadata.insert("width".to_string(), dimensions.width.to_string());
    metadata.insert("height".to_string(), dimensions.height.to_string());
    metadata
}

#[derive(Clone)]
pub struct MediaArchiver {
    http: HttpClient,
    blobs: Arc<dyn BlobStore>,
    metrics: Arc<dyn MetricsSink>,
}

impl MediaArchiver {
    pub fn new(http: HttpClient, blobs: Arc<dyn BlobStore>, metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            http,
            blobs,
            metrics,
        }
    }

    /// Downloads `media` and stores it under `key`
    ///
    /// A server error on the primary URL is retried once against the fallback
    /// URL, whose bytes land on the same key. Any other failure is returned as
    /// an item-level error.
    pub async fn archive(&self, site: Site, key: &str, media: &MediaRef) -> Result<StoredMedia> {
        let primary = self.http.fetch_bytes(&media.fetch_url, &media.headers).await;

        let (content_type, body) = match &media.fallback_url {
            Some(fallback) if primary.is_server_error() => {
                tracing::warn!(
                    "[{}] WARNING: Retrieval of image {} failed. Falling back to thumbnail image...",
                    site,
                    media.fetch_url
                );
                self.http
                    .fetch_bytes(fallback, &media.headers)
                    .await
                    .into_body(fallback)?
            }
            _ => primary.into_body(&media.fetch_url)?,
        };

        self.store(site, key, media.kind, content_type.as_deref(), body)
            .await
    }

    /// Stores already downloaded bytes
    pub async fn store(
        &self,
        site: Site,
        key: &str,
        kind: MediaKind,
        content_type: Option<&str>,
        body: Bytes,
    ) -> Result<StoredMedia> {
        let is_image = match kind {
            MediaKind::Image => true,
            MediaKind::File => false,
            MediaKind::Auto => {
                is_image_key(key) || content_type.map_or(false, |ct| ct.starts_with("image/"))
            }
        };

        let size = body.len();
        let dimensions = if is_image {
            image_dimensions(&body)
        } else {
            None
        };

        let metadata = match dimensions {
            Some(dimensions) => dimension_metadata(dimensions),
            None => {
                if is_image {
                    tracing::debug!("[{}] Could not read dimensions of {}", site, key);
                }
                BlobMetadata::new()
            }
        };

        tracing::info!(
            "[{}] Uploading {} as {} (size = {})",
            site,
            key,
            if is_image { "image" } else { "file" },
            size
        );
        self.blobs.put(key, body, metadata).await?;

        let counter = if is_image {
            site.image_counter()
        } else {
            site.file_counter()
        };
        record_best_effort(self.metrics.as_ref(), &counter, 1).await;

        Ok(StoredMedia {
            key: key.to_string(),
            is_image,
            dimensions,
            size,
        })
    }
}
