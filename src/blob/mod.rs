//! Blob storage for media files and index snapshots
//!
//! Objects are addressed by slash-separated keys (`pixiv/123_p0.png`,
//! `index/pixiv.json`) and carry a small string metadata map (image
//! `width`/`height`). The crawler only talks to the [`BlobStore`] trait; the
//! filesystem backend keeps the archive usable without a cloud bucket.

mod fs;
mod signing;

pub use fs::FsBlobStore;
pub use signing::UrlSigner;

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// String metadata attached to a stored object
pub type BlobMetadata = BTreeMap<String, String>;

/// Errors that can occur in a blob store
#[derive(Debug, Error)]
pub enum BlobError {
    #[error("Invalid blob key '{0}'")]
    InvalidKey(String),

    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Cannot sign URL: {0}")]
    Signing(String),

    #[error("Corrupt metadata for {key}: {message}")]
    Metadata { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for blob store operations
pub type BlobResult<T> = Result<T, BlobError>;

/// Size and metadata of a stored object
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectHead {
    pub key: String,
    pub size: u64,
    pub metadata: BlobMetadata,
}

impl ObjectHead {
    /// Parses a numeric metadata field such as `width`
    pub fn dimension(&self, name: &str) -> Option<u32> {
        self.metadata.get(name).and_then(|v| v.parse().ok())
    }
}

/// An object store keyed by string paths
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores an object, replacing any previous object and metadata at `key`
    async fn put(&self, key: &str, bytes: Bytes, metadata: BlobMetadata) -> BlobResult<()>;

    /// Reads an object; `None` when it does not exist
    async fn get(&self, key: &str) -> BlobResult<Option<Bytes>>;

    /// Lists the keys starting with `prefix`, sorted
    async fn list(&self, prefix: &str) -> BlobResult<Vec<String>>;

    /// Reads size and metadata without the body
    async fn head(&self, key: &str) -> BlobResult<Option<ObjectHead>>;

    /// Replaces the metadata of an existing object, keeping its body
    async fn copy_with_metadata(&self, key: &str, metadata: BlobMetadata) -> BlobResult<()>;

    /// Time-limited URL for reading an object
    fn signed_url(&self, key: &str, ttl: Duration) -> BlobResult<String>;
}

/// Rejects keys that are empty or would escape the store
pub fn validate_key(key: &str) -> BlobResult<()> {
    if key.is_empty() || key.starts_with('/') || key.contains('\\') {
        return Err(BlobError::InvalidKey(key.to_string()));
    }

    if key
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(BlobError::InvalidKey(key.to_string()));
    }

    Ok(())
}
