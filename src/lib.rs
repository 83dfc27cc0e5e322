//! Hoard: an incremental archival crawler
//!
//! This crate pages through the private bookmark and timeline feeds of a handful
//! of sites, downloads whatever has not been archived yet, and persists metadata
//! into an entry store and media into blob storage. A known-ID index keeps runs
//! from downloading the same item twice.

pub mod blob;
pub mod config;
pub mod crawler;
pub mod index;
pub mod metrics;
pub mod model;
pub mod output;
pub mod sites;
pub mod storage;
pub mod views;

use thiserror::Error;

/// Main error type for Hoard operations
#[derive(Debug, Error)]
pub enum HoardError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Unexpected status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Unexpected response shape from {context}: {message}")]
    UnexpectedShape { context: String, message: String },

    #[error("No session registered for {0}")]
    MissingSession(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Blob store error: {0}")]
    Blob(#[from] blob::BlobError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Upload worker failed: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HoardError {
    /// Whether this failure only concerns the item being processed.
    ///
    /// Item-level failures skip the current item and let the run continue.
    /// Everything else aborts the run.
    pub fn is_item_level(&self) -> bool {
        matches!(
            self,
            Self::Http { .. } | Self::Status { .. } | Self::Reqwest(_)
        )
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Hoard operations
pub type Result<T> = std::result::Result<T, HoardError>;

// Re-export commonly used types
pub use config::Config;
pub use model::{Item, ItemSummary, MediaKind, MediaRef, Site, Visibility};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_errors_are_item_level() {
        let err = HoardError::Status {
            url: "https://example.com/a.png".to_string(),
            status: 404,
        };
        assert!(err.is_item_level());
    }

    #[test]
    fn test_shape_errors_are_fatal() {
        let err = HoardError::UnexpectedShape {
            context: "pixiv bookmarks".to_string(),
            message: "missing body".to_string(),
        };
        assert!(!err.is_item_level());
        assert!(!HoardError::MissingSession("pixiv".to_string()).is_item_level());
    }
}
