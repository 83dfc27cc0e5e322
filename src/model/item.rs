use crate::model::Visibility;
use serde_json::Value;

/// An entry of a remote feed, before its detail has been fetched
#[derive(Debug, Clone, PartialEq)]
pub struct ItemSummary {
    /// Site-native identifier
    pub id: String,

    /// Partition the item belongs to
    pub visibility: Visibility,

    /// Whether the content is locked for the current session
    pub restricted: bool,

    /// Raw listing payload, kept for adapters that need it to fetch the detail
    pub data: Value,
}

impl ItemSummary {
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            visibility: Visibility::Public,
            restricted: false,
            data,
        }
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_restricted(mut self, restricted: bool) -> Self {
        self.restricted = restricted;
        self
    }
}

/// A fully fetched item, ready to be persisted
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: String,
    pub visibility: Visibility,
    pub restricted: bool,
    pub body: Value,
}

impl Item {
    /// Builds an item that inherits identity and partition from its summary
    pub fn from_summary(summary: &ItemSummary, body: Value) -> Self {
        Self {
            id: summary.id.clone(),
            visibility: summary.visibility,
            restricted: summary.restricted,
            body,
        }
    }
}

/// How a downloaded media file should be stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Always an image; dimensions are recorded
    Image,
    /// Always an opaque file
    File,
    /// Decide from the key extension and response content type
    Auto,
}

/// A media file referenced by an item
#[derive(Debug, Clone, PartialEq)]
pub struct MediaRef {
    /// URL the storage key is derived from
    pub source_url: String,

    /// URL actually requested (may carry size parameters)
    pub fetch_url: String,

    /// Lower-resolution URL tried when the primary fails with a server error
    pub fallback_url: Option<String>,

    pub kind: MediaKind,

    /// Extra request headers (referer, cookies)
    pub headers: Vec<(String, String)>,
}

impl MediaRef {
    pub fn new(url: impl Into<String>, kind: MediaKind) -> Self {
        let url = url.into();
        Self {
            source_url: url.clone(),
            fetch_url: url,
            fallback_url: None,
            kind,
            headers: Vec::new(),
        }
    }

    pub fn with_fetch_url(mut self, fetch_url: impl Into<String>) -> Self {
        self.fetch_url = fetch_url.into();
        self
    }

    pub fn with_fallback(mut self, fallback_url: Option<String>) -> Self {
        self.fallback_url = fallback_url;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Last path segment of the source URL, without query or fragment
    pub fn filename(&self) -> Option<String> {
        url_basename(&self.source_url)
    }
}

/// Returns the last non-empty path segment of a URL
pub fn url_basename(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    parsed
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()
        .map(|segment| segment.to_string())
}
