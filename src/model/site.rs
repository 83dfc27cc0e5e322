use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A remote service that Hoard archives from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Site {
    Twitter,
    Pixiv,
    Fanbox,
    Poipiku,
    Booth,
}

/// Shape of the published known-ID snapshot for a site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotLayout {
    /// A flat JSON array of IDs
    Flat,
    /// `{"public": [...], "private": [...]}`
    Partitioned,
}

impl Site {
    pub const ALL: [Site; 5] = [
        Site::Twitter,
        Site::Pixiv,
        Site::Fanbox,
        Site::Poipiku,
        Site::Booth,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Twitter => "twitter",
            Self::Pixiv => "pixiv",
            Self::Fanbox => "fanbox",
            Self::Poipiku => "poipiku",
            Self::Booth => "booth",
        }
    }

    /// Key of the known-ID snapshot blob, e.g. `index/pixiv.json`
    pub fn snapshot_key(&self) -> String {
        format!("index/{}.json", self.as_str())
    }

    /// Blob key for a stored media file
    pub fn blob_key(&self, filename: &str) -> String {
        format!("{}/{}", self.as_str(), filename)
    }

    pub fn snapshot_layout(&self) -> SnapshotLayout {
        match self {
            Self::Pixiv | Self::Poipiku => SnapshotLayout::Partitioned,
            Self::Twitter | Self::Fanbox | Self::Booth => SnapshotLayout::Flat,
        }
    }

    /// Counter name for a saved image, e.g. `FanboxImageSaved`
    pub fn image_counter(&self) -> String {
        format!("{}ImageSaved", self.metric_prefix())
    }

    /// Counter name for a saved non-image file, e.g. `FanboxFileSaved`
    pub fn file_counter(&self) -> String {
        format!("{}FileSaved", self.metric_prefix())
    }

    fn metric_prefix(&self) -> &'static str {
        match self {
            Self::Twitter => "Twitter",
            Self::Pixiv => "Pixiv",
            Self::Fanbox => "Fanbox",
            Self::Poipiku => "Poipiku",
            Self::Booth => "Booth",
        }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Site {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Site::ALL
            .iter()
            .copied()
            .find(|site| site.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown site '{}'", s))
    }
}

/// Public/private partition of an archived item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

impl Visibility {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "public" => Some(Self::Public),
            "private" => Some(Self::Private),
            _ => None,
        }
    }
}
