use crate::index::KnownIdIndex;
use crate::model::{SnapshotLayout, Visibility};
use serde::Deserialize;
use serde_json::json;

/// Either published shape of a snapshot
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SnapshotDocument {
    Flat(Vec<String>),
    Partitioned {
        #[serde(default)]
        public: Vec<String>,
        #[serde(default)]
        private: Vec<String>,
    },
}

/// Serializes an index in the given layout
pub fn encode_snapshot(index: &KnownIdIndex, layout: SnapshotLayout) -> Vec<u8> {
    let document = match layout {
        SnapshotLayout::Flat => json!(index.ids(None)),
        SnapshotLayout::Partitioned => json!({
            "public": index.ids(Some(Visibility::Public)),
            "private": index.ids(Some(Visibility::Private)),
        }),
    };
    document.to_string().into_bytes()
}

/// Parses a snapshot of either layout
///
/// Snapshots do not record the restricted flag; every loaded ID is treated as
/// fully archived.
pub fn decode_snapshot(raw: &[u8]) -> Result<KnownIdIndex, serde_json::Error> {
    let mut index = KnownIdIndex::new();

    match serde_json::from_slice(raw)? {
        SnapshotDocument::Flat(ids) => {
            for id in ids {
                index.insert(id, Visibility::Public, false);
            }
        }
        SnapshotDocument::Partitioned { public, private } => {
            for id in public {
                index.insert(id, Visibility::Public, false);
            }
            for id in private {
                index.insert(id, Visibility::Private, false);
            }
        }
    }

    Ok(index)
}
