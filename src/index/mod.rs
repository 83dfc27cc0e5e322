//! Known-ID index
//!
//! The set of item IDs already archived for one site. It is rebuilt from the
//! entry store (or loaded from a published snapshot) at the start of a run,
//! mutated in memory by the crawl loop, and republished periodically.

mod builder;
mod snapshot;

pub use builder::{load_or_rebuild, publish, rebuild, SCAN_PAGE_SIZE};
pub use snapshot::{decode_snapshot, encode_snapshot};

use crate::model::Visibility;
use std::collections::HashMap;

/// What the index remembers about an archived item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KnownEntry {
    pub visibility: Visibility,
    /// The item was archived while its content was locked
    pub restricted: bool,
}

/// Archived IDs of one site
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KnownIdIndex {
    entries: HashMap<String, KnownEntry>,
}

impl KnownIdIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<KnownEntry> {
        self.entries.get(id).copied()
    }

    /// Records an ID, replacing what was known about it
    pub fn insert(&mut self, id: impl Into<String>, visibility: Visibility, restricted: bool) {
        self.entries.insert(
            id.into(),
            KnownEntry {
                visibility,
                restricted,
            },
        );
    }

    /// Sorted IDs, optionally limited to one partition
    pub fn ids(&self, visibility: Option<Visibility>) -> Vec<String> {
        let mut ids: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| visibility.map_or(true, |v| entry.visibility == v))
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }
}
