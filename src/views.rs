//! Read views and maintenance over the archive
//!
//! - [`random_entries`] samples archived entries of a site together with
//!   signed URLs of their media
//! - [`backfill_dimensions`] rewrites the `width`/`height` metadata of every
//!   stored image

use crate::blob::BlobStore;
use crate::config::IndexSource;
use crate::crawler::dimensions::image_dimensions;
use crate::crawler::media::{dimension_metadata, is_image_key};
use crate::index;
use crate::model::{Site, Visibility};
use crate::storage::{lock, EntryStore, SharedStorage};
use crate::Result;
use rand::seq::IndexedRandom;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// Largest sample [`random_entries`] returns
pub const MAX_SAMPLE: usize = 100;

/// A stored media file, readable through a signed URL
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaView {
    pub key: String,
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// An archived entry with its media
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryView {
    pub id: String,
    pub visibility: Visibility,
    pub entry: Value,
    pub media: Vec<MediaView>,
}

/// Clamps a requested sample size into `1..=MAX_SAMPLE`
pub fn clamp_count(requested: usize) -> usize {
    requested.clamp(1, MAX_SAMPLE)
}

/// Page number of a pixiv-style key such as `pixiv/100_p3.png`
fn page_number(key: &str) -> Option<u32> {
    let (_, rest) = key.rsplit_once("_p")?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Samples up to `count` archived entries of `site`
///
/// IDs are drawn from the published snapshot (rebuilt when missing),
/// optionally from one visibility partition only. Entries archived while
/// restricted are left out.
pub async fn random_entries(
    storage: &SharedStorage,
    blobs: &dyn BlobStore,
    site: Site,
    visibility: Option<Visibility>,
    count: usize,
    url_ttl: Duration,
) -> Result<Vec<EntryView>> {
    let known = index::load_or_rebuild(storage, blobs, site, IndexSource::Snapshot).await?;
    let ids = known.ids(visibility);

    let sampled: Vec<String> = {
        let mut rng = rand::rng();
        ids.choose_multiple(&mut rng, clamp_count(count))
            .cloned()
            .collect()
    };
    tracing::debug!("[{}] Sampled {} of {} ids", site, sampled.len(), ids.len());

    let entries = lock(storage)?.get_entries(site, &sampled)?;

    let mut views = Vec::with_capacity(entries.len());
    for entry in entries.into_iter().filter(|entry| !entry.restricted) {
        let mut keys = entry.media_keys.clone();
        if keys.is_empty() {
            keys = blobs.list(&format!("{}/{}_", site, entry.id)).await?;
            keys.sort_by_key(|key| page_number(key));
        }

        let mut media = Vec::with_capacity(keys.len());
        for key in keys {
            let head = match blobs.head(&key).await? {
                Some(head) => head,
                None => {
                    tracing::debug!("[{}] Media {} is not stored", site, key);
                    continue;
                }
            };
            media.push(MediaView {
                url: blobs.signed_url(&key, url_ttl)?,
                width: head.dimension("width"),
                height: head.dimension("height"),
                key,
            });
        }

        views.push(EntryView {
            id: entry.id,
            visibility: entry.visibility,
            entry: entry.body,
            media,
        });
    }

    Ok(views)
}

/// Totals of a dimension backfill
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub updated: usize,
    /// Objects that are not images or could not be decoded
    pub skipped: usize,
    pub failed: usize,
}

/// Recomputes the dimension metadata of every stored image
///
/// Snapshots under `index/` are ignored. A failure on one object is logged
/// and does not stop the backfill.
pub async fn backfill_dimensions(blobs: &dyn BlobStore) -> Result<BackfillReport> {
    let keys = blobs.list("").await?;
    tracing::info!("Retrieved {} objects", keys.len());

    let mut report = BackfillReport::default();
    for key in keys.iter().filter(|key| !key.starts_with("index/")) {
        if !is_image_key(key) {
            report.skipped += 1;
            continue;
        }

        tracing::debug!("Processing image {}", key);
        match backfill_one(blobs, key).await {
            Ok(true) => report.updated += 1,
            Ok(false) => {
                tracing::warn!("Could not read dimensions of {}", key);
                report.skipped += 1;
            }
            Err(e) => {
                tracing::error!("Failed to update image dimension for {}: {}", key, e);
                report.failed += 1;
            }
        }
    }

    tracing::info!(
        "Backfill finished: {} updated, {} skipped, {} failed",
        report.updated,
        report.skipped,
        report.failed
    );
    Ok(report)
}

async fn backfill_one(blobs: &dyn BlobStore, key: &str) -> Result<bool> {
    let body = match blobs.get(key).await? {
        Some(body) => body,
        None => return Ok(false),
    };
    match image_dimensions(&body) {
        Some(dimensions) => {
            blobs
                .copy_with_metadata(key, dimension_metadata(dimensions))
                .await?;
            Ok(true)
        }
        None => Ok(false),
    }
}
