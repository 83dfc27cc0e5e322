use crate::blob::{BlobMetadata, BlobStore};
use crate::config::IndexSource;
use crate::index::{decode_snapshot, encode_snapshot, KnownIdIndex};
use crate::model::Site;
use crate::storage::{lock, EntryScanner, SharedStorage, StorageResult};
use crate::{HoardError, Result};
use bytes::Bytes;

/// Entries requested per scan page
pub const SCAN_PAGE_SIZE: usize = 1000;

/// Rebuilds the index of a site by scanning the entry store
///
/// Pages are requested until the store stops returning a continuation token.
pub fn rebuild<S: EntryScanner + ?Sized>(
    scanner: &S,
    site: Site,
    page_size: usize,
) -> StorageResult<KnownIdIndex> {
    let mut index = KnownIdIndex::new();
    let mut start_after: Option<String> = None;

    loop {
        let page = scanner.scan_entries(site, start_after.as_deref(), page_size)?;
        tracing::debug!(
            "[{}] Retrieved {} existing entries (start_after = {:?})",
            site,
            page.items.len(),
            start_after
        );

        for entry in page.items {
            index.insert(entry.id, entry.visibility, entry.restricted);
        }

        match page.next {
            Some(token) => start_after = Some(token),
            None => break,
        }
    }

    tracing::info!("[{}] Retrieved {} ids in total", site, index.len());
    Ok(index)
}

/// Publishes the index as the site's snapshot blob
pub async fn publish(blobs: &dyn BlobStore, site: Site, index: &KnownIdIndex) -> Result<()> {
    let raw = encode_snapshot(index, site.snapshot_layout());
    blobs
        .put(&site.snapshot_key(), Bytes::from(raw), BlobMetadata::new())
        .await?;
    tracing::debug!("[{}] Published index snapshot ({} ids)", site, index.len());
    Ok(())
}

/// Produces the index a crawl run starts from
///
/// A scan always republishes the snapshot. A snapshot source falls back to a
/// scan when no snapshot has been published yet.
pub async fn load_or_rebuild(
    storage: &SharedStorage,
    blobs: &dyn BlobStore,
    site: Site,
    source: IndexSource,
) -> Result<KnownIdIndex> {
    if source == IndexSource::Snapshot {
        if let Some(raw) = blobs.get(&site.snapshot_key()).await? {
            let index = decode_snapshot(&raw).map_err(|e| HoardError::UnexpectedShape {
                context: site.snapshot_key(),
                message: e.to_string(),
            })?;
            tracing::info!("[{}] Loaded {} ids from snapshot", site, index.len());
            return Ok(index);
        }
        tracing::info!("[{}] No snapshot published yet, scanning entries", site);
    }

    let index = {
        let storage = lock(storage)?;
        rebuild(&*storage, site, SCAN_PAGE_SIZE)?
    };
    publish(blobs, site, &index).await?;
    Ok(index)
}
