//! Incremental crawl driver
//!
//! One control loop shared by every scheduled site:
//!
//! 1. Load the known-ID index (rebuilding and publishing it when scanning)
//! 2. Enumerate the remote frontier and select what is new, oldest first
//! 3. For each selected item: fetch its detail, archive its media, write its
//!    entry and record it in the index
//! 4. Every `index-flush-interval` items, flush the writer and republish the
//!    snapshot; do the same once more at the end
//!
//! Items are persisted independently, so stopping early on the budget leaves
//! everything already processed valid.

use crate::blob::BlobStore;
use crate::config::CrawlerConfig;
use crate::crawler::budget::Budget;
use crate::crawler::frontier::select_new;
use crate::crawler::media::MediaArchiver;
use crate::crawler::writer::EntryWriter;
use crate::index::{self, KnownIdIndex};
use crate::model::{Item, ItemSummary, MediaRef, Site};
use crate::storage::{lock, EntryRecord, RunStatus, RunStore, SharedStorage};
use crate::{HoardError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

/// The site-specific part of a crawl
#[async_trait]
pub trait SiteAdapter: Send + Sync {
    fn site(&self) -> Site;

    /// Prefix of log lines, e.g. `twitter:alice`
    fn label(&self) -> String {
        self.site().to_string()
    }

    /// Lists remote item summaries, newest first
    async fn enumerate_frontier(
        &self,
        index: &KnownIdIndex,
        budget: &Budget,
    ) -> Result<Vec<ItemSummary>>;

    /// Fetches the full item(s) behind a summary
    ///
    /// Usually one item; the Twitter adapter also returns the ancestors of a
    /// reply that were not visited earlier in this run.
    async fn fetch_item_detail(
        &self,
        summary: &ItemSummary,
        visited: &HashSet<String>,
    ) -> Result<Vec<Item>>;

    /// Media files referenced by an item, in storage order
    fn extract_media(&self, item: &Item) -> Result<Vec<MediaRef>>;

    /// Blob key of a media file, derived from its source URL
    fn storage_key(&self, media: &MediaRef) -> Result<String> {
        media
            .filename()
            .map(|filename| self.site().blob_key(&filename))
            .ok_or_else(|| HoardError::UnexpectedShape {
                context: self.label(),
                message: format!("media URL without a file name: {}", media.source_url),
            })
    }
}

/// Collaborators of a crawl run
#[derive(Clone)]
pub struct CrawlContext {
    pub storage: SharedStorage,
    pub blobs: Arc<dyn BlobStore>,
    pub archiver: MediaArchiver,
    pub settings: CrawlerConfig,
    pub config_hash: String,
}

/// Totals of a crawl run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    /// Items selected from the frontier
    pub selected: usize,
    /// Entries written, reply ancestors included
    pub archived: usize,
    /// Items, or members of a reply chain, skipped after an item-level failure
    pub skipped: usize,
    /// The run stopped early on the budget
    pub interrupted: bool,
}

impl CrawlReport {
    fn status(&self) -> RunStatus {
        if self.interrupted {
            RunStatus::Interrupted
        } else {
            RunStatus::Completed
        }
    }
}

/// Entries written and chain members skipped for one summary
#[derive(Debug, Default, Clone, Copy)]
struct ItemTally {
    archived: usize,
    skipped: usize,
}

enum ItemOutcome {
    Archived(ItemTally),
    OutOfTime(ItemTally),
}

enum MemberOutcome {
    Written,
    OutOfTime,
}

/// In-memory state mutated by the control loop
struct RunState {
    index: KnownIdIndex,
    writer: EntryWriter,
    visited: HashSet<String>,
}

/// Runs one incremental crawl of `adapter` and records it as a run
pub async fn run_incremental(
    ctx: &CrawlContext,
    adapter: &dyn SiteAdapter,
    budget: &Budget,
) -> Result<CrawlReport> {
    let label = adapter.label();
    let run_id = lock(&ctx.storage)?.create_run(adapter.site(), &ctx.config_hash)?;
    let start_time = Instant::now();

    let result = if budget.soft_exhausted() {
        tracing::info!(
            "[{}] Remaining time ({:?}) is short. Giving up...",
            label,
            budget.remaining()
        );
        Ok(CrawlReport {
            interrupted: true,
            ..CrawlReport::default()
        })
    } else {
        crawl(ctx, adapter, budget).await
    };

    match &result {
        Ok(report) => {
            lock(&ctx.storage)?.finish_run(
                run_id,
                report.status(),
                report.archived as u64,
                report.skipped as u64,
            )?;
            tracing::info!(
                "[{}] Crawl {}: {} archived, {} skipped in {:?}",
                label,
                report.status().to_db_string(),
                report.archived,
                report.skipped,
                start_time.elapsed()
            );
        }
        Err(e) => {
            tracing::error!("[{}] Crawl failed: {}", label, e);
            lock(&ctx.storage)?.finish_run(run_id, RunStatus::Failed, 0, 0)?;
        }
    }

    result
}

async fn crawl(
    ctx: &CrawlContext,
    adapter: &dyn SiteAdapter,
    budget: &Budget,
) -> Result<CrawlReport> {
    let site = adapter.site();
    let label = adapter.label();

    let index = index::load_or_rebuild(
        &ctx.storage,
        ctx.blobs.as_ref(),
        site,
        ctx.settings.index_source,
    )
    .await?;

    let frontier = adapter.enumerate_frontier(&index, budget).await?;
    let selected = select_new(frontier, &index);
    tracing::info!("[{}] Fetched {} new items", label, selected.len());

    let mut state = RunState {
        index,
        writer: EntryWriter::new(ctx.storage.clone(), ctx.settings.entry_batch_size),
        visited: HashSet::new(),
    };
    let mut report = CrawlReport {
        selected: selected.len(),
        ..CrawlReport::default()
    };
    let mut since_flush = 0;

    for summary in selected {
        if budget.soft_exhausted() {
            tracing::info!(
                "[{}] Remaining time ({:?}) is short. Giving up...",
                label,
                budget.remaining()
            );
            report.interrupted = true;
            break;
        }

        if state.visited.contains(&summary.id) {
            tracing::debug!("[{}] {} was archived earlier in this run", label, summary.id);
            continue;
        }

        tracing::info!("[{}] Archiving item {}...", label, summary.id);
        match process_item(ctx, adapter, budget, &summary, &mut state).await {
            Ok(ItemOutcome::Archived(tally)) => {
                report.archived += tally.archived;
                report.skipped += tally.skipped;
                since_flush += tally.archived;
            }
            Ok(ItemOutcome::OutOfTime(tally)) => {
                tracing::info!("[{}] Remaining time is too short. Stopping immediately.", label);
                report.archived += tally.archived;
                report.skipped += tally.skipped;
                report.interrupted = true;
                break;
            }
            Err(e) if e.is_item_level() => {
                tracing::warn!("[{}] Skipping item {}: {}", label, summary.id, e);
                report.skipped += 1;
            }
            Err(e) => {
                checkpoint(ctx, site, &mut state).await?;
                return Err(e);
            }
        }

        if since_flush >= ctx.settings.index_flush_interval {
            checkpoint(ctx, site, &mut state).await?;
            since_flush = 0;
        }
    }

    checkpoint(ctx, site, &mut state).await?;
    Ok(report)
}

/// Archives the item(s) behind one summary
///
/// Each item of a reply chain is archived on its own: an item-level failure
/// skips that item only and the rest of the chain is still archived.
async fn process_item(
    ctx: &CrawlContext,
    adapter: &dyn SiteAdapter,
    budget: &Budget,
    summary: &ItemSummary,
    state: &mut RunState,
) -> Result<ItemOutcome> {
    let items = adapter.fetch_item_detail(summary, &state.visited).await?;
    let mut tally = ItemTally::default();

    for item in items {
        let id = item.id.clone();
        match archive_member(ctx, adapter, budget, item, state).await {
            Ok(MemberOutcome::Written) => tally.archived += 1,
            Ok(MemberOutcome::OutOfTime) => return Ok(ItemOutcome::OutOfTime(tally)),
            Err(e) if e.is_item_level() => {
                tracing::warn!("[{}] Skipping {} of {}: {}", adapter.label(), id, summary.id, e);
                tally.skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(ItemOutcome::Archived(tally))
}

/// Archives the media of one item, then writes its entry and indexes it
async fn archive_member(
    ctx: &CrawlContext,
    adapter: &dyn SiteAdapter,
    budget: &Budget,
    item: Item,
    state: &mut RunState,
) -> Result<MemberOutcome> {
    let site = adapter.site();
    let media = adapter.extract_media(&item)?;
    tracing::debug!("[{}] Saving {} media of {}...", adapter.label(), media.len(), item.id);

    let mut media_keys = Vec::with_capacity(media.len());
    for media_ref in &media {
        if budget.hard_exhausted() {
            return Ok(MemberOutcome::OutOfTime);
        }
        let key = adapter.storage_key(media_ref)?;
        ctx.archiver.archive(site, &key, media_ref).await?;
        media_keys.push(key);
    }

    state.writer.write(EntryRecord {
        site,
        id: item.id.clone(),
        visibility: item.visibility,
        restricted: item.restricted,
        body: item.body,
        media_keys,
        archived_at: Utc::now().to_rfc3339(),
    })?;
    state.index.insert(item.id.clone(), item.visibility, item.restricted);
    state.visited.insert(item.id);
    Ok(MemberOutcome::Written)
}

/// Flushes buffered entries, then publishes the snapshot
async fn checkpoint(ctx: &CrawlContext, site: Site, state: &mut RunState) -> Result<()> {
    state.writer.flush()?;
    index::publish(ctx.blobs.as_ref(), site, &state.index).await
}
