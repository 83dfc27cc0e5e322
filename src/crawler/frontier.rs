//! Frontier enumeration and selection
//!
//! Two paging strategies are supported:
//!
//! - **Cursor-based**: the source is asked for items older than a `max_id`
//!   cursor. The next cursor is one less than the smallest ID of the page, so
//!   cursors strictly decrease and no ID is requested twice.
//! - **Known-streak**: newest-first feeds without a stable cursor are walked
//!   page by page until `grace_pages` consecutive pages bring nothing new.
//!
//! [`select_new`] then reduces the enumerated frontier to the items that still
//! need archiving, oldest first.

use crate::crawler::budget::Budget;
use crate::index::KnownIdIndex;
use crate::model::ItemSummary;
use crate::{HoardError, Result};
use async_trait::async_trait;
use std::collections::HashSet;

/// A feed addressed by a descending `max_id` cursor
#[async_trait]
pub trait CursorSource: Send + Sync {
    /// Items with an ID at most `max_id` (newest first); `None` asks for the newest
    async fn fetch_older(&self, max_id: Option<u64>) -> Result<Vec<ItemSummary>>;
}

/// One page of a known-streak feed
#[derive(Debug, Clone)]
pub enum FeedPage<C> {
    Items {
        items: Vec<ItemSummary>,
        /// Cursor of the following page; `None` when the feed ends here
        next: Option<C>,
    },
    /// HTTP success carrying a body-level error flag
    SoftError(String),
}

/// A newest-first feed walked page by page
#[async_trait]
pub trait PagedFeed: Send + Sync {
    type Cursor: Clone + Send + Sync + std::fmt::Debug;

    fn first_cursor(&self) -> Self::Cursor;

    async fn fetch_page(&self, cursor: &Self::Cursor) -> Result<FeedPage<Self::Cursor>>;
}

/// Stopping rules of a known-streak walk
#[derive(Debug, Clone, Copy)]
pub struct StreakLimits {
    pub grace_pages: u32,
    pub max_pages: u32,
    pub soft_error_retries: u32,
}

/// Whether a summary would be selected for archiving
///
/// Unknown IDs are new. A known ID is new again when it was archived while
/// restricted and the feed now shows it unlocked.
pub fn needs_archiving(index: &KnownIdIndex, summary: &ItemSummary) -> bool {
    match index.get(&summary.id) {
        None => true,
        Some(known) => known.restricted && !summary.restricted,
    }
}

/// Walks a cursor-based source
pub async fn walk_cursor<S: CursorSource + ?Sized>(
    source: &S,
    label: &str,
    max_pages: u32,
    budget: &Budget,
) -> Result<Vec<ItemSummary>> {
    let mut collected = Vec::new();
    let mut cursor: Option<u64> = None;

    for page in 0..max_pages {
        if budget.soft_exhausted() {
            tracing::info!("[{}] Budget exhausted before page {}", label, page + 1);
            break;
        }

        let items = source.fetch_older(cursor).await?;
        tracing::info!("[{}] Retrieved {} items (max_id = {:?})", label, items.len(), cursor);

        if items.is_empty() {
            break;
        }

        let mut min_id = u64::MAX;
        for item in &items {
            let id: u64 = item.id.parse().map_err(|_| HoardError::UnexpectedShape {
                context: label.to_string(),
                message: format!("non-numeric id '{}'", item.id),
            })?;
            min_id = min_id.min(id);
        }
        collected.extend(items);

        let next = match min_id.checked_sub(1) {
            Some(next) => next,
            None => break,
        };
        if cursor.map_or(false, |previous| next >= previous) {
            tracing::warn!("[{}] Cursor did not advance (max_id = {})", label, next);
            break;
        }
        cursor = Some(next);
    }

    Ok(collected)
}

/// Walks a newest-first feed until it stops yielding unseen items
pub async fn walk_known_streak<F: PagedFeed + ?Sized>(
    feed: &F,
    label: &str,
    index: &KnownIdIndex,
    limits: StreakLimits,
    budget: &Budget,
) -> Result<Vec<ItemSummary>> {
    let mut collected = Vec::new();
    let mut cursor = feed.first_cursor();
    let mut pages = 0;
    let mut streak = 0;
    let mut retries = 0;

    while pages < limits.max_pages {
        if budget.soft_exhausted() {
            tracing::info!("[{}] Budget exhausted before page {}", label, pages + 1);
            break;
        }

        let (items, next) = match feed.fetch_page(&cursor).await? {
            FeedPage::SoftError(message) => {
                retries += 1;
                if retries > limits.soft_error_retries {
                    tracing::warn!(
                        "[{}] Giving up on page {:?} after {} soft errors: {}",
                        label,
                        cursor,
                        retries,
                        message
                    );
                    break;
                }
                tracing::warn!("[{}] Soft error on page {:?}: {}", label, cursor, message);
                continue;
            }
            FeedPage::Items { items, next } => (items, next),
        };

        retries = 0;
        pages += 1;
        tracing::info!("[{}] Retrieved {} items (page = {:?})", label, items.len(), cursor);

        if items.is_empty() {
            break;
        }

        let has_new = items.iter().any(|item| needs_archiving(index, item));
        collected.extend(items);

        if has_new {
            streak = 0;
        } else {
            streak += 1;
            if streak >= limits.grace_pages {
                tracing::debug!("[{}] {} pages without new items, stopping", label, streak);
                break;
            }
        }

        match next {
            Some(next) => cursor = next,
            None => break,
        }
    }

    Ok(collected)
}

/// Reduces a newest-first frontier to the items to archive, oldest first
pub fn select_new(frontier: Vec<ItemSummary>, index: &KnownIdIndex) -> Vec<ItemSummary> {
    let mut seen = HashSet::new();
    let mut selected: Vec<ItemSummary> = frontier
        .into_iter()
        .filter(|summary| needs_archiving(index, summary))
        .filter(|summary| seen.insert(summary.id.clone()))
        .collect();
    selected.reverse();
    selected
}
