//! Storage traits and error types
//!
//! This module defines the trait interfaces for storage backends and
//! associated error types. The crawler only ever talks to these traits; the
//! SQLite backend is one implementation.

use crate::model::Site;
use crate::storage::{
    EntryProjection, EntryRecord, RunRecord, RunStatus, ScanPage, SessionRecord,
};
use thiserror::Error;

/// Largest number of records accepted by one batch write
pub const MAX_BATCH_WRITE: usize = 25;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Batch of {0} records exceeds the limit of {MAX_BATCH_WRITE}")]
    BatchTooLarge(usize),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Paginated, projected scan over the entries of one site
///
/// `start_after` is the continuation token returned by the previous page;
/// `None` starts from the beginning. A page without `next` is the last one.
pub trait EntryScanner {
    fn scan_entries(
        &self,
        site: Site,
        start_after: Option<&str>,
        limit: usize,
    ) -> StorageResult<ScanPage>;
}

/// Per-site tables of archived item metadata
pub trait EntryStore: EntryScanner {
    /// Gets one entry by its site-native ID
    fn get_entry(&self, site: Site, id: &str) -> StorageResult<Option<EntryRecord>>;

    /// Gets several entries, silently omitting unknown IDs
    fn get_entries(&self, site: Site, ids: &[String]) -> StorageResult<Vec<EntryRecord>>;

    /// Inserts or replaces one entry
    fn put_entry(&mut self, entry: &EntryRecord) -> StorageResult<()>;

    /// Inserts or replaces up to [`MAX_BATCH_WRITE`] entries at once
    fn batch_put_entries(&mut self, entries: &[EntryRecord]) -> StorageResult<()>;

    /// Counts the entries of a site
    fn count_entries(&self, site: Site) -> StorageResult<u64>;

    /// Returns every stored entry projection for a site, in scan order
    fn list_projections(&self, site: Site) -> StorageResult<Vec<EntryProjection>> {
        let mut out = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self.scan_entries(site, token.as_deref(), 500)?;
            out.extend(page.items);
            match page.next {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        Ok(out)
    }
}

/// Credentials registered per site
pub trait SessionStore {
    fn get_session(&self, id: &str) -> StorageResult<Option<SessionRecord>>;

    /// Registers or replaces a credential
    fn put_session(&mut self, id: &str, credential: &str) -> StorageResult<()>;

    fn list_sessions(&self) -> StorageResult<Vec<SessionRecord>>;
}

/// Bookkeeping of crawl invocations
pub trait RunStore {
    /// Creates a new run in the `running` state and returns its ID
    fn create_run(&mut self, site: Site, config_hash: &str) -> StorageResult<i64>;

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Records the outcome of a run
    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        archived: u64,
        skipped: u64,
    ) -> StorageResult<()>;

    /// Most recent runs, newest first
    fn get_latest_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>>;
}

/// Named monotonically increasing counters
pub trait CounterStore {
    fn increment_counter(&mut self, name: &str, delta: u64) -> StorageResult<()>;

    /// All counters sorted by name
    fn get_counters(&self) -> StorageResult<Vec<(String, u64)>>;
}
