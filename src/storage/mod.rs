//! Storage module for persisting archive metadata
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Entry persistence and paginated, projected scans
//! - Session credentials
//! - Operational counters
//! - Run tracking

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{
    CounterStore, EntryScanner, EntryStore, RunStore, SessionStore, StorageError, StorageResult,
    MAX_BATCH_WRITE,
};

use crate::model::{Site, Visibility};
use crate::HoardError;
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Storage handle shared between the crawl loop and the metrics sink
pub type SharedStorage = Arc<Mutex<SqliteStorage>>;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(HoardError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, HoardError> {
    SqliteStorage::new(path)
}

/// Wraps a storage backend for sharing
pub fn share(storage: SqliteStorage) -> SharedStorage {
    Arc::new(Mutex::new(storage))
}

/// Locks a shared storage handle
///
/// The guard must not be held across an `.await`.
pub fn lock(storage: &SharedStorage) -> StorageResult<MutexGuard<'_, SqliteStorage>> {
    storage
        .lock()
        .map_err(|_| StorageError::Database("storage lock poisoned".to_string()))
}

/// An archived item as stored in the entry table
#[derive(Debug, Clone, PartialEq)]
pub struct EntryRecord {
    pub site: Site,
    pub id: String,
    pub visibility: Visibility,
    pub restricted: bool,
    pub body: Value,
    /// Blob keys of the media stored for this item
    pub media_keys: Vec<String>,
    pub archived_at: String,
}

/// The projection of an entry returned by a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryProjection {
    pub id: String,
    pub visibility: Visibility,
    pub restricted: bool,
}

/// One page of an entry scan
#[derive(Debug, Clone, Default)]
pub struct ScanPage {
    pub items: Vec<EntryProjection>,
    /// Continuation token; `None` on the last page
    pub next: Option<String>,
}

/// A registered session credential
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: String,
    pub credential: String,
    pub updated_at: String,
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub site: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub archived: u64,
    pub skipped: u64,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
