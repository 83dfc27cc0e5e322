//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the storage traits.

use crate::model::{Site, Visibility};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{
    CounterStore, EntryScanner, EntryStore, RunStore, SessionStore, StorageError, StorageResult,
    MAX_BATCH_WRITE,
};
use crate::storage::{
    EntryProjection, EntryRecord, RunRecord, RunStatus, ScanPage, SessionRecord,
};
use crate::HoardError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const ENTRY_COLUMNS: &str =
    "site, id, visibility, restricted, body, media_keys, archived_at";

const RUN_COLUMNS: &str =
    "id, site, started_at, finished_at, config_hash, status, archived, skipped";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(HoardError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, HoardError> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA mmap_size = 268435456;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> Result<Self, HoardError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

/// Raw column values of an entry row, decoded outside the row closure
struct EntryRow {
    site: String,
    id: String,
    visibility: String,
    restricted: bool,
    body: String,
    media_keys: String,
    archived_at: String,
}

impl EntryRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            site: row.get(0)?,
            id: row.get(1)?,
            visibility: row.get(2)?,
            restricted: row.get(3)?,
            body: row.get(4)?,
            media_keys: row.get(5)?,
            archived_at: row.get(6)?,
        })
    }

    fn decode(self) -> StorageResult<EntryRecord> {
        let site = self
            .site
            .parse::<Site>()
            .map_err(StorageError::Serialization)?;
        let body = serde_json::from_str(&self.body)
            .map_err(|e| StorageError::Serialization(format!("entry {}: {}", self.id, e)))?;
        let media_keys = serde_json::from_str(&self.media_keys)
            .map_err(|e| StorageError::Serialization(format!("entry {}: {}", self.id, e)))?;

        Ok(EntryRecord {
            site,
            visibility: Visibility::from_db_string(&self.visibility).unwrap_or_default(),
            id: self.id,
            restricted: self.restricted,
            body,
            media_keys,
            archived_at: self.archived_at,
        })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        site: row.get(1)?,
        started_at: row.get(2)?,
        finished_at: row.get(3)?,
        config_hash: row.get(4)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?)
            .unwrap_or(RunStatus::Running),
        archived: row.get::<_, i64>(6)? as u64,
        skipped: row.get::<_, i64>(7)? as u64,
    })
}

fn write_entry(conn: &Connection, entry: &EntryRecord) -> StorageResult<()> {
    let body = serde_json::to_string(&entry.body)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    let media_keys = serde_json::to_string(&entry.media_keys)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;

    conn.execute(
        "INSERT INTO entries (site, id, visibility, restricted, body, media_keys, archived_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(site, id) DO UPDATE SET
             visibility = excluded.visibility,
             restricted = excluded.restricted,
             body = excluded.body,
             media_keys = excluded.media_keys,
             archived_at = excluded.archived_at",
        params![
            entry.site.as_str(),
            entry.id,
            entry.visibility.to_db_string(),
            entry.restricted,
            body,
            media_keys,
            entry.archived_at,
        ],
    )?;
    Ok(())
}

impl EntryScanner for SqliteStorage {
    fn scan_entries(
        &self,
        site: Site,
        start_after: Option<&str>,
        limit: usize,
    ) -> StorageResult<ScanPage> {
        let mut stmt = self.conn.prepare(
            "SELECT id, visibility, restricted FROM entries
             WHERE site = ?1 AND (?2 IS NULL OR id > ?2)
             ORDER BY id
             LIMIT ?3",
        )?;

        let rows = stmt.query_map(params![site.as_str(), start_after, limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, bool>(2)?,
            ))
        })?;

        let mut items = Vec::new();
        for row in rows {
            let (id, visibility, restricted) = row?;
            items.push(EntryProjection {
                id,
                visibility: Visibility::from_db_string(&visibility).unwrap_or_default(),
                restricted,
            });
        }

        let next = if limit > 0 && items.len() == limit {
            items.last().map(|entry| entry.id.clone())
        } else {
            None
        };

        Ok(ScanPage { items, next })
    }
}

impl EntryStore for SqliteStorage {
    fn get_entry(&self, site: Site, id: &str) -> StorageResult<Option<EntryRecord>> {
        let row = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM entries WHERE site = ?1 AND id = ?2",
                    ENTRY_COLUMNS
                ),
                params![site.as_str(), id],
                EntryRow::from_row,
            )
            .optional()?;

        row.map(EntryRow::decode).transpose()
    }

    fn get_entries(&self, site: Site, ids: &[String]) -> StorageResult<Vec<EntryRecord>> {
        let mut entries = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(entry) = self.get_entry(site, id)? {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    fn put_entry(&mut self, entry: &EntryRecord) -> StorageResult<()> {
        write_entry(&self.conn, entry)
    }

    fn batch_put_entries(&mut self, entries: &[EntryRecord]) -> StorageResult<()> {
        if entries.len() > MAX_BATCH_WRITE {
            return Err(StorageError::BatchTooLarge(entries.len()));
        }

        let tx = self.conn.transaction()?;
        for entry in entries {
            write_entry(&tx, entry)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn count_entries(&self, site: Site) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM entries WHERE site = ?1",
            params![site.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

impl SessionStore for SqliteStorage {
    fn get_session(&self, id: &str) -> StorageResult<Option<SessionRecord>> {
        let session = self
            .conn
            .query_row(
                "SELECT id, credential, updated_at FROM sessions WHERE id = ?1",
                params![id],
                |row| {
                    Ok(SessionRecord {
                        id: row.get(0)?,
                        credential: row.get(1)?,
                        updated_at: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(session)
    }

    fn put_session(&mut self, id: &str, credential: &str) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO sessions (id, credential, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET
                 credential = excluded.credential,
                 updated_at = excluded.updated_at",
            params![id, credential, now],
        )?;
        Ok(())
    }

    fn list_sessions(&self) -> StorageResult<Vec<SessionRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, credential, updated_at FROM sessions ORDER BY id")?;
        let sessions = stmt
            .query_map([], |row| {
                Ok(SessionRecord {
                    id: row.get(0)?,
                    credential: row.get(1)?,
                    updated_at: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sessions)
    }
}

impl RunStore for SqliteStorage {
    fn create_run(&mut self, site: Site, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (site, started_at, config_hash, status) VALUES (?1, ?2, ?3, ?4)",
            params![
                site.as_str(),
                now,
                config_hash,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS),
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        archived: u64,
        skipped: u64,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, archived = ?3, skipped = ?4
             WHERE id = ?5",
            params![
                status.to_db_string(),
                now,
                archived as i64,
                skipped as i64,
                run_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_latest_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM runs ORDER BY id DESC LIMIT ?1",
            RUN_COLUMNS
        ))?;
        let runs = stmt
            .query_map(params![limit as i64], run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }
}

impl CounterStore for SqliteStorage {
    fn increment_counter(&mut self, name: &str, delta: u64) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO counters (name, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET
                 value = value + excluded.value,
                 updated_at = excluded.updated_at",
            params![name, delta as i64, now],
        )?;
        Ok(())
    }

    fn get_counters(&self) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, value FROM counters ORDER BY name")?;
        let counters = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(counters)
    }
}
