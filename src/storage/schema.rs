//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Hoard database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Credentials registered per site (cookie strings or token JSON)
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    credential TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Archived item metadata, one logical table per site
CREATE TABLE IF NOT EXISTS entries (
    site TEXT NOT NULL,
    id TEXT NOT NULL,
    visibility TEXT NOT NULL,
    restricted INTEGER NOT NULL DEFAULT 0,
    body TEXT NOT NULL,
    media_keys TEXT NOT NULL DEFAULT '[]',
    archived_at TEXT NOT NULL,
    PRIMARY KEY (site, id)
);

CREATE INDEX IF NOT EXISTS idx_entries_site ON entries(site);

-- Operational counters
CREATE TABLE IF NOT EXISTS counters (
    name TEXT PRIMARY KEY,
    value INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL
);

-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    archived INTEGER NOT NULL DEFAULT 0,
    skipped INTEGER NOT NULL DEFAULT 0
);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
