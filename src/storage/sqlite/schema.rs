//! Schema creation for the journal database.
//!
//! `entries` is the authoritative table. `entries_fts` is a standalone FTS5
//! table keyed by `entries.rowid`; it stores its own copy of the searchable
//! text, so removing a row from it never reads back through `entries`.
//!
//! No triggers are installed; the index is maintained by [`super::fts`].

use super::error::storage_error;
use crate::Result;
use rusqlite::{Connection, OptionalExtension};

const CREATE_ENTRIES: &str = "CREATE TABLE IF NOT EXISTS entries (
    id TEXT PRIMARY KEY,
    created_at INTEGER NOT NULL,
    recorded_at INTEGER NOT NULL,
    prompt TEXT,
    duration_seconds REAL,
    audio_local_uri TEXT NOT NULL,
    audio_remote_uri TEXT,
    photo_local_uri TEXT,
    photo_remote_uri TEXT,
    transcript TEXT,
    transcript_segments TEXT,
    transcribed INTEGER DEFAULT 0,
    tags TEXT,
    favourite INTEGER DEFAULT 0,
    updated_at INTEGER NOT NULL
)";

const CREATE_FTS: &str =
    "CREATE VIRTUAL TABLE IF NOT EXISTS entries_fts USING fts5(prompt, transcript)";

/// Result of schema initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaStatus {
    /// Whether `entries_fts` exists and can be queried.
    pub fts_available: bool,
}

/// Creates the schema if missing.
///
/// FTS creation is best-effort: when FTS5 is unavailable the journal still
/// works, and search uses substring matching.
///
/// # Errors
///
/// Returns an error if the `entries` table or its indexes cannot be created.
pub fn initialize(conn: &Connection) -> Result<SchemaStatus> {
    conn.execute(CREATE_ENTRIES, [])
        .map_err(|e| storage_error("create_entries_table", &e))?;

    create_indexes(conn)?;

    let fts_available = match create_fts(conn) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "FTS5 unavailable, search will use substring matching");
            metrics::counter!("storage_fts_unavailable_total").increment(1);
            false
        },
    };

    Ok(SchemaStatus { fts_available })
}

fn create_indexes(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_entries_created_at ON entries(created_at DESC);
         CREATE INDEX IF NOT EXISTS idx_entries_recorded_at ON entries(recorded_at DESC);",
    )
    .map_err(|e| storage_error("create_entries_indexes", &e))
}

fn create_fts(conn: &Connection) -> rusqlite::Result<()> {
    if uses_external_content(conn)? {
        rebuild_standalone_fts(conn)?;
    }
    conn.execute(CREATE_FTS, [])?;
    Ok(())
}

/// Returns `true` if `entries_fts` was created as an external-content table.
///
/// Older databases declared `content='entries'`, which makes a plain
/// `DELETE` read the current `entries` row to decide what to remove from the
/// index. Once that row has changed or vanished the index is damaged.
fn uses_external_content(conn: &Connection) -> rusqlite::Result<bool> {
    let sql: Option<String> = conn
        .query_row(
            "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = 'entries_fts'",
            [],
            |row| row.get(0),
        )
        .optional()?;

    Ok(sql.is_some_and(|sql| sql.to_lowercase().contains("content=")))
}

/// Replaces an external-content index with a standalone one and repopulates it.
fn rebuild_standalone_fts(conn: &Connection) -> rusqlite::Result<()> {
    tracing::info!("Migrating entries_fts to a standalone index");
    let tx = conn.unchecked_transaction()?;
    tx.execute("DROP TABLE IF EXISTS entries_fts", [])?;
    tx.execute(CREATE_FTS, [])?;
    let copied = tx.execute(
        "INSERT INTO entries_fts(rowid, prompt, transcript)
         SELECT rowid, prompt, transcript FROM entries",
        [],
    )?;
    tx.commit()?;
    tracing::info!(entries = copied, "Rebuilt entries_fts");
    metrics::counter!("storage_fts_rebuilds_total").increment(1);
    Ok(())
}

/// Returns `true` if `entries_fts` currently exists.
///
/// # Errors
///
/// Returns an error if `sqlite_master` cannot be read.
pub fn fts_table_exists(conn: &Connection) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'entries_fts')",
        [],
        |row| row.get(0),
    )
    .map_err(|e| storage_error("check_fts_table", &e))
}
