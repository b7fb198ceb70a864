//! Maintenance of the `entries_fts` shadow index.
//!
//! The index is a convenience: a failure here never fails the caller's write.
//! It is logged and counted, and search keeps working on whatever the index
//! holds (or through the substring fallback).

use rusqlite::{Connection, params};

/// Change applied to an entry's index row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FtsOperation {
    /// A new entry was inserted.
    Insert,
    /// An entry's prompt or transcript changed.
    Update,
    /// The entry is about to be deleted.
    Delete,
}

impl FtsOperation {
    /// Returns the operation name used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// Removes the index row for `id`.
fn remove(conn: &Connection, id: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM entries_fts WHERE rowid = (SELECT rowid FROM entries WHERE id = ?1)",
        params![id],
    )
}

/// Copies the current searchable text of `id` into the index.
fn copy_from_entry(conn: &Connection, id: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO entries_fts(rowid, prompt, transcript)
         SELECT rowid, prompt, transcript FROM entries WHERE id = ?1",
        params![id],
    )
}

/// Brings the index row for `id` in line with `entries`.
///
/// Insert and update replace the index row from the committed entry. Delete
/// must run while the entry row still exists, since the index row is found
/// through its rowid.
///
/// Returns `false` if the index could not be updated.
pub fn reindex(conn: &Connection, op: FtsOperation, id: &str) -> bool {
    let result = match op {
        FtsOperation::Insert | FtsOperation::Update => {
            remove(conn, id).and_then(|_| copy_from_entry(conn, id))
        },
        FtsOperation::Delete => remove(conn, id),
    };

    match result {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(
                operation = op.as_str(),
                entry_id = %id,
                error = %e,
                "Failed to update search index"
            );
            metrics::counter!("storage_fts_sync_failures_total", "operation" => op.as_str())
                .increment(1);
            false
        },
    }
}

/// Empties the index.
///
/// # Errors
///
/// Returns the engine error if the table exists but cannot be cleared.
pub fn clear(conn: &Connection) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM entries_fts", [])
}
