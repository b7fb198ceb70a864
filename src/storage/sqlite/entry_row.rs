//! Row conversion for entries.

use crate::models::{Entry, EntryId};
use rusqlite::Row;

/// Column list for selecting a full entry from `entries` aliased as `e`.
pub const ENTRY_COLUMNS: &str = "e.id, e.created_at, e.recorded_at, e.updated_at, e.prompt, \
     e.duration_seconds, e.audio_local_uri, e.audio_remote_uri, e.photo_local_uri, \
     e.photo_remote_uri, e.transcript, e.transcript_segments, e.transcribed, e.tags, e.favourite";

/// Builds an [`Entry`] from a row selected with [`ENTRY_COLUMNS`].
///
/// Columns are read by name, so extra columns such as a search rank are
/// ignored. `transcribed` and `favourite` are stored as integers and read as
/// non-zero; a NULL flag reads as `false`.
///
/// # Errors
///
/// Returns the engine error if a column is missing or has the wrong type.
pub fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<Entry> {
    Ok(Entry {
        id: EntryId::new(row.get::<_, String>("id")?),
        created_at: row.get("created_at")?,
        recorded_at: row.get("recorded_at")?,
        updated_at: row.get("updated_at")?,
        prompt: row.get("prompt")?,
        duration_seconds: row.get("duration_seconds")?,
        audio_local_uri: row.get("audio_local_uri")?,
        audio_remote_uri: row.get("audio_remote_uri")?,
        photo_local_uri: row.get("photo_local_uri")?,
        photo_remote_uri: row.get("photo_remote_uri")?,
        transcript: row.get("transcript")?,
        transcript_segments: row.get("transcript_segments")?,
        transcribed: flag(row, "transcribed")?,
        tags: row.get("tags")?,
        favourite: flag(row, "favourite")?,
    })
}

fn flag(row: &Row<'_>, column: &str) -> rusqlite::Result<bool> {
    Ok(row.get::<_, Option<i64>>(column)?.is_some_and(|v| v != 0))
}
