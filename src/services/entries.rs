//! Entry repository.
//!
//! The CRUD and search surface over the journal database. Every operation
//! runs through the retry policy; the write paths additionally recreate the
//! database once when the engine reports corruption.
//!
//! # Search
//!
//! Ranked search runs against the FTS index with BM25 weighted 2:1 in favour
//! of the prompt column. If the index is missing or the MATCH query fails,
//! a case-insensitive substring match ranks prompt hits above transcript hits.
//! Either way ties fall back to newest first, and a search that still fails
//! after retries yields no results rather than an error.

use crate::config::{JournalConfig, RetryConfig};
use crate::models::{
    AssignedTimestamps, CreateEntryInput, Entry, EntryId, EntryUpdate, FieldUpdate, non_empty,
};
use crate::storage::sqlite::{
    ConnectionManager, Database, ENTRY_COLUMNS, FtsOperation, build_fts_query, entry_from_row, fts,
    like_pattern, record_operation_metrics, status_of, storage_error,
};
use crate::storage::with_retry;
use crate::{Error, Result, current_timestamp_millis};
use chrono::{DateTime, Local, NaiveTime, TimeZone};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::instrument;

/// Milliseconds in the "today" window.
const DAY_MILLIS: i64 = 24 * 60 * 60 * 1000;

/// Result of a write that may have gone through corruption recovery.
enum Recovery<T> {
    /// No corruption was seen.
    Direct(Result<T>),
    /// The database was recreated; this is the outcome afterwards.
    AfterRecreate(Result<T>),
}

/// Repository of journal entries.
#[derive(Debug, Clone)]
pub struct EntryRepository {
    manager: Arc<ConnectionManager>,
    retry: RetryConfig,
    recreate_delay: Duration,
    list_limit: usize,
    search_limit: usize,
}

impl EntryRepository {
    /// Creates a repository over `manager` with limits and policies from `config`.
    #[must_use]
    pub fn new(manager: Arc<ConnectionManager>, config: &JournalConfig) -> Self {
        Self {
            manager,
            retry: config.retry,
            recreate_delay: Duration::from_millis(config.delays.recreate_ms),
            list_limit: config.list_limit,
            search_limit: config.search_limit,
        }
    }

    /// Saves a new entry and returns it as stored.
    ///
    /// The id and timestamps are assigned here. Empty optional strings are
    /// stored as NULL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an empty audio URI,
    /// [`Error::EntryNotRetrieved`] if the inserted row cannot be read back,
    /// [`Error::RecoveryFailed`] if corruption recovery failed, or the
    /// storage error that survived retries.
    #[instrument(skip(self, input), fields(operation = "save_entry", entry_id))]
    pub async fn save(&self, input: &CreateEntryInput) -> Result<Entry> {
        let start = Instant::now();
        if input.audio_local_uri.trim().is_empty() {
            return Err(Error::InvalidInput("audio_local_uri is required".to_string()));
        }

        let now = current_timestamp_millis();
        let id = EntryId::generate(now);
        let timestamps = AssignedTimestamps::resolve(input, now);
        tracing::Span::current().record("entry_id", id.as_str());

        let outcome = self
            .with_recovery("save_entry", |db| {
                let id = id.clone();
                let input = input.clone();
                let fts = db.fts_available();
                async move {
                    db.call("save_entry", move |conn| {
                        insert_entry(conn, &id, timestamps, &input, fts)
                    })
                    .await
                }
            })
            .await;

        let result = match outcome {
            Recovery::Direct(result) | Recovery::AfterRecreate(result) => result,
        };
        if let Ok(entry) = &result {
            tracing::info!(entry_id = %entry.id, "Saved entry");
        }
        record_operation_metrics("save", start, status_of(&result));
        result
    }

    /// Returns the entry with `id`, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns the storage error that survived retries.
    #[instrument(skip(self), fields(operation = "get_entry"))]
    pub async fn get(&self, id: &EntryId) -> Result<Option<Entry>> {
        let start = Instant::now();
        let result = with_retry(&self.manager, self.retry, "get_entry", |db| {
            let id = id.clone();
            async move { db.call("get_entry", move |conn| fetch_entry(conn, &id)).await }
        })
        .await;
        record_operation_metrics("get", start, status_of(&result));
        result
    }

    /// Lists entries newest first, capped at `limit` (default 100).
    ///
    /// # Errors
    ///
    /// Returns the storage error that survived retries.
    #[instrument(skip(self), fields(operation = "list_entries"))]
    pub async fn list(&self, limit: Option<usize>) -> Result<Vec<Entry>> {
        let start = Instant::now();
        let limit = sql_limit(limit.unwrap_or(self.list_limit));
        let sql = format!("SELECT {ENTRY_COLUMNS} FROM entries e ORDER BY e.created_at DESC LIMIT ?1");
        let result = self.query_entries("list_entries", sql, vec![Value::Integer(limit)]).await;
        record_operation_metrics("list", start, status_of(&result));
        result
    }

    /// Lists favourite entries newest first, capped at `limit` (default 100).
    ///
    /// # Errors
    ///
    /// Returns the storage error that survived retries.
    #[instrument(skip(self), fields(operation = "list_favourites"))]
    pub async fn list_favourites(&self, limit: Option<usize>) -> Result<Vec<Entry>> {
        let start = Instant::now();
        let limit = sql_limit(limit.unwrap_or(self.list_limit));
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM entries e WHERE e.favourite = 1 ORDER BY e.created_at DESC LIMIT ?1"
        );
        let result = self.query_entries("list_favourites", sql, vec![Value::Integer(limit)]).await;
        record_operation_metrics("list_favourites", start, status_of(&result));
        result
    }

    /// Returns the most recently recorded entry of the current local day.
    ///
    /// # Errors
    ///
    /// Returns the storage error that survived retries.
    #[instrument(skip(self), fields(operation = "get_today_entry"))]
    pub async fn get_for_today(&self) -> Result<Option<Entry>> {
        let start = Instant::now();
        let (day_start, day_end) = day_window(Local::now());
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM entries e
             WHERE e.recorded_at >= ?1 AND e.recorded_at < ?2
             ORDER BY e.recorded_at DESC LIMIT 1"
        );
        let result = self
            .query_entries(
                "get_today_entry",
                sql,
                vec![Value::Integer(day_start), Value::Integer(day_end)],
            )
            .await
            .map(|entries| entries.into_iter().next());
        record_operation_metrics("get_for_today", start, status_of(&result));
        result
    }

    /// Applies a partial update and returns the updated entry.
    ///
    /// Only fields present in `update` change; `updated_at` is always
    /// refreshed. The row update is one transaction. When prompt or
    /// transcript change, the search index is refreshed after commit.
    ///
    /// Returns `None` if the entry does not exist. If the database had to be
    /// recreated because of corruption, the entry is gone and the result is
    /// `None` as well, whatever happened during recovery.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an empty or null audio URI, or the
    /// non-corruption storage error that survived retries.
    #[instrument(skip(self, update), fields(operation = "update_entry"))]
    pub async fn update(&self, id: &EntryId, update: &EntryUpdate) -> Result<Option<Entry>> {
        let start = Instant::now();
        match &update.audio_local_uri {
            FieldUpdate::Clear => {
                return Err(Error::InvalidInput("audio_local_uri cannot be null".to_string()));
            },
            FieldUpdate::Set(uri) if uri.trim().is_empty() => {
                return Err(Error::InvalidInput("audio_local_uri cannot be empty".to_string()));
            },
            FieldUpdate::Set(_) | FieldUpdate::Unchanged => {},
        }

        let outcome = self
            .with_recovery("update_entry", |db| {
                let id = id.clone();
                let update = update.clone();
                let fts = db.fts_available();
                async move {
                    db.call("update_entry", move |conn| {
                        apply_update(conn, &id, &update, current_timestamp_millis(), fts)
                    })
                    .await
                }
            })
            .await;

        let result = match outcome {
            Recovery::Direct(result) => result,
            Recovery::AfterRecreate(result) => Ok(result.unwrap_or_else(|e| {
                tracing::error!(error = %e, "Update failed after database recreation, restart the app");
                None
            })),
        };
        record_operation_metrics("update", start, status_of(&result));
        result
    }

    /// Deletes an entry; returns whether a row was removed.
    ///
    /// The search index row is removed first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RecoveryFailed`] if corruption recovery failed, or the
    /// storage error that survived retries.
    #[instrument(skip(self), fields(operation = "delete_entry"))]
    pub async fn delete(&self, id: &EntryId) -> Result<bool> {
        let start = Instant::now();
        let outcome = self
            .with_recovery("delete_entry", |db| {
                let id = id.clone();
                let fts = db.fts_available();
                async move { db.call("delete_entry", move |conn| delete_entry(conn, &id, fts)).await }
            })
            .await;

        let result = match outcome {
            Recovery::Direct(result) | Recovery::AfterRecreate(result) => result,
        };
        record_operation_metrics("delete", start, status_of(&result));
        result
    }

    /// Ranked full-text search over prompt and transcript.
    ///
    /// Returns at most the configured search limit (default 50). A blank
    /// query returns nothing. Never fails: errors that survive retries are
    /// logged and produce an empty result.
    #[instrument(skip(self, query), fields(operation = "search_entries", query_len = query.len()))]
    pub async fn search(&self, query: &str) -> Vec<Entry> {
        let start = Instant::now();
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }

        let limit = sql_limit(self.search_limit);
        let result = with_retry(&self.manager, self.retry, "search_entries", |db| {
            let query = query.to_string();
            let fts = db.fts_available();
            async move {
                db.call("search_entries", move |conn| search_entries(conn, &query, fts, limit))
                    .await
            }
        })
        .await;

        record_operation_metrics("search", start, status_of(&result));
        result.unwrap_or_else(|e| {
            tracing::error!(error = %e, "Search failed, returning no results");
            Vec::new()
        })
    }

    /// Deletes every entry and empties the search index.
    ///
    /// Returns the number of entries removed. Runs once: there is no retry
    /// and no corruption recovery.
    ///
    /// # Errors
    ///
    /// Returns the storage error of the single attempt.
    #[instrument(skip(self), fields(operation = "clear_entries"))]
    pub async fn clear_all(&self) -> Result<usize> {
        let start = Instant::now();
        let result = match self.manager.get_connection().await {
            Ok(db) => {
                let fts = db.fts_available();
                db.call("clear_entries", move |conn| clear_entries(conn, fts)).await
            },
            Err(e) => Err(e),
        };
        if let Ok(removed) = result {
            tracing::warn!(removed, "Cleared all entries");
        }
        record_operation_metrics("clear_all", start, status_of(&result));
        result
    }

    async fn query_entries(
        &self,
        operation: &'static str,
        sql: String,
        values: Vec<Value>,
    ) -> Result<Vec<Entry>> {
        with_retry(&self.manager, self.retry, operation, |db| {
            let sql = sql.clone();
            let values = values.clone();
            async move {
                db.call(operation, move |conn| {
                    query_entry_rows(conn, &sql, values).map_err(|e| storage_error(operation, &e))
                })
                .await
            }
        })
        .await
    }

    /// Runs a write with retries, recreating the database once on corruption.
    async fn with_recovery<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> Recovery<T>
    where
        F: FnMut(Arc<Database>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match with_retry(&self.manager, self.retry, operation, &mut attempt).await {
            Err(e) if e.is_corruption() => {
                tracing::error!(operation, error = %e, "Storage corruption detected, recreating database");
                if let Err(recreate_error) = self.manager.recreate_database(self.recreate_delay).await {
                    return Recovery::AfterRecreate(Err(recreate_error));
                }
                let result = with_retry(&self.manager, self.retry, operation, attempt)
                    .await
                    .map_err(|e| {
                        if e.is_corruption() {
                            Error::RecoveryFailed(e.to_string())
                        } else {
                            e
                        }
                    });
                Recovery::AfterRecreate(result)
            },
            other => Recovery::Direct(other),
        }
    }
}

/// Returns the `[start, end)` window in epoch millis of the local day
/// containing `now`.
///
/// The window is 24 hours long starting at local midnight. If midnight does
/// not exist locally (a DST gap), the window starts at the first instant of
/// the day.
#[must_use]
pub fn day_window(now: DateTime<Local>) -> (i64, i64) {
    let midnight = now.date_naive().and_time(NaiveTime::MIN);
    let start = Local.from_local_datetime(&midnight).earliest().map_or_else(
        || {
            let elapsed = now.naive_local() - midnight;
            now.timestamp_millis() - elapsed.num_milliseconds()
        },
        |start| start.timestamp_millis(),
    );
    (start, start + DAY_MILLIS)
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn fetch_entry(conn: &Connection, id: &EntryId) -> Result<Option<Entry>> {
    let sql = format!("SELECT {ENTRY_COLUMNS} FROM entries e WHERE e.id = ?1");
    conn.query_row(&sql, params![id.as_str()], entry_from_row)
        .optional()
        .map_err(|e| storage_error("get_entry", &e))
}

fn query_entry_rows(conn: &Connection, sql: &str, values: Vec<Value>) -> rusqlite::Result<Vec<Entry>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params_from_iter(values), entry_from_row)?;
    rows.collect()
}

fn insert_entry(
    conn: &Connection,
    id: &EntryId,
    timestamps: AssignedTimestamps,
    input: &CreateEntryInput,
    fts: bool,
) -> Result<Entry> {
    let transcript = non_empty(input.transcript.as_deref());
    // The id is fixed across retries, so a retried insert is a no-op.
    conn.execute(
        "INSERT OR IGNORE INTO entries (
            id, created_at, recorded_at, updated_at, prompt, duration_seconds,
            audio_local_uri, photo_local_uri, transcript, transcribed, favourite
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0)",
        params![
            id.as_str(),
            timestamps.created_at,
            timestamps.recorded_at,
            timestamps.updated_at,
            non_empty(input.prompt.as_deref()),
            input.duration_seconds,
            input.audio_local_uri,
            non_empty(input.photo_local_uri.as_deref()),
            transcript,
            i64::from(transcript.is_some()),
        ],
    )
    .map_err(|e| storage_error("save_entry", &e))?;

    if fts {
        fts::reindex(conn, FtsOperation::Insert, id.as_str());
    }

    fetch_entry(conn, id)?.ok_or_else(|| Error::EntryNotRetrieved(id.to_string()))
}

/// Builds the `UPDATE` statement for `update`, binding `id` last.
fn build_update(id: &EntryId, update: &EntryUpdate, now: i64) -> (String, Vec<Value>) {
    fn text(value: Option<&String>) -> Value {
        non_empty(value.map(String::as_str)).map_or(Value::Null, |s| Value::Text(s.to_string()))
    }

    let mut columns: Vec<&'static str> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    let text_fields = [
        ("prompt", &update.prompt),
        ("transcript_segments", &update.transcript_segments),
        ("audio_remote_uri", &update.audio_remote_uri),
        ("photo_local_uri", &update.photo_local_uri),
        ("photo_remote_uri", &update.photo_remote_uri),
        ("tags", &update.tags),
    ];
    for (column, field) in text_fields {
        if let Some(change) = field.as_change() {
            columns.push(column);
            values.push(text(change));
        }
    }

    if let Some(change) = update.transcript.as_change() {
        let value = text(change);
        columns.push("transcribed");
        values.push(Value::Integer(i64::from(!matches!(value, Value::Null))));
        columns.push("transcript");
        values.push(value);
    }
    if let Some(change) = update.duration_seconds.as_change() {
        columns.push("duration_seconds");
        values.push(change.map_or(Value::Null, |d| Value::Real(*d)));
    }
    if let FieldUpdate::Set(uri) = &update.audio_local_uri {
        columns.push("audio_local_uri");
        values.push(Value::Text(uri.clone()));
    }
    if let Some(favourite) = update.favourite {
        columns.push("favourite");
        values.push(Value::Integer(i64::from(favourite)));
    }

    columns.push("updated_at");
    values.push(Value::Integer(now));

    let assignments = columns
        .iter()
        .enumerate()
        .map(|(i, column)| format!("{column} = ?{}", i + 1))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!("UPDATE entries SET {assignments} WHERE id = ?{}", columns.len() + 1);
    values.push(Value::Text(id.as_str().to_string()));
    (sql, values)
}

fn apply_update(
    conn: &mut Connection,
    id: &EntryId,
    update: &EntryUpdate,
    now: i64,
    fts: bool,
) -> Result<Option<Entry>> {
    let (sql, values) = build_update(id, update, now);

    let tx = conn
        .transaction()
        .map_err(|e| storage_error("update_entry", &e))?;
    let changed = tx
        .execute(&sql, params_from_iter(values))
        .map_err(|e| storage_error("update_entry", &e))?;
    tx.commit().map_err(|e| storage_error("update_entry", &e))?;

    if changed == 0 {
        tracing::debug!(entry_id = %id, "No entry to update");
        return Ok(None);
    }

    if fts && update.touches_search_text() {
        fts::reindex(conn, FtsOperation::Update, id.as_str());
    }

    fetch_entry(conn, id)
}

fn delete_entry(conn: &Connection, id: &EntryId, fts: bool) -> Result<bool> {
    if fts {
        fts::reindex(conn, FtsOperation::Delete, id.as_str());
    }
    let removed = conn
        .execute("DELETE FROM entries WHERE id = ?1", params![id.as_str()])
        .map_err(|e| storage_error("delete_entry", &e))?;
    Ok(removed > 0)
}

fn clear_entries(conn: &Connection, fts: bool) -> Result<usize> {
    let removed = conn
        .execute("DELETE FROM entries", [])
        .map_err(|e| storage_error("clear_entries", &e))?;
    if fts && let Err(e) = fts::clear(conn) {
        tracing::warn!(error = %e, "Failed to clear search index");
        metrics::counter!("storage_fts_sync_failures_total", "operation" => "clear").increment(1);
    }
    Ok(removed)
}

fn search_entries(conn: &Connection, query: &str, fts: bool, limit: i64) -> Result<Vec<Entry>> {
    if fts && let Some(fts_query) = build_fts_query(query) {
        match ranked_search(conn, &fts_query, limit) {
            Ok(entries) => return Ok(entries),
            Err(e) => {
                tracing::warn!(error = %e, "Full-text search failed, falling back to substring search");
            },
        }
    }

    metrics::counter!("storage_search_fallback_total").increment(1);
    substring_search(conn, query, limit).map_err(|e| storage_error("search_entries", &e))
}

fn ranked_search(conn: &Connection, fts_query: &str, limit: i64) -> rusqlite::Result<Vec<Entry>> {
    let sql = format!(
        "SELECT {ENTRY_COLUMNS}, bm25(entries_fts, 2.0, 1.0) AS rank
         FROM entries_fts
         JOIN entries e ON e.rowid = entries_fts.rowid
         WHERE entries_fts MATCH ?1
         ORDER BY rank ASC, e.created_at DESC
         LIMIT ?2"
    );
    query_entry_rows(
        conn,
        &sql,
        vec![Value::Text(fts_query.to_string()), Value::Integer(limit)],
    )
}

fn substring_search(conn: &Connection, query: &str, limit: i64) -> rusqlite::Result<Vec<Entry>> {
    let sql = format!(
        r"SELECT {ENTRY_COLUMNS},
            CASE
                WHEN LOWER(e.prompt) LIKE ?1 ESCAPE '\' THEN 1
                WHEN LOWER(e.transcript) LIKE ?1 ESCAPE '\' THEN 2
                ELSE 3
            END AS rank
         FROM entries e
         WHERE LOWER(e.prompt) LIKE ?1 ESCAPE '\' OR LOWER(e.transcript) LIKE ?1 ESCAPE '\'
         ORDER BY rank ASC, e.created_at DESC
         LIMIT ?2"
    );
    query_entry_rows(
        conn,
        &sql,
        vec![Value::Text(like_pattern(query)), Value::Integer(limit)],
    )
}
