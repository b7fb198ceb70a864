//! Integration tests for the journal store.
//!
//! Every test runs against a real on-disk database in a temporary directory.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use chrono::Local;
use minmo::services::day_window;
use minmo::{CreateEntryInput, Entry, EntryId, EntryUpdate, FieldUpdate, JournalConfig, JournalStore};
use rusqlite::Connection;
use std::io::{Seek, SeekFrom, Write};
use tempfile::TempDir;

fn open_store(dir: &TempDir) -> JournalStore {
    JournalStore::open(JournalConfig::for_data_dir(dir.path()).without_delays())
}

fn audio(n: usize) -> CreateEntryInput {
    CreateEntryInput::new(format!("file:///audio/{n}.m4a"))
}

fn ids(entries: &[Entry]) -> Vec<&str> {
    entries.iter().map(|e| e.id.as_str()).collect()
}

/// Saves entries with unrelated text so BM25 term weights stay positive.
async fn save_fillers(store: &JournalStore, count: usize) {
    for n in 0..count {
        store
            .entries()
            .save(&audio(1000 + n).with_prompt("rainy afternoon").with_transcript("nothing much happened"))
            .await
            .unwrap();
    }
}

// ============================================================================
// Save / get / list
// ============================================================================

#[tokio::test]
async fn test_save_assigns_id_and_timestamps() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let entry = store
        .entries()
        .save(&audio(1).with_prompt("What made you smile?").with_duration(12.5))
        .await
        .unwrap();

    assert!(!entry.id.as_str().is_empty());
    assert_eq!(entry.created_at, entry.recorded_at);
    assert_eq!(entry.updated_at, entry.created_at);
    assert_eq!(entry.prompt.as_deref(), Some("What made you smile?"));
    assert_eq!(entry.duration_seconds, Some(12.5));
    assert!(!entry.transcribed);
    assert!(!entry.favourite);

    let fetched = store.entries().get(&entry.id).await.unwrap();
    assert_eq!(fetched, Some(entry));
}

#[tokio::test]
async fn test_save_stores_empty_strings_as_null() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let entry = store
        .entries()
        .save(&audio(1).with_prompt("").with_transcript("").with_photo(""))
        .await
        .unwrap();

    assert_eq!(entry.prompt, None);
    assert_eq!(entry.transcript, None);
    assert_eq!(entry.photo_local_uri, None);
    assert!(!entry.transcribed);

    let transcribed = store
        .entries()
        .save(&audio(2).with_transcript("hello there"))
        .await
        .unwrap();
    assert!(transcribed.transcribed);
}

#[tokio::test]
async fn test_save_rejects_missing_audio() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let err = store.entries().save(&CreateEntryInput::new("  ")).await.unwrap_err();
    assert!(matches!(err, minmo::Error::InvalidInput(_)));
}

#[tokio::test]
async fn test_get_missing_returns_none() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    assert!(store.entries().get(&EntryId::new("missing")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_list_is_newest_first_and_limited() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let mut saved = Vec::new();
    for n in 0..5 {
        let entry = store
            .entries()
            .save(&audio(n).with_created_at(1_700_000_000_000 + i64::try_from(n).unwrap() * 1000))
            .await
            .unwrap();
        saved.push(entry.id);
    }

    let all = store.entries().list(None).await.unwrap();
    let expected: Vec<&str> = saved.iter().rev().map(EntryId::as_str).collect();
    assert_eq!(ids(&all), expected);

    let limited = store.entries().list(Some(2)).await.unwrap();
    assert_eq!(ids(&limited), expected[..2].to_vec());
}

#[tokio::test]
async fn test_list_favourites() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let first = store.entries().save(&audio(1).with_created_at(1_000)).await.unwrap();
    let _second = store.entries().save(&audio(2).with_created_at(2_000)).await.unwrap();
    let third = store.entries().save(&audio(3).with_created_at(3_000)).await.unwrap();

    for id in [&first.id, &third.id] {
        store
            .entries()
            .update(id, &EntryUpdate::new().favourite(true))
            .await
            .unwrap();
    }

    let favourites = store.entries().list_favourites(None).await.unwrap();
    assert_eq!(ids(&favourites), vec![third.id.as_str(), first.id.as_str()]);
    assert!(favourites.iter().all(|e| e.favourite));
}

#[tokio::test]
async fn test_concurrent_saves_share_one_connection() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let handles: Vec<_> = (0..16)
        .map(|n| {
            let store = store.clone();
            tokio::spawn(async move { store.entries().save(&audio(n)).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(store.entries().list(None).await.unwrap().len(), 16);
}

// ============================================================================
// Today
// ============================================================================

#[tokio::test]
async fn test_get_for_today_uses_local_day_window() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let (start, end) = day_window(Local::now());

    assert!(store.entries().get_for_today().await.unwrap().is_none());

    store.entries().save(&audio(1).with_recorded_at(start - 1)).await.unwrap();
    store.entries().save(&audio(2).with_recorded_at(end)).await.unwrap();
    assert!(store.entries().get_for_today().await.unwrap().is_none());

    let early = store.entries().save(&audio(3).with_recorded_at(start)).await.unwrap();
    let later = store.entries().save(&audio(4).with_recorded_at(start + 60_000)).await.unwrap();

    let today = store.entries().get_for_today().await.unwrap().unwrap();
    assert_eq!(today.id, later.id);
    assert_ne!(today.id, early.id);
}

#[tokio::test]
async fn test_get_for_today_includes_last_millisecond() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let (_, end) = day_window(Local::now());

    let last = store.entries().save(&audio(1).with_recorded_at(end - 1)).await.unwrap();

    let today = store.entries().get_for_today().await.unwrap().unwrap();
    assert_eq!(today.id, last.id);
}

// ============================================================================
// Update / delete
// ============================================================================

#[tokio::test]
async fn test_update_distinguishes_absent_and_null() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let entry = store
        .entries()
        .save(
            &audio(1)
                .with_prompt("keep me")
                .with_transcript("drop me")
                .with_photo("file:///photo.jpg")
                .with_created_at(1_000),
        )
        .await
        .unwrap();

    let update = EntryUpdate {
        transcript: FieldUpdate::Clear,
        ..EntryUpdate::default()
    };
    let updated = store.entries().update(&entry.id, &update).await.unwrap().unwrap();

    assert_eq!(updated.prompt.as_deref(), Some("keep me"));
    assert_eq!(updated.photo_local_uri.as_deref(), Some("file:///photo.jpg"));
    assert_eq!(updated.transcript, None);
    assert!(!updated.transcribed);
    assert_eq!(updated.created_at, entry.created_at);
    assert!(updated.updated_at > entry.updated_at);
}

#[tokio::test]
async fn test_update_from_json_payload() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let entry = store.entries().save(&audio(1).with_prompt("before")).await.unwrap();

    let update: EntryUpdate =
        serde_json::from_str(r#"{"transcript": "now transcribed", "prompt": null}"#).unwrap();
    let updated = store.entries().update(&entry.id, &update).await.unwrap().unwrap();

    assert_eq!(updated.prompt, None);
    assert_eq!(updated.transcript.as_deref(), Some("now transcribed"));
    assert!(updated.transcribed);
    assert_eq!(updated.audio_local_uri, entry.audio_local_uri);
}

#[tokio::test]
async fn test_update_missing_entry_returns_none() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let result = store
        .entries()
        .update(&EntryId::new("ghost"), &EntryUpdate::new().favourite(true))
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn test_update_rejects_empty_audio() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let entry = store.entries().save(&audio(1)).await.unwrap();

    let update = EntryUpdate::new().audio_local_uri("");
    let err = store.entries().update(&entry.id, &update).await.unwrap_err();
    assert!(matches!(err, minmo::Error::InvalidInput(_)));
}

#[tokio::test]
async fn test_update_rejects_null_audio() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let entry = store.entries().save(&audio(1)).await.unwrap();

    let update: EntryUpdate = serde_json::from_str(r#"{"audio_local_uri": null}"#).unwrap();
    let err = store.entries().update(&entry.id, &update).await.unwrap_err();
    assert!(matches!(err, minmo::Error::InvalidInput(_)));

    let stored = store.entries().get(&entry.id).await.unwrap().unwrap();
    assert_eq!(stored.audio_local_uri, entry.audio_local_uri);
}

#[tokio::test]
async fn test_delete_reports_whether_removed() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let entry = store.entries().save(&audio(1).with_prompt("gone soon")).await.unwrap();

    assert!(store.entries().delete(&entry.id).await.unwrap());
    assert!(!store.entries().delete(&entry.id).await.unwrap());
    assert!(store.entries().get(&entry.id).await.unwrap().is_none());
    assert!(store.entries().search("gone").await.is_empty());
}

#[tokio::test]
async fn test_clear_all_empties_entries_and_index() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    for n in 0..3 {
        store.entries().save(&audio(n).with_prompt("sunset")).await.unwrap();
    }

    assert_eq!(store.entries().clear_all().await.unwrap(), 3);
    assert!(store.entries().list(None).await.unwrap().is_empty());
    assert!(store.entries().search("sunset").await.is_empty());

    let fresh = store.entries().save(&audio(9).with_prompt("sunset again")).await.unwrap();
    assert_eq!(ids(&store.entries().search("sunset").await), vec![fresh.id.as_str()]);
}

// ============================================================================
// Search
// ============================================================================

#[tokio::test]
async fn test_search_blank_query_returns_nothing() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    store.entries().save(&audio(1).with_prompt("anything")).await.unwrap();

    assert!(store.entries().search("").await.is_empty());
    assert!(store.entries().search("   ").await.is_empty());
    assert!(store.entries().search("?!").await.is_empty());
}

#[tokio::test]
async fn test_search_prompt_outranks_transcript() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    save_fillers(&store, 4).await;

    let in_prompt = store
        .entries()
        .save(&audio(1).with_prompt("coffee morning").with_transcript("quiet day").with_created_at(1_000))
        .await
        .unwrap();
    let in_transcript = store
        .entries()
        .save(&audio(2).with_prompt("quiet day").with_transcript("coffee morning").with_created_at(2_000))
        .await
        .unwrap();

    let results = store.entries().search("coffee").await;
    assert_eq!(ids(&results), vec![in_prompt.id.as_str(), in_transcript.id.as_str()]);
}

#[tokio::test]
async fn test_search_matches_word_prefixes() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    save_fillers(&store, 4).await;

    let brave = store.entries().save(&audio(1).with_transcript("I was brave today")).await.unwrap();
    let film = store.entries().save(&audio(2).with_transcript("Watched Braveheart again")).await.unwrap();

    let results = store.entries().search("brave").await;
    let found = ids(&results);
    assert_eq!(found.len(), 2);
    assert!(found.contains(&brave.id.as_str()));
    assert!(found.contains(&film.id.as_str()));

    let results = store.entries().search("braveheart").await;
    assert_eq!(ids(&results), vec![film.id.as_str()]);
}

#[tokio::test]
async fn test_search_exact_phrase_ranks_first() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    save_fillers(&store, 4).await;

    let phrase = store
        .entries()
        .save(&audio(1).with_transcript("a slow morning coffee outside").with_created_at(1_000))
        .await
        .unwrap();
    let scattered = store
        .entries()
        .save(&audio(2).with_transcript("coffee then a slow morning").with_created_at(2_000))
        .await
        .unwrap();

    let results = store.entries().search("morning coffee").await;
    assert_eq!(ids(&results), vec![phrase.id.as_str(), scattered.id.as_str()]);
}

#[tokio::test]
async fn test_search_tolerates_fts_syntax_in_query() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let entry = store
        .entries()
        .save(&audio(1).with_prompt("NEAR the AND gate \"quoted\""))
        .await
        .unwrap();

    let results = store.entries().search("\"quoted\" AND NEAR(").await;
    assert_eq!(ids(&results), vec![entry.id.as_str()]);
}

#[tokio::test]
async fn test_search_sees_updated_text() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let entry = store.entries().save(&audio(1).with_transcript("apple pie")).await.unwrap();
    assert!(store.entries().search("banana").await.is_empty());

    store
        .entries()
        .update(&entry.id, &EntryUpdate::new().transcript(Some("banana bread")))
        .await
        .unwrap();

    assert_eq!(ids(&store.entries().search("banana").await), vec![entry.id.as_str()]);
    assert!(store.entries().search("apple").await.is_empty());
}

#[tokio::test]
async fn test_search_survives_update_and_delete_churn() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let mut kept = Vec::new();
    for n in 0..6 {
        let entry = store.entries().save(&audio(n).with_prompt("harbour lights")).await.unwrap();
        if n % 2 == 0 {
            store.entries().delete(&entry.id).await.unwrap();
        } else {
            store
                .entries()
                .update(&entry.id, &EntryUpdate::new().prompt(Some("harbour lights at dusk")))
                .await
                .unwrap();
            kept.push(entry.id);
        }
    }

    let results = store.entries().search("harbour").await;
    assert_eq!(results.len(), kept.len());
    assert!(results.iter().all(|e| kept.contains(&e.id)));
}

#[tokio::test]
async fn test_search_falls_back_to_substring_without_index() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let in_transcript = store
        .entries()
        .save(&audio(1).with_transcript("Espresso at noon").with_created_at(2_000))
        .await
        .unwrap();
    let in_prompt = store
        .entries()
        .save(&audio(2).with_prompt("ESPRESSO or tea?").with_created_at(1_000))
        .await
        .unwrap();
    store.entries().save(&audio(3).with_prompt("100 percent")).await.unwrap();

    let db = store.connections().get_connection().await.unwrap();
    db.call("drop_index", |conn| {
        conn.execute_batch("DROP TABLE entries_fts")
            .map_err(|e| minmo::Error::OperationFailed {
                operation: "drop_index".to_string(),
                cause: e.to_string(),
            })
    })
    .await
    .unwrap();

    let results = store.entries().search("espresso").await;
    assert_eq!(ids(&results), vec![in_prompt.id.as_str(), in_transcript.id.as_str()]);

    assert!(store.entries().search("100%").await.is_empty());
}

// ============================================================================
// Corruption recovery
// ============================================================================

/// Overwrites the root pages of `entries` and its primary key index.
fn corrupt_entries_table(db_path: &std::path::Path) {
    let (page_size, roots) = {
        let conn = Connection::open(db_path).unwrap();
        let page_size: i64 = conn.query_row("PRAGMA page_size", [], |row| row.get(0)).unwrap();
        let roots: Vec<i64> = conn
            .prepare(
                "SELECT rootpage FROM sqlite_master
                 WHERE name IN ('entries', 'sqlite_autoindex_entries_1')",
            )
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();
        conn.close().unwrap();
        let roots: Vec<u64> = roots.into_iter().map(|r| u64::try_from(r).unwrap()).collect();
        (u64::try_from(page_size).unwrap(), roots)
    };
    assert_eq!(roots.len(), 2);

    let mut file = std::fs::OpenOptions::new().write(true).open(db_path).unwrap();
    let garbage = vec![0xFF_u8; usize::try_from(page_size).unwrap()];
    for root in roots {
        file.seek(SeekFrom::Start((root - 1) * page_size)).unwrap();
        file.write_all(&garbage).unwrap();
    }
    file.sync_all().unwrap();
}

#[tokio::test]
async fn test_update_on_corrupt_database_recreates_it() {
    let dir = TempDir::new().unwrap();
    let config = JournalConfig::for_data_dir(dir.path()).without_delays();
    let store = JournalStore::open(config.clone());

    let entry = store.entries().save(&audio(1).with_prompt("doomed")).await.unwrap();
    store.close().await;
    corrupt_entries_table(&config.database_path());

    let result = store
        .entries()
        .update(&entry.id, &EntryUpdate::new().favourite(true))
        .await
        .unwrap();

    assert!(result.is_none());
    assert_eq!(store.connections().recoveries(), 1);
    assert!(store.entries().list(None).await.unwrap().is_empty());

    let fresh = store.entries().save(&audio(2)).await.unwrap();
    assert!(store.entries().get(&fresh.id).await.unwrap().is_some());
}

/// Overwrites the file header so `SQLite` no longer recognizes the database.
fn clobber_header(db_path: &std::path::Path) {
    let mut file = std::fs::OpenOptions::new().write(true).open(db_path).unwrap();
    file.seek(SeekFrom::Start(0)).unwrap();
    file.write_all(&[0xAB_u8; 100]).unwrap();
    file.sync_all().unwrap();
}

#[tokio::test]
async fn test_save_on_corrupt_database_recreates_it() {
    let dir = TempDir::new().unwrap();
    let config = JournalConfig::for_data_dir(dir.path()).without_delays();
    let store = JournalStore::open(config.clone());

    let old = store.entries().save(&audio(1).with_prompt("doomed")).await.unwrap();
    store.close().await;
    corrupt_entries_table(&config.database_path());

    let fresh = store.entries().save(&audio(2).with_prompt("survivor")).await.unwrap();

    assert_eq!(store.connections().recoveries(), 1);
    assert_eq!(fresh.prompt.as_deref(), Some("survivor"));
    assert!(store.entries().get(&old.id).await.unwrap().is_none());
    assert_eq!(ids(&store.entries().list(None).await.unwrap()), vec![fresh.id.as_str()]);
}

#[tokio::test]
async fn test_delete_on_corrupt_database_recreates_it() {
    let dir = TempDir::new().unwrap();
    let config = JournalConfig::for_data_dir(dir.path()).without_delays();
    let store = JournalStore::open(config.clone());

    let entry = store.entries().save(&audio(1)).await.unwrap();
    store.close().await;
    clobber_header(&config.database_path());

    assert!(!store.entries().delete(&entry.id).await.unwrap());
    assert_eq!(store.connections().recoveries(), 1);
    assert!(store.entries().list(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_update_on_unreadable_header_recreates_database() {
    let dir = TempDir::new().unwrap();
    let config = JournalConfig::for_data_dir(dir.path()).without_delays();
    let store = JournalStore::open(config.clone());

    let entry = store.entries().save(&audio(1).with_prompt("doomed")).await.unwrap();
    store.close().await;
    clobber_header(&config.database_path());

    let result = store
        .entries()
        .update(&entry.id, &EntryUpdate::new().favourite(true))
        .await
        .unwrap();

    assert!(result.is_none());
    assert_eq!(store.connections().recoveries(), 1);

    let fresh = store.entries().save(&audio(2)).await.unwrap();
    assert!(store.entries().get(&fresh.id).await.unwrap().is_some());
    assert_eq!(store.connections().recoveries(), 1);
}

#[tokio::test]
async fn test_clear_all_on_corrupt_database_does_not_recreate() {
    let dir = TempDir::new().unwrap();
    let config = JournalConfig::for_data_dir(dir.path()).without_delays();
    let store = JournalStore::open(config.clone());

    store.entries().save(&audio(1)).await.unwrap();
    store.close().await;
    clobber_header(&config.database_path());

    let err = store.entries().clear_all().await.unwrap_err();
    assert!(err.is_corruption(), "unexpected error: {err}");
    assert_eq!(store.connections().recoveries(), 0);
}

// ============================================================================
// Maintenance
// ============================================================================

#[tokio::test]
async fn test_reset_database_keeps_working_store() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    store.entries().save(&audio(1).with_prompt("before reset")).await.unwrap();

    store.maintenance().reset_database().await.unwrap();

    assert!(store.entries().list(None).await.unwrap().is_empty());
    assert!(store.entries().search("reset").await.is_empty());
    store.entries().save(&audio(2)).await.unwrap();
    assert_eq!(store.entries().list(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_nuclear_reset_wipes_everything() {
    let dir = TempDir::new().unwrap();
    let config = JournalConfig::for_data_dir(dir.path()).without_delays();
    std::fs::create_dir_all(&config.audio_dir).unwrap();
    std::fs::write(config.audio_dir.join("1.m4a"), b"audio").unwrap();
    std::fs::write(&config.device_id_file, b"device").unwrap();

    let store = JournalStore::open(config.clone());
    store.entries().save(&audio(1).with_prompt("first")).await.unwrap();

    let report = store.maintenance().nuclear_reset().await.unwrap();

    assert!(report.is_complete(), "{:?}", report.failures);
    assert_eq!(report.audio_files_deleted, 1);
    assert!(report.device_id_cleared);
    assert!(!config.audio_dir.join("1.m4a").exists());
    assert!(!config.device_id_file.exists());
    assert!(store.entries().list(None).await.unwrap().is_empty());
}
