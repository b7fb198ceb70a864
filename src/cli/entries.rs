//! Entry commands.

use super::{require_confirmation, write_json};
use crate::services::{JournalStore, TextSegment, highlight_terms};
use crate::{CreateEntryInput, Entry, EntryId, EntryUpdate, Error, Result};
use serde::Serialize;
use std::io::Write;

/// Arguments of the `save` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct SaveArgs {
    /// URI of the recorded audio file.
    #[arg(short, long)]
    pub audio: String,

    /// The prompt that was answered.
    #[arg(short, long)]
    pub prompt: Option<String>,

    /// Transcript of the recording.
    #[arg(short, long)]
    pub transcript: Option<String>,

    /// Length of the recording in seconds.
    #[arg(short, long)]
    pub duration: Option<f64>,

    /// URI of an attached photo.
    #[arg(long)]
    pub photo: Option<String>,

    /// Recording time in epoch milliseconds (defaults to now).
    #[arg(long)]
    pub recorded_at: Option<i64>,
}

impl SaveArgs {
    fn into_input(self) -> CreateEntryInput {
        CreateEntryInput {
            audio_local_uri: self.audio,
            prompt: self.prompt,
            duration_seconds: self.duration,
            photo_local_uri: self.photo,
            transcript: self.transcript,
            recorded_at: self.recorded_at,
            created_at: None,
        }
    }
}

/// Saves a new entry and prints it.
pub async fn cmd_save(store: &JournalStore, args: SaveArgs, out: &mut dyn Write) -> Result<()> {
    if args.audio.trim().is_empty() {
        return Err(Error::InvalidInput("--audio must not be empty".to_string()));
    }
    let entry = store.entries().save(&args.into_input()).await?;
    write_json(out, &entry)
}

/// Prints one entry, or `null` if it does not exist.
pub async fn cmd_get(store: &JournalStore, id: &str, out: &mut dyn Write) -> Result<()> {
    let entry = store.entries().get(&EntryId::new(id)).await?;
    write_json(out, &entry)
}

/// Prints entries, newest first.
pub async fn cmd_list(store: &JournalStore, limit: Option<usize>, out: &mut dyn Write) -> Result<()> {
    let entries = store.entries().list(limit).await?;
    write_json(out, &entries)
}

/// Prints favourite entries, newest first.
pub async fn cmd_favourites(
    store: &JournalStore,
    limit: Option<usize>,
    out: &mut dyn Write,
) -> Result<()> {
    let entries = store.entries().list_favourites(limit).await?;
    write_json(out, &entries)
}

/// Prints the latest entry recorded today, or `null`.
pub async fn cmd_today(store: &JournalStore, out: &mut dyn Write) -> Result<()> {
    let entry = store.entries().get_for_today().await?;
    write_json(out, &entry)
}

/// Applies a JSON partial update and prints the updated entry.
///
/// Absent keys stay unchanged and `null` clears a field, for example
/// `{"prompt": null, "favourite": true}`.
pub async fn cmd_update(
    store: &JournalStore,
    id: &str,
    changes: &str,
    out: &mut dyn Write,
) -> Result<()> {
    let update: EntryUpdate = serde_json::from_str(changes)
        .map_err(|e| Error::InvalidInput(format!("invalid update JSON: {e}")))?;
    let entry = store.entries().update(&EntryId::new(id), &update).await?;
    write_json(out, &entry)
}

#[derive(Serialize)]
struct DeleteOutput<'a> {
    id: &'a str,
    deleted: bool,
}

/// Deletes one entry.
pub async fn cmd_delete(store: &JournalStore, id: &str, out: &mut dyn Write) -> Result<()> {
    let deleted = store.entries().delete(&EntryId::new(id)).await?;
    write_json(out, &DeleteOutput { id, deleted })
}

#[derive(Serialize)]
struct Highlights {
    prompt: Vec<TextSegment>,
    transcript: Vec<TextSegment>,
}

#[derive(Serialize)]
struct HighlightedEntry {
    #[serde(flatten)]
    entry: Entry,
    highlights: Highlights,
}

/// Prints ranked search results, optionally with highlighted matches.
pub async fn cmd_search(
    store: &JournalStore,
    query: &str,
    highlight: bool,
    out: &mut dyn Write,
) -> Result<()> {
    let entries = store.entries().search(query).await;
    if !highlight {
        return write_json(out, &entries);
    }

    let highlighted: Vec<HighlightedEntry> = entries
        .into_iter()
        .map(|entry| HighlightedEntry {
            highlights: Highlights {
                prompt: highlight_terms(entry.prompt.as_deref().unwrap_or_default(), query),
                transcript: highlight_terms(entry.transcript.as_deref().unwrap_or_default(), query),
            },
            entry,
        })
        .collect();
    write_json(out, &highlighted)
}

#[derive(Serialize)]
struct ClearOutput {
    deleted: usize,
}

/// Deletes every entry. Requires confirmation.
pub async fn cmd_clear(store: &JournalStore, confirmed: bool, out: &mut dyn Write) -> Result<()> {
    require_confirmation("clear", confirmed)?;
    let deleted = store.entries().clear_all().await?;
    write_json(out, &ClearOutput { deleted })
}
