//! Reset commands.

use super::{require_confirmation, write_json};
use crate::Result;
use crate::services::JournalStore;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct ResetOutput {
    reset: bool,
}

/// Recreates an empty database. Media files are kept.
pub async fn cmd_reset(store: &JournalStore, confirmed: bool, out: &mut dyn Write) -> Result<()> {
    require_confirmation("reset", confirmed)?;
    store.maintenance().reset_database().await?;
    write_json(out, &ResetOutput { reset: true })
}

/// Deletes the database, every media file and the device id.
///
/// Prints the cleanup report; partial failures are listed in it.
pub async fn cmd_nuke(store: &JournalStore, confirmed: bool, out: &mut dyn Write) -> Result<()> {
    require_confirmation("nuke", confirmed)?;
    let report = store.maintenance().nuclear_reset().await?;
    if !report.is_complete() {
        eprintln!(
            "Warning: {} cleanup step(s) failed, see \"failures\"",
            report.failures.len()
        );
    }
    write_json(out, &report)
}
