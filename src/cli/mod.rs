//! CLI command implementations.
//!
//! Every command writes its result to the given writer as pretty JSON, so the
//! binary stays a thin argument parser and the handlers stay testable.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `save` | Save a new entry |
//! | `get` | Fetch one entry by id |
//! | `list` | List entries, newest first |
//! | `favourites` | List favourite entries |
//! | `today` | Show the entry recorded today |
//! | `update` | Apply a partial update given as JSON |
//! | `delete` | Delete one entry |
//! | `search` | Ranked full-text search |
//! | `clear` | Delete every entry |
//! | `reset` | Recreate an empty database, keeping media |
//! | `nuke` | Delete the database, all media and the device id |
//!
//! # Example Usage
//!
//! ```bash
//! minmo save --audio file:///audio/1.m4a --prompt "Best part of today?"
//! minmo search "coffee walk" --highlight
//! minmo update 1718000000000-abc123def '{"favourite": true, "prompt": null}'
//! minmo nuke --yes
//! ```

// Allow print_stdout/stderr in CLI module (consistent with main.rs)
#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]

mod entries;
mod maintenance;

pub use entries::{
    SaveArgs, cmd_clear, cmd_delete, cmd_favourites, cmd_get, cmd_list, cmd_save, cmd_search,
    cmd_today, cmd_update,
};
pub use maintenance::{cmd_nuke, cmd_reset};

use crate::{Error, Result};
use serde::Serialize;
use std::io::Write;

/// Writes `value` as pretty JSON followed by a newline.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn write_json<T: Serialize + ?Sized>(out: &mut dyn Write, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value).map_err(|e| Error::failed("write_output", e))?;
    writeln!(out).map_err(|e| Error::failed("write_output", e))
}

/// Refuses a destructive command unless the user confirmed it.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] when `confirmed` is false.
pub fn require_confirmation(command: &str, confirmed: bool) -> Result<()> {
    if confirmed {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "'{command}' is irreversible, re-run with --yes to confirm"
        )))
    }
}
