//! Data models for minmo.
//!
//! This module contains the entry types shared by the storage layer, the
//! services and the CLI.

mod entry;
mod update;

pub use entry::{AssignedTimestamps, CreateEntryInput, Entry, EntryId};
pub(crate) use entry::non_empty;
pub use update::{EntryUpdate, FieldUpdate};
