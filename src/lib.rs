//! # Minmo
//!
//! Local-first persistence for a journaling app that stores short audio, photo
//! and text "moments".
//!
//! The crate owns a single embedded `SQLite` database with a full-text shadow
//! index, and exposes a narrow query surface to the presentation layer:
//!
//! - **Entries**: save, get, list, favourites, today's entry, partial update,
//!   delete, ranked search and clear-all
//! - **Maintenance**: manual database reset and the full "nuclear" wipe of
//!   entries, media files and device identity
//!
//! Transient engine failures are retried with linear backoff, storage
//! corruption triggers a one-shot destructive recreation of the database files,
//! and search degrades to substring matching when FTS5 is unavailable.
//!
//! ## Example
//!
//! ```rust,ignore
//! use minmo::{CreateEntryInput, JournalConfig, JournalStore};
//!
//! let store = JournalStore::open(JournalConfig::load_default());
//! let entry = store
//!     .entries()
//!     .save(&CreateEntryInput::new("file:///audio/1.m4a").with_prompt("Best part of today?"))
//!     .await?;
//! let hits = store.entries().search("today").await;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod cli;
pub mod config;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

pub use config::JournalConfig;
pub use models::{CreateEntryInput, Entry, EntryId, EntryUpdate, FieldUpdate};
pub use services::{EntryRepository, JournalStore, MaintenanceService};
pub use storage::{ConnectionManager, DeviceIdentity, MediaKind, MediaStore};

/// Error type for minmo operations.
///
/// The storage layer classifies every engine failure into one of these
/// variants, so retry and recovery decisions are a `match`, not string
/// sniffing.
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Missing audio URI, malformed CLI JSON, bad config values |
/// | `Transient` | Handle closed or not ready, busy/locked database, I/O errors, failed statement prepare |
/// | `Corruption` | `SQLite` reports a malformed database image or a non-database file |
/// | `InitializationFailed` | The connection manager exhausted its initialization attempts |
/// | `RecoveryFailed` | Recreating the database after corruption failed |
/// | `EntryNotRetrieved` | A freshly inserted entry could not be read back |
/// | `OperationFailed` | Anything else (constraints, filesystem, serialization) |
#[derive(Debug, Clone, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A transient engine failure; safe to retry on a fresh connection.
    #[error("transient failure in '{operation}': {cause}")]
    Transient {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// The on-disk database image is unreadable.
    #[error("storage corruption detected in '{operation}': {cause}")]
    Corruption {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// The database could not be initialized.
    #[error("failed to initialize database: {0}")]
    InitializationFailed(String),

    /// The database could not be recreated after corruption.
    #[error("failed to recreate database, please restart the app: {0}")]
    RecoveryFailed(String),

    /// An inserted entry vanished before it could be read back.
    #[error("could not retrieve saved entry '{0}'")]
    EntryNotRetrieved(String),

    /// An operation failed for a non-retryable reason.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

impl Error {
    /// Returns `true` if the operation may succeed on a fresh connection.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Returns `true` if the database image is corrupt.
    #[must_use]
    pub const fn is_corruption(&self) -> bool {
        matches!(self, Self::Corruption { .. })
    }

    pub(crate) fn transient(operation: &str, cause: impl ToString) -> Self {
        Self::Transient {
            operation: operation.to_string(),
            cause: cause.to_string(),
        }
    }

    pub(crate) fn failed(operation: &str, cause: impl ToString) -> Self {
        Self::OperationFailed {
            operation: operation.to_string(),
            cause: cause.to_string(),
        }
    }
}

/// Result type alias for minmo operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in milliseconds.
///
/// Falls back to 0 if the system clock is before the Unix epoch.
#[must_use]
pub fn current_timestamp_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
