//! Storage layer.
//!
//! - [`sqlite`]: the journal database, its FTS shadow index and connection lifecycle
//! - [`resilience`]: retry of transient failures
//! - [`media`]: audio and photo files referenced by entries
//! - [`identity`]: the per-installation device identifier

// Dropping guards slightly earlier would not release anything meaningful.
#![allow(clippy::significant_drop_tightening)]

pub mod identity;
pub mod media;
pub mod resilience;
pub mod sqlite;

pub use identity::{DeviceIdentity, FileDeviceIdentity};
pub use media::{LocalMediaStore, MediaKind, MediaStore};
pub use resilience::with_retry;
pub use sqlite::{ConnectionManager, Database, DatabaseLayout};
