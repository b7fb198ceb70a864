//! Business logic services.
//!
//! [`JournalStore`] wires the storage layer together and hands out the two
//! services the presentation layer uses: [`EntryRepository`] and
//! [`MaintenanceService`].

mod entries;
pub mod highlight;
mod maintenance;

pub use entries::{EntryRepository, day_window};
pub use highlight::{TextSegment, highlight_terms};
pub use maintenance::{MaintenanceService, NuclearResetReport};

use crate::config::JournalConfig;
use crate::storage::{
    ConnectionManager, DatabaseLayout, DeviceIdentity, FileDeviceIdentity, LocalMediaStore,
    MediaStore,
};
use std::sync::Arc;

/// The journal's persistence layer.
///
/// Owns the process-wide [`ConnectionManager`]; the database is opened
/// lazily by the first operation.
///
/// # Usage
///
/// ```rust,ignore
/// use minmo::{CreateEntryInput, JournalConfig, JournalStore};
///
/// let store = JournalStore::open(JournalConfig::load_default());
/// let entry = store.entries().save(&CreateEntryInput::new("file:///a.m4a")).await?;
/// store.maintenance().reset_database().await?;
/// ```
#[derive(Debug, Clone)]
pub struct JournalStore {
    manager: Arc<ConnectionManager>,
    entries: EntryRepository,
    maintenance: MaintenanceService,
}

impl JournalStore {
    /// Creates a store with local media storage and a file-backed device id.
    #[must_use]
    pub fn open(config: JournalConfig) -> Self {
        let media = Arc::new(LocalMediaStore::new(&config.audio_dir, &config.photo_dir));
        let identity = Arc::new(FileDeviceIdentity::new(&config.device_id_file));
        Self::with_collaborators(config, media, identity)
    }

    /// Creates a store with custom media and identity collaborators.
    #[must_use]
    pub fn with_collaborators(
        config: JournalConfig,
        media: Arc<dyn MediaStore>,
        identity: Arc<dyn DeviceIdentity>,
    ) -> Self {
        let db_path = config.database_path();
        tracing::debug!(path = %db_path.display(), "Journal store configured");
        let manager = Arc::new(ConnectionManager::new(DatabaseLayout::new(db_path), config.init));
        Self {
            entries: EntryRepository::new(Arc::clone(&manager), &config),
            maintenance: MaintenanceService::new(Arc::clone(&manager), media, identity, &config),
            manager,
        }
    }

    /// Returns the entry repository.
    #[must_use]
    pub const fn entries(&self) -> &EntryRepository {
        &self.entries
    }

    /// Returns the maintenance service.
    #[must_use]
    pub const fn maintenance(&self) -> &MaintenanceService {
        &self.maintenance
    }

    /// Returns the connection manager.
    #[must_use]
    pub const fn connections(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    /// Closes the database. The next operation reopens it.
    pub async fn close(&self) {
        self.manager.close_connection().await;
    }
}
