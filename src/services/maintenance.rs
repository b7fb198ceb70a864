//! Destructive maintenance operations.
//!
//! | Operation | Database | Media files | Device id |
//! |-----------|----------|-------------|-----------|
//! | [`MaintenanceService::reset_database`] | recreated empty | kept | kept |
//! | [`MaintenanceService::nuclear_reset`] | recreated empty | deleted | cleared |
//!
//! Both are irreversible.

use crate::config::JournalConfig;
use crate::storage::{ConnectionManager, DeviceIdentity, MediaKind, MediaStore};
use crate::{Error, Result};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::instrument;

/// Outcome of a nuclear reset.
///
/// Cleanup steps are best-effort; their failures are collected here instead
/// of aborting the reset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NuclearResetReport {
    /// Database files removed (primary, WAL, SHM).
    pub database_files_removed: usize,
    /// Audio files deleted.
    pub audio_files_deleted: usize,
    /// Photo files deleted.
    pub photo_files_deleted: usize,
    /// Whether the device identifier was cleared.
    pub device_id_cleared: bool,
    /// Description of each cleanup step that failed.
    pub failures: Vec<String>,
}

impl NuclearResetReport {
    /// Returns `true` if every cleanup step succeeded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Service for manual resets.
#[derive(Clone)]
pub struct MaintenanceService {
    manager: Arc<ConnectionManager>,
    media: Arc<dyn MediaStore>,
    identity: Arc<dyn DeviceIdentity>,
    recreate_delay: Duration,
    close_delay: Duration,
}

impl std::fmt::Debug for MaintenanceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaintenanceService")
            .field("manager", &self.manager)
            .field("recreate_delay", &self.recreate_delay)
            .field("close_delay", &self.close_delay)
            .finish_non_exhaustive()
    }
}

impl MaintenanceService {
    /// Creates the service.
    #[must_use]
    pub fn new(
        manager: Arc<ConnectionManager>,
        media: Arc<dyn MediaStore>,
        identity: Arc<dyn DeviceIdentity>,
        config: &JournalConfig,
    ) -> Self {
        Self {
            manager,
            media,
            identity,
            recreate_delay: Duration::from_millis(config.delays.recreate_ms),
            close_delay: Duration::from_millis(config.delays.close_ms),
        }
    }

    /// Deletes the database files and recreates an empty database.
    ///
    /// Same sequence as corruption recovery, triggered by the user.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RecoveryFailed`] if the new database cannot be opened.
    #[instrument(skip(self), fields(operation = "reset_database"))]
    pub async fn reset_database(&self) -> Result<()> {
        let start = Instant::now();
        tracing::warn!("Manual database reset requested");
        let result = self.manager.recreate_database(self.recreate_delay).await.map(|_| ());
        Self::record_metrics("reset_database", start, result.is_ok());
        result
    }

    /// Deletes all app data: the database, every media file and the device
    /// identifier, then opens a fresh empty database.
    ///
    /// Each cleanup step runs even if an earlier one failed; failures are
    /// listed in the returned report.
    ///
    /// # Errors
    ///
    /// Returns an error only if the fresh database cannot be initialized.
    #[instrument(skip(self), fields(operation = "nuclear_reset"))]
    pub async fn nuclear_reset(&self) -> Result<NuclearResetReport> {
        let start = Instant::now();
        tracing::warn!("Nuclear reset requested, deleting all app data");
        let mut report = NuclearResetReport::default();

        self.manager.close_connection().await;
        report.database_files_removed = self.manager.layout().remove_files();
        tokio::time::sleep(self.close_delay).await;

        report.audio_files_deleted = self.delete_media(MediaKind::Audio, &mut report.failures).await;
        report.photo_files_deleted = self.delete_media(MediaKind::Photo, &mut report.failures).await;

        let identity = Arc::clone(&self.identity);
        match run_blocking("clear_device_id", move || identity.clear()).await {
            Ok(()) => report.device_id_cleared = true,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to clear device id");
                report.failures.push(format!("device id: {e}"));
            },
        }

        tokio::time::sleep(self.close_delay).await;

        let reinit = self.manager.get_connection().await;
        Self::record_metrics("nuclear_reset", start, reinit.is_ok());
        reinit?;

        tracing::info!(
            database_files = report.database_files_removed,
            audio_files = report.audio_files_deleted,
            photo_files = report.photo_files_deleted,
            failures = report.failures.len(),
            duration_ms = start.elapsed().as_millis(),
            "Nuclear reset completed"
        );
        Ok(report)
    }

    /// Deletes every file of `kind`, recording failures.
    async fn delete_media(&self, kind: MediaKind, failures: &mut Vec<String>) -> usize {
        let media = Arc::clone(&self.media);
        let listed = run_blocking("list_media_files", move || media.list_files(kind)).await;
        let uris = match listed {
            Ok(uris) => uris,
            Err(e) => {
                tracing::warn!(kind = kind.as_str(), error = %e, "Failed to list media files");
                failures.push(format!("list {} files: {e}", kind.as_str()));
                return 0;
            },
        };

        let mut deleted = 0;
        for uri in uris {
            let media = Arc::clone(&self.media);
            let target = uri.clone();
            match run_blocking("delete_media_file", move || media.delete_file(&target)).await {
                Ok(()) => deleted += 1,
                Err(e) => {
                    tracing::warn!(kind = kind.as_str(), uri = %uri, error = %e, "Failed to delete media file");
                    metrics::counter!("storage_file_delete_failures_total", "kind" => kind.as_str())
                        .increment(1);
                    failures.push(format!("delete {uri}: {e}"));
                },
            }
        }
        deleted
    }

    fn record_metrics(operation: &'static str, start: Instant, success: bool) {
        let status = if success { "success" } else { "error" };
        metrics::counter!("maintenance_operations_total", "operation" => operation, "status" => status)
            .increment(1);
        metrics::histogram!("maintenance_operation_duration_ms", "operation" => operation)
            .record(start.elapsed().as_secs_f64() * 1000.0);
    }
}

/// Runs a blocking collaborator call on the blocking pool.
async fn run_blocking<T, F>(operation: &'static str, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::failed(operation, e))?
}
