//! On-disk layout of the database.

use std::path::{Path, PathBuf};

/// Paths of the database file and its WAL sidecars.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseLayout {
    db: PathBuf,
}

impl DatabaseLayout {
    /// Creates a layout for the database at `db`.
    #[must_use]
    pub fn new(db: impl Into<PathBuf>) -> Self {
        Self { db: db.into() }
    }

    /// Primary database file.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db
    }

    /// Write-ahead log (`<db>-wal`).
    #[must_use]
    pub fn wal_path(&self) -> PathBuf {
        Self::sidecar(&self.db, "-wal")
    }

    /// Shared-memory index (`<db>-shm`).
    #[must_use]
    pub fn shm_path(&self) -> PathBuf {
        Self::sidecar(&self.db, "-shm")
    }

    /// All files that make up the database, primary first.
    #[must_use]
    pub fn files(&self) -> [PathBuf; 3] {
        [self.db.clone(), self.wal_path(), self.shm_path()]
    }

    /// Deletes every database file that exists.
    ///
    /// Each file is removed independently; a failure is logged and does not
    /// stop the others. Returns the number of files removed.
    pub fn remove_files(&self) -> usize {
        let mut removed = 0;
        for path in self.files() {
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    tracing::debug!(path = %path.display(), "Removed database file");
                    removed += 1;
                },
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to remove database file");
                    metrics::counter!("storage_file_delete_failures_total", "kind" => "database")
                        .increment(1);
                },
            }
        }
        removed
    }

    fn sidecar(db: &Path, suffix: &str) -> PathBuf {
        let mut name = db.as_os_str().to_os_string();
        name.push(suffix);
        PathBuf::from(name)
    }
}
