//! Per-installation device identity.

use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Supplies a stable identifier for this installation.
pub trait DeviceIdentity: Send + Sync {
    /// Returns the identifier, creating one on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier cannot be read or persisted.
    fn device_id(&self) -> Result<String>;

    /// Forgets the identifier. Clearing when none exists succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if a stored identifier cannot be removed.
    fn clear(&self) -> Result<()>;
}

/// [`DeviceIdentity`] stored as a UUID in a single file.
#[derive(Debug, Clone)]
pub struct FileDeviceIdentity {
    path: PathBuf,
}

impl FileDeviceIdentity {
    /// Creates an identity stored at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_existing(&self) -> Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let id = contents.trim();
                Ok((!id.is_empty()).then(|| id.to_string()))
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::failed("read_device_id", e)),
        }
    }
}

impl DeviceIdentity for FileDeviceIdentity {
    fn device_id(&self) -> Result<String> {
        if let Some(id) = self.read_existing()? {
            return Ok(id);
        }

        let id = uuid::Uuid::new_v4().to_string();
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::failed("write_device_id", e))?;
        }
        std::fs::write(&self.path, &id).map_err(|e| Error::failed("write_device_id", e))?;
        tracing::info!(device_id = %id, "Generated new device id");
        Ok(id)
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!("Cleared device id");
                Ok(())
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::failed("clear_device_id", e)),
        }
    }
}
