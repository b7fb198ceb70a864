//! Media file storage.
//!
//! Entries reference audio and photo files by URI; the bytes live in two
//! directories under the data dir. The database never reads or writes them.

use crate::{Error, Result};
use std::path::{Path, PathBuf};

const FILE_SCHEME: &str = "file://";

/// Kind of media file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// Audio recordings.
    Audio,
    /// Photos.
    Photo,
}

impl MediaKind {
    /// Returns the kind name used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Photo => "photo",
        }
    }
}

/// File-system collaborator for media blobs.
///
/// Implementations are blocking; async callers run them on the blocking pool.
pub trait MediaStore: Send + Sync {
    /// Copies `source_uri` into permanent audio storage as `filename`.
    ///
    /// # Errors
    ///
    /// Returns an error if the filename is invalid or the copy fails.
    fn save_audio_file(&self, source_uri: &str, filename: &str) -> Result<String>;

    /// Copies `source_uri` into permanent photo storage as `filename`.
    ///
    /// # Errors
    ///
    /// Returns an error if the filename is invalid or the copy fails.
    fn save_photo_file(&self, source_uri: &str, filename: &str) -> Result<String>;

    /// Deletes the file at `uri`. Deleting a missing file succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be removed.
    fn delete_file(&self, uri: &str) -> Result<()>;

    /// Lists the URIs of every file stored for `kind`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be read.
    fn list_files(&self, kind: MediaKind) -> Result<Vec<String>>;
}

/// Converts a `file://` URI (or plain path) to a path.
#[must_use]
pub fn uri_to_path(uri: &str) -> PathBuf {
    PathBuf::from(uri.strip_prefix(FILE_SCHEME).unwrap_or(uri))
}

/// Converts a path to a `file://` URI.
#[must_use]
pub fn path_to_uri(path: &Path) -> String {
    format!("{FILE_SCHEME}{}", path.display())
}

/// [`MediaStore`] backed by two local directories.
#[derive(Debug, Clone)]
pub struct LocalMediaStore {
    audio_dir: PathBuf,
    photo_dir: PathBuf,
}

impl LocalMediaStore {
    /// Creates a store over the given directories. They are created on the
    /// first save.
    #[must_use]
    pub fn new(audio_dir: impl Into<PathBuf>, photo_dir: impl Into<PathBuf>) -> Self {
        Self {
            audio_dir: audio_dir.into(),
            photo_dir: photo_dir.into(),
        }
    }

    /// Returns the directory for `kind`.
    #[must_use]
    pub fn dir(&self, kind: MediaKind) -> &Path {
        match kind {
            MediaKind::Audio => &self.audio_dir,
            MediaKind::Photo => &self.photo_dir,
        }
    }

    fn save(&self, kind: MediaKind, source_uri: &str, filename: &str) -> Result<String> {
        validate_filename(filename)?;
        let dir = self.dir(kind);
        std::fs::create_dir_all(dir).map_err(|e| Error::failed("create_media_dir", e))?;

        let destination = dir.join(filename);
        std::fs::copy(uri_to_path(source_uri), &destination).map_err(|e| {
            tracing::error!(kind = kind.as_str(), source = source_uri, error = %e, "Failed to copy media file");
            Error::failed("copy_media_file", format!("failed to copy {} file: {e}", kind.as_str()))
        })?;

        tracing::debug!(kind = kind.as_str(), path = %destination.display(), "Saved media file");
        Ok(path_to_uri(&destination))
    }
}

/// Rejects names that would escape the media directory.
fn validate_filename(filename: &str) -> Result<()> {
    let path = Path::new(filename);
    let single_component = path.components().count() == 1
        && path.file_name().is_some_and(|name| name == path.as_os_str());
    if filename.is_empty() || !single_component {
        return Err(Error::InvalidInput(format!("invalid media filename: {filename:?}")));
    }
    Ok(())
}

impl MediaStore for LocalMediaStore {
    fn save_audio_file(&self, source_uri: &str, filename: &str) -> Result<String> {
        self.save(MediaKind::Audio, source_uri, filename)
    }

    fn save_photo_file(&self, source_uri: &str, filename: &str) -> Result<String> {
        self.save(MediaKind::Photo, source_uri, filename)
    }

    fn delete_file(&self, uri: &str) -> Result<()> {
        match std::fs::remove_file(uri_to_path(uri)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::failed("delete_media_file", e)),
        }
    }

    fn list_files(&self, kind: MediaKind) -> Result<Vec<String>> {
        let entries = match std::fs::read_dir(self.dir(kind)) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::failed("list_media_files", e)),
        };

        let mut uris = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::failed("list_media_files", e))?;
            if entry.file_type().is_ok_and(|t| t.is_file()) {
                uris.push(path_to_uri(&entry.path()));
            }
        }
        uris.sort();
        Ok(uris)
    }
}
