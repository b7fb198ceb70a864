//! Observability.
//!
//! Installs the global `tracing` subscriber. Metrics are emitted through the
//! `metrics` facade and stay no-ops unless the embedding application installs
//! a recorder.

mod logging;

pub use logging::{LOG_ENV, LoggingConfig};

use crate::config::LogFormat;
use crate::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static LOGGING_INIT: OnceLock<()> = OnceLock::new();

/// Installs the global subscriber.
///
/// Console output goes to stderr so stdout stays free for command output.
///
/// # Errors
///
/// Returns an error if logging was already initialized or the log file
/// cannot be opened.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    if LOGGING_INIT.get().is_some() {
        return Err(Error::failed("logging_init", "logging already initialized"));
    }

    let registry = tracing_subscriber::registry().with(config.filter());

    match (&config.file, config.format) {
        (Some(log_file), LogFormat::Json) => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(open_log_file(log_file)?)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(true),
            )
            .try_init(),
        (Some(log_file), LogFormat::Pretty) => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(open_log_file(log_file)?)
                    .with_ansi(false)
                    .with_target(true),
            )
            .try_init(),
        (None, LogFormat::Json) => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(io::stderr)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(true),
            )
            .try_init(),
        (None, LogFormat::Pretty) => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_writer(io::stderr)
                    .with_target(true),
            )
            .try_init(),
    }
    .map_err(|e| Error::failed("logging_init", e))?;

    LOGGING_INIT
        .set(())
        .map_err(|()| Error::failed("logging_init", "failed to mark logging initialized"))
}

/// Thread-safe file writer for logging.
#[derive(Clone)]
struct LogFileWriter {
    file: Arc<Mutex<File>>,
}

impl Write for LogFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .file
            .lock()
            .map_err(|e| io::Error::other(e.to_string()))?;
        guard.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut guard = self
            .file
            .lock()
            .map_err(|e| io::Error::other(e.to_string()))?;
        guard.flush()
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogFileWriter {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Opens a log file for appending, creating parent directories.
fn open_log_file(path: &Path) -> Result<LogFileWriter> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::failed("create_log_dir", e))?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::failed("open_log_file", format!("{}: {e}", path.display())))?;

    Ok(LogFileWriter {
        file: Arc::new(Mutex::new(file)),
    })
}
