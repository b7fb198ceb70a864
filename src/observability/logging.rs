//! Structured logging configuration.

use crate::config::{LogFormat, LoggingSettings};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the filter directive.
pub const LOG_ENV: &str = "MINMO_LOG";

/// Resolved logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Filter directive in `EnvFilter` syntax.
    pub directive: String,
    /// Output format.
    pub format: LogFormat,
    /// Log file; stderr when unset.
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    /// Resolves the configuration from settings and the environment.
    ///
    /// The filter is taken from `MINMO_LOG`, then `RUST_LOG`, then the
    /// configured level, then `debug` when verbose or `info` otherwise.
    #[must_use]
    pub fn from_settings(settings: &LoggingSettings, verbose: bool) -> Self {
        Self::resolve(settings, verbose, |key| std::env::var(key).ok())
    }

    /// Like [`LoggingConfig::from_settings`], reading variables through `lookup`.
    #[must_use]
    pub fn resolve(
        settings: &LoggingSettings,
        verbose: bool,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let directive = lookup(LOG_ENV)
            .or_else(|| lookup("RUST_LOG"))
            .filter(|value| !value.trim().is_empty())
            .or_else(|| settings.level.clone())
            .unwrap_or_else(|| if verbose { "debug" } else { "info" }.to_string());

        Self {
            directive,
            format: settings.format,
            file: settings.file.clone(),
        }
    }

    /// Builds the filter, falling back to `info` for an invalid directive.
    #[must_use]
    pub fn filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.directive).unwrap_or_else(|_| EnvFilter::new("info"))
    }
}
