//! Configuration management.
//!
//! Configuration is resolved in three layers: built-in defaults, an optional
//! TOML file, then `MINMO_*` environment variables.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application directory name under the platform data/config dirs.
const APP_DIR: &str = "minmo";

/// Default database file name.
pub const DEFAULT_DATABASE_NAME: &str = "minmo.db";

/// Main configuration for minmo.
#[derive(Debug, Clone)]
pub struct JournalConfig {
    /// Application-private directory holding the database and media.
    pub data_dir: PathBuf,
    /// Database file name inside `data_dir`.
    pub database_name: String,
    /// Directory for saved audio clips.
    pub audio_dir: PathBuf,
    /// Directory for saved photos.
    pub photo_dir: PathBuf,
    /// File holding the per-installation device identifier.
    pub device_id_file: PathBuf,
    /// Retry policy for repository operations.
    pub retry: RetryConfig,
    /// Connection initialization policy.
    pub init: InitConfig,
    /// Settle delays used by destructive maintenance.
    pub delays: MaintenanceDelays,
    /// Default cap for list queries.
    pub list_limit: usize,
    /// Cap for search results.
    pub search_limit: usize,
    /// Logging settings.
    pub logging: LoggingSettings,
}

/// Retry policy for transient storage failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Backoff unit; retry `n` waits `n * backoff_ms`.
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_ms: 200,
        }
    }
}

impl RetryConfig {
    /// Returns the delay before retry number `attempt` (1-based).
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_ms.saturating_mul(u64::from(attempt)))
    }
}

/// Connection initialization policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitConfig {
    /// Initialization retries after the first attempt.
    pub max_retries: u32,
    /// Delay unit between attempts; attempt `n` waits `n * retry_delay_ms`.
    pub retry_delay_ms: u64,
    /// Pause after a successful open before handing out the handle.
    pub settle_delay_ms: u64,
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_delay_ms: 200,
            settle_delay_ms: 100,
        }
    }
}

/// Delays used by reset operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaintenanceDelays {
    /// Wait between deleting database files and recreating them.
    pub recreate_ms: u64,
    /// Wait after closing the database so file handles are released.
    pub close_ms: u64,
}

impl Default for MaintenanceDelays {
    fn default() -> Self {
        Self {
            recreate_ms: 500,
            close_ms: 1000,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parses a format string, defaulting to pretty.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Default)]
pub struct LoggingSettings {
    /// Filter directive (e.g. `info`, `minmo=debug`).
    pub level: Option<String>,
    /// Output format.
    pub format: LogFormat,
    /// Optional log file; stderr when unset.
    pub file: Option<PathBuf>,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Data directory.
    pub data_dir: Option<String>,
    /// Database file name.
    pub database_name: Option<String>,
    /// List cap.
    pub list_limit: Option<usize>,
    /// Search cap.
    pub search_limit: Option<usize>,
    /// Retry section.
    pub retry: Option<ConfigFileRetry>,
    /// Logging section.
    pub logging: Option<ConfigFileLogging>,
}

/// Retry section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileRetry {
    /// Retries after the first attempt.
    pub max_retries: Option<u32>,
    /// Backoff unit in milliseconds.
    pub backoff_ms: Option<u64>,
}

/// Logging section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileLogging {
    /// Filter directive.
    pub level: Option<String>,
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// Log file path.
    pub file: Option<String>,
}

impl Default for JournalConfig {
    fn default() -> Self {
        let data_dir = directories::ProjectDirs::from("", "", APP_DIR)
            .map_or_else(|| PathBuf::from(".minmo"), |dirs| dirs.data_dir().to_path_buf());
        Self::for_data_dir(data_dir)
    }
}

impl JournalConfig {
    /// Creates a configuration with every path rooted at `data_dir`.
    #[must_use]
    pub fn for_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            audio_dir: data_dir.join("audio"),
            photo_dir: data_dir.join("photos"),
            device_id_file: data_dir.join("device_id"),
            database_name: DEFAULT_DATABASE_NAME.to_string(),
            data_dir,
            retry: RetryConfig::default(),
            init: InitConfig::default(),
            delays: MaintenanceDelays::default(),
            list_limit: 100,
            search_limit: 50,
            logging: LoggingSettings::default(),
        }
    }

    /// Zeroes every retry, settle and maintenance delay.
    ///
    /// Retry counts are kept, so behavior is unchanged apart from timing.
    #[must_use]
    pub const fn without_delays(mut self) -> Self {
        self.retry.backoff_ms = 0;
        self.init.retry_delay_ms = 0;
        self.init.settle_delay_ms = 0;
        self.delays.recreate_ms = 0;
        self.delays.close_ms = 0;
        self
    }

    /// Returns the path of the primary database file.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_name)
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::failed("read_config_file", e))?;

        let file: ConfigFile =
            toml::from_str(&contents).map_err(|e| crate::Error::failed("parse_config_file", e))?;

        Ok(Self::from_config_file(file))
    }

    /// Loads configuration from the default location, then applies
    /// environment overrides.
    ///
    /// Checks the platform config dir first, then `~/.config/minmo/`.
    /// Falls back to defaults if no readable file is found.
    #[must_use]
    pub fn load_default() -> Self {
        Self::find_config_file()
            .and_then(|path| match Self::load_from_file(&path) {
                Ok(config) => Some(config),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable config file");
                    None
                },
            })
            .unwrap_or_default()
            .with_env_overrides()
    }

    fn find_config_file() -> Option<PathBuf> {
        let base_dirs = directories::BaseDirs::new()?;

        let platform_config = base_dirs.config_dir().join(APP_DIR).join("config.toml");
        if platform_config.exists() {
            return Some(platform_config);
        }

        let xdg_config = base_dirs
            .home_dir()
            .join(".config")
            .join(APP_DIR)
            .join("config.toml");
        xdg_config.exists().then_some(xdg_config)
    }

    /// Converts a `ConfigFile` to `JournalConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = file
            .data_dir
            .map_or_else(Self::default, Self::for_data_dir);

        if let Some(name) = file.database_name {
            config.database_name = name;
        }
        if let Some(limit) = file.list_limit {
            config.list_limit = limit.max(1);
        }
        if let Some(limit) = file.search_limit {
            config.search_limit = limit.max(1);
        }
        if let Some(retry) = file.retry {
            if let Some(v) = retry.max_retries {
                config.retry.max_retries = v;
            }
            if let Some(v) = retry.backoff_ms {
                config.retry.backoff_ms = v;
            }
        }
        if let Some(logging) = file.logging {
            config.logging.level = logging.level;
            if let Some(format) = logging.format {
                config.logging.format = LogFormat::parse(&format);
            }
            config.logging.file = logging.file.map(PathBuf::from);
        }

        config
    }

    /// Applies `MINMO_*` environment variable overrides.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides using `lookup` to read variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `MINMO_DATA_DIR` | Data directory (re-roots media and device id paths) |
    /// | `MINMO_RETRY_MAX` | Retries after the first attempt |
    /// | `MINMO_RETRY_BACKOFF_MS` | Backoff unit |
    /// | `MINMO_LOG_FORMAT` | `pretty` or `json` |
    /// | `MINMO_LOG_FILE` | Log file path |
    #[must_use]
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = lookup("MINMO_DATA_DIR") {
            let rebased = Self::for_data_dir(dir);
            self.audio_dir = rebased.audio_dir;
            self.photo_dir = rebased.photo_dir;
            self.device_id_file = rebased.device_id_file;
            self.data_dir = rebased.data_dir;
        }
        if let Some(v) = lookup("MINMO_RETRY_MAX")
            && let Ok(parsed) = v.parse::<u32>()
        {
            self.retry.max_retries = parsed;
        }
        if let Some(v) = lookup("MINMO_RETRY_BACKOFF_MS")
            && let Ok(parsed) = v.parse::<u64>()
        {
            self.retry.backoff_ms = parsed;
        }
        if let Some(v) = lookup("MINMO_LOG_FORMAT") {
            self.logging.format = LogFormat::parse(&v);
        }
        if let Some(v) = lookup("MINMO_LOG_FILE") {
            self.logging.file = Some(PathBuf::from(v));
        }
        self
    }

    /// Sets the data directory, re-rooting media and identity paths.
    #[must_use]
    pub fn with_data_dir(self, path: impl Into<PathBuf>) -> Self {
        let rebased = Self::for_data_dir(path);
        Self {
            data_dir: rebased.data_dir,
            audio_dir: rebased.audio_dir,
            photo_dir: rebased.photo_dir,
            device_id_file: rebased.device_id_file,
            ..self
        }
    }
}
