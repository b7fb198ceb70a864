//! Binary entry point for minmo.
//!
//! A command-line front end over the journal store. Results are printed to
//! stdout as JSON; logs go to stderr.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use anyhow::Context;
use clap::{Parser, Subcommand};
use minmo::cli::{self, SaveArgs};
use minmo::config::JournalConfig;
use minmo::observability::{self, LoggingConfig};
use minmo::services::JournalStore;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Minmo - a local-first journal of audio, photo and text moments.
#[derive(Parser)]
#[command(name = "minmo")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "MINMO_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Data directory (overrides the configuration).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Save a new entry.
    Save(SaveArgs),

    /// Show one entry.
    Get {
        /// Entry id.
        id: String,
    },

    /// List entries, newest first.
    List {
        /// Maximum number of entries.
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// List favourite entries.
    Favourites {
        /// Maximum number of entries.
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show the entry recorded today.
    Today,

    /// Update an entry from a JSON object of changed fields.
    Update {
        /// Entry id.
        id: String,

        /// Changes, e.g. '{"favourite": true, "prompt": null}'.
        changes: String,
    },

    /// Delete an entry.
    Delete {
        /// Entry id.
        id: String,
    },

    /// Search prompts and transcripts.
    Search {
        /// The search query.
        query: String,

        /// Include highlighted match segments.
        #[arg(long)]
        highlight: bool,
    },

    /// Delete every entry.
    Clear {
        /// Confirm the irreversible operation.
        #[arg(long)]
        yes: bool,
    },

    /// Recreate an empty database, keeping media files.
    Reset {
        /// Confirm the irreversible operation.
        #[arg(long)]
        yes: bool,
    },

    /// Delete the database, all media files and the device id.
    Nuke {
        /// Confirm the irreversible operation.
        #[arg(long)]
        yes: bool,
    },
}

/// Main entry point.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref(), cli.data_dir.clone()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e:#}");
            return ExitCode::FAILURE;
        },
    };

    let logging = LoggingConfig::from_settings(&config.logging, cli.verbose);
    if let Err(e) = observability::init_logging(&logging) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    let store = JournalStore::open(config);
    let result = run_command(&store, cli.command).await;
    store.close().await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
async fn run_command(store: &JournalStore, command: Commands) -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match command {
        Commands::Save(args) => cli::cmd_save(store, args, &mut out)
            .await
            .context("save failed")?,
        Commands::Get { id } => cli::cmd_get(store, &id, &mut out).await?,
        Commands::List { limit } => cli::cmd_list(store, limit, &mut out).await?,
        Commands::Favourites { limit } => cli::cmd_favourites(store, limit, &mut out).await?,
        Commands::Today => cli::cmd_today(store, &mut out).await?,
        Commands::Update { id, changes } => cli::cmd_update(store, &id, &changes, &mut out)
            .await
            .with_context(|| format!("update of '{id}' failed"))?,
        Commands::Delete { id } => cli::cmd_delete(store, &id, &mut out).await?,
        Commands::Search { query, highlight } => {
            cli::cmd_search(store, &query, highlight, &mut out).await?;
        },
        Commands::Clear { yes } => cli::cmd_clear(store, yes, &mut out).await?,
        Commands::Reset { yes } => cli::cmd_reset(store, yes, &mut out).await?,
        Commands::Nuke { yes } => cli::cmd_nuke(store, yes, &mut out).await?,
    }

    Ok(())
}

/// Loads configuration.
fn load_config(path: Option<&Path>, data_dir: Option<PathBuf>) -> anyhow::Result<JournalConfig> {
    let config = match path {
        Some(path) => JournalConfig::load_from_file(path)
            .with_context(|| format!("cannot load {}", path.display()))?
            .with_env_overrides(),
        None => JournalConfig::load_default(),
    };

    Ok(match data_dir {
        Some(dir) => config.with_data_dir(dir),
        None => config,
    })
}
