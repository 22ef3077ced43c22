//! # ragtrace CLI
//!
//! Ask questions about local documents. Each question runs the full
//! ingest, store, retrieve, generate pipeline under one trace id.
//!
//! ## Usage
//!
//! ```bash
//! ragtrace --config ./config/ragtrace.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ragtrace ask "<query>" --file <path>...` | Answer one question from the given files |
//! | `ragtrace chat --dir <dir>` | Interactive session; history carries between questions |
//! | `ragtrace parse <file>` | Print the chunks produced for one file |
//!
//! Logs go to stderr; set `RUST_LOG` (e.g. `RUST_LOG=ragtrace=debug`) to
//! change the level.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ragtrace::commands;
use ragtrace::config::{self, Config};

/// Retrieval-augmented question answering over local documents.
#[derive(Parser)]
#[command(name = "ragtrace", version)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/ragtrace.toml`. Built-in defaults are used
    /// when the file does not exist.
    #[arg(long, global = true, default_value = "./config/ragtrace.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a single question from the given documents.
    Ask {
        /// The question.
        query: String,

        /// Document to ingest (repeatable).
        #[arg(long = "file", short = 'f')]
        files: Vec<PathBuf>,

        /// Ingest every supported file under this directory.
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Print the full response as JSON.
        #[arg(long)]
        json: bool,

        /// Print the pipeline messages of the run.
        #[arg(long)]
        show_messages: bool,
    },

    /// Ask questions interactively, one per line on stdin.
    ///
    /// The files are re-ingested for every question. Chunks already in the
    /// index are not embedded again, so repeated questions search the same
    /// set of chunks. Type `exit` or `quit` (or send EOF) to stop.
    Chat {
        #[arg(long = "file", short = 'f')]
        files: Vec<PathBuf>,

        #[arg(long)]
        dir: Option<PathBuf>,

        #[arg(long)]
        show_messages: bool,
    },

    /// Print the chunks the parser produces for one file.
    Parse {
        /// File to parse.
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = load_or_default(&cli.config)?;

    match cli.command {
        Commands::Ask {
            query,
            files,
            dir,
            json,
            show_messages,
        } => {
            let paths = commands::collect_files(&files, dir.as_deref())?;
            commands::run_ask(&cfg, &query, &paths, json, show_messages)?;
        }
        Commands::Chat {
            files,
            dir,
            show_messages,
        } => {
            let paths = commands::collect_files(&files, dir.as_deref())?;
            commands::run_chat(&cfg, &paths, show_messages)?;
        }
        Commands::Parse { path } => {
            commands::run_parse(&cfg, &path)?;
        }
    }

    Ok(())
}

fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Ok(Config::default())
    }
}
