//! CLI argument definitions for quotegate.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `run` | Full session: acquire, gate, generate and publish (dry run) |
//! | `acquire` | Acquire, render and gate without any collaborator |
//! | `snapshot show` | Print the persisted last-known-good batch |
//! | `debug-document` | Fetch one quote page and show what extraction finds |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--config` | none | TOML configuration file |
//! | `--symbols` | configured | Comma-separated symbol override |
//! | `--timeout-ms` | configured | Per-request timeout |
//! | `--log-format` | `compact` | `pretty`, `compact` or `json` |
//! | `--log-level` | `info` | Filter used when `RUST_LOG` is unset |
//!
//! # Examples
//!
//! ```bash
//! quotegate --config quotegate.toml run
//! quotegate --symbols SMR,URA acquire --format json --pretty
//! quotegate snapshot show
//! quotegate debug-document SMR --out smr.html
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::logging::LogFormat;

/// Gated market-data acquisition.
#[derive(Debug, Parser)]
#[command(
    name = "quotegate",
    author,
    version,
    about = "Tiered quote acquisition with a plausibility gate",
    long_about = "quotegate fetches quotes from a structured endpoint, falls back to \
per-symbol quote pages and then to the last persisted snapshot, and refuses to hand \
implausible data to report generation.\n\
\n\
Use 'quotegate <command> --help' for command-specific help."
)]
pub struct Cli {
    /// TOML configuration file. Built-in defaults apply when omitted.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Symbols to acquire, overriding configuration and environment.
    #[arg(long, global = true, value_delimiter = ',')]
    pub symbols: Vec<String>,

    /// Per-request timeout in milliseconds.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Log line layout.
    #[arg(
        long,
        global = true,
        value_enum,
        env = "QUOTEGATE_LOG_FORMAT",
        default_value_t = LogFormat::Compact
    )]
    pub log_format: LogFormat,

    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the full session with dry-run collaborators.
    Run,
    /// Acquire, render and gate; print the result.
    Acquire(AcquireArgs),
    /// Inspect the persisted snapshot.
    Snapshot(SnapshotArgs),
    /// Fetch one quote page and show the extracted fields.
    DebugDocument(DebugDocumentArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Rendered context followed by the verdict.
    Text,
    /// Single JSON object.
    Json,
}

#[derive(Debug, Args)]
pub struct AcquireArgs {
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, default_value_t = false)]
    pub pretty: bool,
}

#[derive(Debug, Args)]
pub struct SnapshotArgs {
    #[command(subcommand)]
    pub command: SnapshotCommand,
}

#[derive(Debug, Subcommand)]
pub enum SnapshotCommand {
    /// Render the snapshot and gate it with the configured bands.
    Show,
}

#[derive(Debug, Args)]
pub struct DebugDocumentArgs {
    pub symbol: String,

    /// Write the decoded page to this file.
    #[arg(long)]
    pub out: Option<PathBuf>,
}
