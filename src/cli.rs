//! Command-line interface definitions for feedvault.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Every option falls back to the configuration file and then to built-in
//! defaults, so a bare `feedvault` run with a `tasks.txt` next to it just
//! works.

use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the feedvault application.
///
/// # Examples
///
/// ```sh
/// # Archive everything listed in ./tasks.txt into ./result
/// feedvault
///
/// # Explicit task list and result directory
/// feedvault -t ./feeds.txt -r /srv/archive
///
/// # Re-download media even when it is already on disk
/// feedvault --force
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML configuration file
    #[arg(short, long, env = "FEEDVAULT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Task list file, one `<url> <alias>` per line
    #[arg(short, long)]
    pub tasks: Option<PathBuf>,

    /// Directory receiving one archive per alias
    #[arg(short, long)]
    pub result_dir: Option<PathBuf>,

    /// Retries after the first failed attempt of a network operation
    #[arg(long)]
    pub retry_times: Option<u32>,

    /// Re-download media even when the target file already exists
    #[arg(long)]
    pub force: bool,

    /// Proxy URL applied to all schemes
    #[arg(long, env = "FEEDVAULT_PROXY")]
    pub proxy: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}
