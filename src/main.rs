//! # Feedvault
//!
//! An archiving pipeline that mirrors web syndication feeds (RSS and
//! podcast-style) together with every media artifact they reference —
//! artwork, enclosures, inline images — into a local directory tree for
//! offline preservation.
//!
//! ## Features
//!
//! - Reads a plain-text task list of feed URLs with aliases
//! - Retry-resilient fetching with an explicit attempt budget
//! - Recursive media discovery across heterogeneous feed element shapes
//! - Deterministic mapping of remote URLs to safe local paths
//! - Two-layer download deduplication: per-session URL cache plus
//!   filesystem existence check, with a force flag to override the latter
//! - Verbatim feed and per-item metadata snapshots alongside the media
//!
//! ## Usage
//!
//! ```sh
//! feedvault -t ./tasks.txt -r ./result
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture, once per task:
//! 1. **Provenance**: record where and when the archive was taken
//! 2. **Fetching**: download the feed body and snapshot it verbatim
//! 3. **Parsing**: build a navigable channel/item tree from the body
//! 4. **Archival**: per channel and per item, persist metadata fragments
//!    and mirror every referenced media artifact
//!
//! Tasks are processed sequentially; a task that fails is logged and the
//! run moves on to the next one.

use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cli;
mod config;
mod crawler;
mod error;
mod extract;
mod feed;
mod fetch;
mod media;
mod tasks;
mod utils;

use cli::Cli;
use config::Config;
use crawler::Crawler;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("feedvault starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    // --- Effective configuration: defaults < file < CLI ---
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    config.apply_cli(&args);
    debug!(?config, "Effective configuration");

    // Early check: ensure the result directory is writable
    if let Err(e) = ensure_writable_dir(&config.result_dir).await {
        error!(
            path = %config.result_dir.display(),
            error = %e,
            "Result directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    // ---- Load tasks ----
    let tasks = tasks::load_tasks(&config.tasks_file).await?;
    info!(
        count = tasks.len(),
        path = %config.tasks_file.display(),
        "Loaded task list"
    );

    // ---- Crawl each task sequentially ----
    let mut failed = 0usize;
    for task in &tasks {
        let mut crawler = match Crawler::new(task, &config) {
            Ok(crawler) => crawler,
            Err(e) => {
                error!(alias = %task.alias, url = %task.url, error = %e, "Could not set up crawl session");
                failed += 1;
                continue;
            }
        };
        if let Err(e) = crawler.crawl().await {
            error!(alias = %task.alias, url = %task.url, error = %e, "Crawl failed");
            failed += 1;
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        total = tasks.len(),
        failed,
        ?elapsed,
        "All tasks processed"
    );

    Ok(())
}
