//! Media artifact download with deduplication and idempotency.
//!
//! Every remote URL maps deterministically onto a path under the session's
//! `media/` directory. Two independent checks keep an artifact from being
//! fetched twice: an in-memory set of URLs already downloaded this session,
//! and a filesystem existence check that spans sessions. The force flag
//! bypasses only the filesystem check.
//!
//! Bodies are streamed chunk by chunk straight to disk; a media fetch that
//! dies mid-stream leaves whatever arrived and never takes the rest of the
//! crawl down with it.

use crate::error::CrawlError;
use crate::fetch::get_with_retry;
use crate::utils::sanitize_segment;
use futures::StreamExt;
use reqwest::Client;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, instrument, warn};

/// Downloads media artifacts for one crawl session.
pub struct MediaDownloader {
    base_dir: PathBuf,
    client: Client,
    max_retries: u32,
    force_redownload: bool,
    /// URLs already handled this session, successful or not.
    downloaded: HashSet<String>,
}

impl MediaDownloader {
    pub fn new(base_dir: PathBuf, client: Client, max_retries: u32, force_redownload: bool) -> Self {
        Self {
            base_dir,
            client,
            max_retries,
            force_redownload,
            downloaded: HashSet::new(),
        }
    }

    /// Map a remote URL onto a local path under `<base_dir>/media/`.
    ///
    /// The scheme is stripped, the remainder is split on `/`, empty
    /// segments are dropped, and every segment is sanitized. The query
    /// string is not treated specially; it simply gets sanitized into the
    /// final segment.
    pub fn local_path(&self, url: &str) -> PathBuf {
        let without_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
        let mut path = self.base_dir.join("media");
        for segment in without_scheme.split('/').filter(|s| !s.is_empty()) {
            path.push(sanitize_segment(segment));
        }
        path
    }

    /// Download one media URL, honoring both dedup layers.
    ///
    /// A missing or empty URL is a logged no-op. Fetch failures (retry
    /// exhaustion, mid-stream body errors) are logged and absorbed so
    /// sibling downloads proceed; filesystem failures propagate and abort
    /// the session.
    #[instrument(level = "debug", skip(self))]
    pub async fn download(&mut self, url: Option<&str>) -> Result<(), CrawlError> {
        let Some(url) = url.filter(|u| !u.is_empty()) else {
            warn!("skipping empty media url");
            return Ok(());
        };

        let local_path = self.local_path(url);
        if let Some(parent) = local_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| CrawlError::io(parent, e))?;
        }

        if self.downloaded.contains(url) {
            warn!(%url, "duplicate media url in this session");
            return Ok(());
        }

        if local_path.is_file() {
            if !self.force_redownload {
                warn!(%url, path = %local_path.display(), "file already exists; skipping");
                return Ok(());
            }
            warn!(%url, path = %local_path.display(), "re-downloading existing file");
        }

        debug!(%url, path = %local_path.display(), "downloading media");
        self.downloaded.insert(url.to_string());

        let response = match get_with_retry(&self.client, url, self.max_retries).await {
            Ok(response) => response,
            Err(e) => {
                error!(%url, error = %e, "media fetch failed; skipping artifact");
                return Ok(());
            }
        };

        self.save_body(response, &local_path).await
    }

    /// Copy the response body to `path` one chunk at a time.
    ///
    /// The file handle is released on every exit path; a body stream error
    /// keeps the bytes that already arrived.
    async fn save_body(&self, response: reqwest::Response, path: &Path) -> Result<(), CrawlError> {
        let mut file = fs::File::create(path)
            .await
            .map_err(|e| CrawlError::io(path, e))?;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(bytes) => file
                    .write_all(&bytes)
                    .await
                    .map_err(|e| CrawlError::io(path, e))?,
                Err(e) => {
                    error!(path = %path.display(), error = %e, "media body stream failed; keeping partial file");
                    break;
                }
            }
        }

        file.flush().await.map_err(|e| CrawlError::io(path, e))?;
        Ok(())
    }
}
