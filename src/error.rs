//! Error taxonomy for crawl sessions.
//!
//! Two layers: [`FetchError`] covers a single network operation (and the
//! exhaustion of its retry loop), [`CrawlError`] covers everything fatal to
//! one crawl session. The task loop in `main` logs a `CrawlError` and moves
//! on to the next task; nothing here aborts the process.

use std::path::PathBuf;
use thiserror::Error;

/// Failure of one network operation, or of the whole bounded retry loop.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level failure: connect, TLS, or body read.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("unexpected status {status}")]
    Status { status: reqwest::StatusCode },

    /// Every attempt failed; `last` is the final cause.
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: Box<FetchError> },
}

impl FetchError {
    /// Whether retrying cannot change the outcome.
    ///
    /// The retry loop retries every kind alike; this classification only
    /// feeds the logs.
    pub fn is_permanent(&self) -> bool {
        matches!(self, FetchError::Status { status } if status.is_client_error())
    }
}

/// Fatal errors for one crawl session.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// The feed body itself could not be fetched. Without it there is
    /// nothing to archive beyond the provenance record.
    #[error("feed unavailable at {url}: {source}")]
    FeedUnavailable {
        url: String,
        #[source]
        source: FetchError,
    },

    /// Directory or file operation failed under the session base directory.
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A configured proxy URL was rejected by the HTTP client.
    #[error("invalid proxy url {url}: {source}")]
    Proxy {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The HTTP client could not be constructed.
    #[error("http client setup failed: {0}")]
    Client(#[source] reqwest::Error),

    /// The provenance record could not be serialized.
    #[error("provenance serialization failed: {0}")]
    Provenance(#[source] serde_json::Error),
}

impl CrawlError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CrawlError::Io {
            path: path.into(),
            source,
        }
    }
}
