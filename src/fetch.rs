//! Network fetching with a bounded retry loop.
//!
//! This module provides the retry-resilient fetch boundary every network
//! operation in the crawler goes through.
//!
//! # Architecture
//!
//! The module uses a trait-based design for flexibility:
//! - [`FetchAsync`]: Core trait defining one async network operation
//! - [`HttpGet`]: Wraps a plain `reqwest` GET request
//! - [`RetryFetch`]: Decorator that adds retry logic to any `FetchAsync`
//!   implementation
//!
//! # Retry Strategy
//!
//! An operation is invoked up to `max_retries + 1` times with no delay
//! between attempts. Every failure is logged and retried regardless of
//! cause; a permanent HTTP status (404 and friends) burns through the
//! budget just like a connection reset. [`FetchError::is_permanent`]
//! records the distinction in the logs so the policy can be revisited
//! without re-deriving it from traffic.

use crate::error::FetchError;
use reqwest::{Client, Response};
use std::fmt;
use tracing::{debug, error, instrument};

/// Trait for one async network operation.
///
/// Implementors perform a single attempt; retry behavior comes from
/// wrapping them in [`RetryFetch`].
pub trait FetchAsync {
    /// The type of response produced by a successful attempt.
    type Response;

    /// Perform one attempt of the operation.
    async fn fetch(&self) -> Result<Self::Response, FetchError>;
}

/// Decorator that adds a bounded retry loop to any [`FetchAsync`]
/// implementation.
///
/// Callers must treat [`FetchError::Exhausted`] as "skip this artifact"
/// at media scope and as fatal at feed scope; the decorator itself never
/// panics and never sleeps between attempts.
pub struct RetryFetch<T> {
    /// The underlying operation to wrap.
    inner: T,
    /// Retries allowed after the first failed attempt.
    max_retries: u32,
}

impl<T> RetryFetch<T>
where
    T: FetchAsync,
{
    /// Create a new retry wrapper around an existing [`FetchAsync`]
    /// implementation.
    ///
    /// # Arguments
    ///
    /// * `inner` - The underlying operation to wrap
    /// * `max_retries` - Retries after the first failed attempt; `0` means
    ///   a single attempt
    pub fn new(inner: T, max_retries: u32) -> Self {
        Self { inner, max_retries }
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl<T> FetchAsync for RetryFetch<T>
where
    T: FetchAsync,
{
    type Response = T::Response;

    async fn fetch(&self) -> Result<Self::Response, FetchError> {
        let attempts = self.max_retries.saturating_add(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            debug!(attempt, max = attempts, "trying fetch");
            match self.inner.fetch().await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    if attempt >= attempts {
                        error!(attempt, max = attempts, error = %e, "fetch retries exhausted");
                        return Err(FetchError::Exhausted {
                            attempts: attempt,
                            last: Box::new(e),
                        });
                    }
                    error!(
                        attempt,
                        max = attempts,
                        permanent = e.is_permanent(),
                        error = %e,
                        "fetch attempt failed; retrying"
                    );
                }
            }
        }
    }
}

/// One GET request against a shared [`Client`].
///
/// Non-success statuses are failures here, not responses: the caller
/// either gets a body it can stream or an error kind it can log.
#[derive(Debug)]
pub struct HttpGet<'a> {
    pub client: &'a Client,
    pub url: &'a str,
}

impl FetchAsync for HttpGet<'_> {
    type Response = Response;

    async fn fetch(&self) -> Result<Response, FetchError> {
        let response = self.client.get(self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { status });
        }
        Ok(response)
    }
}

/// GET a URL with the bounded retry loop applied.
///
/// This is the primary entry point for both feed and media fetches.
///
/// # Arguments
///
/// * `client` - The session's HTTP client (user agent, proxies, timeout)
/// * `url` - The URL to fetch
/// * `max_retries` - Retries after the first failed attempt
///
/// # Returns
///
/// The first successful response, or [`FetchError::Exhausted`] once the
/// attempt budget is spent.
#[instrument(level = "debug", skip(client))]
pub async fn get_with_retry(
    client: &Client,
    url: &str,
    max_retries: u32,
) -> Result<Response, FetchError> {
    RetryFetch::new(HttpGet { client, url }, max_retries)
        .fetch()
        .await
}
