//! Fetch unit: one URL in, one [`FetchResult`] out.
//!
//! The transport sits behind the [`Fetcher`] trait so the worker pool can be
//! driven by the reqwest-backed [`HttpFetcher`] in production and by scripted
//! fetchers in tests. [`FetchUnit`] wraps a fetcher with the run's timeout and
//! retry policy and turns every error into data.

mod http;

pub use http::{HttpFetcher, validate_url};

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::config::RetryConfig;
use crate::error::FetchError;
use crate::retry::with_retry;
use crate::types::{FetchResult, Payload};

/// Abstraction over retrieving one URL, enabling testability.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Retrieve `url`, returning the response payload or a classified error
    async fn fetch(&self, url: &str) -> Result<Payload, FetchError>;
}

/// A [`Fetcher`] combined with the per-fetch timeout and retry policy
pub struct FetchUnit {
    fetcher: Arc<dyn Fetcher>,
    timeout: Duration,
    retry: RetryConfig,
}

impl FetchUnit {
    /// Create a fetch unit
    pub fn new(fetcher: Arc<dyn Fetcher>, timeout: Duration, retry: RetryConfig) -> Self {
        Self {
            fetcher,
            timeout,
            retry,
        }
    }

    /// Time budget of a single attempt
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetch one URL. Never fails: errors become a failure result.
    pub async fn fetch(&self, input_index: usize, url: &str) -> FetchResult {
        let started = Instant::now();
        tracing::debug!(url, input_index, "Fetching URL");

        let outcome = with_retry(&self.retry, || self.attempt(url)).await;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let mut result = match outcome {
            Ok(payload) => {
                tracing::debug!(
                    url,
                    status_code = payload.status_code,
                    bytes = payload.body.len(),
                    elapsed_ms,
                    "Fetched URL"
                );
                FetchResult::success(url, input_index, payload)
            }
            Err(e) => {
                tracing::warn!(url, kind = %e.kind(), error = %e, "Fetch failed");
                FetchResult::failure(url, input_index, e.kind(), e.to_string())
            }
        };
        result.fetched_at = Utc::now();
        result.elapsed_ms = elapsed_ms;
        result
    }

    /// One attempt, capped by the timeout
    async fn attempt(&self, url: &str) -> Result<Payload, FetchError> {
        match tokio::time::timeout(self.timeout, self.fetcher.fetch(url)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(format!(
                "no response from '{}' within {} ms",
                url,
                self.timeout.as_millis()
            ))),
        }
    }
}
