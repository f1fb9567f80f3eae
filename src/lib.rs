//! # fetcher
//!
//! Concurrent URL fetch engine with content deduplication.
//!
//! A list of URLs is fetched by a bounded pool of workers. Every URL yields
//! exactly one result, success or classified failure; failures never abort
//! the batch. Results with identical content are collapsed into one, and the
//! remaining set is written as plain text, JSON or CSV and/or handed back to
//! the caller.
//!
//! ## Quick Start
//!
//! ```no_run
//! use fetcher::{Config, UrlFetcher};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.fetch.max_workers = 10;
//!
//!     let fetcher = UrlFetcher::new(config)?;
//!     let results = fetcher
//!         .run(vec![
//!             "https://example.com".to_string(),
//!             "https://example.org".to_string(),
//!         ])
//!         .await?;
//!
//!     println!(
//!         "{} unique of {} fetched",
//!         results.len(),
//!         results.attempted()
//!     );
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Command-line front end
pub mod cli;
/// Result deduplication
pub mod collector;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Fetch unit and HTTP transport
pub mod fetch;
/// URL list loading
pub mod input;
/// Run orchestration and the embeddable entry point
pub mod orchestrator;
/// Output formatting
pub mod output;
/// Bounded worker pool
pub mod pool;
/// Retry logic with exponential backoff
pub mod retry;
/// Core result types
pub mod types;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use config::{Config, FetchConfig, OutputConfig, OutputFormat, RetryConfig};
pub use error::{Error, FetchError, OutputError, Result};
pub use fetch::{FetchUnit, Fetcher, HttpFetcher};
pub use input::load_urls;
pub use orchestrator::{FetchOptions, UrlFetcher, fetch_urls, fetch_with};
pub use types::{
    DedupKey, ErrorKind, FetchFailure, FetchOutcome, FetchResult, FetchStatus, Payload,
    ResultOrder, ResultSet,
};

/// Wait for a termination request.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use fetcher::{UrlFetcher, Config, shutdown_signal};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example(urls: Vec<String>) -> fetcher::Result<()> {
/// let fetcher = UrlFetcher::new(Config::default())?;
/// let cancel = CancellationToken::new();
///
/// let trigger = cancel.clone();
/// tokio::spawn(async move {
///     shutdown_signal().await;
///     trigger.cancel();
/// });
///
/// let results = fetcher.run_with_cancel(urls, cancel).await?;
/// # Ok(())
/// # }
/// ```
#[cfg(unix)]
pub async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(
                error = %e,
                "Could not register SIGTERM handler, waiting for SIGINT only"
            );
            sigint.recv().await;
            tracing::info!("Received SIGINT signal (Ctrl+C)");
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(
                error = %e,
                "Could not register SIGINT handler, waiting for SIGTERM only"
            );
            sigterm.recv().await;
            tracing::info!("Received SIGTERM signal");
        }
        (Err(e), Err(_)) => {
            tracing::error!(
                error = %e,
                "Could not register any signal handlers, using ctrl_c fallback"
            );
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

/// Wait for a termination request (Ctrl+C).
#[cfg(not(unix))]
pub async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
            std::future::pending::<()>().await;
        }
    }
}
