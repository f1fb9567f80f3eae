//! Error types for fetcher
//!
//! Two layers of errors exist in this crate:
//! - [`Error`] is returned from run-level operations (configuration, output, cancellation)
//! - [`FetchError`] describes a single failed fetch and is always converted into
//!   data (a [`FetchFailure`](crate::types::FetchFailure)) before it leaves the worker pool

use crate::types::{ErrorKind, ResultSet};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for fetcher operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for fetcher
///
/// Per-URL failures never show up here; they are recorded inside the
/// [`ResultSet`] instead.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "max_workers")
        key: Option<String>,
    },

    /// Writing the results failed; the computed results are carried along
    #[error(transparent)]
    Output(#[from] OutputError),

    /// The run was interrupted before every URL produced a result
    #[error("run cancelled before all URLs were fetched")]
    Cancelled,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a configuration error tied to a specific setting
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Returns true for errors raised before any fetch was attempted
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config { .. })
    }
}

/// Failure to write results to their destination
///
/// The fetch phase has already completed when this error occurs, so the
/// result set is kept and handed back through [`OutputError::into_results`].
#[derive(Debug, Error)]
#[error("failed to write results to {}: {source}", destination(.path))]
pub struct OutputError {
    /// File being written, `None` for standard output
    pub path: Option<PathBuf>,
    /// Underlying write error
    #[source]
    pub source: std::io::Error,
    /// Results computed by the run
    pub results: Box<ResultSet>,
}

impl OutputError {
    /// Recover the computed results
    pub fn into_results(self) -> ResultSet {
        *self.results
    }
}

fn destination(path: &Option<PathBuf>) -> String {
    match path {
        Some(p) => p.display().to_string(),
        None => "standard output".to_string(),
    }
}

/// Error produced by a single fetch attempt
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The URL could not be parsed or uses an unsupported scheme
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The request did not finish within the configured timeout
    #[error("timed out: {0}")]
    Timeout(String),

    /// Connection, DNS, TLS or body transfer failure
    #[error("network error: {0}")]
    Network(String),

    /// Server answered with a non-success status and the policy treats that as failure
    #[error("HTTP {code}: {reason}")]
    HttpStatus {
        /// Numeric status code
        code: u16,
        /// Canonical reason phrase, if known
        reason: String,
    },

    /// Anything else, including panics inside a fetch
    #[error("{0}")]
    Other(String),
}

impl FetchError {
    /// Classify this error into the kind recorded in results
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::InvalidUrl(_) => ErrorKind::InvalidUrl,
            FetchError::Timeout(_) => ErrorKind::Timeout,
            FetchError::Network(_) => ErrorKind::NetworkError,
            FetchError::HttpStatus { .. } | FetchError::Other(_) => ErrorKind::Other,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout(e.to_string())
        } else if e.is_builder() {
            FetchError::InvalidUrl(e.to_string())
        } else if e.is_connect() || e.is_request() || e.is_body() || e.is_decode() {
            FetchError::Network(e.to_string())
        } else if let Some(status) = e.status() {
            FetchError::HttpStatus {
                code: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("unknown").to_string(),
            }
        } else {
            FetchError::Other(e.to_string())
        }
    }
}

impl From<url::ParseError> for FetchError {
    fn from(e: url::ParseError) -> Self {
        FetchError::InvalidUrl(e.to_string())
    }
}
