//! Configuration types for fetcher

use crate::error::{Error, Result};
use crate::types::ResultOrder;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Fetch behavior configuration (concurrency, timeouts, HTTP policy)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Maximum number of concurrent workers (default: 5)
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Time budget for a single fetch attempt (default: 30 seconds)
    #[serde(default = "default_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Record non-2xx responses as failures instead of successes (default: false)
    #[serde(default)]
    pub fail_on_http_status: bool,

    /// Capacity of the channel between workers and the collector (default: 64)
    #[serde(default = "default_result_buffer")]
    pub result_buffer: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            timeout: default_timeout(),
            user_agent: default_user_agent(),
            fail_on_http_status: false,
            result_buffer: default_result_buffer(),
        }
    }
}

/// Retry configuration for transient fetch failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first try (default: 0, no retries)
    #[serde(default)]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Output format for a result set
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text (default)
    #[default]
    Plain,
    /// Pretty-printed JSON array
    Json,
    /// Comma-separated values with a header row
    Csv,
}

impl OutputFormat {
    /// Resolve the `--json` / `--csv` flag pair into one format
    ///
    /// The two flags are mutually exclusive; neither selects plain text.
    pub fn from_flags(json: bool, csv: bool) -> Result<Self> {
        match (json, csv) {
            (true, true) => Err(Error::config(
                "output.format",
                "JSON and CSV output are mutually exclusive",
            )),
            (true, false) => Ok(OutputFormat::Json),
            (false, true) => Ok(OutputFormat::Csv),
            (false, false) => Ok(OutputFormat::Plain),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            OutputFormat::Plain => "plain",
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
        })
    }
}

/// Where and how results are written
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output file (None = standard output)
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Output format
    #[serde(default)]
    pub format: OutputFormat,

    /// Ordering of the final result set
    #[serde(default)]
    pub order: ResultOrder,
}

/// Main configuration for fetcher
///
/// Every field has a default, so an empty TOML document is a valid configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Fetch behavior
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Retry policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Output destination and format
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read config file '{}': {}", path.display(), e),
            key: None,
        })?;
        Self::from_toml(&content).map_err(|e| match e {
            Error::Config { message, key } => Error::Config {
                message: format!("{}: {}", path.display(), message),
                key,
            },
            other => other,
        })
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config {
            message: format!("invalid config: {}", e),
            key: None,
        })
    }

    /// Check that every setting is usable before any fetch starts
    pub fn validate(&self) -> Result<()> {
        if self.fetch.max_workers == 0 {
            return Err(Error::config(
                "fetch.max_workers",
                "max_workers must be a positive integer",
            ));
        }
        if self.fetch.timeout.is_zero() {
            return Err(Error::config("fetch.timeout", "timeout must be greater than zero"));
        }
        if self.fetch.result_buffer == 0 {
            return Err(Error::config(
                "fetch.result_buffer",
                "result_buffer must be greater than zero",
            ));
        }
        if self.retry.backoff_multiplier.is_nan() || self.retry.backoff_multiplier < 1.0 {
            return Err(Error::config(
                "retry.backoff_multiplier",
                "backoff_multiplier must be at least 1.0",
            ));
        }
        Ok(())
    }
}

/// Convert a signed worker count from user input into a validated one
///
/// Zero and negative values are configuration errors.
pub fn worker_count(requested: i64) -> Result<usize> {
    if requested <= 0 {
        return Err(Error::config(
            "fetch.max_workers",
            format!("max_workers must be a positive integer, got {}", requested),
        ));
    }
    usize::try_from(requested).map_err(|_| {
        Error::config(
            "fetch.max_workers",
            format!("max_workers {} is too large", requested),
        )
    })
}

fn default_max_workers() -> usize {
    5
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    format!("fetcher/{}", env!("CARGO_PKG_VERSION"))
}

fn default_result_buffer() -> usize {
    64
}

fn default_true() -> bool {
    true
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
