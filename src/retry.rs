//! Retry with exponential backoff.
//!
//! Retries are opt-in: with the default [`RetryConfig`] (`max_attempts = 0`)
//! an operation runs exactly once. When enabled, errors that report
//! themselves as transient through [`IsRetryable`] are retried after a
//! growing, optionally jittered, delay.
//!
//! # Example
//!
//! ```no_run
//! use fetcher::config::RetryConfig;
//! use fetcher::error::FetchError;
//! use fetcher::retry::with_retry;
//!
//! # async fn example() -> Result<(), FetchError> {
//! let config = RetryConfig { max_attempts: 3, ..Default::default() };
//! let body = with_retry(&config, || async {
//!     Err::<String, _>(FetchError::Network("connection reset".into()))
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;
use crate::error::FetchError;

/// Errors that know whether trying again could help
pub trait IsRetryable {
    /// True for transient failures
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for FetchError {
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout(_) | FetchError::Network(_) => true,
            // Rate limited or server-side trouble
            FetchError::HttpStatus { code, .. } => *code == 429 || (500..600).contains(code),
            FetchError::InvalidUrl(_) | FetchError::Other(_) => false,
        }
    }
}

/// Delay schedule for one retried operation
///
/// Yields at most `max_attempts` delays, starting at `initial_delay` and
/// multiplying by `backoff_multiplier`, capped at `max_delay`. Jitter is
/// applied to each yielded delay, never to the base of the next one.
#[derive(Clone, Debug)]
pub struct Backoff {
    next: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter: bool,
    remaining: u32,
}

impl Backoff {
    /// Schedule described by `config`
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            next: config.initial_delay.min(config.max_delay),
            max_delay: config.max_delay,
            multiplier: config.backoff_multiplier,
            jitter: config.jitter,
            remaining: config.max_attempts,
        }
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let base = self.next;
        let grown = base.as_secs_f64() * self.multiplier;
        self.next = if grown.is_finite() && grown >= 0.0 {
            Duration::from_secs_f64(grown.min(self.max_delay.as_secs_f64()))
        } else {
            self.max_delay
        };

        Some(if self.jitter { add_jitter(base) } else { base })
    }
}

/// Run `operation`, retrying transient failures per `config`
///
/// Returns the first success, or the error that ended the attempts: a
/// permanent one, or the last transient one once the schedule is used up.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut schedule = Backoff::new(config);
    let mut attempt: u32 = 1;

    loop {
        let error = match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if !error.is_retryable() {
            return Err(error);
        }
        let Some(delay) = schedule.next() else {
            if attempt > 1 {
                tracing::debug!(error = %error, attempts = attempt, "Retries exhausted");
            }
            return Err(error);
        };

        tracing::warn!(
            error = %error,
            attempt,
            max_attempts = config.max_attempts,
            delay_ms = delay.as_millis(),
            "Transient failure, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

/// Stretch `delay` by a random factor in `[1, 2]`
fn add_jitter(delay: Duration) -> Duration {
    let factor: f64 = rand::thread_rng().gen_range(1.0..=2.0);
    delay.mul_f64(factor)
}
