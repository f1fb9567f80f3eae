//! Shared test helpers: a scripted [`Fetcher`] that records concurrency.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::FetchError;
use crate::fetch::Fetcher;
use crate::types::Payload;

/// What a scripted URL does when fetched
#[derive(Clone, Debug)]
enum Action {
    Body(String),
    Error(FetchError),
    Panic(String),
    /// Fail `failures` times, then return `body`
    Flaky {
        failures: usize,
        error: FetchError,
        body: String,
    },
}

/// Scripted behavior for one URL
#[derive(Clone, Debug)]
pub(crate) struct Script {
    action: Action,
    delay: Duration,
}

impl Script {
    pub(crate) fn body(body: &str) -> Self {
        Self {
            action: Action::Body(body.to_string()),
            delay: Duration::ZERO,
        }
    }

    pub(crate) fn error(error: FetchError) -> Self {
        Self {
            action: Action::Error(error),
            delay: Duration::ZERO,
        }
    }

    pub(crate) fn panic(message: &str) -> Self {
        Self {
            action: Action::Panic(message.to_string()),
            delay: Duration::ZERO,
        }
    }

    pub(crate) fn flaky(failures: usize, error: FetchError, body: &str) -> Self {
        Self {
            action: Action::Flaky {
                failures,
                error,
                body: body.to_string(),
            },
            delay: Duration::ZERO,
        }
    }

    pub(crate) fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Decrements the in-flight counter when a fetch finishes, panics, or is dropped
struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// [`Fetcher`] answering from a per-URL script; unknown URLs fail with a network error.
pub(crate) struct ScriptedFetcher {
    scripts: HashMap<String, Script>,
    fallback_delay: Duration,
    attempts: Mutex<HashMap<String, usize>>,
    calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl ScriptedFetcher {
    pub(crate) fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            fallback_delay: Duration::ZERO,
            attempts: Mutex::new(HashMap::new()),
            calls: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn with(mut self, url: &str, script: Script) -> Self {
        self.scripts.insert(url.to_string(), script);
        self
    }

    /// Delay applied to URLs without a script
    pub(crate) fn with_fallback_delay(mut self, delay: Duration) -> Self {
        self.fallback_delay = delay;
        self
    }

    /// Total number of fetch calls
    pub(crate) fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    /// Highest number of simultaneous fetches observed
    pub(crate) fn max_in_flight(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.max_in_flight)
    }

    fn attempt_number(&self, url: &str) -> usize {
        let mut attempts = self.attempts.lock().unwrap();
        let n = attempts.entry(url.to_string()).or_insert(0);
        *n += 1;
        *n
    }
}

#[async_trait::async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<Payload, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlightGuard(Arc::clone(&self.in_flight));

        let attempt = self.attempt_number(url);
        let script = self.scripts.get(url).cloned();
        let delay = script
            .as_ref()
            .map(|s| s.delay)
            .unwrap_or(self.fallback_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match script.map(|s| s.action) {
            Some(Action::Body(body)) => Ok(Payload::text(body)),
            Some(Action::Error(e)) => Err(e),
            Some(Action::Panic(message)) => panic!("{}", message),
            Some(Action::Flaky {
                failures,
                error,
                body,
            }) => {
                if attempt <= failures {
                    Err(error)
                } else {
                    Ok(Payload::text(body))
                }
            }
            None => Err(FetchError::Network(format!("no route to {}", url))),
        }
    }
}

/// URLs `http://host/0` .. `http://host/{n-1}`
pub(crate) fn numbered_urls(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("http://host/{i}")).collect()
}

/// Fetcher returning a distinct body for every numbered URL
pub(crate) fn distinct_bodies(n: usize, delay: Duration) -> ScriptedFetcher {
    numbered_urls(n)
        .into_iter()
        .enumerate()
        .fold(ScriptedFetcher::new(), |fetcher, (i, url)| {
            fetcher.with(&url, Script::body(&format!("body-{i}")).delayed(delay))
        })
}
