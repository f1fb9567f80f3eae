//! Fetch orchestrator: validates configuration, drives the pool and collector,
//! and dispatches the finished result set.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::collector::ResultCollector;
use crate::config::{Config, OutputFormat, worker_count};
use crate::error::{Error, Result};
use crate::fetch::{FetchUnit, Fetcher, HttpFetcher};
use crate::output;
use crate::pool::{WorkerPool, result_channel};
use crate::types::ResultSet;

/// Entry point for fetching a URL list with one configuration
///
/// Cheap to clone; clones share the fetch unit (and its HTTP connection pool).
#[derive(Clone)]
pub struct UrlFetcher {
    config: Arc<Config>,
    unit: Arc<FetchUnit>,
}

impl std::fmt::Debug for UrlFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlFetcher")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl UrlFetcher {
    /// Create a fetcher backed by HTTP
    ///
    /// Fails with [`Error::Config`] before any network activity if the
    /// configuration is invalid.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let http = HttpFetcher::new(&config.fetch)?;
        Ok(Self::build(config, Arc::new(http)))
    }

    /// Create a fetcher using a custom [`Fetcher`] transport
    pub fn with_fetcher(config: Config, fetcher: Arc<dyn Fetcher>) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, fetcher))
    }

    fn build(config: Config, fetcher: Arc<dyn Fetcher>) -> Self {
        let unit = FetchUnit::new(fetcher, config.fetch.timeout, config.retry.clone());
        Self {
            config: Arc::new(config),
            unit: Arc::new(unit),
        }
    }

    /// The validated configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fetch every URL and return the deduplicated results
    pub async fn run(&self, urls: Vec<String>) -> Result<ResultSet> {
        self.run_with_cancel(urls, CancellationToken::new()).await
    }

    /// Like [`run`](Self::run), but stops early when `cancel` fires
    ///
    /// A cancelled run returns [`Error::Cancelled`]; partial results are dropped.
    pub async fn run_with_cancel(
        &self,
        urls: Vec<String>,
        cancel: CancellationToken,
    ) -> Result<ResultSet> {
        let submitted = urls.len();
        if submitted == 0 {
            tracing::info!("No URLs to fetch");
            return Ok(ResultSet::default());
        }

        let pool = WorkerPool::new(Arc::clone(&self.unit), self.config.fetch.max_workers);
        let (sink, rx) = result_channel(self.config.fetch.result_buffer);
        let collector = ResultCollector::new(self.config.output.order);

        tracing::info!(
            urls = submitted,
            workers = pool.worker_count(submitted),
            timeout_ms = self.unit.timeout().as_millis(),
            "Starting fetch run"
        );

        let (report, results) = tokio::join!(pool.run(urls, sink, cancel), collector.drain(rx));

        if !report.drained() {
            if report.cancelled {
                return Err(Error::Cancelled);
            }
            return Err(Error::Other(format!(
                "worker pool finished with {} of {} results",
                report.completed, submitted
            )));
        }

        tracing::info!(
            attempted = results.attempted(),
            distinct = results.len(),
            failures = results.failures().count(),
            duplicates = results.duplicates_removed(),
            "Fetch run complete"
        );

        Ok(results)
    }

    /// Write `results` to the configured output
    ///
    /// Returns the results on success; on failure they are inside
    /// [`Error::Output`].
    pub fn emit(&self, results: ResultSet) -> Result<ResultSet> {
        output::emit(
            results,
            self.config.output.format,
            self.config.output.path.as_deref(),
        )
    }
}

/// Options for [`fetch_urls`]
#[derive(Clone, Debug)]
pub struct FetchOptions {
    /// Maximum number of concurrent workers; must be positive (default: 5)
    pub max_workers: i64,
    /// Write results to this file instead of standard output
    pub output_file: Option<PathBuf>,
    /// Write JSON
    pub output_json: bool,
    /// Write CSV
    pub output_csv: bool,
    /// Return the results to the caller
    pub return_list: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            max_workers: 5,
            output_file: None,
            output_json: false,
            output_csv: false,
            return_list: false,
        }
    }
}

impl FetchOptions {
    /// Validate the options and turn them into a [`Config`]
    pub fn to_config(&self) -> Result<Config> {
        let mut config = Config::default();
        config.fetch.max_workers = worker_count(self.max_workers)?;
        config.output.format = OutputFormat::from_flags(self.output_json, self.output_csv)?;
        config.output.path = self.output_file.clone();
        Ok(config)
    }

    /// Whether results should be written out
    ///
    /// Output is written when a file or format was requested, and also when
    /// nothing was requested at all so results are never silently discarded.
    pub fn writes_output(&self) -> bool {
        self.output_file.is_some() || self.output_json || self.output_csv || !self.return_list
    }
}

/// Fetch `urls` concurrently and write and/or return the unique responses
///
/// # Example
///
/// ```no_run
/// use fetcher::{FetchOptions, fetch_urls};
///
/// # async fn example() -> fetcher::Result<()> {
/// let urls = vec!["http://example.com".to_string(), "http://example.org".to_string()];
/// let results = fetch_urls(urls, FetchOptions { return_list: true, ..Default::default() })
///     .await?
///     .unwrap_or_default();
/// for result in &results {
///     println!("{} -> {:?}", result.url, result.status());
/// }
/// # Ok(())
/// # }
/// ```
pub async fn fetch_urls(urls: Vec<String>, options: FetchOptions) -> Result<Option<ResultSet>> {
    let config = options.to_config()?;
    let fetcher = UrlFetcher::new(config)?;
    fetch_with(&fetcher, urls, &options).await
}

/// [`fetch_urls`] with an already constructed [`UrlFetcher`]
///
/// The options are validated before any fetch starts, and their output file
/// and format decide where results are written. Worker count, timeout and
/// retries come from the fetcher's configuration.
pub async fn fetch_with(
    fetcher: &UrlFetcher,
    urls: Vec<String>,
    options: &FetchOptions,
) -> Result<Option<ResultSet>> {
    let target = options.to_config()?.output;

    let mut results = fetcher.run(urls).await?;
    if options.writes_output() {
        results = output::emit(results, target.format, target.path.as_deref())?;
    }
    Ok(options.return_list.then_some(results))
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::test_helpers::{Script, ScriptedFetcher, distinct_bodies, numbered_urls};
    use crate::types::{ErrorKind, ResultOrder};
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn config(max_workers: usize) -> Config {
        let mut config = Config::default();
        config.fetch.max_workers = max_workers;
        config
    }

    #[test]
    fn zero_workers_rejected_before_fetching() {
        let fetcher = ScriptedFetcher::new();
        let calls = fetcher.calls();

        let err = UrlFetcher::with_fetcher(config(0), Arc::new(fetcher)).unwrap_err();

        assert!(err.is_config());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn options_reject_non_positive_workers_and_conflicting_formats() {
        for max_workers in [0, -1, -50] {
            let options = FetchOptions {
                max_workers,
                ..Default::default()
            };
            assert!(options.to_config().unwrap_err().is_config());
        }

        let options = FetchOptions {
            output_json: true,
            output_csv: true,
            ..Default::default()
        };
        assert!(options.to_config().unwrap_err().is_config());
    }

    #[test]
    fn options_decide_whether_to_write() {
        let return_only = FetchOptions {
            return_list: true,
            ..Default::default()
        };
        assert!(!return_only.writes_output());

        assert!(FetchOptions::default().writes_output(), "never silently discard");

        let both = FetchOptions {
            return_list: true,
            output_json: true,
            ..Default::default()
        };
        assert!(both.writes_output());
    }

    #[tokio::test]
    async fn empty_input_is_empty_success() {
        let fetcher =
            UrlFetcher::with_fetcher(config(5), Arc::new(ScriptedFetcher::new())).unwrap();
        let results = fetcher.run(Vec::new()).await.unwrap();
        assert!(results.is_empty());
        assert_eq!(results.attempted(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn failures_are_isolated() {
        let urls = numbered_urls(10);
        let mut scripted = ScriptedFetcher::new();
        for (i, url) in urls.iter().enumerate() {
            let script = if i % 3 == 1 {
                Script::error(FetchError::Network(format!("unreachable {i}")))
            } else {
                Script::body(&format!("page {i}"))
            };
            scripted = scripted.with(url, script);
        }
        let fetcher = UrlFetcher::with_fetcher(config(4), Arc::new(scripted)).unwrap();

        let results = fetcher.run(urls).await.unwrap();

        assert_eq!(results.attempted(), 10);
        assert_eq!(results.successes().count(), 7);
        assert_eq!(results.failures().count(), 3);
        assert!(
            results
                .failures()
                .all(|r| r.failure_info().unwrap().kind == ErrorKind::NetworkError)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn duplicate_content_collapses() {
        let scripted = ScriptedFetcher::new()
            .with("http://a", Script::body("X"))
            .with("http://b", Script::body("X"))
            .with("http://c", Script::body("Y"));
        let fetcher = UrlFetcher::with_fetcher(config(3), Arc::new(scripted)).unwrap();

        let results = fetcher
            .run(vec!["http://a".into(), "http://b".into(), "http://c".into()])
            .await
            .unwrap();

        assert_eq!(results.attempted(), 3);
        assert_eq!(results.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn repeated_runs_are_equivalent() {
        let n = 16;
        let build = || {
            // Varying delays shuffle completion order between runs
            numbered_urls(n)
                .into_iter()
                .enumerate()
                .fold(ScriptedFetcher::new(), |f, (i, url)| {
                    let delay = Duration::from_millis(((i * 7) % 5) as u64 * 3);
                    f.with(&url, Script::body(&format!("body-{}", i % 6)).delayed(delay))
                })
        };

        let first = UrlFetcher::with_fetcher(config(5), Arc::new(build()))
            .unwrap()
            .run(numbered_urls(n))
            .await
            .unwrap();
        let second = UrlFetcher::with_fetcher(config(3), Arc::new(build()))
            .unwrap()
            .run(numbered_urls(n))
            .await
            .unwrap();

        assert_eq!(first.len(), 6);
        assert!(first.equivalent(&second));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn input_order_makes_runs_identical() {
        let mut cfg = config(4);
        cfg.output.order = ResultOrder::Input;
        let urls = numbered_urls(8);

        let run = |cfg: Config, urls: Vec<String>| async move {
            UrlFetcher::with_fetcher(cfg, Arc::new(distinct_bodies(8, Duration::from_millis(3))))
                .unwrap()
                .run(urls)
                .await
                .unwrap()
        };

        let first = run(cfg.clone(), urls.clone()).await;
        let second = run(cfg, urls.clone()).await;

        let order: Vec<_> = first.iter().map(|r| r.url.clone()).collect();
        assert_eq!(order, urls);
        assert_eq!(first.keys(), second.keys());
    }

    #[tokio::test]
    async fn cancelled_run_reports_cancelled() {
        let scripted = ScriptedFetcher::new().with_fallback_delay(Duration::from_secs(10));
        let fetcher = UrlFetcher::with_fetcher(config(2), Arc::new(scripted)).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = fetcher
            .run_with_cancel(numbered_urls(4), cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled), "got {err:?}");
    }

    #[tokio::test]
    async fn fetch_with_returns_list_without_writing() {
        let scripted = ScriptedFetcher::new().with("http://a", Script::body("A"));
        let fetcher = UrlFetcher::with_fetcher(config(1), Arc::new(scripted)).unwrap();
        let options = FetchOptions {
            return_list: true,
            ..Default::default()
        };

        let results = fetch_with(&fetcher, vec!["http://a".into()], &options)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn fetch_with_rejects_conflicting_formats_before_fetching() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let scripted = ScriptedFetcher::new().with("http://a", Script::body("A"));
        let calls = scripted.calls();
        let fetcher = UrlFetcher::with_fetcher(Config::default(), Arc::new(scripted)).unwrap();
        let options = FetchOptions {
            output_file: Some(path.clone()),
            output_json: true,
            output_csv: true,
            return_list: true,
            ..Default::default()
        };

        let err = fetch_with(&fetcher, vec!["http://a".into()], &options)
            .await
            .unwrap_err();

        assert!(err.is_config(), "got {err:?}");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn fetch_with_writes_where_the_options_say() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let scripted = ScriptedFetcher::new()
            .with("http://a", Script::body("A"))
            .with("http://b", Script::body("B"));
        // Plain output to stdout in the fetcher's own configuration
        let fetcher = UrlFetcher::with_fetcher(Config::default(), Arc::new(scripted)).unwrap();
        let options = FetchOptions {
            output_file: Some(path.clone()),
            output_json: true,
            return_list: true,
            ..Default::default()
        };

        let results = fetch_with(&fetcher, vec!["http://a".into(), "http://b".into()], &options)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(results.len(), 2);
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn output_failure_keeps_results() {
        let dir = tempfile::tempdir().unwrap();
        let scripted = ScriptedFetcher::new()
            .with("http://a", Script::body("A"))
            .with("http://b", Script::body("B"));
        let fetcher = UrlFetcher::with_fetcher(config(2), Arc::new(scripted)).unwrap();
        let options = FetchOptions {
            output_file: Some(dir.path().join("no-such-dir").join("out.json")),
            output_json: true,
            return_list: true,
            ..Default::default()
        };

        let err = fetch_with(&fetcher, vec!["http://a".into(), "http://b".into()], &options)
            .await
            .unwrap_err();

        match err {
            Error::Output(e) => assert_eq!(e.into_results().len(), 2),
            other => panic!("expected Output error, got {other:?}"),
        }
    }
}
