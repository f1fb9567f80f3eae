//! Command-line front end for the `fetcher` binary.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, OutputFormat, worker_count};
use crate::error::{Error, Result};
use crate::input::load_urls;
use crate::orchestrator::UrlFetcher;
use crate::shutdown_signal;
use crate::types::{ResultOrder, ResultSet};

const DESCRIPTION: &str = "Fetch multiple URLs concurrently and keep the unique responses";

/// Exit code for a run that was interrupted by a signal
pub const EXIT_INTERRUPTED: u8 = 130;
/// Exit code for invalid configuration or input
pub const EXIT_CONFIG: u8 = 2;
/// Exit code for output and other runtime failures
pub const EXIT_FAILURE: u8 = 1;

/// Command-line arguments
#[derive(Debug, Parser)]
#[command(name = "fetcher")]
#[command(about = DESCRIPTION)]
#[command(version, disable_version_flag = true)]
pub struct Cli {
    /// File with one URL per line
    #[arg(short, long)]
    pub input: PathBuf,

    /// Write results to this file instead of standard output
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output results in JSON format
    #[arg(short, long)]
    pub json: bool,

    /// Output results in CSV format
    #[arg(short, long)]
    pub csv: bool,

    /// Maximum number of concurrent workers [default: 5]
    #[arg(short, long, allow_negative_numbers = true)]
    pub workers: Option<i64>,

    /// TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Extra attempts for timeouts, network errors, 429 and 5xx responses
    #[arg(long)]
    pub retries: Option<u32>,

    /// Record non-2xx responses as failures
    #[arg(long)]
    pub fail_on_status: bool,

    /// Emit results in input order instead of completion order
    #[arg(long)]
    pub ordered: bool,

    /// Do not print the banner
    #[arg(long)]
    pub no_banner: bool,

    /// Enable verbose logging
    #[arg(long)]
    pub verbose: bool,

    /// Print version
    #[arg(short = 'v', long, action = clap::ArgAction::Version)]
    #[allow(dead_code)]
    version: Option<bool>,
}

impl Cli {
    /// Build the run configuration: defaults, then the config file, then flags
    pub fn to_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        if let Some(workers) = self.workers {
            config.fetch.max_workers = worker_count(workers)?;
        }
        if let Some(secs) = self.timeout {
            config.fetch.timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = self.retries {
            config.retry.max_attempts = retries;
        }
        if self.fail_on_status {
            config.fetch.fail_on_http_status = true;
        }
        if self.ordered {
            config.output.order = ResultOrder::Input;
        }
        if self.json || self.csv {
            config.output.format = OutputFormat::from_flags(self.json, self.csv)?;
        }
        if let Some(path) = &self.output {
            config.output.path = Some(path.clone());
        }

        config.validate()?;
        Ok(config)
    }
}

/// Map a run error to the process exit code
pub fn exit_code(error: &Error) -> u8 {
    match error {
        Error::Config { .. } => EXIT_CONFIG,
        Error::Cancelled => EXIT_INTERRUPTED,
        _ => EXIT_FAILURE,
    }
}

fn print_banner() {
    eprintln!(
        r"
 _____     _       _
|  ___|__ | |_ ___| |__   ___ _ __
| |_ / _ \| __/ __| '_ \ / _ \ '__|
|  _|  __/| || (__| | | |  __/ |
|_|  \___| \__\___|_| |_|\___|_|

Fetch URLs Concurrently
Version: {}
Description: {}
",
        env!("CARGO_PKG_VERSION"),
        DESCRIPTION
    );
}

/// Run the command line and report the outcome as an exit code
pub async fn run(cli: Cli) -> ExitCode {
    if !cli.no_banner {
        print_banner();
    }

    match execute(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("fetcher: {e}");
            ExitCode::from(exit_code(&e))
        }
    }
}

async fn execute(cli: &Cli) -> Result<()> {
    let config = cli.to_config()?;
    let fetcher = UrlFetcher::new(config)?;
    let urls = load_urls(&cli.input).await?;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let watcher = tokio::spawn(async move {
        shutdown_signal().await;
        trigger.cancel();
    });

    // The watcher stays armed until the results are written
    let outcome = fetch_and_emit(&fetcher, urls, cancel).await;
    watcher.abort();

    let results = outcome?;
    tracing::info!(
        unique = results.len(),
        attempted = results.attempted(),
        failures = results.failures().count(),
        "Done"
    );
    Ok(())
}

async fn fetch_and_emit(
    fetcher: &UrlFetcher,
    urls: Vec<String>,
    cancel: CancellationToken,
) -> Result<ResultSet> {
    let results = fetcher.run_with_cancel(urls, cancel.clone()).await?;
    emit_until_cancelled(fetcher, results, &cancel).await
}

/// Write results on a blocking thread, giving up when `cancel` fires
async fn emit_until_cancelled(
    fetcher: &UrlFetcher,
    results: ResultSet,
    cancel: &CancellationToken,
) -> Result<ResultSet> {
    let writer = fetcher.clone();
    let emitting = tokio::task::spawn_blocking(move || writer.emit(results));

    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::warn!("Interrupted while writing results");
            Err(Error::Cancelled)
        }
        joined = emitting => joined
            .map_err(|e| Error::Other(format!("output task failed: {}", e)))?,
    }
}
