//! Mock servers, URL files and an instrumented fetcher

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use fetcher::{Config, FetchError, Fetcher, Payload};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Start a mock server answering `GET /<name>` with `body` for every page
pub async fn serve_pages(pages: &[(&str, &str)]) -> MockServer {
    let server = MockServer::start().await;
    for (name, body) in pages {
        Mock::given(method("GET"))
            .and(path(format!("/{name}")))
            .respond_with(ResponseTemplate::new(200).set_body_string(*body))
            .mount(&server)
            .await;
    }
    server
}

/// Full URL of `name` on `server`
pub fn page_url(server: &MockServer, name: &str) -> String {
    format!("{}/{}", server.uri(), name)
}

/// A URL on a local port nothing listens on
pub fn unreachable_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    format!("http://127.0.0.1:{port}/gone")
}

/// Write `urls` one per line into `dir/urls.txt`
pub fn write_url_file(dir: &Path, urls: &[String]) -> PathBuf {
    let file = dir.join("urls.txt");
    std::fs::write(&file, urls.join("\n")).expect("write URL file");
    file
}

/// Default configuration with `workers` workers and a short timeout
pub fn test_config(workers: usize) -> Config {
    let mut config = Config::default();
    config.fetch.max_workers = workers;
    config.fetch.timeout = Duration::from_secs(5);
    config
}

/// Fetcher that sleeps, echoes the URL as body and records concurrency
#[derive(Clone, Default)]
pub struct CountingFetcher {
    delay: Duration,
    calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl CountingFetcher {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Fetcher for CountingFetcher {
    async fn fetch(&self, url: &str) -> Result<Payload, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(Payload::text(url))
    }
}
