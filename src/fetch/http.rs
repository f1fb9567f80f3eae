//! reqwest-backed [`Fetcher`].

use reqwest::header::CONTENT_TYPE;
use url::Url;

use super::Fetcher;
use crate::config::FetchConfig;
use crate::error::{Error, FetchError, Result};
use crate::types::Payload;

/// Production [`Fetcher`] issuing HTTP GET requests through a shared client.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    fail_on_http_status: bool,
}

impl HttpFetcher {
    /// Build a fetcher with a client configured from `config`
    ///
    /// The client timeout matches the per-fetch timeout so a stalled transfer
    /// is reported as a timeout by reqwest itself.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .pool_max_idle_per_host(config.max_workers)
            .build()
            .map_err(|e| Error::Other(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self::with_client(client, config.fail_on_http_status))
    }

    /// Wrap an existing client
    pub fn with_client(client: reqwest::Client, fail_on_http_status: bool) -> Self {
        Self {
            client,
            fail_on_http_status,
        }
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> std::result::Result<Payload, FetchError> {
        let target = validate_url(url)?;

        let response = self.client.get(target).send().await?;
        let status = response.status();

        if self.fail_on_http_status && !status.is_success() {
            return Err(FetchError::HttpStatus {
                code: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.text().await?;

        Ok(Payload {
            status_code: status.as_u16(),
            content_type,
            body,
        })
    }
}

/// Parse `url` and check it is something an HTTP client can fetch
pub fn validate_url(url: &str) -> std::result::Result<Url, FetchError> {
    let parsed = Url::parse(url.trim())?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(FetchError::InvalidUrl(format!(
                "unsupported scheme '{}' in '{}'",
                other, url
            )));
        }
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(FetchError::InvalidUrl(format!("missing host in '{}'", url)));
    }
    Ok(parsed)
}
