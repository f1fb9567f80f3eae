//! Core types for fetcher

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Classification of a failed fetch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Connection refused, DNS failure, TLS error, broken transfer
    NetworkError,
    /// The fetch exceeded its time budget
    Timeout,
    /// The URL is malformed or uses an unsupported scheme
    #[serde(rename = "InvalidURL")]
    InvalidUrl,
    /// Anything else (rejected HTTP status, worker panic, ...)
    Other,
}

impl ErrorKind {
    /// Stable label used in text output
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NetworkError => "NetworkError",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::InvalidUrl => "InvalidURL",
            ErrorKind::Other => "Other",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a fetch succeeded
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    /// A response was received
    Success,
    /// The fetch failed and was classified
    Failure,
}

/// Response data captured from a successful fetch
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    /// HTTP status code of the response
    pub status_code: u16,
    /// Content-Type header, if present
    #[serde(default)]
    pub content_type: Option<String>,
    /// Response body decoded as text
    pub body: String,
}

impl Payload {
    /// Create a 200 payload with only a body
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            status_code: 200,
            content_type: None,
            body: body.into(),
        }
    }
}

/// Classified failure of a fetch
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchFailure {
    /// Failure classification
    pub kind: ErrorKind,
    /// Human-readable description
    pub detail: String,
}

/// Outcome of a fetch: exactly one of payload or failure
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FetchOutcome {
    /// Response captured
    Success(Payload),
    /// Fetch failed
    Failure(FetchFailure),
}

/// Outcome of fetching one URL
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResult {
    /// The URL that was requested
    pub url: String,

    /// Position of the URL in the input list
    #[serde(skip)]
    pub input_index: usize,

    /// Payload or failure
    #[serde(flatten)]
    pub outcome: FetchOutcome,

    /// When the fetch finished
    pub fetched_at: DateTime<Utc>,

    /// Wall time spent on the fetch, retries included
    pub elapsed_ms: u64,
}

impl FetchResult {
    /// Build a successful result
    pub fn success(url: impl Into<String>, input_index: usize, payload: Payload) -> Self {
        Self {
            url: url.into(),
            input_index,
            outcome: FetchOutcome::Success(payload),
            fetched_at: Utc::now(),
            elapsed_ms: 0,
        }
    }

    /// Build a failed result
    pub fn failure(
        url: impl Into<String>,
        input_index: usize,
        kind: ErrorKind,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            input_index,
            outcome: FetchOutcome::Failure(FetchFailure {
                kind,
                detail: detail.into(),
            }),
            fetched_at: Utc::now(),
            elapsed_ms: 0,
        }
    }

    /// Status derived from the outcome
    pub fn status(&self) -> FetchStatus {
        match self.outcome {
            FetchOutcome::Success(_) => FetchStatus::Success,
            FetchOutcome::Failure(_) => FetchStatus::Failure,
        }
    }

    /// Returns true if the fetch succeeded
    pub fn is_success(&self) -> bool {
        self.status() == FetchStatus::Success
    }

    /// Payload, present iff the fetch succeeded
    pub fn payload(&self) -> Option<&Payload> {
        match &self.outcome {
            FetchOutcome::Success(p) => Some(p),
            FetchOutcome::Failure(_) => None,
        }
    }

    /// Failure, present iff the fetch failed
    pub fn failure_info(&self) -> Option<&FetchFailure> {
        match &self.outcome {
            FetchOutcome::Success(_) => None,
            FetchOutcome::Failure(f) => Some(f),
        }
    }

    /// Equivalence key used for deduplication
    pub fn dedup_key(&self) -> DedupKey {
        match &self.outcome {
            FetchOutcome::Success(p) => DedupKey::content(&p.body),
            FetchOutcome::Failure(f) => DedupKey::Failure {
                kind: f.kind,
                url: self.url.clone(),
            },
        }
    }
}

/// Equivalence key deciding whether two results are duplicates
///
/// Successes compare by the SHA-256 of their body; status code, headers and
/// URL do not participate. Failures compare by kind and URL, so a URL that
/// appears twice in the input and fails the same way twice collapses to one
/// entry. A success is never equal to a failure.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DedupKey {
    /// Hex-encoded SHA-256 of a response body
    Content(String),
    /// Failure kind together with the source URL
    Failure {
        /// Failure classification
        kind: ErrorKind,
        /// URL that failed
        url: String,
    },
}

impl DedupKey {
    /// Key for a response body
    pub fn content(body: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(body.as_bytes());
        DedupKey::Content(format!("{:x}", hasher.finalize()))
    }
}

/// Ordering applied to a finished result set
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultOrder {
    /// First-seen order of distinct responses (depends on network timing)
    #[default]
    Completion,
    /// Input order; among duplicates the earliest input entry is kept
    Input,
}

/// Deduplicated results of one run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResultSet {
    entries: Vec<FetchResult>,
    attempted: usize,
}

impl ResultSet {
    pub(crate) fn new(entries: Vec<FetchResult>, attempted: usize) -> Self {
        Self { entries, attempted }
    }

    /// Number of distinct results
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the run produced no results
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of results received before deduplication
    pub fn attempted(&self) -> usize {
        self.attempted
    }

    /// Number of results dropped as duplicates
    pub fn duplicates_removed(&self) -> usize {
        self.attempted.saturating_sub(self.entries.len())
    }

    /// Iterate over the results in set order
    pub fn iter(&self) -> std::slice::Iter<'_, FetchResult> {
        self.entries.iter()
    }

    /// Results as a slice
    pub fn as_slice(&self) -> &[FetchResult] {
        &self.entries
    }

    /// Successful results
    pub fn successes(&self) -> impl Iterator<Item = &FetchResult> {
        self.entries.iter().filter(|r| r.is_success())
    }

    /// Failed results
    pub fn failures(&self) -> impl Iterator<Item = &FetchResult> {
        self.entries.iter().filter(|r| !r.is_success())
    }

    /// Equivalence keys in set order
    pub fn keys(&self) -> Vec<DedupKey> {
        self.entries.iter().map(FetchResult::dedup_key).collect()
    }

    /// Compare two sets under the deduplication equivalence, ignoring order
    pub fn equivalent(&self, other: &ResultSet) -> bool {
        let mut a = self.keys();
        let mut b = other.keys();
        a.sort();
        b.sort();
        a == b
    }

    /// Consume the set, returning the results
    pub fn into_vec(self) -> Vec<FetchResult> {
        self.entries
    }
}

impl IntoIterator for ResultSet {
    type Item = FetchResult;
    type IntoIter = std::vec::IntoIter<FetchResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a FetchResult;
    type IntoIter = std::slice::Iter<'a, FetchResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
