//! URL list loading.

use std::path::Path;

use crate::error::{Error, Result};

/// Read a URL list file: one URL per line, blank lines skipped
///
/// Lines are trimmed but not validated; malformed URLs are reported per URL
/// by the fetch stage. An unreadable file is a configuration error.
pub async fn load_urls(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let content = tokio::fs::read_to_string(path).await.map_err(|e| Error::Config {
        message: format!("failed to read input file '{}': {}", path.display(), e),
        key: Some("input".to_string()),
    })?;

    let urls = parse_url_list(&content);
    tracing::debug!(path = %path.display(), urls = urls.len(), "Loaded URL list");
    Ok(urls)
}

/// Split text into trimmed, non-empty lines
pub fn parse_url_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
