//! Catalog fetching and validation.
//!
//! The feed is one JSON document listing repositories, either a bare array
//! or `{"repos": [...]}`. Each record is validated on its own: a bad record
//! is counted and dropped, a bad document fails the whole fetch.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, instrument, warn};

use super::retry::{run_with_retry, RetryPolicy, Retryable};
use crate::domain::{CatalogEntry, MalformedEntry, RepoId};

/// Deadline for a single feed download
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Field names accepted for each record attribute, first match wins
const LOCATION_FIELDS: &[&str] = &["url", "sourceLocation", "html_url"];
const ORG_FIELDS: &[&str] = &["org", "owner", "organization"];
const NAME_FIELDS: &[&str] = &["name", "repo"];
const TIMESTAMP_FIELDS: &[&str] = &["pushedAt", "lastModifiedAt", "pushed_at"];

/// Catalog fetch errors
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("feed transport error: {0}")]
    Transport(String),

    #[error("feed returned HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("feed document is not a repository list: {0}")]
    Decode(String),

    #[error("failed to read feed file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Retryable for CatalogError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::Decode(_) | Self::Io { .. } => false,
        }
    }
}

/// Where the catalog document comes from
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Human-readable location for logs
    fn describe(&self) -> String;

    /// Download the raw document
    async fn fetch_document(&self) -> Result<String, CatalogError>;
}

/// Feed served over HTTP(S), no auth
pub struct HttpCatalogSource {
    client: reqwest::Client,
    url: String,
}

impl HttpCatalogSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogSource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    async fn fetch_document(&self) -> Result<String, CatalogError> {
        let response = self
            .client
            .get(&self.url)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .map_err(|e| CatalogError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status {
                status: status.as_u16(),
                url: self.url.clone(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| CatalogError::Transport(e.to_string()))
    }
}

/// Feed read from a local file
pub struct FileCatalogSource {
    path: PathBuf,
}

impl FileCatalogSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CatalogSource for FileCatalogSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch_document(&self) -> Result<String, CatalogError> {
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| CatalogError::Io {
                path: self.path.clone(),
                source,
            })
    }
}

/// Pick a source for a feed location: http(s) URLs go over the network,
/// anything else (optionally `file://`) is a local path.
pub fn source_for(feed: &str) -> Arc<dyn CatalogSource> {
    if feed.starts_with("http://") || feed.starts_with("https://") {
        Arc::new(HttpCatalogSource::new(feed))
    } else {
        let path = feed.strip_prefix("file://").unwrap_or(feed);
        Arc::new(FileCatalogSource::new(path))
    }
}

/// Result of a successful fetch
#[derive(Debug, Clone, Default)]
pub struct FetchedCatalog {
    /// Valid entries in feed order
    pub entries: Vec<CatalogEntry>,

    /// Records dropped during validation
    pub malformed: usize,
}

/// Parse a feed document into validated entries
pub fn parse_catalog(document: &str) -> Result<FetchedCatalog, CatalogError> {
    let value: Value =
        serde_json::from_str(document).map_err(|e| CatalogError::Decode(e.to_string()))?;

    let records = match value {
        Value::Array(records) => records,
        Value::Object(mut map) => match map.remove("repos") {
            Some(Value::Array(records)) => records,
            _ => {
                return Err(CatalogError::Decode(
                    "expected an array or an object with a 'repos' array".to_string(),
                ))
            }
        },
        other => {
            return Err(CatalogError::Decode(format!(
                "expected an array, got {}",
                json_kind(&other)
            )))
        }
    };

    let mut catalog = FetchedCatalog::default();
    for (position, record) in records.iter().enumerate() {
        match parse_record(record) {
            Ok(entry) => catalog.entries.push(entry),
            Err(reason) => {
                warn!(position, %reason, "Dropping malformed catalog record");
                catalog.malformed += 1;
            }
        }
    }

    Ok(catalog)
}

/// Validate one feed record
pub fn parse_record(record: &Value) -> Result<CatalogEntry, MalformedEntry> {
    let map = record
        .as_object()
        .ok_or_else(|| MalformedEntry::Shape(json_kind(record).to_string()))?;

    let location = field(map, LOCATION_FIELDS).ok_or(MalformedEntry::MissingLocation)?;
    let timestamp = field(map, TIMESTAMP_FIELDS).ok_or(MalformedEntry::MissingTimestamp)?;

    let id = match (field(map, ORG_FIELDS), field(map, NAME_FIELDS)) {
        (Some(org), Some(name)) => RepoId::new(org, name)?,
        _ => RepoId::from_url(location)?,
    };

    CatalogEntry::new(id, location, timestamp)
}

/// First non-empty string among `names`
fn field<'a>(map: &'a Map<String, Value>, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .filter_map(|name| map.get(*name).and_then(Value::as_str))
        .map(str::trim)
        .find(|value| !value.is_empty())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Fetches and validates the catalog with bounded retries
pub struct CatalogFetcher {
    source: Arc<dyn CatalogSource>,
    retry: RetryPolicy,
}

impl CatalogFetcher {
    pub fn new(source: Arc<dyn CatalogSource>, retry: RetryPolicy) -> Self {
        Self { source, retry }
    }

    /// Download and validate the catalog.
    ///
    /// Transport and server errors are retried; a document that does not
    /// decode is not.
    #[instrument(skip(self), fields(feed = %self.source.describe()))]
    pub async fn fetch(&self) -> Result<FetchedCatalog, CatalogError> {
        let source = &self.source;
        let document = run_with_retry(&self.retry, "catalog_fetch", move |_| source.fetch_document())
            .await?;

        let catalog = parse_catalog(&document)?;
        info!(
            entries = catalog.entries.len(),
            malformed = catalog.malformed,
            "Fetched catalog"
        );
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_array_document() {
        let doc = json!([
            {"url": "https://github.com/alphagov/notify", "pushedAt": "2024-01-01T00:00:00Z", "org": "alphagov", "name": "notify"},
            {"url": "https://github.com/cabinetoffice/x.git", "pushedAt": "2024-02-01T00:00:00Z"},
        ])
        .to_string();

        let catalog = parse_catalog(&doc).unwrap();
        assert_eq!(catalog.malformed, 0);
        assert_eq!(catalog.entries.len(), 2);
        assert_eq!(catalog.entries[1].id.to_string(), "cabinetoffice/x");
    }

    #[test]
    fn test_parse_wrapped_document() {
        let doc = json!({"repos": [
            {"url": "https://github.com/a/b", "lastModifiedAt": "2024-01-01T00:00:00Z", "owner": "a", "name": "b"}
        ]})
        .to_string();

        let catalog = parse_catalog(&doc).unwrap();
        assert_eq!(catalog.entries[0].id, RepoId::new("a", "b").unwrap());
    }

    #[test]
    fn test_malformed_records_counted() {
        let doc = json!([
            {"url": "https://github.com/a/ok", "pushedAt": "2024-01-01T00:00:00Z"},
            {"url": "https://github.com/a/no-ts"},
            {"pushedAt": "2024-01-01T00:00:00Z", "org": "a", "name": "no-url"},
            {"url": "https://github.com/a/bad-ts", "pushedAt": "last tuesday"},
            "not an object",
            null,
        ])
        .to_string();

        let catalog = parse_catalog(&doc).unwrap();
        assert_eq!(catalog.entries.len(), 1);
        assert_eq!(catalog.malformed, 5);
    }

    #[test]
    fn test_bad_document_is_terminal() {
        let err = parse_catalog("{\"unexpected\": true}").unwrap_err();
        assert!(matches!(err, CatalogError::Decode(_)));
        assert!(!err.is_retryable());

        assert!(parse_catalog("<html>").is_err());
        assert!(parse_catalog("42").is_err());
    }

    #[test]
    fn test_empty_feed_is_valid() {
        let catalog = parse_catalog("[]").unwrap();
        assert!(catalog.entries.is_empty());
    }

    #[test]
    fn test_status_classification() {
        let server = CatalogError::Status {
            status: 503,
            url: "u".into(),
        };
        let client = CatalogError::Status {
            status: 404,
            url: "u".into(),
        };
        assert!(server.is_retryable());
        assert!(!client.is_retryable());
        assert!(CatalogError::Transport("reset".into()).is_retryable());
    }

    #[test]
    fn test_source_for() {
        assert!(source_for("https://example.org/repos.json")
            .describe()
            .starts_with("https://"));
        assert_eq!(source_for("file:///tmp/repos.json").describe(), "/tmp/repos.json");
        assert_eq!(source_for("repos.json").describe(), "repos.json");
    }
}
