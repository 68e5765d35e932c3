//! Object store interfaces.
//!
//! The object store is both the durable home of every summary and the only
//! cache index: an object's own metadata records which catalog timestamp it
//! was built from. Backends must make writes atomic, so a metadata read never
//! observes content without metadata or metadata without content.

pub mod fs;
pub mod gcs;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::retry::Retryable;
use crate::domain::{CatalogEntry, RepoId, SummaryArtifact};

// Re-export the backends
pub use fs::FsStore;
pub use gcs::GcsStore;

/// Content type declared for every summary object
pub const CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Custom metadata stored alongside each summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetadata {
    /// Repository URL the summary was generated from
    pub source_location: String,

    /// Catalog timestamp at the time of the write; the cache key
    pub last_modified_at: String,

    /// When the summary was written (RFC 3339, UTC)
    pub processed_at: String,

    /// Informational fields (org, repo, size, truncated)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl ObjectMetadata {
    /// Metadata for a fresh write of `artifact`, stamped now
    pub fn for_entry(entry: &CatalogEntry, artifact: &SummaryArtifact) -> Self {
        let extra = [
            ("org", entry.id.org.clone()),
            ("repo", entry.id.name.clone()),
            ("size", artifact.size_bytes.to_string()),
            ("truncated", artifact.truncated.to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            source_location: entry.source_location.clone(),
            last_modified_at: entry.last_modified_at.clone(),
            processed_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            extra,
        }
    }

    /// Flatten into a string map for stores with key/value metadata
    pub fn to_custom_metadata(&self) -> BTreeMap<String, String> {
        let mut map = self.extra.clone();
        map.insert("sourceLocation".to_string(), self.source_location.clone());
        map.insert("lastModifiedAt".to_string(), self.last_modified_at.clone());
        map.insert("processedAt".to_string(), self.processed_at.clone());
        map
    }

    /// Rebuild from a string map. Missing fields become empty strings,
    /// which never match a validated catalog timestamp.
    pub fn from_custom_metadata(mut map: BTreeMap<String, String>) -> Self {
        let source_location = map.remove("sourceLocation").unwrap_or_default();
        let last_modified_at = map.remove("lastModifiedAt").unwrap_or_default();
        let processed_at = map.remove("processedAt").unwrap_or_default();

        Self {
            source_location,
            last_modified_at,
            processed_at,
            extra: map,
        }
    }
}

/// Object store errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object store unavailable: {0}")]
    Unavailable(String),

    #[error("object store rejected request for '{key}': {message}")]
    Rejected { key: String, message: String },

    #[error("stored object '{key}' is unreadable: {message}")]
    Corrupt { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Retryable for StorageError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Io(_))
    }
}

/// Derive the object key for a repository: `{prefix}{org}/{name}`
pub fn object_key(prefix: &str, id: &RepoId) -> String {
    format!("{}{}/{}", prefix, id.org, id.name)
}

/// Trait for durable summary storage
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Human-readable backend name
    fn name(&self) -> &str;

    /// Fetch only the metadata of `key`; `None` if no object exists
    async fn read_metadata(&self, key: &str) -> Result<Option<ObjectMetadata>, StorageError>;

    /// Write content and metadata together, fully replacing any prior object
    async fn write_object(
        &self,
        key: &str,
        content: &str,
        metadata: &ObjectMetadata,
    ) -> Result<(), StorageError>;

    /// Fetch metadata and content of `key`
    async fn read_object(&self, key: &str)
        -> Result<Option<(ObjectMetadata, String)>, StorageError>;
}
