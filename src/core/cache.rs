//! Cache decisions against stored object metadata.
//!
//! An entry is current exactly when a stored object exists and its recorded
//! `lastModifiedAt` equals the catalog's timestamp string. There is no
//! separate index and no time-based expiry.

use tracing::debug;

use super::retry::{run_with_retry, RetryPolicy};
use crate::domain::CatalogEntry;
use crate::storage::{ObjectMetadata, ObjectStore, StorageError};

/// Outcome of comparing stored metadata with a catalog entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheStatus {
    /// No stored object
    Miss,

    /// Stored object was built from a different timestamp
    Stale { stored: String },

    /// Stored object is current
    Hit,
}

impl CacheStatus {
    pub fn needs_processing(&self) -> bool {
        !matches!(self, Self::Hit)
    }
}

/// Pure decision: exact string equality of the timestamps
pub fn decide(stored: Option<&ObjectMetadata>, entry: &CatalogEntry) -> CacheStatus {
    match stored {
        None => CacheStatus::Miss,
        Some(metadata) if metadata.last_modified_at == entry.last_modified_at => CacheStatus::Hit,
        Some(metadata) => CacheStatus::Stale {
            stored: metadata.last_modified_at.clone(),
        },
    }
}

/// Metadata lookups with the light retry schedule
pub struct CacheChecker {
    retry: RetryPolicy,
}

impl Default for CacheChecker {
    fn default() -> Self {
        Self::new(RetryPolicy::light())
    }
}

impl CacheChecker {
    pub fn new(retry: RetryPolicy) -> Self {
        Self { retry }
    }

    /// Look up `key` and decide. A lookup that keeps failing is returned as
    /// an error; the caller records the entry as failed.
    pub async fn check(
        &self,
        store: &dyn ObjectStore,
        key: &str,
        entry: &CatalogEntry,
    ) -> Result<CacheStatus, StorageError> {
        let stored =
            run_with_retry(&self.retry, "cache_lookup", move |_| store.read_metadata(key)).await?;

        let status = decide(stored.as_ref(), entry);
        debug!(key, ?status, "Cache decision");
        Ok(status)
    }

    /// Convenience form of [`check`](Self::check)
    pub async fn needs_processing(
        &self,
        store: &dyn ObjectStore,
        key: &str,
        entry: &CatalogEntry,
    ) -> Result<bool, StorageError> {
        Ok(self.check(store, key, entry).await?.needs_processing())
    }
}
