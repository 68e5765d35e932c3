//! Core ingestion logic.
//!
//! This module contains:
//! - Fetcher: Catalog download and record validation
//! - Partition: Deterministic assignment of entries to workers
//! - Cache: Freshness decisions against stored metadata
//! - Summary: Bounded, time-limited summary generation
//! - Retry: Shared retry/backoff executor
//! - Orchestrator: Main run loop

pub mod cache;
pub mod fetcher;
pub mod orchestrator;
pub mod partition;
pub mod retry;
pub mod summary;

// Re-export commonly used types
pub use cache::{decide, CacheChecker, CacheStatus};
pub use fetcher::{
    parse_catalog, source_for, CatalogError, CatalogFetcher, CatalogSource, FetchedCatalog,
    FileCatalogSource, HttpCatalogSource,
};
pub use orchestrator::{Orchestrator, RunError, RunOptions, DEFAULT_PROGRESS_INTERVAL};
pub use partition::{stable_hash, PartitionError, PartitionSpec, PartitionStrategy};
pub use retry::{run_with_retry, RetryPolicy, Retryable};
pub use summary::{truncate_summary, SummaryGenerator, SummaryLimits};
