//! reposcrape - Repository summary ingestion worker
//!
//! Fetches a public catalog of source repositories, takes a deterministic
//! slice of it, and for every repository whose stored summary is missing or
//! out of date generates a size-bounded text digest and uploads it to an
//! object store.
//!
//! # Architecture
//!
//! The object store is the only state:
//! - Each summary carries the catalog timestamp it was built from
//! - A repository is skipped when that timestamp still matches the catalog
//! - Workers share nothing, so any number can run in parallel over
//!   disjoint partitions
//!
//! # Modules
//!
//! - `adapters`: Summarization backends (gitingest CLI, HTTP ingest service)
//! - `core`: Fetching, partitioning, cache decisions, retries, orchestration
//! - `domain`: Data structures (CatalogEntry, SummaryArtifact, Run)
//! - `storage`: Object stores (local directory, Cloud Storage)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Worker 3 of 10
//! reposcrape run --partitions 10 --partition-index 3
//!
//! # Everything, without uploading
//! reposcrape run --dry-run --limit 20
//!
//! # What is stored for one repository
//! reposcrape inspect alphagov/notify
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod storage;

// Re-export main types at crate root for convenience
pub use core::{Orchestrator, RunOptions};
pub use domain::{CatalogEntry, RepoId, RunReport};
pub use storage::ObjectStore;
