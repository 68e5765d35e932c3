//! Domain types for the ingestion worker.
//!
//! This module contains the core data structures:
//! - Catalog: Validated repository records from the feed
//! - Artifact: Bounded summaries awaiting upload
//! - Outcome: Per-entry results
//! - Run: Run state, statistics and the final report

pub mod artifact;
pub mod catalog;
pub mod outcome;
pub mod run;

// Re-export commonly used types
pub use artifact::SummaryArtifact;
pub use catalog::{CatalogEntry, MalformedEntry, RepoId};
pub use outcome::{EntryFailure, FailureKind, ProcessingOutcome};
pub use run::{format_elapsed, PartitionInfo, Run, RunPhase, RunReport, RunStatistics, RunSummary};
