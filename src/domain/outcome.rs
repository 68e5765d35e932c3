//! Per-entry processing outcomes.

use serde::{Deserialize, Serialize};

use super::catalog::RepoId;

/// Result of driving one catalog entry through the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingOutcome {
    /// Stored metadata already matched the catalog timestamp
    Skipped,

    /// Summary generated and (unless dry-run) uploaded
    Processed { bytes_written: u64 },

    /// Some step gave up; the run carries on
    Failed { kind: FailureKind, message: String },
}

impl ProcessingOutcome {
    pub fn failed(kind: FailureKind, error: impl ToString) -> Self {
        Self::Failed {
            kind,
            message: error.to_string(),
        }
    }
}

/// Which step an entry failed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Metadata lookup against the object store
    CacheLookup,

    /// Summarizer exceeded its wall-clock budget
    GenerationTimeout,

    /// Summarizer returned an error or unusable output
    Generation,

    /// Summarizer could not be reached
    UpstreamUnavailable,

    /// Object store rejected or dropped the write
    Upload,
}

/// A failed entry as recorded in run statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryFailure {
    pub id: RepoId,
    pub kind: FailureKind,
    pub message: String,
}
