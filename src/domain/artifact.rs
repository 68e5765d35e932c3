//! Summary artifacts produced by the summarizer.
//!
//! An artifact only lives between generation and upload; it is never
//! persisted on its own.

use serde::{Deserialize, Serialize};

use super::catalog::RepoId;

/// The bounded text summary for one repository
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryArtifact {
    /// Repository the summary describes
    pub id: RepoId,

    /// Summary text, already size-bounded
    pub content: String,

    /// Size in bytes of `content`
    pub size_bytes: u64,

    /// Whether the size bound cut the original output
    pub truncated: bool,
}

impl SummaryArtifact {
    /// Create a new artifact
    pub fn new(id: RepoId, content: String, truncated: bool) -> Self {
        let size_bytes = content.len() as u64;
        Self {
            id,
            content,
            size_bytes,
            truncated,
        }
    }
}
