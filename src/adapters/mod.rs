//! Adapter interfaces for summarization backends.
//!
//! A [`Summarizer`] turns a repository location into a textual digest. The
//! backend may answer with plain text or with a structured payload; callers
//! only ever see [`SummaryPayload::into_text`].

pub mod gitingest;
pub mod http;

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::core::retry::Retryable;

// Re-export the adapters
pub use gitingest::GitingestAdapter;
pub use http::HttpSummarizer;

/// Summarization errors
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("summarization timed out after {0:?}")]
    Timeout(Duration),

    #[error("summarization failed: {0}")]
    Failed(String),

    #[error("summarization service unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The backend refused the request or answered with something unusable
    #[error("summarization rejected: {0}")]
    Rejected(String),

    #[error("summarizer returned no content")]
    EmptyOutput,

    /// The backend cannot run at all (missing binary, bad endpoint)
    #[error("summarizer misconfigured: {0}")]
    Misconfigured(String),
}

impl Retryable for GenerationError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Failed(_) | Self::UpstreamUnavailable(_)
        )
    }
}

/// Raw summarizer output before normalization
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SummaryPayload {
    /// Plain text digest
    Text(String),

    /// Sectioned digest
    Structured {
        summary: String,
        #[serde(default)]
        tree: Option<String>,
        #[serde(default)]
        content: Option<String>,
    },

    /// `[summary, tree]`
    Pair(String, String),
}

impl SummaryPayload {
    /// Collapse into one text, joining non-empty sections with a blank line
    pub fn into_text(self) -> String {
        let parts = match self {
            Self::Text(text) => return text,
            Self::Structured {
                summary,
                tree,
                content,
            } => vec![Some(summary), tree, content],
            Self::Pair(summary, tree) => vec![Some(summary), Some(tree)],
        };

        parts
            .into_iter()
            .flatten()
            .filter(|part| !part.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Trait for summarization backends
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Human-readable adapter name
    fn name(&self) -> &str;

    /// Summarize the repository at `location`, asking the backend to keep
    /// its output within `max_bytes`
    async fn summarize(
        &self,
        location: &str,
        max_bytes: usize,
    ) -> Result<SummaryPayload, GenerationError>;

    /// Check the backend is reachable before a run starts
    async fn health_check(&self) -> Result<(), GenerationError>;
}
