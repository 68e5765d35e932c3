//! Bounded summary generation.
//!
//! Wraps a [`Summarizer`] with:
//! - A hard wall-clock timeout per repository, covering every attempt
//! - Retries on transient failures within that budget
//! - Payload normalization to plain text
//! - A post-hoc size bound with a truncation notice

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{debug, warn};

use super::retry::{run_with_retry, RetryPolicy};
use crate::adapters::{GenerationError, Summarizer};
use crate::domain::{CatalogEntry, SummaryArtifact};

/// Limits applied to every summarization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryLimits {
    /// Wall-clock budget per repository in seconds (default: 300 = 5 min)
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Maximum summary size in bytes (default: 512KB)
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

fn default_timeout_seconds() -> u64 {
    300
}
fn default_max_bytes() -> usize {
    512 * 1024
}

impl Default for SummaryLimits {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
            max_bytes: default_max_bytes(),
        }
    }
}

impl SummaryLimits {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Bound `text` to `max_bytes`.
///
/// Oversized text is cut at a character boundary and ends with a notice; the
/// result, notice included, never exceeds the limit. Returns the bounded text
/// and whether anything was cut.
pub fn truncate_summary(text: String, max_bytes: usize) -> (String, bool) {
    if text.len() <= max_bytes {
        return (text, false);
    }

    let notice = format!(
        "\n\n[... Summary truncated at {}KB limit ...]",
        max_bytes / 1024
    );
    // Limits too small for the notice get a bare cut
    let (budget, notice) = if notice.len() <= max_bytes {
        (max_bytes - notice.len(), notice)
    } else {
        (max_bytes, String::new())
    };

    let mut cut = budget;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }

    let mut bounded = text;
    bounded.truncate(cut);
    bounded.push_str(&notice);
    (bounded, true)
}

/// Produces bounded artifacts for catalog entries
pub struct SummaryGenerator {
    summarizer: Arc<dyn Summarizer>,
    limits: SummaryLimits,
    retry: RetryPolicy,
}

impl SummaryGenerator {
    pub fn new(summarizer: Arc<dyn Summarizer>, limits: SummaryLimits, retry: RetryPolicy) -> Self {
        Self {
            summarizer,
            limits,
            retry,
        }
    }

    /// Summarize one entry. Retries and their backoff share one timeout;
    /// when it elapses the in-flight attempt is dropped, child work with it.
    pub async fn generate(&self, entry: &CatalogEntry) -> Result<SummaryArtifact, GenerationError> {
        let summarizer = self.summarizer.as_ref();
        let location = entry.source_location.as_str();
        let limit = self.limits.timeout();
        let max_bytes = self.limits.max_bytes;

        let attempts = run_with_retry(&self.retry, "summarize", move |attempt| async move {
            debug!(location, attempt, "Summarizing");
            summarizer.summarize(location, max_bytes).await
        });
        let payload = match timeout(limit, attempts).await {
            Ok(result) => result?,
            Err(_) => return Err(GenerationError::Timeout(limit)),
        };

        let text = payload.into_text();
        if text.trim().is_empty() {
            return Err(GenerationError::EmptyOutput);
        }

        let (content, truncated) = truncate_summary(text, max_bytes);
        if truncated {
            warn!(repo = %entry.id, max_bytes, "Summary truncated");
        }

        Ok(SummaryArtifact::new(entry.id.clone(), content, truncated))
    }
}
