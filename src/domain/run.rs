//! Run state, statistics and the final report.
//!
//! A Run represents one execution of the orchestrator over one partition.
//! Statistics are accumulated in memory and emitted once as a [`RunReport`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::catalog::RepoId;
use super::outcome::{EntryFailure, ProcessingOutcome};

/// Phase of the orchestrator state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    Fetching,
    Partitioning,
    Iterating,
    Reporting,
    Done,

    /// The catalog could not be fetched; nothing was attempted
    AbortedFetch,
}

impl Default for RunPhase {
    fn default() -> Self {
        Self::Idle
    }
}

/// Counters for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatistics {
    /// Entries assigned to this worker (after partitioning and any cap)
    pub total: usize,

    /// Entries skipped because the stored object was current
    pub cached: usize,

    /// Entries summarized (and uploaded unless dry-run)
    pub processed: usize,

    /// Entries that failed at some step
    pub failed: usize,

    /// Feed records dropped during validation
    pub malformed: usize,

    /// Content bytes written to the object store
    pub bytes_written: u64,

    /// Failed entries with their reason
    pub failures: Vec<EntryFailure>,
}

impl RunStatistics {
    /// Fold one entry outcome into the counters
    pub fn record(&mut self, id: &RepoId, outcome: ProcessingOutcome) {
        match outcome {
            ProcessingOutcome::Skipped => self.cached += 1,
            ProcessingOutcome::Processed { bytes_written } => {
                self.processed += 1;
                self.bytes_written += bytes_written;
            }
            ProcessingOutcome::Failed { kind, message } => {
                self.failed += 1;
                self.failures.push(EntryFailure {
                    id: id.clone(),
                    kind,
                    message,
                });
            }
        }
    }

    /// Entries that reached a final outcome
    pub fn attempted(&self) -> usize {
        self.cached + self.processed + self.failed
    }

    /// Percentage of attempted entries that were cache hits
    pub fn cache_hit_rate(&self) -> f64 {
        let attempted = self.attempted();
        if attempted == 0 {
            return 0.0;
        }
        let rate = self.cached as f64 / attempted as f64 * 100.0;
        (rate * 10.0).round() / 10.0
    }
}

/// Coarse classification of how a run went
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunSummary {
    /// Every attempted entry was already cached
    NothingToDo,

    /// Work was done and nothing failed
    WorkDone,

    /// At least one entry failed
    WorkFailed,
}

/// Partition assignment echoed in the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionInfo {
    pub count: usize,
    pub index: usize,
}

/// Structured record emitted once at the end of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub partition: PartitionInfo,
    pub dry_run: bool,
    pub cancelled: bool,
    pub summary: RunSummary,
    pub total: usize,
    pub skipped_cached: usize,
    pub processed: usize,
    pub failed: usize,
    pub malformed: usize,
    pub bytes_written: u64,
    pub elapsed_seconds: f64,
    pub cache_hit_rate: f64,
    pub failures: Vec<EntryFailure>,
}

/// One orchestrator run over one partition
#[derive(Debug, Clone)]
pub struct Run {
    /// Unique identifier for this run
    pub id: Uuid,

    /// Current phase
    pub phase: RunPhase,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// Monotonic start for elapsed-time measurement
    started: tokio::time::Instant,

    /// Partition this worker covers
    pub partition: PartitionInfo,

    /// Uploads are skipped when set
    pub dry_run: bool,

    /// Set when a stop signal ended iteration early
    pub cancelled: bool,

    /// Counters
    pub stats: RunStatistics,
}

impl Run {
    /// Start a new run
    pub fn new(partition: PartitionInfo, dry_run: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            phase: RunPhase::Idle,
            started_at: Utc::now(),
            started: tokio::time::Instant::now(),
            partition,
            dry_run,
            cancelled: false,
            stats: RunStatistics::default(),
        }
    }

    /// Move to the next phase
    pub fn transition(&mut self, phase: RunPhase) {
        tracing::debug!(run_id = %self.id, from = ?self.phase, to = ?phase, "Run phase change");
        self.phase = phase;
    }

    /// Time since the run started
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Estimated time to finish the remaining entries at the current pace
    pub fn eta(&self) -> Option<Duration> {
        let attempted = self.stats.attempted();
        if attempted == 0 {
            return None;
        }
        let remaining = self.stats.total.saturating_sub(attempted) as u32;
        Some(self.elapsed() / attempted as u32 * remaining)
    }

    /// Classify the run for the report
    pub fn summary(&self) -> RunSummary {
        if self.stats.failed > 0 {
            RunSummary::WorkFailed
        } else if self.stats.processed > 0 {
            RunSummary::WorkDone
        } else {
            RunSummary::NothingToDo
        }
    }

    /// Freeze the run into its report
    pub fn report(&self) -> RunReport {
        let elapsed = self.elapsed().as_secs_f64();
        RunReport {
            run_id: self.id,
            started_at: self.started_at,
            completed_at: Utc::now(),
            partition: self.partition,
            dry_run: self.dry_run,
            cancelled: self.cancelled,
            summary: self.summary(),
            total: self.stats.total,
            skipped_cached: self.stats.cached,
            processed: self.stats.processed,
            failed: self.stats.failed,
            malformed: self.stats.malformed,
            bytes_written: self.stats.bytes_written,
            elapsed_seconds: (elapsed * 10.0).round() / 10.0,
            cache_hit_rate: self.stats.cache_hit_rate(),
            failures: self.stats.failures.clone(),
        }
    }
}

/// Human-readable duration: `5h 47m`, `15m 3s`, `45s`
pub fn format_elapsed(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
