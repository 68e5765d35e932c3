//! Main orchestrator for one ingestion run.
//!
//! Drives the catalog through fetch, partitioning, and per-entry
//! cache-check / generate / upload, then emits a single report. Per-entry
//! failures are recorded and iteration carries on; only an unavailable feed
//! stops the run.

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::adapters::GenerationError;
use crate::domain::{
    format_elapsed, CatalogEntry, FailureKind, ProcessingOutcome, Run, RunPhase, RunReport,
};
use crate::storage::{object_key, ObjectMetadata, ObjectStore};

use super::cache::{CacheChecker, CacheStatus};
use super::fetcher::{CatalogError, CatalogFetcher};
use super::partition::PartitionSpec;
use super::retry::{run_with_retry, RetryPolicy, Retryable};
use super::summary::SummaryGenerator;

/// Default number of entries between progress lines
pub const DEFAULT_PROGRESS_INTERVAL: usize = 100;

/// Per-run settings
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Which slice of the catalog this worker owns
    pub partition: PartitionSpec,

    /// Cap on the number of assigned entries iterated
    pub limit: Option<usize>,

    /// Generate but never upload
    pub dry_run: bool,

    /// Log progress every this many entries (0 disables)
    pub progress_interval: usize,

    /// Prepended to every object key
    pub key_prefix: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            partition: PartitionSpec::single(),
            limit: None,
            dry_run: false,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            key_prefix: String::new(),
        }
    }
}

/// Errors that end a run without a report
#[derive(Debug, Error)]
pub enum RunError {
    #[error("catalog feed unavailable ({}): {source}", feed_failure_kind(.source))]
    FeedUnavailable {
        #[source]
        source: CatalogError,
    },
}

fn feed_failure_kind(error: &CatalogError) -> &'static str {
    if error.is_retryable() {
        "retries exhausted"
    } else {
        "not retryable"
    }
}

/// Main ingestion orchestrator
pub struct Orchestrator {
    fetcher: CatalogFetcher,
    store: Arc<dyn ObjectStore>,
    generator: SummaryGenerator,
    cache: CacheChecker,
    upload_retry: RetryPolicy,
}

impl Orchestrator {
    /// Create an orchestrator with the default lookup and upload schedules
    pub fn new(
        fetcher: CatalogFetcher,
        store: Arc<dyn ObjectStore>,
        generator: SummaryGenerator,
    ) -> Self {
        Self {
            fetcher,
            store,
            generator,
            cache: CacheChecker::default(),
            upload_retry: RetryPolicy::upload(),
        }
    }

    /// Override the metadata lookup schedule
    pub fn with_cache_retry(mut self, policy: RetryPolicy) -> Self {
        self.cache = CacheChecker::new(policy);
        self
    }

    /// Override the upload schedule
    pub fn with_upload_retry(mut self, policy: RetryPolicy) -> Self {
        self.upload_retry = policy;
        self
    }

    /// Execute one run over the configured partition.
    ///
    /// Cancelling `cancel` stops the run before the next entry starts; the
    /// entry in flight finishes and the report is still produced.
    #[instrument(
        skip(self, options, cancel),
        fields(
            partitions = options.partition.count(),
            index = options.partition.index(),
            dry_run = options.dry_run
        )
    )]
    pub async fn run(
        &self,
        options: &RunOptions,
        cancel: CancellationToken,
    ) -> Result<RunReport, RunError> {
        let mut run = Run::new(options.partition.info(), options.dry_run);
        info!(run_id = %run.id, store = self.store.name(), "Starting run");

        run.transition(RunPhase::Fetching);
        let fetched = tokio::select! {
            result = self.fetcher.fetch() => result,
            _ = cancel.cancelled() => {
                warn!(run_id = %run.id, "Cancelled while fetching catalog");
                run.cancelled = true;
                return Ok(self.finish(&mut run));
            }
        };
        let catalog = match fetched {
            Ok(catalog) => catalog,
            Err(source) => {
                run.transition(RunPhase::AbortedFetch);
                error!(run_id = %run.id, error = %source, "Catalog fetch failed, aborting run");
                return Err(RunError::FeedUnavailable { source });
            }
        };

        run.transition(RunPhase::Partitioning);
        let catalog_size = catalog.entries.len();
        let mut assigned = options.partition.assign(catalog.entries);
        if let Some(limit) = options.limit {
            assigned.truncate(limit);
        }
        run.stats.total = assigned.len();
        run.stats.malformed = catalog.malformed;
        info!(
            run_id = %run.id,
            assigned = assigned.len(),
            catalog = catalog_size,
            malformed = catalog.malformed,
            strategy = ?options.partition.strategy(),
            "Partition assigned"
        );

        run.transition(RunPhase::Iterating);
        for entry in &assigned {
            if cancel.is_cancelled() {
                warn!(
                    run_id = %run.id,
                    remaining = run.stats.total - run.stats.attempted(),
                    "Stop requested, not starting further entries"
                );
                run.cancelled = true;
                break;
            }

            let outcome = self.process_entry(entry, options).await;
            run.stats.record(&entry.id, outcome);

            let attempted = run.stats.attempted();
            if options.progress_interval > 0 && attempted % options.progress_interval == 0 {
                log_progress(&run);
            }
        }

        Ok(self.finish(&mut run))
    }

    /// Drive one entry through cache check, generation, and upload
    #[instrument(skip(self, entry, options), fields(repo = %entry.id))]
    pub async fn process_entry(
        &self,
        entry: &CatalogEntry,
        options: &RunOptions,
    ) -> ProcessingOutcome {
        let key = object_key(&options.key_prefix, &entry.id);
        let store = self.store.as_ref();

        let status = match self.cache.check(store, &key, entry).await {
            Ok(status) => status,
            Err(e) => {
                warn!(error = %e, "Cache lookup failed");
                return ProcessingOutcome::failed(FailureKind::CacheLookup, e);
            }
        };

        match &status {
            CacheStatus::Hit => {
                debug!("Up to date, skipping");
                return ProcessingOutcome::Skipped;
            }
            CacheStatus::Miss => info!("Not yet summarized"),
            CacheStatus::Stale { stored } => {
                info!(stored = %stored, current = %entry.last_modified_at, "Summary is stale")
            }
        }

        let artifact = match self.generator.generate(entry).await {
            Ok(artifact) => artifact,
            Err(e) => {
                warn!(error = %e, "Summary generation failed");
                return ProcessingOutcome::failed(generation_failure_kind(&e), e);
            }
        };

        if options.dry_run {
            info!(bytes = artifact.size_bytes, "Dry run, upload skipped");
            return ProcessingOutcome::Processed { bytes_written: 0 };
        }

        let metadata = ObjectMetadata::for_entry(entry, &artifact);
        let key = key.as_str();
        let content = artifact.content.as_str();
        let metadata = &metadata;

        match run_with_retry(&self.upload_retry, "upload", move |_| {
            store.write_object(key, content, metadata)
        })
        .await
        {
            Ok(()) => {
                info!(key, bytes = artifact.size_bytes, truncated = artifact.truncated, "Uploaded");
                ProcessingOutcome::Processed {
                    bytes_written: artifact.size_bytes,
                }
            }
            Err(e) => {
                warn!(key, error = %e, "Upload failed");
                ProcessingOutcome::failed(FailureKind::Upload, e)
            }
        }
    }

    fn finish(&self, run: &mut Run) -> RunReport {
        run.transition(RunPhase::Reporting);
        let report = run.report();

        info!(
            run_id = %run.id,
            total = report.total,
            skipped_cached = report.skipped_cached,
            processed = report.processed,
            failed = report.failed,
            malformed = report.malformed,
            bytes_written = report.bytes_written,
            cache_hit_rate = report.cache_hit_rate,
            cancelled = report.cancelled,
            elapsed = %format_elapsed(run.elapsed()),
            "Run finished"
        );

        run.transition(RunPhase::Done);
        report
    }
}

fn generation_failure_kind(error: &GenerationError) -> FailureKind {
    match error {
        GenerationError::Timeout(_) => FailureKind::GenerationTimeout,
        GenerationError::UpstreamUnavailable(_) => FailureKind::UpstreamUnavailable,
        GenerationError::Failed(_)
        | GenerationError::Rejected(_)
        | GenerationError::EmptyOutput
        | GenerationError::Misconfigured(_) => FailureKind::Generation,
    }
}

fn log_progress(run: &Run) {
    let attempted = run.stats.attempted();
    let percent = if run.stats.total == 0 {
        100.0
    } else {
        attempted as f64 / run.stats.total as f64 * 100.0
    };
    let eta = run
        .eta()
        .map(format_elapsed)
        .unwrap_or_else(|| "unknown".to_string());

    info!(
        run_id = %run.id,
        attempted,
        total = run.stats.total,
        percent = %format!("{:.1}", percent),
        processed = run.stats.processed,
        cached = run.stats.cached,
        failed = run.stats.failed,
        cache_hit_rate = run.stats.cache_hit_rate(),
        elapsed = %format_elapsed(run.elapsed()),
        eta = %eta,
        "Progress"
    );
}
