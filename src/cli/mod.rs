//! Command-line interface for reposcrape.
//!
//! Provides commands for running an ingestion worker over one partition,
//! inspecting a stored summary, and showing the resolved configuration.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::adapters::{GitingestAdapter, HttpSummarizer, Summarizer};
use crate::config::{self, ResolvedConfig, StoreBackend, SummarizerKind};
use crate::core::{
    source_for, CatalogFetcher, Orchestrator, PartitionSpec, PartitionStrategy, RunOptions,
    SummaryGenerator,
};
use crate::domain::{RepoId, RunReport};
use crate::storage::{object_key, FsStore, GcsStore, ObjectStore};

/// Exit status for a run ended by a stop signal
const EXIT_CANCELLED: u8 = 130;

/// reposcrape - Repository summary ingestion worker
#[derive(Parser, Debug)]
#[command(name = "reposcrape")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (default: .reposcrape/config.yaml found upward from the current directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log output format (logs go to stderr)
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Summarize this worker's partition of the catalog
    Run {
        /// Total number of partitions (workers)
        #[arg(long, alias = "batch-size", default_value_t = 1)]
        partitions: usize,

        /// This worker's partition, 0-based
        #[arg(long, alias = "offset", default_value_t = 0)]
        partition_index: usize,

        /// How entries are assigned to partitions
        #[arg(long, value_enum, default_value_t = StrategyArg::Position)]
        partition_strategy: StrategyArg,

        /// Process at most this many assigned entries
        #[arg(long)]
        limit: Option<usize>,

        /// Check cache and generate summaries, but never upload
        #[arg(long)]
        dry_run: bool,

        /// Also write the run report to this file
        #[arg(long)]
        report: Option<PathBuf>,

        /// Object store backend (overrides config)
        #[arg(long, value_enum)]
        store: Option<StoreArg>,

        /// Catalog feed URL or file path (overrides config)
        #[arg(long)]
        feed: Option<String>,

        /// Object key prefix (overrides config)
        #[arg(long)]
        prefix: Option<String>,
    },

    /// Show the stored metadata for a repository
    Inspect {
        /// Repository identifier (org/name)
        identifier: String,

        /// Print the stored summary text as well
        #[arg(long)]
        content: bool,

        /// Object store backend (overrides config)
        #[arg(long, value_enum)]
        store: Option<StoreArg>,
    },

    /// Show resolved configuration (debug)
    Config,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Partition strategy for CLI (maps to PartitionStrategy)
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    Position,
    Hash,
}

impl From<StrategyArg> for PartitionStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Position => PartitionStrategy::Position,
            StrategyArg::Hash => PartitionStrategy::Hash,
        }
    }
}

/// Store backend for CLI (maps to StoreBackend)
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreArg {
    Fs,
    Gcs,
}

impl From<StoreArg> for StoreBackend {
    fn from(arg: StoreArg) -> Self {
        match arg {
            StoreArg::Fs => StoreBackend::Fs,
            StoreArg::Gcs => StoreBackend::Gcs,
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<ExitCode> {
        let config_path = self.config.as_deref();

        match self.command {
            Commands::Run {
                partitions,
                partition_index,
                partition_strategy,
                limit,
                dry_run,
                report,
                store,
                feed,
                prefix,
            } => {
                let cfg = config::load_config(config_path)?;
                let partition = PartitionSpec::new(partitions, partition_index)
                    .context("Invalid partition assignment")?
                    .with_strategy(partition_strategy.into());

                let options = RunOptions {
                    partition,
                    limit,
                    dry_run,
                    progress_interval: cfg.progress_interval,
                    key_prefix: prefix.unwrap_or_else(|| cfg.store.prefix.clone()),
                };
                let backend = store.map(Into::into).unwrap_or(cfg.store.backend);
                let feed = feed.unwrap_or_else(|| cfg.feed_url.clone());

                run_worker(&cfg, backend, &feed, &options, report.as_deref()).await
            }
            Commands::Inspect {
                identifier,
                content,
                store,
            } => {
                let cfg = config::load_config(config_path)?;
                let backend = store.map(Into::into).unwrap_or(cfg.store.backend);
                inspect(&cfg, backend, &identifier, content).await?;
                Ok(ExitCode::SUCCESS)
            }
            Commands::Config => {
                let cfg = config::load_config(config_path)?;
                show_config(&cfg);
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}

/// Build the configured object store
fn build_store(cfg: &ResolvedConfig, backend: StoreBackend) -> Result<Arc<dyn ObjectStore>> {
    let store: Arc<dyn ObjectStore> = match backend {
        StoreBackend::Fs => Arc::new(FsStore::new(&cfg.store.root)),
        StoreBackend::Gcs => Arc::new(
            GcsStore::new(
                &cfg.store.endpoint,
                cfg.store.bucket.clone(),
                cfg.store.token.clone(),
            )
            .context("Failed to create Cloud Storage client")?,
        ),
    };
    Ok(store)
}

/// Build the configured summarizer
fn build_summarizer(cfg: &ResolvedConfig) -> Result<Arc<dyn Summarizer>> {
    let summarizer: Arc<dyn Summarizer> = match cfg.summarizer.kind {
        SummarizerKind::Gitingest => {
            Arc::new(GitingestAdapter::with_binary_path(&cfg.summarizer.binary))
        }
        SummarizerKind::Http => {
            let endpoint = cfg
                .summarizer
                .endpoint
                .as_deref()
                .context("No summarizer endpoint configured")?;
            Arc::new(HttpSummarizer::new(endpoint))
        }
    };
    Ok(summarizer)
}

/// Run one worker and emit its report
async fn run_worker(
    cfg: &ResolvedConfig,
    backend: StoreBackend,
    feed: &str,
    options: &RunOptions,
    report_path: Option<&Path>,
) -> Result<ExitCode> {
    let store = build_store(cfg, backend)?;
    let summarizer = build_summarizer(cfg)?;

    // Generation runs in dry-run too, so the backend must be usable either way
    summarizer
        .health_check()
        .await
        .with_context(|| format!("Summarizer '{}' is not usable", summarizer.name()))?;

    let fetcher = CatalogFetcher::new(source_for(feed), cfg.light_retry.clone());
    let generator = SummaryGenerator::new(
        summarizer,
        cfg.summarizer.limits,
        cfg.light_retry.clone(),
    );
    let orchestrator = Orchestrator::new(fetcher, store, generator)
        .with_cache_retry(cfg.light_retry.clone())
        .with_upload_retry(cfg.upload_retry.clone());

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    let report = orchestrator.run(options, cancel).await?;
    emit_report(&report, report_path)?;

    if report.cancelled {
        Ok(ExitCode::from(EXIT_CANCELLED))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Print the report as one JSON line on stdout, and optionally to a file
fn emit_report(report: &RunReport, path: Option<&Path>) -> Result<()> {
    let line = serde_json::to_string(report).context("Failed to serialize run report")?;
    println!("{}", line);

    if let Some(path) = path {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let pretty =
            serde_json::to_string_pretty(report).context("Failed to serialize run report")?;
        std::fs::write(path, pretty)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
        info!(path = %path.display(), "Report written");
    }

    Ok(())
}

/// Cancel `token` on Ctrl-C or (on Unix) SIGTERM
fn spawn_signal_handler(token: CancellationToken) {
    tokio::spawn(async move {
        wait_for_stop_signal().await;
        warn!("Stop signal received, finishing the current entry");
        token.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_stop_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                Ok(()) = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            warn!(error = %e, "Cannot listen for SIGTERM, only Ctrl-C will stop the run");
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_stop_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Show what the store holds for one repository
async fn inspect(
    cfg: &ResolvedConfig,
    backend: StoreBackend,
    identifier: &str,
    with_content: bool,
) -> Result<()> {
    let id: RepoId = identifier
        .parse()
        .with_context(|| format!("Invalid repository identifier: {}", identifier))?;
    let store = build_store(cfg, backend)?;
    let key = object_key(&cfg.store.prefix, &id);

    let (metadata, content) = if with_content {
        match store.read_object(&key).await? {
            Some((metadata, content)) => (metadata, Some(content)),
            None => anyhow::bail!("No stored summary for {} (key '{}')", id, key),
        }
    } else {
        match store.read_metadata(&key).await? {
            Some(metadata) => (metadata, None),
            None => anyhow::bail!("No stored summary for {} (key '{}')", id, key),
        }
    };

    println!("Repository:     {}", id);
    println!("Store:          {} (key '{}')", store.name(), key);
    println!("Source:         {}", metadata.source_location);
    println!("Last modified:  {}", metadata.last_modified_at);
    println!("Processed at:   {}", metadata.processed_at);
    for (k, v) in &metadata.extra {
        println!("  {}: {}", k, v);
    }

    if let Some(content) = content {
        println!();
        println!("{}", content);
    }

    Ok(())
}

/// Show resolved configuration
fn show_config(cfg: &ResolvedConfig) {
    println!("reposcrape configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!("Feed:        {}", cfg.feed_url);
    println!();
    println!("Store:");
    println!("  Backend:  {:?}", cfg.store.backend);
    println!("  Root:     {}", cfg.store.root.display());
    println!("  Bucket:   {}", cfg.store.bucket);
    println!("  Endpoint: {}", cfg.store.endpoint);
    println!(
        "  Prefix:   {}",
        if cfg.store.prefix.is_empty() {
            "(none)"
        } else {
            cfg.store.prefix.as_str()
        }
    );
    println!(
        "  Token:    {}",
        if cfg.store.token.is_some() { "(set)" } else { "(not set)" }
    );
    println!();
    println!("Summarizer:");
    println!("  Kind:     {:?}", cfg.summarizer.kind);
    println!("  Binary:   {}", cfg.summarizer.binary);
    if let Some(endpoint) = &cfg.summarizer.endpoint {
        println!("  Endpoint: {}", endpoint);
    }
    println!("  Timeout:  {}s", cfg.summarizer.limits.timeout_seconds);
    println!("  Max size: {} bytes", cfg.summarizer.limits.max_bytes);
    println!();
    println!("Retry:");
    println!(
        "  Light:    {} attempts, delays {:?} ms",
        cfg.light_retry.max_attempts, cfg.light_retry.delays_ms
    );
    println!(
        "  Upload:   {} attempts, delays {:?} ms",
        cfg.upload_retry.max_attempts, cfg.upload_retry.delays_ms
    );
    println!();
    println!("Progress interval: {} entries", cfg.progress_interval);
}
