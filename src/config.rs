//! Configuration for reposcrape.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (REPOSCRAPE_FEED_URL, REPOSCRAPE_STORE_ROOT,
//!    GCS_BUCKET_NAME, GCS_ACCESS_TOKEN, GITINGEST_BIN, REPOSCRAPE_SUMMARIZER_URL)
//! 2. Config file (.reposcrape/config.yaml, or `--config <path>`)
//! 3. Defaults
//!
//! Config file discovery:
//! - Searches current directory and parents for .reposcrape/config.yaml
//! - Relative paths in the file (`store.root`, a file-path `feed_url`) are
//!   resolved against the project root (the directory holding .reposcrape/)
//!
//! Command-line flags override the resolved values for a single run.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::{RetryPolicy, SummaryLimits, DEFAULT_PROGRESS_INTERVAL};

/// Published feed of public-sector repositories
pub const DEFAULT_FEED_URL: &str =
    "https://uk-x-gov-software-community.github.io/xgov-opensource-repo-scraper/repos.json";

/// Bucket used when none is configured
pub const DEFAULT_BUCKET: &str = "govreposcrape-summaries";

/// Environment variable holding the bucket bearer token unless overridden
pub const DEFAULT_TOKEN_ENV: &str = "GCS_ACCESS_TOKEN";

const CONFIG_DIR: &str = ".reposcrape";
const CONFIG_FILE: &str = "config.yaml";

/// Object store backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Local directory
    #[default]
    Fs,

    /// Google Cloud Storage bucket
    Gcs,
}

/// Summarization backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummarizerKind {
    /// `gitingest` CLI subprocess
    #[default]
    Gitingest,

    /// Remote ingest service
    Http,
}

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    pub feed_url: Option<String>,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub summarizer: SummarizerConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    pub progress_interval: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    pub backend: Option<StoreBackend>,
    /// Store directory for the fs backend (relative to project root)
    pub root: Option<String>,
    pub bucket: Option<String>,
    /// Prepended to every object key, e.g. `summaries/`
    pub prefix: Option<String>,
    /// JSON API endpoint override (emulators, private endpoints)
    pub endpoint: Option<String>,
    /// Name of the environment variable holding the bearer token
    pub token_env: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SummarizerConfig {
    pub kind: Option<SummarizerKind>,
    pub binary: Option<String>,
    pub endpoint: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub max_bytes: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RetryConfig {
    /// Catalog fetch, metadata lookups and summarization
    pub light: Option<RetryPolicy>,
    /// Object uploads
    pub upload: Option<RetryPolicy>,
}

/// Resolved object store settings
#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub root: PathBuf,
    pub bucket: String,
    pub prefix: String,
    pub endpoint: String,
    pub token: Option<String>,
}

/// Resolved summarizer settings
#[derive(Debug, Clone)]
pub struct SummarizerSettings {
    pub kind: SummarizerKind,
    pub binary: String,
    pub endpoint: Option<String>,
    pub limits: SummaryLimits,
}

/// Fully resolved configuration
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub feed_url: String,
    pub store: StoreSettings,
    pub summarizer: SummarizerSettings,
    pub light_retry: RetryPolicy,
    pub upload_retry: RetryPolicy,
    pub progress_interval: usize,
}

/// Find config file by searching `start` and its parents
pub fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_DIR).join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
pub fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to `base`
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// A feed given as a local path follows the same rule as `store.root`
fn resolve_feed(base: &Path, feed: String) -> String {
    if feed.starts_with("http://") || feed.starts_with("https://") {
        return feed;
    }
    let path = feed.strip_prefix("file://").unwrap_or(&feed);
    resolve_path(base, path).display().to_string()
}

/// Project root for a config file: the parent of `.reposcrape/`
fn project_root(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .and_then(|p| p.parent())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Merge a parsed config file (if any) with environment lookups and defaults
pub fn resolve<F>(file: Option<(PathBuf, ConfigFile)>, env: F) -> Result<ResolvedConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let (config_file, file) = match file {
        Some((path, file)) => (Some(path), file),
        None => (None, ConfigFile::default()),
    };
    let base_dir = config_file.as_deref().map(project_root);

    let feed_url = match (env("REPOSCRAPE_FEED_URL"), file.feed_url, &base_dir) {
        (Some(feed), _, _) => feed,
        (None, Some(feed), Some(base)) => resolve_feed(base, feed),
        (None, Some(feed), None) => feed,
        (None, None, _) => DEFAULT_FEED_URL.to_string(),
    };

    let root = match (env("REPOSCRAPE_STORE_ROOT"), &file.store.root, &base_dir) {
        (Some(root), _, _) => PathBuf::from(root),
        (None, Some(root), Some(base)) => resolve_path(base, root),
        (None, Some(root), None) => PathBuf::from(root),
        (None, None, _) => dirs::home_dir()
            .context("Failed to determine home directory")?
            .join(CONFIG_DIR)
            .join("store"),
    };

    let token_env = file
        .store
        .token_env
        .clone()
        .unwrap_or_else(|| DEFAULT_TOKEN_ENV.to_string());

    let store = StoreSettings {
        backend: file.store.backend.unwrap_or_default(),
        root,
        bucket: env("GCS_BUCKET_NAME")
            .or(file.store.bucket)
            .unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
        prefix: file.store.prefix.unwrap_or_default(),
        endpoint: file
            .store
            .endpoint
            .unwrap_or_else(|| crate::storage::gcs::DEFAULT_ENDPOINT.to_string()),
        token: env(&token_env).filter(|t| !t.is_empty()),
    };

    // An endpoint from the environment selects the HTTP summarizer
    let env_endpoint = env("REPOSCRAPE_SUMMARIZER_URL");
    let kind = match (&env_endpoint, file.summarizer.kind) {
        (Some(_), _) => SummarizerKind::Http,
        (None, kind) => kind.unwrap_or_default(),
    };
    let endpoint = env_endpoint.or(file.summarizer.endpoint);
    if kind == SummarizerKind::Http && endpoint.is_none() {
        anyhow::bail!("summarizer.endpoint is required when summarizer.kind is 'http'");
    }

    let defaults = SummaryLimits::default();
    if file.summarizer.timeout_seconds == Some(0) {
        anyhow::bail!("summarizer.timeout_seconds must be greater than 0");
    }
    if file.summarizer.max_bytes == Some(0) {
        anyhow::bail!("summarizer.max_bytes must be greater than 0");
    }
    let summarizer = SummarizerSettings {
        kind,
        binary: env("GITINGEST_BIN")
            .or(file.summarizer.binary)
            .unwrap_or_else(|| crate::adapters::gitingest::DEFAULT_BINARY.to_string()),
        endpoint,
        limits: SummaryLimits {
            timeout_seconds: file
                .summarizer
                .timeout_seconds
                .unwrap_or(defaults.timeout_seconds),
            max_bytes: file.summarizer.max_bytes.unwrap_or(defaults.max_bytes),
        },
    };

    let light_retry = file.retry.light.unwrap_or_else(RetryPolicy::light);
    let upload_retry = file.retry.upload.unwrap_or_else(RetryPolicy::upload);
    for (name, policy) in [("light", &light_retry), ("upload", &upload_retry)] {
        policy
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid retry.{} policy: {}", name, e))?;
    }

    Ok(ResolvedConfig {
        config_file,
        feed_url,
        store,
        summarizer,
        light_retry,
        upload_retry,
        progress_interval: file.progress_interval.unwrap_or(DEFAULT_PROGRESS_INTERVAL),
    })
}

/// Load configuration from all sources.
///
/// An explicit path must exist; otherwise the file is discovered from the
/// current directory upward and is optional.
pub fn load_config(explicit: Option<&Path>) -> Result<ResolvedConfig> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let cwd = std::env::current_dir().context("Failed to read current directory")?;
            find_config_file(&cwd)
        }
    };

    let file = match path {
        Some(path) => {
            let parsed = load_config_file(&path)?;
            Some((path, parsed))
        }
        None => None,
    };

    resolve(file, |key| std::env::var(key).ok())
}
