//! Shared fakes for integration tests.
//!
//! In-memory stand-ins for the feed, the object store and the summarizer,
//! with call counters and failure injection.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use reposcrape::adapters::{GenerationError, Summarizer, SummaryPayload};
use reposcrape::core::{
    CatalogError, CatalogFetcher, CatalogSource, Orchestrator, RetryPolicy, SummaryGenerator,
    SummaryLimits,
};
use reposcrape::storage::{ObjectMetadata, ObjectStore, StorageError};

/// One feed record in the published shape
pub fn record(org: &str, name: &str, pushed_at: &str) -> Value {
    json!({
        "url": format!("https://x/{}/{}", org, name),
        "pushedAt": pushed_at,
        "org": org,
        "name": name,
    })
}

/// `count` records named `repo-0..repo-N` under `org`
pub fn records(org: &str, count: usize, pushed_at: &str) -> Vec<Value> {
    (0..count)
        .map(|i| record(org, &format!("repo-{}", i), pushed_at))
        .collect()
}

/// Feed served from memory
pub struct StaticCatalog {
    document: Mutex<String>,
    pub fetches: AtomicUsize,
}

impl StaticCatalog {
    pub fn new(records: Vec<Value>) -> Arc<Self> {
        Arc::new(Self {
            document: Mutex::new(Value::Array(records).to_string()),
            fetches: AtomicUsize::new(0),
        })
    }

    pub fn raw(document: &str) -> Arc<Self> {
        Arc::new(Self {
            document: Mutex::new(document.to_string()),
            fetches: AtomicUsize::new(0),
        })
    }

    /// Replace the published records
    pub fn publish(&self, records: Vec<Value>) {
        *self.document.lock().unwrap() = Value::Array(records).to_string();
    }
}

#[async_trait]
impl CatalogSource for StaticCatalog {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    async fn fetch_document(&self) -> Result<String, CatalogError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.document.lock().unwrap().clone())
    }
}

/// Feed that never answers successfully
pub struct UnreachableCatalog {
    pub fetches: AtomicUsize,
}

impl UnreachableCatalog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            fetches: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl CatalogSource for UnreachableCatalog {
    fn describe(&self) -> String {
        "unreachable".to_string()
    }

    async fn fetch_document(&self) -> Result<String, CatalogError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Err(CatalogError::Status {
            status: 503,
            url: "https://feed.invalid/repos.json".to_string(),
        })
    }
}

/// Object store kept in a map
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, (ObjectMetadata, String)>>,
    pub writes: AtomicUsize,
    pub lookups: AtomicUsize,
    /// Keys whose writes are always refused
    pub refuse_writes: Mutex<HashSet<String>>,
    /// Fail every metadata lookup as unavailable
    pub lookups_down: Mutex<bool>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn get(&self, key: &str) -> Option<(ObjectMetadata, String)> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn read_metadata(&self, key: &str) -> Result<Option<ObjectMetadata>, StorageError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if *self.lookups_down.lock().unwrap() {
            return Err(StorageError::Unavailable("lookup refused".to_string()));
        }
        Ok(self.get(key).map(|(metadata, _)| metadata))
    }

    async fn write_object(
        &self,
        key: &str,
        content: &str,
        metadata: &ObjectMetadata,
    ) -> Result<(), StorageError> {
        if self.refuse_writes.lock().unwrap().contains(key) {
            return Err(StorageError::Unavailable(format!("write to {} refused", key)));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (metadata.clone(), content.to_string()));
        Ok(())
    }

    async fn read_object(
        &self,
        key: &str,
    ) -> Result<Option<(ObjectMetadata, String)>, StorageError> {
        Ok(self.get(key))
    }
}

/// Summarizer answering from a script
#[derive(Default)]
pub struct ScriptedSummarizer {
    pub calls: AtomicUsize,
    /// Locations that always fail
    pub failing: HashSet<String>,
    /// Bytes of filler appended to every summary
    pub padding: usize,
    /// Time spent per call
    pub delay: Option<Duration>,
}

impl ScriptedSummarizer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_on(location: &str) -> Arc<Self> {
        Arc::new(Self {
            failing: [location.to_string()].into_iter().collect(),
            ..Default::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Summarizer for ScriptedSummarizer {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn summarize(
        &self,
        location: &str,
        _max_bytes: usize,
    ) -> Result<SummaryPayload, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.contains(location) {
            return Err(GenerationError::Failed(format!("cannot clone {}", location)));
        }

        Ok(SummaryPayload::Structured {
            summary: format!("Repository: {}", location),
            tree: Some("src/\n  main.rs".to_string()),
            content: Some("x".repeat(self.padding)).filter(|c| !c.is_empty()),
        })
    }

    async fn health_check(&self) -> Result<(), GenerationError> {
        Ok(())
    }
}

/// Orchestrator wired to fakes with single-attempt retries
pub fn orchestrator(
    catalog: Arc<dyn CatalogSource>,
    store: Arc<dyn ObjectStore>,
    summarizer: Arc<dyn Summarizer>,
) -> Orchestrator {
    orchestrator_with(catalog, store, summarizer, RetryPolicy::none(), SummaryLimits::default())
}

pub fn orchestrator_with(
    catalog: Arc<dyn CatalogSource>,
    store: Arc<dyn ObjectStore>,
    summarizer: Arc<dyn Summarizer>,
    retry: RetryPolicy,
    limits: SummaryLimits,
) -> Orchestrator {
    let fetcher = CatalogFetcher::new(catalog, retry.clone());
    let generator = SummaryGenerator::new(summarizer, limits, retry.clone());
    Orchestrator::new(fetcher, store, generator)
        .with_cache_retry(retry.clone())
        .with_upload_retry(retry)
}
