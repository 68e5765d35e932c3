//! Summary Generation Integration Tests
//!
//! Timeout, retry, normalization and size bounding around a summarizer.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reposcrape::adapters::{GenerationError, Summarizer, SummaryPayload};
use reposcrape::core::{RetryPolicy, SummaryGenerator, SummaryLimits};
use reposcrape::domain::{CatalogEntry, RepoId};

fn entry() -> CatalogEntry {
    CatalogEntry::new(
        RepoId::new("alphagov", "notify").unwrap(),
        "https://github.com/alphagov/notify",
        "2024-01-01T00:00:00Z",
    )
    .unwrap()
}

/// Returns a fixed payload after `hangs` calls that never finish in time
/// and after handing out the queued `failures` one per call
struct FixedSummarizer {
    payload: SummaryPayload,
    hangs: u32,
    failures: Mutex<VecDeque<GenerationError>>,
    calls: Arc<AtomicU32>,
}

impl FixedSummarizer {
    fn new(payload: SummaryPayload) -> Self {
        Self {
            payload,
            hangs: 0,
            failures: Mutex::new(VecDeque::new()),
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    fn failing_with(self, failures: Vec<GenerationError>) -> Self {
        *self.failures.lock().unwrap() = failures.into();
        self
    }
}

#[async_trait]
impl Summarizer for FixedSummarizer {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn summarize(
        &self,
        _location: &str,
        _max_bytes: usize,
    ) -> Result<SummaryPayload, GenerationError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.hangs {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if let Some(failure) = self.failures.lock().unwrap().pop_front() {
            return Err(failure);
        }
        Ok(self.payload.clone())
    }

    async fn health_check(&self) -> Result<(), GenerationError> {
        Ok(())
    }
}

fn generator(summarizer: FixedSummarizer, limits: SummaryLimits, retry: RetryPolicy) -> SummaryGenerator {
    SummaryGenerator::new(Arc::new(summarizer), limits, retry)
}

#[tokio::test]
async fn test_pair_payload_normalized() {
    let summarizer = FixedSummarizer::new(SummaryPayload::Pair(
        "Repository: alphagov/notify".to_string(),
        "└── README.md".to_string(),
    ));
    let gen = generator(summarizer, SummaryLimits::default(), RetryPolicy::none());

    let artifact = gen.generate(&entry()).await.unwrap();

    assert_eq!(artifact.content, "Repository: alphagov/notify\n\n└── README.md");
    assert_eq!(artifact.size_bytes, artifact.content.len() as u64);
    assert!(!artifact.truncated);
    assert_eq!(artifact.id.to_string(), "alphagov/notify");
}

#[tokio::test]
async fn test_output_never_exceeds_limit() {
    for limit in [64usize, 1000, 1024, 4096, 65536] {
        let summarizer = FixedSummarizer::new(SummaryPayload::Text("ü".repeat(100_000)));
        let limits = SummaryLimits {
            max_bytes: limit,
            ..Default::default()
        };
        let artifact = generator(summarizer, limits, RetryPolicy::none())
            .generate(&entry())
            .await
            .unwrap();

        assert!(artifact.truncated);
        assert!(
            artifact.content.len() <= limit,
            "limit {} produced {} bytes",
            limit,
            artifact.content.len()
        );
    }
}

#[tokio::test]
async fn test_output_at_limit_untouched() {
    let text = "a".repeat(2048);
    let summarizer = FixedSummarizer::new(SummaryPayload::Text(text.clone()));
    let limits = SummaryLimits {
        max_bytes: 2048,
        ..Default::default()
    };

    let artifact = generator(summarizer, limits, RetryPolicy::none())
        .generate(&entry())
        .await
        .unwrap();

    assert_eq!(artifact.content, text);
    assert!(!artifact.truncated);
}

#[tokio::test]
async fn test_empty_output_is_an_error() {
    let summarizer = FixedSummarizer::new(SummaryPayload::Structured {
        summary: "  ".to_string(),
        tree: None,
        content: None,
    });
    let err = generator(summarizer, SummaryLimits::default(), RetryPolicy::none())
        .generate(&entry())
        .await
        .unwrap_err();

    assert!(matches!(err, GenerationError::EmptyOutput));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_without_retry() {
    let mut summarizer = FixedSummarizer::new(SummaryPayload::Text("ok".to_string()));
    summarizer.hangs = 1;
    let limits = SummaryLimits {
        timeout_seconds: 300,
        ..Default::default()
    };

    let started = tokio::time::Instant::now();
    let err = generator(summarizer, limits, RetryPolicy::none())
        .generate(&entry())
        .await
        .unwrap_err();

    assert!(matches!(err, GenerationError::Timeout(d) if d == Duration::from_secs(300)));
    assert!(started.elapsed() >= Duration::from_secs(300));
    assert!(started.elapsed() < Duration::from_secs(301));
}

#[tokio::test(start_paused = true)]
async fn test_hung_repository_bounded_across_retries() {
    let mut summarizer = FixedSummarizer::new(SummaryPayload::Text("never".to_string()));
    summarizer.hangs = u32::MAX;
    let calls = summarizer.calls.clone();

    let started = tokio::time::Instant::now();
    let err = generator(summarizer, SummaryLimits::default(), RetryPolicy::light())
        .generate(&entry())
        .await
        .unwrap_err();

    // One budget for the repository, not one per attempt
    assert!(matches!(err, GenerationError::Timeout(d) if d == Duration::from_secs(300)));
    assert!(started.elapsed() >= Duration::from_secs(300));
    assert!(started.elapsed() < Duration::from_secs(301));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_retried_within_budget() {
    let summarizer = FixedSummarizer::new(SummaryPayload::Text("second time lucky".to_string()))
        .failing_with(vec![GenerationError::UpstreamUnavailable("HTTP 503".to_string())]);
    let calls = summarizer.calls.clone();
    let limits = SummaryLimits {
        timeout_seconds: 5,
        ..Default::default()
    };

    let artifact = generator(summarizer, limits, RetryPolicy::light())
        .generate(&entry())
        .await
        .unwrap();

    assert_eq!(artifact.content, "second time lucky");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_request_not_retried() {
    let summarizer = FixedSummarizer::new(SummaryPayload::Text("unused".to_string()))
        .failing_with(vec![
            GenerationError::Rejected("HTTP 400: invalid repository url".to_string()),
            GenerationError::Rejected("HTTP 400: invalid repository url".to_string()),
        ]);
    let calls = summarizer.calls.clone();

    let started = tokio::time::Instant::now();
    let err = generator(summarizer, SummaryLimits::default(), RetryPolicy::light())
        .generate(&entry())
        .await
        .unwrap_err();

    assert!(matches!(err, GenerationError::Rejected(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(started.elapsed(), Duration::ZERO);
}
