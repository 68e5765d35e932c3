//! HTTP ingest-service adapter.
//!
//! POSTs `{input_text, max_file_size}` to a summarization service. The
//! service may answer with a JSON payload in any shape [`SummaryPayload`]
//! accepts, or with plain text.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::debug;

use super::{GenerationError, Summarizer, SummaryPayload};

#[derive(Debug, Serialize)]
struct IngestRequest<'a> {
    input_text: &'a str,
    max_file_size: usize,
}

/// Summarizer backed by a remote ingest service
pub struct HttpSummarizer {
    client: Client,
    endpoint: String,
}

impl HttpSummarizer {
    /// Create an adapter posting to `endpoint`
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

/// Classify a non-success status: 5xx and 429 are transient, anything else
/// is the service refusing this request
fn status_error(status: StatusCode, body: &str) -> GenerationError {
    let message = format!("HTTP {}: {}", status.as_u16(), body.trim());
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        GenerationError::UpstreamUnavailable(message)
    } else {
        GenerationError::Rejected(message)
    }
}

/// Decode a successful response body
fn parse_response(is_json: bool, body: String) -> Result<SummaryPayload, GenerationError> {
    if body.trim().is_empty() {
        return Err(GenerationError::EmptyOutput);
    }
    if !is_json {
        return Ok(SummaryPayload::Text(body));
    }
    serde_json::from_str(&body)
        .map_err(|e| GenerationError::Rejected(format!("unrecognized response payload: {}", e)))
}

#[async_trait]
impl Summarizer for HttpSummarizer {
    fn name(&self) -> &str {
        "http"
    }

    async fn summarize(
        &self,
        location: &str,
        max_bytes: usize,
    ) -> Result<SummaryPayload, GenerationError> {
        let request = IngestRequest {
            input_text: location,
            max_file_size: max_bytes,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerationError::UpstreamUnavailable(e.to_string()))?;

        let status = response.status();
        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("application/json"))
            .unwrap_or(false);
        let body = response
            .text()
            .await
            .map_err(|e| GenerationError::UpstreamUnavailable(e.to_string()))?;

        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        debug!(location, bytes = body.len(), "Ingest service responded");
        parse_response(is_json, body)
    }

    async fn health_check(&self) -> Result<(), GenerationError> {
        // Any HTTP answer proves the service is reachable
        self.client
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|e| GenerationError::UpstreamUnavailable(e.to_string()))?;
        Ok(())
    }
}
