//! Google Cloud Storage backend over the JSON API.
//!
//! Content and metadata go up in one `uploadType=multipart` request, so the
//! object becomes visible with both or neither. Metadata reads use the object
//! resource endpoint and never download content.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{ObjectMetadata, ObjectStore, StorageError, CONTENT_TYPE};

/// Public JSON API endpoint
pub const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";

/// Per-request deadline for metadata reads and uploads
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Object resource, only the fields we read
#[derive(Debug, Deserialize)]
struct GcsObject {
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

/// Cloud Storage bucket client
#[derive(Debug, Clone)]
pub struct GcsStore {
    client: Client,
    endpoint: Url,
    bucket: String,
    token: Option<String>,
}

impl GcsStore {
    /// Create a client for `bucket`. Requests carry `token` as a bearer
    /// credential when one is given.
    pub fn new(
        endpoint: &str,
        bucket: impl Into<String>,
        token: Option<String>,
    ) -> Result<Self, StorageError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| StorageError::Unavailable(format!("invalid endpoint '{}': {}", endpoint, e)))?;
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            bucket: bucket.into(),
            token,
        })
    }

    /// `{endpoint}/{prefix...}/b/{bucket}/o[/{key}]` with each segment encoded
    fn url(&self, prefix: &[&str], key: Option<&str>) -> Result<Url, StorageError> {
        let mut url = self.endpoint.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| StorageError::Unavailable("endpoint cannot be a base URL".to_string()))?;
            segments.pop_if_empty();
            segments.extend(prefix);
            segments.extend(["b", self.bucket.as_str(), "o"]);
            if let Some(key) = key {
                // A single segment: '/' inside the key is percent-encoded
                segments.push(key);
            }
        }
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, key: &str, request: RequestBuilder) -> Result<Option<Response>, StorageError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if status.is_success() {
            return Ok(Some(response));
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_status(key, status, &body))
    }
}

/// Map a non-success status onto a transient or terminal error
fn classify_status(key: &str, status: StatusCode, body: &str) -> StorageError {
    let message = format!("HTTP {}: {}", status.as_u16(), body.trim());
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        StorageError::Unavailable(message)
    } else {
        StorageError::Rejected {
            key: key.to_string(),
            message,
        }
    }
}

/// Build a `multipart/related` body: JSON resource first, then content
fn multipart_body(
    boundary: &str,
    key: &str,
    content: &str,
    metadata: &ObjectMetadata,
) -> String {
    let resource = json!({
        "name": key,
        "contentType": CONTENT_TYPE,
        "metadata": metadata.to_custom_metadata(),
    });

    format!(
        "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{resource}\r\n\
         --{b}\r\nContent-Type: {ct}\r\n\r\n{content}\r\n--{b}--\r\n",
        b = boundary,
        resource = resource,
        ct = CONTENT_TYPE,
        content = content,
    )
}

#[async_trait]
impl ObjectStore for GcsStore {
    fn name(&self) -> &str {
        "gcs"
    }

    async fn read_metadata(&self, key: &str) -> Result<Option<ObjectMetadata>, StorageError> {
        let url = self.url(&["storage", "v1"], Some(key))?;

        let Some(response) = self.send(key, self.client.get(url)).await? else {
            return Ok(None);
        };

        let object: GcsObject = response.json().await.map_err(|e| StorageError::Corrupt {
            key: key.to_string(),
            message: e.to_string(),
        })?;

        Ok(Some(ObjectMetadata::from_custom_metadata(object.metadata)))
    }

    async fn write_object(
        &self,
        key: &str,
        content: &str,
        metadata: &ObjectMetadata,
    ) -> Result<(), StorageError> {
        let mut url = self.url(&["upload", "storage", "v1"], None)?;
        url.query_pairs_mut().append_pair("uploadType", "multipart");

        let boundary = format!("reposcrape-{}", uuid::Uuid::new_v4().simple());
        let body = multipart_body(&boundary, key, content, metadata);

        let request = self
            .client
            .post(url)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .body(body);

        match self.send(key, request).await? {
            Some(_) => {
                debug!(bucket = %self.bucket, key, bytes = content.len(), "Object uploaded");
                Ok(())
            }
            // A 404 on upload means the bucket itself is missing
            None => Err(StorageError::Rejected {
                key: key.to_string(),
                message: format!("bucket '{}' not found", self.bucket),
            }),
        }
    }

    async fn read_object(
        &self,
        key: &str,
    ) -> Result<Option<(ObjectMetadata, String)>, StorageError> {
        let Some(metadata) = self.read_metadata(key).await? else {
            return Ok(None);
        };

        let mut url = self.url(&["storage", "v1"], Some(key))?;
        url.query_pairs_mut().append_pair("alt", "media");

        let Some(response) = self.send(key, self.client.get(url)).await? else {
            return Ok(None);
        };
        let content = response
            .text()
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;

        Ok(Some((metadata, content)))
    }
}
