//! gitingest adapter.
//!
//! Runs the `gitingest` CLI as a subprocess and reads the digest from stdout.
//! The child is killed if the returned future is dropped, which is how the
//! caller's wall-clock timeout abandons a slow repository.
//!
//! gitingest's `-s` caps each file, not the digest, so stdout is read only up
//! to one byte past the requested size; the rest is drained and discarded.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::debug;

use super::{GenerationError, Summarizer, SummaryPayload};

/// Default binary name
pub const DEFAULT_BINARY: &str = "gitingest";

/// Kept from stderr for error messages
const STDERR_LIMIT: u64 = 64 * 1024;

/// Read at most `limit` bytes, then drain the rest of the stream so the
/// writer never blocks on a full pipe. Returns the kept bytes and how many
/// were dropped.
async fn read_bounded<R>(reader: R, limit: u64) -> std::io::Result<(Vec<u8>, u64)>
where
    R: AsyncRead + Unpin,
{
    let mut kept = Vec::new();
    let mut bounded = reader.take(limit);
    bounded.read_to_end(&mut kept).await?;

    let mut rest = bounded.into_inner();
    let dropped = tokio::io::copy(&mut rest, &mut tokio::io::sink()).await?;
    Ok((kept, dropped))
}

/// gitingest adapter using subprocess mode
pub struct GitingestAdapter {
    /// Path to the gitingest binary
    binary_path: String,
}

impl Default for GitingestAdapter {
    fn default() -> Self {
        Self::with_binary_path(DEFAULT_BINARY)
    }
}

impl GitingestAdapter {
    /// Create an adapter with a custom binary path
    pub fn with_binary_path(binary_path: impl Into<String>) -> Self {
        Self {
            binary_path: binary_path.into(),
        }
    }

    /// Arguments for one summarization
    fn args(location: &str, max_bytes: usize) -> Vec<String> {
        vec![
            location.to_string(),
            "-s".to_string(),
            max_bytes.to_string(),
            "-o".to_string(),
            "-".to_string(),
        ]
    }

    fn spawn_error(&self, e: std::io::Error) -> GenerationError {
        if e.kind() == std::io::ErrorKind::NotFound {
            GenerationError::Misconfigured(format!("'{}' not found on PATH", self.binary_path))
        } else {
            GenerationError::Failed(format!("failed to spawn '{}': {}", self.binary_path, e))
        }
    }
}

#[async_trait]
impl Summarizer for GitingestAdapter {
    fn name(&self) -> &str {
        "gitingest"
    }

    async fn summarize(
        &self,
        location: &str,
        max_bytes: usize,
    ) -> Result<SummaryPayload, GenerationError> {
        let mut child = Command::new(&self.binary_path)
            .args(Self::args(location, max_bytes))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => (stdout, stderr),
            _ => {
                return Err(GenerationError::Failed(
                    "gitingest output was not captured".to_string(),
                ))
            }
        };

        // One byte past the limit is enough for truncation to notice
        let stdout_limit = max_bytes as u64 + 1;
        let ((stdout, dropped), (stderr, _)) = tokio::try_join!(
            read_bounded(stdout, stdout_limit),
            read_bounded(stderr, STDERR_LIMIT)
        )
        .map_err(|e| GenerationError::Failed(format!("failed to read gitingest output: {}", e)))?;
        if dropped > 0 {
            debug!(location, dropped, "Discarded gitingest output past the size limit");
        }

        let status = child
            .wait()
            .await
            .map_err(|e| GenerationError::Failed(format!("failed to wait for gitingest: {}", e)))?;

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr);
            let exit_code = status.code().unwrap_or(-1);
            return Err(GenerationError::Failed(format!(
                "gitingest exited with code {}: {}",
                exit_code,
                stderr.trim()
            )));
        }

        // Repositories can contain arbitrary bytes; keep what we can
        let stdout = String::from_utf8_lossy(&stdout).into_owned();
        if stdout.trim().is_empty() {
            return Err(GenerationError::EmptyOutput);
        }

        Ok(SummaryPayload::Text(stdout))
    }

    async fn health_check(&self) -> Result<(), GenerationError> {
        let output = Command::new(&self.binary_path)
            .arg("--help")
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GenerationError::Misconfigured(format!(
                "gitingest health check failed: {}",
                stderr.trim()
            )));
        }

        Ok(())
    }
}
