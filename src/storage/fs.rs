//! Local-directory object store.
//!
//! Each object is one file: the first line holds the JSON metadata, the rest
//! is the summary text. Writes go to a temporary file in the destination
//! directory and are renamed into place, so readers see either the old object
//! or the new one, never a mix.

use std::io::Write;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, File};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use super::{ObjectMetadata, ObjectStore, StorageError};

const OBJECT_EXTENSION: &str = "obj";

/// Filesystem-backed object store
#[derive(Debug, Clone)]
pub struct FsStore {
    /// Directory holding all objects
    root: PathBuf,
}

impl FsStore {
    /// Create a store rooted at `root` (created on first write)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map a key onto a path under the root, rejecting traversal
    fn object_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let valid = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));

        if !valid {
            return Err(StorageError::Rejected {
                key: key.to_string(),
                message: "key must be a relative path without '.' or '..' segments".to_string(),
            });
        }

        let mut path = self.root.join(relative);
        let file_name = format!(
            "{}.{}",
            path.file_name().unwrap_or_default().to_string_lossy(),
            OBJECT_EXTENSION
        );
        path.set_file_name(file_name);
        Ok(path)
    }

    fn corrupt(key: &str, message: impl ToString) -> StorageError {
        StorageError::Corrupt {
            key: key.to_string(),
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for FsStore {
    fn name(&self) -> &str {
        "fs"
    }

    async fn read_metadata(&self, key: &str) -> Result<Option<ObjectMetadata>, StorageError> {
        let path = self.object_path(key)?;

        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        // Only the header line is read; content stays on disk
        let mut header = String::new();
        BufReader::new(file).read_line(&mut header).await?;

        let metadata = serde_json::from_str(header.trim_end())
            .map_err(|e| Self::corrupt(key, e))?;
        Ok(Some(metadata))
    }

    async fn write_object(
        &self,
        key: &str,
        content: &str,
        metadata: &ObjectMetadata,
    ) -> Result<(), StorageError> {
        let path = self.object_path(key)?;
        let header = serde_json::to_string(metadata).map_err(|e| StorageError::Rejected {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        let content = content.to_string();

        let parent = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        fs::create_dir_all(&parent).await?;

        let target = path.clone();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
            tmp.write_all(header.as_bytes())?;
            tmp.write_all(b"\n")?;
            tmp.write_all(content.as_bytes())?;
            tmp.as_file().sync_all()?;
            tmp.persist(&target).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| StorageError::Unavailable(format!("write task failed: {}", e)))??;

        debug!(key, path = %path.display(), "Object written");
        Ok(())
    }

    async fn read_object(
        &self,
        key: &str,
    ) -> Result<Option<(ObjectMetadata, String)>, StorageError> {
        let path = self.object_path(key)?;

        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let (header, content) = raw
            .split_once('\n')
            .ok_or_else(|| Self::corrupt(key, "missing metadata header"))?;
        let metadata = serde_json::from_str(header).map_err(|e| Self::corrupt(key, e))?;

        Ok(Some((metadata, content.to_string())))
    }
}
