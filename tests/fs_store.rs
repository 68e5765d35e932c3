//! Filesystem Store Integration Tests
//!
//! Object layout, metadata-only reads and atomic replacement.

use std::collections::BTreeMap;

use reposcrape::storage::{FsStore, ObjectMetadata, ObjectStore, StorageError};
use tempfile::TempDir;

fn metadata(ts: &str) -> ObjectMetadata {
    ObjectMetadata {
        source_location: "https://github.com/alphagov/notify".to_string(),
        last_modified_at: ts.to_string(),
        processed_at: "2024-06-01T12:00:00Z".to_string(),
        extra: [("org".to_string(), "alphagov".to_string())]
            .into_iter()
            .collect::<BTreeMap<_, _>>(),
    }
}

#[tokio::test]
async fn test_missing_object_reads_as_none() {
    let temp = TempDir::new().unwrap();
    let store = FsStore::new(temp.path());

    assert!(store.read_metadata("alphagov/notify").await.unwrap().is_none());
    assert!(store.read_object("alphagov/notify").await.unwrap().is_none());
}

#[tokio::test]
async fn test_write_then_read() {
    let temp = TempDir::new().unwrap();
    let store = FsStore::new(temp.path().join("nested/root"));
    let content = "Repository: alphagov/notify\n\nDirectory structure:\n└── src/\n";

    store
        .write_object("alphagov/notify", content, &metadata("2024-01-01T00:00:00Z"))
        .await
        .unwrap();

    let read = store.read_metadata("alphagov/notify").await.unwrap().unwrap();
    assert_eq!(read, metadata("2024-01-01T00:00:00Z"));

    let (read, body) = store.read_object("alphagov/notify").await.unwrap().unwrap();
    assert_eq!(read.last_modified_at, "2024-01-01T00:00:00Z");
    assert_eq!(body, content);

    assert!(temp.path().join("nested/root/alphagov/notify.obj").exists());
}

#[tokio::test]
async fn test_rewrite_replaces_whole_object() {
    let temp = TempDir::new().unwrap();
    let store = FsStore::new(temp.path());

    store
        .write_object("a/b", "first version, rather long", &metadata("2024-01-01T00:00:00Z"))
        .await
        .unwrap();
    store
        .write_object("a/b", "second", &metadata("2024-02-01T00:00:00Z"))
        .await
        .unwrap();

    let (read, body) = store.read_object("a/b").await.unwrap().unwrap();
    assert_eq!(read.last_modified_at, "2024-02-01T00:00:00Z");
    assert_eq!(body, "second");

    // No temporary files left behind
    let leftovers: Vec<_> = std::fs::read_dir(temp.path().join("a"))
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(leftovers, vec![std::ffi::OsString::from("b.obj")]);
}

#[tokio::test]
async fn test_prefixed_keys_nest() {
    let temp = TempDir::new().unwrap();
    let store = FsStore::new(temp.path());

    store
        .write_object("summaries/a/b", "x", &metadata("2024-01-01T00:00:00Z"))
        .await
        .unwrap();

    assert!(temp.path().join("summaries/a/b.obj").exists());
    assert!(store.read_metadata("a/b").await.unwrap().is_none());
}

#[tokio::test]
async fn test_traversal_rejected() {
    let temp = TempDir::new().unwrap();
    let store = FsStore::new(temp.path());

    let err = store
        .write_object("../escape", "x", &metadata("2024-01-01T00:00:00Z"))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Rejected { .. }));
}

#[tokio::test]
async fn test_corrupt_header_reported() {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join("a")).unwrap();
    std::fs::write(temp.path().join("a/b.obj"), "not json\ncontent").unwrap();
    let store = FsStore::new(temp.path());

    let err = store.read_metadata("a/b").await.unwrap_err();
    assert!(matches!(err, StorageError::Corrupt { .. }));
}
