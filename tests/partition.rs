//! Partition Integration Tests
//!
//! Coverage and disjointness of partition assignment across workers.

use std::collections::HashMap;

use reposcrape::core::{PartitionSpec, PartitionStrategy};
use reposcrape::domain::{CatalogEntry, RepoId};

fn catalog(size: usize) -> Vec<CatalogEntry> {
    (0..size)
        .map(|i| {
            let id = RepoId::new(format!("org-{}", i % 7), format!("repo-{}", i)).unwrap();
            CatalogEntry::new(id, format!("https://x/{}", i), "2024-01-01T00:00:00Z").unwrap()
        })
        .collect()
}

/// How many workers each entry was assigned to
fn assignment_counts(
    entries: &[CatalogEntry],
    count: usize,
    strategy: PartitionStrategy,
) -> HashMap<RepoId, usize> {
    let mut seen: HashMap<RepoId, usize> = HashMap::new();
    for index in 0..count {
        let spec = PartitionSpec::new(count, index)
            .unwrap()
            .with_strategy(strategy);
        for entry in spec.assign(entries.to_vec()) {
            *seen.entry(entry.id).or_default() += 1;
        }
    }
    seen
}

fn assert_exact_cover(size: usize, count: usize, strategy: PartitionStrategy) {
    let entries = catalog(size);
    let seen = assignment_counts(&entries, count, strategy);

    assert_eq!(
        seen.len(),
        size,
        "K={} N={} {:?}: not every entry was assigned",
        size,
        count,
        strategy
    );
    assert!(
        seen.values().all(|&n| n == 1),
        "K={} N={} {:?}: an entry was assigned twice",
        size,
        count,
        strategy
    );
}

#[test]
fn test_position_partitions_cover_exactly_once() {
    let n = 10;
    for k in [0, 1, n - 1, n, n + 1, 1000] {
        assert_exact_cover(k, n, PartitionStrategy::Position);
    }
}

#[test]
fn test_hash_partitions_cover_exactly_once() {
    let n = 10;
    for k in [0, 1, n - 1, n, n + 1, 1000] {
        assert_exact_cover(k, n, PartitionStrategy::Hash);
    }
}

#[test]
fn test_single_partition_takes_everything() {
    let entries = catalog(50);
    assert_eq!(PartitionSpec::single().assign(entries.clone()), entries);
}

#[test]
fn test_hash_assignment_survives_reordering() {
    let entries = catalog(200);
    let mut reversed = entries.clone();
    reversed.reverse();

    let spec = PartitionSpec::new(8, 5)
        .unwrap()
        .with_strategy(PartitionStrategy::Hash);

    let mut forward: Vec<RepoId> = spec.assign(entries).into_iter().map(|e| e.id).collect();
    let mut backward: Vec<RepoId> = spec.assign(reversed).into_iter().map(|e| e.id).collect();
    forward.sort();
    backward.sort();

    assert_eq!(forward, backward);
}

#[test]
fn test_assignment_preserves_feed_order() {
    let entries = catalog(30);
    let spec = PartitionSpec::new(4, 1).unwrap();

    let assigned: Vec<String> = spec
        .assign(entries)
        .into_iter()
        .map(|e| e.id.name)
        .collect();

    assert_eq!(
        assigned,
        vec!["repo-1", "repo-5", "repo-9", "repo-13", "repo-17", "repo-21", "repo-25", "repo-29"]
    );
}

#[test]
fn test_hash_spreads_load() {
    let entries = catalog(1000);
    let mut sizes = Vec::new();
    for index in 0..4 {
        let spec = PartitionSpec::new(4, index)
            .unwrap()
            .with_strategy(PartitionStrategy::Hash);
        sizes.push(spec.assign(entries.clone()).len());
    }

    // Loose bound; SHA-256 is close to uniform
    assert!(sizes.iter().all(|&s| s > 150 && s < 350), "{:?}", sizes);
}
