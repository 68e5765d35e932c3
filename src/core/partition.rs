//! Deterministic work partitioning across independent workers.
//!
//! Worker `M` of `N` owns an entry when the entry's selector modulo `N`
//! equals `M`. With the default `position` strategy the selector is the
//! entry's index in the feed; with `hash` it is a stable hash of the
//! `org/name` identifier, which keeps assignments fixed when the feed is
//! reordered. Either way the `N` partitions are pairwise disjoint and
//! together cover the catalog.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::domain::{CatalogEntry, PartitionInfo, RepoId};

/// Partition validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PartitionError {
    #[error("partition count must be at least 1")]
    ZeroPartitions,

    #[error("partition index {index} out of range for {count} partitions")]
    IndexOutOfRange { index: usize, count: usize },
}

/// How entries map to partitions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionStrategy {
    /// Feed position modulo N
    #[default]
    Position,

    /// SHA-256 of the identifier modulo N
    Hash,
}

/// Which slice of the catalog this worker owns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionSpec {
    count: usize,
    index: usize,
    strategy: PartitionStrategy,
}

impl PartitionSpec {
    /// Validate `(count, index)`; requires `count >= 1` and `index < count`
    pub fn new(count: usize, index: usize) -> Result<Self, PartitionError> {
        if count == 0 {
            return Err(PartitionError::ZeroPartitions);
        }
        if index >= count {
            return Err(PartitionError::IndexOutOfRange { index, count });
        }
        Ok(Self {
            count,
            index,
            strategy: PartitionStrategy::default(),
        })
    }

    /// The whole catalog
    pub fn single() -> Self {
        Self {
            count: 1,
            index: 0,
            strategy: PartitionStrategy::default(),
        }
    }

    pub fn with_strategy(mut self, strategy: PartitionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn strategy(&self) -> PartitionStrategy {
        self.strategy
    }

    pub fn info(&self) -> PartitionInfo {
        PartitionInfo {
            count: self.count,
            index: self.index,
        }
    }

    /// Whether the entry at feed `position` with identifier `id` is ours
    pub fn owns(&self, position: usize, id: &RepoId) -> bool {
        let selector = match self.strategy {
            PartitionStrategy::Position => position as u64,
            PartitionStrategy::Hash => stable_hash(&id.to_string()),
        };
        selector % self.count as u64 == self.index as u64
    }

    /// Keep the owned entries, preserving feed order
    pub fn assign(&self, entries: Vec<CatalogEntry>) -> Vec<CatalogEntry> {
        entries
            .into_iter()
            .enumerate()
            .filter(|(position, entry)| self.owns(*position, &entry.id))
            .map(|(_, entry)| entry)
            .collect()
    }
}

/// First 8 bytes of SHA-256, big-endian. Identical on every platform and run.
pub fn stable_hash(value: &str) -> u64 {
    let digest = Sha256::digest(value.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}
