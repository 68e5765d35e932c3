//! Catalog entries: the validated, typed form of one repository record.
//!
//! Records arrive from the feed as loosely-shaped JSON; they are converted
//! here into [`CatalogEntry`] values or rejected with a [`MalformedEntry`]
//! reason. Nothing past the fetch boundary sees the raw shape.

use std::fmt;
use std::str::FromStr;

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Repository identifier (`organization/name`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepoId {
    /// Owning organization or user
    pub org: String,

    /// Repository name within the organization
    pub name: String,
}

impl RepoId {
    /// Create an identifier, trimming surrounding whitespace
    pub fn new(org: impl Into<String>, name: impl Into<String>) -> Result<Self, MalformedEntry> {
        let org = org.into().trim().to_string();
        let name = name.into().trim().to_string();

        if org.is_empty() || name.is_empty() {
            return Err(MalformedEntry::MissingIdentifier);
        }
        if org.contains('/') || name.contains('/') || org == ".." || name == ".." {
            return Err(MalformedEntry::InvalidIdentifier(format!("{}/{}", org, name)));
        }

        Ok(Self { org, name })
    }

    /// Derive an identifier from the last two path segments of a repository URL
    ///
    /// `https://github.com/alphagov/govuk-frontend.git` → `alphagov/govuk-frontend`
    pub fn from_url(url: &str) -> Result<Self, MalformedEntry> {
        let parsed = reqwest::Url::parse(url.trim())
            .map_err(|_| MalformedEntry::InvalidLocation(url.to_string()))?;

        let segments: Vec<&str> = parsed
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();

        match segments.as_slice() {
            [.., org, name] => {
                let name = name.strip_suffix(".git").unwrap_or(name);
                Self::new(*org, name)
            }
            _ => Err(MalformedEntry::MissingIdentifier),
        }
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.org, self.name)
    }
}

impl FromStr for RepoId {
    type Err = MalformedEntry;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once('/') {
            Some((org, name)) => Self::new(org, name),
            None => Err(MalformedEntry::InvalidIdentifier(s.to_string())),
        }
    }
}

impl Serialize for RepoId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RepoId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One repository from the catalog feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    /// `org/name` identifier, also the basis of the storage key
    pub id: RepoId,

    /// Where the summarizer fetches the repository from
    pub source_location: String,

    /// Last-modified timestamp exactly as the feed reported it
    pub last_modified_at: String,
}

impl CatalogEntry {
    /// Build a validated entry.
    ///
    /// The timestamp must parse as RFC 3339 / ISO-8601 but is kept verbatim:
    /// cache decisions compare the feed's own string.
    pub fn new(
        id: RepoId,
        source_location: impl Into<String>,
        last_modified_at: impl Into<String>,
    ) -> Result<Self, MalformedEntry> {
        let source_location = source_location.into().trim().to_string();
        let last_modified_at = last_modified_at.into().trim().to_string();

        if source_location.is_empty() {
            return Err(MalformedEntry::MissingLocation);
        }
        if last_modified_at.is_empty() {
            return Err(MalformedEntry::MissingTimestamp);
        }
        if DateTime::parse_from_rfc3339(&last_modified_at).is_err() {
            return Err(MalformedEntry::InvalidTimestamp(last_modified_at));
        }

        Ok(Self {
            id,
            source_location,
            last_modified_at,
        })
    }
}

/// Why a feed record was dropped
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedEntry {
    #[error("record has no organization/name identifier")]
    MissingIdentifier,

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("record has no source location")]
    MissingLocation,

    #[error("invalid source location: {0}")]
    InvalidLocation(String),

    #[error("record has no last-modified timestamp")]
    MissingTimestamp,

    #[error("unparseable last-modified timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("record is not an object of the expected shape: {0}")]
    Shape(String),
}
