//! Core data types for the knowledge base state.

use crate::provenance::ProvenanceSource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Policy classification of a path.
///
/// Governs whether automation may rewrite content under it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    /// Ingestion zone; new notes wait here for the organizer.
    Inbox,
    /// Processed notes kept under the ingestion zone.
    Archive,
    /// Durable knowledge. Never rewritten by automation.
    Atlas,
    /// Derived indexes; safe to regenerate.
    Meta,
    /// Anything outside the configured zone roots.
    Root,
}

impl Zone {
    /// Every zone, in reporting order.
    pub const ALL: [Zone; 5] = [Zone::Inbox, Zone::Archive, Zone::Atlas, Zone::Meta, Zone::Root];

    /// Returns the stored tag for this zone.
    pub fn as_str(&self) -> &'static str {
        match self {
            Zone::Inbox => "inbox",
            Zone::Archive => "archive",
            Zone::Atlas => "atlas",
            Zone::Meta => "meta",
            Zone::Root => "root",
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Zone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inbox" => Ok(Zone::Inbox),
            "archive" => Ok(Zone::Archive),
            "atlas" => Ok(Zone::Atlas),
            "meta" => Ok(Zone::Meta),
            "root" => Ok(Zone::Root),
            other => Err(format!("unknown zone: {}", other)),
        }
    }
}

/// Per-zone counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneCounts {
    pub inbox: usize,
    pub archive: usize,
    pub atlas: usize,
    pub meta: usize,
    pub root: usize,
}

impl ZoneCounts {
    /// Counts one occurrence per zone in the iterator.
    pub fn tally(zones: impl IntoIterator<Item = Zone>) -> Self {
        let mut counts = Self::default();
        for zone in zones {
            counts.add(zone, 1);
        }
        counts
    }

    /// Adds `n` to the counter for `zone`.
    pub fn add(&mut self, zone: Zone, n: usize) {
        *self.slot(zone) += n;
    }

    /// Returns the counter for `zone`.
    pub fn get(&self, zone: Zone) -> usize {
        match zone {
            Zone::Inbox => self.inbox,
            Zone::Archive => self.archive,
            Zone::Atlas => self.atlas,
            Zone::Meta => self.meta,
            Zone::Root => self.root,
        }
    }

    /// Sum over all zones.
    pub fn total(&self) -> usize {
        Zone::ALL.iter().map(|z| self.get(*z)).sum()
    }

    fn slot(&mut self, zone: Zone) -> &mut usize {
        match zone {
            Zone::Inbox => &mut self.inbox,
            Zone::Archive => &mut self.archive,
            Zone::Atlas => &mut self.atlas,
            Zone::Meta => &mut self.meta,
            Zone::Root => &mut self.root,
        }
    }
}

/// Kind of change between two revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
}

impl ChangeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeStatus::Added => "added",
            ChangeStatus::Modified => "modified",
            ChangeStatus::Deleted => "deleted",
            ChangeStatus::Renamed => "renamed",
        }
    }
}

impl fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified change. Transient, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    /// Repo-relative path (the new path for renames).
    pub path: String,
    /// Zone of `path`.
    pub zone: Zone,
    /// What happened to the path.
    pub status: ChangeStatus,
    /// Previous path; set only for renames.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_path: Option<String>,
}

/// The singleton repository pointer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoPointer {
    /// Most recent head observed by any status query.
    pub last_seen_sha: Option<String>,
    /// Most recent commit made by ingestion or snapshot.
    pub last_processed_sha: Option<String>,
    /// Head recorded by the last reconcile run.
    pub last_reconcile_sha: Option<String>,
    /// Fingerprint of the history root.
    pub repo_identity_hash: Option<String>,
    /// Last time any pointer field changed.
    pub updated_at: Option<DateTime<Utc>>,
}

/// A commit made by the organizer or a manual snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedCommit {
    pub id: i64,
    pub sha: String,
    pub branch: String,
    pub processed_at: DateTime<Utc>,
    pub note: Option<String>,
}

/// Metadata about one tracked file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Repo-relative path, `/`-separated.
    pub path: String,
    pub zone: Zone,
    /// BLAKE3 hex digest of the bytes at `checked_at`.
    pub content_hash: String,
    /// Modification time in fractional Unix seconds.
    pub mtime: f64,
    pub size: u64,
    pub checked_at: DateTime<Utc>,
}

/// Immutable record of one reconcile run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileRun {
    pub id: i64,
    pub run_at: DateTime<Utc>,
    /// `None` means the run was a full scan.
    pub from_sha: Option<String>,
    pub to_sha: Option<String>,
    pub files_changed: usize,
    pub changes_by_zone: ZoneCounts,
    /// Recommendations in generation order.
    pub tasks: Vec<String>,
}

/// Append-only attribution of a file mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditProvenance {
    pub id: i64,
    pub path: String,
    pub commit_sha: Option<String>,
    pub source: ProvenanceSource,
    pub recorded_at: DateTime<Utc>,
    pub metadata: Option<serde_json::Value>,
}
