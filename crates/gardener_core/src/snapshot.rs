//! Manual snapshot of uncommitted work.
//!
//! Commits whatever is dirty in the working tree (edits made by hand or by
//! outside tools) and attributes each path to a manual edit.

use crate::error::Result;
use crate::file_state;
use crate::provenance::ProvenanceSource;
use crate::store::StateStore;
use crate::vcs::{StatusEntry, StatusKind, Vcs};
use crate::zone::ZoneMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Commit message used when the caller gives none.
pub const DEFAULT_SNAPSHOT_MESSAGE: &str = "Manual: Snapshot uncommitted changes";

/// Result of a snapshot request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotReport {
    pub committed: bool,
    pub message: String,
    pub files_changed: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
}

impl SnapshotReport {
    fn skipped(message: impl Into<String>) -> Self {
        Self {
            committed: false,
            message: message.into(),
            files_changed: 0,
            commit: None,
        }
    }
}

/// Commits all dirty paths and records manual provenance for each.
///
/// Returns `committed = false` with a reason when there is nothing to do or
/// no repository to commit to. Store exhaustion is returned as an error.
pub fn snapshot(
    store: &StateStore,
    vcs: &dyn Vcs,
    zones: &ZoneMap,
    message: Option<&str>,
) -> Result<SnapshotReport> {
    if !vcs.is_available() {
        return Ok(SnapshotReport::skipped("Version control is not available"));
    }
    if !vcs.is_repository() {
        return Ok(SnapshotReport::skipped("Data directory is not a repository"));
    }

    let entries = vcs.status_entries()?;
    if entries.is_empty() {
        return Ok(SnapshotReport::skipped("No changes to commit"));
    }

    let message = message
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(DEFAULT_SNAPSHOT_MESSAGE);
    let head = match vcs.commit_all(message) {
        Ok(Some(head)) => head,
        Ok(None) => return Ok(SnapshotReport::skipped("No changes to commit")),
        Err(err) => {
            warn!(error = %err, "snapshot commit failed");
            return Ok(SnapshotReport::skipped(format!("Commit failed: {}", err)));
        }
    };

    let branch = vcs.branch().unwrap_or_else(|_| "unknown".to_string());
    store.record_processed_commit(&head, &branch, Some(message))?;

    for entry in &entries {
        if let Err(err) = record_entry(store, zones, &head, entry) {
            if err.is_busy() {
                return Err(err);
            }
            warn!(path = %entry.path, error = %err, "could not update state for snapshot entry");
        }
    }

    info!(sha = %head, files = entries.len(), "snapshot committed");
    Ok(SnapshotReport {
        committed: true,
        message: format!("Committed {} file(s)", entries.len()),
        files_changed: entries.len(),
        commit: Some(head),
    })
}

fn record_entry(store: &StateStore, zones: &ZoneMap, head: &str, entry: &StatusEntry) -> Result<()> {
    let path = Path::new(&entry.path);
    let exists = zones.data_dir().join(path).is_file();
    let source = ProvenanceSource::Manual;

    match entry.kind {
        StatusKind::Deleted => {
            file_state::remove_file_record(store, zones, path)?;
            let metadata = serde_json::json!({ "action": "delete" });
            store.append_provenance(&entry.path, &source, Some(head), Some(&metadata))?;
        }
        StatusKind::Renamed => {
            if let Some(old) = entry.old_path.as_deref() {
                file_state::remove_file_record(store, zones, Path::new(old))?;
            }
            if exists {
                file_state::update_file_record(store, zones, path)?;
            }
            let metadata = serde_json::json!({ "action": "rename", "from": entry.old_path });
            store.append_provenance(&entry.path, &source, Some(head), Some(&metadata))?;
        }
        StatusKind::Copied => {
            if exists {
                file_state::update_file_record(store, zones, path)?;
            }
            let metadata = serde_json::json!({ "action": "copy", "from": entry.old_path });
            store.append_provenance(&entry.path, &source, Some(head), Some(&metadata))?;
        }
        StatusKind::Modified => {
            if exists {
                file_state::update_file_record(store, zones, path)?;
                store.append_provenance(&entry.path, &source, Some(head), None)?;
            }
        }
    }
    Ok(())
}
