//! Retention for the append-mostly ledgers.

use crate::config::RetentionConfig;
use crate::error::Result;
use crate::store::StateStore;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Configuration for a maintenance pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaintenanceConfig {
    /// Processed commits to keep, newest first.
    pub keep_commits: usize,
    /// Provenance records to keep. `None` keeps everything.
    pub keep_provenance: Option<usize>,
    /// Report what would be removed without removing it.
    pub dry_run: bool,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self::from(&RetentionConfig::default())
    }
}

impl From<&RetentionConfig> for MaintenanceConfig {
    fn from(retention: &RetentionConfig) -> Self {
        Self {
            keep_commits: retention.keep_commits,
            keep_provenance: retention.keep_provenance,
            dry_run: false,
        }
    }
}

/// What a maintenance pass removed (or would remove).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceReport {
    pub dry_run: bool,
    pub commits_pruned: usize,
    pub provenance_pruned: usize,
    /// Paths whose records pointed at files that no longer exist.
    pub stale_files: Vec<String>,
}

impl MaintenanceReport {
    /// Total rows affected.
    pub fn total(&self) -> usize {
        self.commits_pruned + self.provenance_pruned + self.stale_files.len()
    }
}

/// Prunes old commits and provenance and drops stale file records.
pub fn maintain(
    store: &StateStore,
    data_dir: &Path,
    config: &MaintenanceConfig,
) -> Result<MaintenanceReport> {
    let report = if config.dry_run {
        MaintenanceReport {
            dry_run: true,
            commits_pruned: store
                .processed_commit_count()?
                .saturating_sub(config.keep_commits),
            provenance_pruned: match config.keep_provenance {
                Some(keep) => store.provenance_count()?.saturating_sub(keep),
                None => 0,
            },
            stale_files: store.stale_file_records(data_dir)?,
        }
    } else {
        MaintenanceReport {
            dry_run: false,
            commits_pruned: store.prune_processed_commits(config.keep_commits)?,
            provenance_pruned: match config.keep_provenance {
                Some(keep) => store.prune_provenance(keep)?,
                None => 0,
            },
            stale_files: store.remove_stale_file_records(data_dir)?,
        }
    };

    info!(
        dry_run = report.dry_run,
        commits = report.commits_pruned,
        provenance = report.provenance_pruned,
        stale_files = report.stale_files.len(),
        "maintenance finished"
    );
    Ok(report)
}
