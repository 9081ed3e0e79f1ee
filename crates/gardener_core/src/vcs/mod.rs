//! Version-control adapter.
//!
//! The knowledge base relies on an external VCS for history. [`Vcs`] is the
//! narrow contract the rest of the crate uses; [`GitCli`] implements it by
//! running the `git` binary.
//!
//! Read operations return [`VcsError`] instead of panicking or retrying; callers
//! on the reconcile path degrade any error to "unavailable".

mod git;

#[cfg(test)]
pub(crate) mod fake;

pub use git::GitCli;

use crate::types::ChangeStatus;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Failure of a VCS invocation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VcsError {
    /// The binary could not be started.
    #[error("version control unavailable: {0}")]
    Unavailable(String),

    /// The command ran and exited non-zero.
    #[error("`{command}` failed (exit {code:?}): {stderr}")]
    Failed {
        /// Command line that failed
        command: String,
        /// Exit code, if the process exited normally
        code: Option<i32>,
        /// Captured standard error
        stderr: String,
    },

    /// The command exceeded its deadline and was killed.
    #[error("`{command}` timed out after {timeout:?}")]
    TimedOut {
        /// Command line that timed out
        command: String,
        /// Deadline that was exceeded
        timeout: Duration,
    },

    /// Output could not be read.
    #[error("version control I/O error: {0}")]
    Io(String),
}

/// Result type for VCS operations.
pub type VcsResult<T> = std::result::Result<T, VcsError>;

/// One entry of a rename-aware diff, before zone classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawChange {
    pub status: ChangeStatus,
    pub path: String,
    pub old_path: Option<String>,
}

/// Working-tree state of a dirty path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    /// Added, modified or untracked.
    Modified,
    Deleted,
    Renamed,
    Copied,
}

/// One dirty path from a porcelain status listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub kind: StatusKind,
    pub path: String,
    /// Source path for renames and copies.
    pub old_path: Option<String>,
}

/// Contract for the external version-control system.
pub trait Vcs: Send + Sync {
    /// Whether the VCS binary can be executed at all.
    fn is_available(&self) -> bool;

    /// Whether the data directory is itself a repository.
    fn is_repository(&self) -> bool;

    /// Current head commit, or `None` when no commits exist.
    fn head(&self) -> VcsResult<Option<String>>;

    /// Current branch name.
    fn branch(&self) -> VcsResult<String>;

    /// Dirty and untracked paths with rename/copy sources.
    fn status_entries(&self) -> VcsResult<Vec<StatusEntry>>;

    /// Dirty and untracked paths.
    fn dirty_paths(&self) -> VcsResult<Vec<String>> {
        Ok(self
            .status_entries()?
            .into_iter()
            .map(|entry| entry.path)
            .collect())
    }

    /// Rename-aware diff between two revisions.
    fn diff(&self, from: &str, to: &str) -> VcsResult<Vec<RawChange>>;

    /// Every tracked path at head.
    fn tracked_paths(&self) -> VcsResult<Vec<String>>;

    /// Earliest root commit reachable from head.
    fn oldest_ancestor(&self) -> VcsResult<Option<String>>;

    /// Whether `ancestor` is reachable from `descendant`.
    fn is_ancestor(&self, ancestor: &str, descendant: &str) -> VcsResult<bool>;

    /// Creates the repository if it does not exist.
    fn init_repository(&self) -> VcsResult<()>;

    /// Stages `paths` (including deletions) and commits if anything is staged.
    ///
    /// Returns the new head, or `None` when there was nothing to commit.
    fn commit_paths(&self, paths: &[String], message: &str) -> VcsResult<Option<String>>;

    /// Stages everything and commits if anything is staged.
    fn commit_all(&self, message: &str) -> VcsResult<Option<String>>;
}

/// Parses `diff --name-status -z -M` output.
///
/// Fields are NUL-separated and paths are never quoted. `A`/`M`/`D`/`T`
/// codes carry one path; `R<score>` pairs the old and new path into a single
/// rename; `C<score>` reports the copy target as added. Other codes are
/// skipped along with their path.
pub fn parse_name_status(output: &str) -> Vec<RawChange> {
    let mut changes = Vec::new();
    let mut fields = output.split('\0').filter(|f| !f.is_empty());
    while let Some(code) = fields.next() {
        let Some(first) = fields.next() else {
            break;
        };
        let change = match code.chars().next() {
            Some('A') => RawChange {
                status: ChangeStatus::Added,
                path: first.to_string(),
                old_path: None,
            },
            Some('M') | Some('T') => RawChange {
                status: ChangeStatus::Modified,
                path: first.to_string(),
                old_path: None,
            },
            Some('D') => RawChange {
                status: ChangeStatus::Deleted,
                path: first.to_string(),
                old_path: None,
            },
            Some('R') => match fields.next() {
                Some(new_path) => RawChange {
                    status: ChangeStatus::Renamed,
                    path: new_path.to_string(),
                    old_path: Some(first.to_string()),
                },
                None => break,
            },
            Some('C') => match fields.next() {
                Some(new_path) => RawChange {
                    status: ChangeStatus::Added,
                    path: new_path.to_string(),
                    old_path: None,
                },
                None => break,
            },
            _ => continue,
        };
        changes.push(change);
    }
    changes
}

/// Splits NUL-terminated path lists such as `ls-files -z`.
pub(crate) fn split_nul(output: &str) -> Vec<String> {
    output
        .split('\0')
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses `status --porcelain -z` output.
///
/// Entries are NUL-separated `XY path`; renames and copies are followed by an
/// extra entry holding the source path.
pub fn parse_status_z(output: &str) -> Vec<StatusEntry> {
    let mut entries = Vec::new();
    let mut parts = output.split('\0');
    while let Some(entry) = parts.next() {
        if entry.len() < 4 {
            continue;
        }
        let (xy, path) = entry.split_at(3);
        let mut flags = xy.chars().take(2);
        let (x, y) = (flags.next().unwrap_or(' '), flags.next().unwrap_or(' '));
        let has = |c: char| x == c || y == c;

        let kind = if has('R') {
            StatusKind::Renamed
        } else if has('C') {
            StatusKind::Copied
        } else if has('D') {
            StatusKind::Deleted
        } else {
            StatusKind::Modified
        };
        let old_path = match kind {
            StatusKind::Renamed | StatusKind::Copied => {
                parts.next().filter(|p| !p.is_empty()).map(str::to_string)
            }
            _ => None,
        };
        entries.push(StatusEntry {
            kind,
            path: path.to_string(),
            old_path,
        });
    }
    entries
}
