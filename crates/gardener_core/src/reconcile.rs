//! The reconcile operation.
//!
//! One run checks repository identity, picks the starting point, diffs to
//! head, derives tasks, persists an immutable run record and moves the
//! reconcile pointer. VCS trouble never aborts a run; it degrades to an
//! empty change set plus a warning task.

use crate::changes;
use crate::config::PointerUpdate;
use crate::error::Result;
use crate::identity::check_identity;
use crate::store::{NewRun, StateStore};
use crate::tasks::{generate_tasks, FULL_SCAN_NOTICE, VCS_UNAVAILABLE_NOTICE};
use crate::types::{ChangedFile, ReconcileRun, RepoPointer, ZoneCounts};
use crate::vcs::{Vcs, VcsResult};
use crate::zone::ZoneMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Options for a reconcile run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Attach the full change list to the returned view.
    pub include_details: bool,
}

/// A persisted run plus what the caller needs to interpret it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileRunView {
    #[serde(flatten)]
    pub run: ReconcileRun,
    /// `false` when this run followed a history rewrite.
    pub identity_valid: bool,
    /// Whether `last_reconcile_sha` now equals `run.to_sha`.
    pub pointer_advanced: bool,
    /// Dirty working-tree paths the run could not see.
    pub uncommitted_files: usize,
    pub uncommitted_by_zone: ZoneCounts,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uncommitted_warning: Option<String>,
    /// `from..to` range the pointer moved past without a diff, after a
    /// degraded run. Those commits are never examined by later runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped_range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<Vec<ChangedFile>>,
}

/// Runs reconciles against one store and repository.
pub struct Reconciler<'a> {
    store: &'a StateStore,
    vcs: &'a dyn Vcs,
    zones: &'a ZoneMap,
    policy: PointerUpdate,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        store: &'a StateStore,
        vcs: &'a dyn Vcs,
        zones: &'a ZoneMap,
        policy: PointerUpdate,
    ) -> Self {
        Self {
            store,
            vcs,
            zones,
            policy,
        }
    }

    /// Executes one reconcile run and records it.
    ///
    /// Only store failures (after retries) are returned as errors.
    pub fn run(&self, options: ReconcileOptions) -> Result<ReconcileRunView> {
        self.store.ensure_schema()?;

        let identity = check_identity(self.store, self.vcs)?;
        let mut tasks = Vec::new();
        let (from_sha, expected) = if identity.valid {
            let pointer = self.store.pointer()?;
            (self.starting_point(&pointer), pointer.last_reconcile_sha)
        } else {
            if let Some(current) = identity.current.as_deref() {
                self.store.set_identity(current, true)?;
            }
            tasks.push(FULL_SCAN_NOTICE.to_string());
            (None, None)
        };

        let head = self.vcs.head();
        let to_sha = head.as_ref().ok().cloned().flatten();
        let detected = head.and_then(|to| self.detect(from_sha.as_deref(), to.as_deref()));
        let (changes, vcs_failed) = match detected {
            Ok(changes) => (changes, false),
            Err(err) => {
                warn!(error = %err, "change detection failed; recording degraded run");
                (Vec::new(), true)
            }
        };

        tasks.extend(generate_tasks(&changes));
        if vcs_failed {
            tasks.push(VCS_UNAVAILABLE_NOTICE.to_string());
        }

        let run = self.store.insert_run(&NewRun {
            from_sha: from_sha.clone(),
            to_sha: to_sha.clone(),
            files_changed: changes.len(),
            changes_by_zone: ZoneCounts::tally(changes.iter().map(|c| c.zone)),
            tasks,
        })?;

        let pointer_advanced = match to_sha.as_deref() {
            Some(to) => self.advance_pointer(expected.as_deref(), to)?,
            None => false,
        };
        let skipped_range = match to_sha.as_deref() {
            Some(to) if vcs_failed && pointer_advanced => {
                let range = format!("{}..{}", from_sha.as_deref().unwrap_or("(root)"), to);
                warn!(range = %range, "pointer advanced past commits that were not diffed");
                Some(range)
            }
            _ => None,
        };

        let (uncommitted_files, uncommitted_by_zone) = self.uncommitted();
        let uncommitted_warning = (uncommitted_files > 0).then(|| {
            format!(
                "{} uncommitted file(s) not included in reconcile. Run snapshot first to include them.",
                uncommitted_files
            )
        });

        info!(
            run_id = run.id,
            from = ?run.from_sha,
            to = ?run.to_sha,
            files_changed = run.files_changed,
            tasks = run.tasks.len(),
            "reconcile run recorded"
        );

        Ok(ReconcileRunView {
            run,
            identity_valid: identity.valid,
            pointer_advanced,
            uncommitted_files,
            uncommitted_by_zone,
            uncommitted_warning,
            skipped_range,
            changes: options.include_details.then_some(changes),
        })
    }

    /// The most recent point already accounted for by either pointer.
    fn starting_point(&self, pointer: &RepoPointer) -> Option<String> {
        match (
            pointer.last_reconcile_sha.as_deref(),
            pointer.last_processed_sha.as_deref(),
        ) {
            (None, None) => None,
            (Some(sha), None) | (None, Some(sha)) => Some(sha.to_string()),
            (Some(reconciled), Some(processed)) if reconciled == processed => {
                Some(reconciled.to_string())
            }
            (Some(reconciled), Some(processed)) => {
                match self.vcs.is_ancestor(reconciled, processed) {
                    Ok(true) => Some(processed.to_string()),
                    Ok(false) => Some(reconciled.to_string()),
                    Err(err) => {
                        debug!(error = %err, "ancestry unknown; using reconcile pointer");
                        Some(reconciled.to_string())
                    }
                }
            }
        }
    }

    fn detect(&self, from: Option<&str>, to: Option<&str>) -> VcsResult<Vec<ChangedFile>> {
        match (from, to) {
            (None, _) => changes::full_scan(self.vcs, self.zones),
            (Some(from), Some(to)) => changes::changes_between(self.vcs, self.zones, from, to),
            (Some(_), None) => Ok(Vec::new()),
        }
    }

    fn advance_pointer(&self, expected: Option<&str>, to: &str) -> Result<bool> {
        match self.policy {
            PointerUpdate::LastWriterWins => {
                let previous = self.store.set_reconcile_pointer(to)?;
                if previous.as_deref() != expected {
                    warn!(
                        expected = ?expected,
                        found = ?previous,
                        to,
                        "reconcile pointer moved by a concurrent run; overwriting"
                    );
                }
                Ok(true)
            }
            PointerUpdate::CompareAndSwap => {
                let swapped = self.store.compare_and_set_reconcile_pointer(expected, to)?;
                if !swapped {
                    warn!(
                        expected = ?expected,
                        to,
                        "reconcile pointer moved by a concurrent run; not advancing"
                    );
                }
                Ok(swapped)
            }
        }
    }

    fn uncommitted(&self) -> (usize, ZoneCounts) {
        match self.vcs.dirty_paths() {
            Ok(paths) => (
                paths.len(),
                ZoneCounts::tally(paths.iter().map(|p| self.zones.classify(p))),
            ),
            Err(err) => {
                debug!(error = %err, "cannot list uncommitted files");
                (0, ZoneCounts::default())
            }
        }
    }
}
