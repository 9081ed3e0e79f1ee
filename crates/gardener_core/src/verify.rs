//! State store integrity checks.
//!
//! Findings are reported, never repaired.

use crate::error::Result;
use crate::store::{StateStore, SCHEMA_VERSION};
use serde::{Deserialize, Serialize};

/// Result of [`verify`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    /// Lines reported by SQLite's integrity check other than "ok".
    pub integrity_errors: Vec<String>,
    /// Schema version recorded in the store.
    pub schema_version: Option<u32>,
    /// Schema version this build expects.
    pub expected_schema_version: u32,
    /// Rows in the repository pointer table. Exactly one is healthy.
    pub pointer_rows: usize,
    /// Reconcile runs whose task list cannot be decoded.
    pub unreadable_runs: Vec<i64>,
}

impl IntegrityReport {
    /// Returns true if any issues were found.
    pub fn has_issues(&self) -> bool {
        !self.integrity_errors.is_empty()
            || self.schema_version != Some(self.expected_schema_version)
            || self.pointer_rows != 1
            || !self.unreadable_runs.is_empty()
    }

    /// Returns a summary message.
    pub fn summary(&self) -> String {
        if !self.has_issues() {
            return "State store is healthy. No issues found.".to_string();
        }
        let mut issues = Vec::new();
        if !self.integrity_errors.is_empty() {
            issues.push(format!("{} integrity error(s)", self.integrity_errors.len()));
        }
        if self.schema_version != Some(self.expected_schema_version) {
            issues.push(match self.schema_version {
                Some(found) => format!(
                    "schema version {} (expected {})",
                    found, self.expected_schema_version
                ),
                None => "missing schema version".to_string(),
            });
        }
        if self.pointer_rows != 1 {
            issues.push(format!("{} pointer row(s) (expected 1)", self.pointer_rows));
        }
        if !self.unreadable_runs.is_empty() {
            issues.push(format!(
                "{} unreadable reconcile run(s)",
                self.unreadable_runs.len()
            ));
        }
        format!("State store has issues: {}", issues.join(", "))
    }
}

/// Checks the store file and its invariants.
pub fn verify(store: &StateStore) -> Result<IntegrityReport> {
    Ok(IntegrityReport {
        integrity_errors: store.check_integrity()?,
        schema_version: store.schema_version()?,
        expected_schema_version: SCHEMA_VERSION,
        pointer_rows: store.pointer_row_count()?,
        unreadable_runs: store.unreadable_runs()?,
    })
}
