//! Maintenance recommendations derived from a change set.
//!
//! The phrasing and ordering here are consumed by people reading run
//! records, so both are stable:
//!
//! 1. inbox additions
//! 2. atlas modifications, additions, deletions, renames (one line each)
//! 3. meta regeneration
//! 4. backlink refresh for any rename or delete
//! 5. consistency check for any atlas or meta change
//!
//! Atlas content is authoritative. Nothing here proposes rewriting it.

use crate::types::{ChangeStatus, ChangedFile, Zone};

/// First task of a run that followed a history rewrite.
pub const FULL_SCAN_NOTICE: &str = "Repository history changed - performed full scan";

/// Last task of a run whose change detection failed.
pub const VCS_UNAVAILABLE_NOTICE: &str = "Version control unavailable - change detection skipped";

/// Maps classified changes to ordered task strings.
pub fn generate_tasks(changes: &[ChangedFile]) -> Vec<String> {
    let mut tasks = Vec::new();
    let count = |zone: Zone, status: ChangeStatus| {
        changes
            .iter()
            .filter(|c| c.zone == zone && c.status == status)
            .count()
    };
    let touches = |zone: Zone| changes.iter().any(|c| c.zone == zone);

    let inbox_added = count(Zone::Inbox, ChangeStatus::Added);
    if inbox_added > 0 {
        tasks.push(format!("Process {} new inbox file(s)", inbox_added));
    }

    let atlas_modified = count(Zone::Atlas, ChangeStatus::Modified);
    if atlas_modified > 0 {
        tasks.push(format!(
            "Review {} modified note(s) in atlas (manual edits preserved)",
            atlas_modified
        ));
    }
    let atlas_added = count(Zone::Atlas, ChangeStatus::Added);
    if atlas_added > 0 {
        tasks.push(format!("Index {} new note(s) added to atlas", atlas_added));
    }
    let atlas_deleted = count(Zone::Atlas, ChangeStatus::Deleted);
    if atlas_deleted > 0 {
        tasks.push(format!(
            "Clean up references to {} deleted note(s)",
            atlas_deleted
        ));
    }
    let atlas_renamed = count(Zone::Atlas, ChangeStatus::Renamed);
    if atlas_renamed > 0 {
        tasks.push(format!("Update links for {} renamed note(s)", atlas_renamed));
    }

    if touches(Zone::Meta) {
        tasks.push("Regenerate meta indexes (derived artifacts may be stale)".to_string());
    }

    if changes
        .iter()
        .any(|c| matches!(c.status, ChangeStatus::Renamed | ChangeStatus::Deleted))
    {
        tasks.push("Refresh backlinks and cross-references".to_string());
    }

    if touches(Zone::Atlas) || touches(Zone::Meta) {
        tasks.push("Run consistency check on knowledge base".to_string());
    }

    tasks
}
