//! Change detection between two points in history.

use crate::types::{ChangeStatus, ChangedFile};
use crate::vcs::{RawChange, Vcs, VcsResult};
use crate::zone::ZoneMap;

/// Attaches a zone to a raw diff entry.
pub fn classify_change(zones: &ZoneMap, raw: RawChange) -> ChangedFile {
    ChangedFile {
        zone: zones.classify(&raw.path),
        path: raw.path,
        status: raw.status,
        old_path: match raw.status {
            ChangeStatus::Renamed => raw.old_path,
            _ => None,
        },
    }
}

/// Every tracked path, reported as added.
pub fn full_scan(vcs: &dyn Vcs, zones: &ZoneMap) -> VcsResult<Vec<ChangedFile>> {
    let mut paths = vcs.tracked_paths()?;
    paths.sort();
    paths.dedup();
    Ok(paths
        .into_iter()
        .map(|path| {
            classify_change(
                zones,
                RawChange {
                    status: ChangeStatus::Added,
                    path,
                    old_path: None,
                },
            )
        })
        .collect())
}

/// Rename-aware changes from `from` to `to`.
pub fn changes_between(
    vcs: &dyn Vcs,
    zones: &ZoneMap,
    from: &str,
    to: &str,
) -> VcsResult<Vec<ChangedFile>> {
    if from == to {
        return Ok(Vec::new());
    }
    Ok(vcs
        .diff(from, to)?
        .into_iter()
        .map(|raw| classify_change(zones, raw))
        .collect())
}

/// Changes since `from` up to the current head.
///
/// `None` means a full scan: every tracked path is reported as added.
pub fn changes_since(
    vcs: &dyn Vcs,
    zones: &ZoneMap,
    from: Option<&str>,
) -> VcsResult<Vec<ChangedFile>> {
    match from {
        None => full_scan(vcs, zones),
        Some(from) => match vcs.head()? {
            Some(head) => changes_between(vcs, zones, from, &head),
            None => Ok(Vec::new()),
        },
    }
}
