//! Path to zone classification.

use crate::config::ZoneConfig;
use crate::provenance::slash_path;
use crate::types::Zone;
use std::path::{Component, Path, PathBuf};

/// Resolved zone roots for one data directory.
#[derive(Debug, Clone)]
pub struct ZoneMap {
    data_dir: PathBuf,
    /// Most specific root first, so nested roots win over their parents.
    roots: Vec<(Zone, PathBuf)>,
}

impl ZoneMap {
    /// Resolves the configured zone roots under `data_dir`.
    ///
    /// Roots that do not exist yet are still resolved lexically.
    pub fn new(data_dir: &Path, zones: &ZoneConfig) -> Self {
        let absolute = if data_dir.is_absolute() {
            data_dir.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(data_dir))
                .unwrap_or_else(|_| data_dir.to_path_buf())
        };
        let data_dir = resolve_lenient(&absolute).unwrap_or(absolute);
        let mut roots: Vec<(Zone, PathBuf)> = [
            (Zone::Archive, &zones.archive),
            (Zone::Inbox, &zones.inbox),
            (Zone::Atlas, &zones.atlas),
            (Zone::Meta, &zones.meta),
        ]
        .into_iter()
        .map(|(zone, rel)| {
            let joined = data_dir.join(rel);
            (zone, resolve_lenient(&joined).unwrap_or(joined))
        })
        .collect();
        roots.sort_by_key(|(_, root)| std::cmp::Reverse(root.components().count()));

        Self { data_dir, roots }
    }

    /// Resolved data directory.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Resolved root directory of `zone`. `Root` has none.
    pub fn root_of(&self, zone: Zone) -> Option<&Path> {
        self.roots
            .iter()
            .find(|(z, _)| *z == zone)
            .map(|(_, root)| root.as_path())
    }

    /// Classifies a path, relative to the data directory or absolute.
    ///
    /// Paths that cannot be resolved fall back to [`Zone::Root`].
    pub fn classify(&self, path: impl AsRef<Path>) -> Zone {
        let Some(resolved) = self.resolve(path.as_ref()) else {
            return Zone::Root;
        };
        self.roots
            .iter()
            .find(|(_, root)| resolved.starts_with(root))
            .map(|(zone, _)| *zone)
            .unwrap_or(Zone::Root)
    }

    /// Returns the data-dir-relative form of `path`, or `None` if it lies outside.
    pub fn relative(&self, path: impl AsRef<Path>) -> Option<String> {
        let resolved = self.resolve(path.as_ref())?;
        let rel = resolved.strip_prefix(&self.data_dir).ok()?;
        let rel = slash_path(rel);
        (!rel.is_empty()).then_some(rel)
    }

    /// Absolute, resolved form of `path`.
    pub fn resolve(&self, path: &Path) -> Option<PathBuf> {
        if path.is_absolute() {
            resolve_lenient(path)
        } else {
            resolve_lenient(&self.data_dir.join(path))
        }
    }
}

/// Resolves `path` without requiring it to exist.
///
/// `..` is applied lexically; the deepest existing ancestor is canonicalized
/// so that symlinked directories compare equal to their targets. Returns
/// `None` when `..` climbs above the filesystem root.
pub(crate) fn resolve_lenient(path: &Path) -> Option<PathBuf> {
    let mut normal = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::ParentDir => {
                if !normal.pop() {
                    return None;
                }
            }
            Component::CurDir => {}
            other => normal.push(other.as_os_str()),
        }
    }

    let mut existing = normal.as_path();
    let mut tail = Vec::new();
    loop {
        match existing.canonicalize() {
            Ok(mut resolved) => {
                for part in tail.iter().rev() {
                    resolved.push(part);
                }
                return Some(resolved);
            }
            Err(_) => {
                tail.push(existing.file_name()?.to_os_string());
                existing = existing.parent()?;
            }
        }
    }
}
