//! Per-file metadata kept in sync with the working tree.

use crate::error::{GardenerError, Result};
use crate::store::StateStore;
use crate::types::FileRecord;
use crate::zone::ZoneMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::time::UNIX_EPOCH;
use tracing::debug;

const HASH_CHUNK: usize = 8 * 1024;

/// BLAKE3 hex digest of a file's current bytes.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    let mut buf = [0u8; HASH_CHUNK];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Data-dir-relative form of `path`, or an error if it lies outside.
fn relative_or_reject(zones: &ZoneMap, path: &Path) -> Result<String> {
    zones
        .relative(path)
        .ok_or_else(|| GardenerError::InvalidPath {
            path: path.display().to_string(),
            reason: "outside the data directory".to_string(),
        })
}

/// Hashes and stats `path`, then upserts its record.
///
/// The digest is always recomputed from the bytes on disk.
pub fn update_file_record(store: &StateStore, zones: &ZoneMap, path: &Path) -> Result<FileRecord> {
    let rel = relative_or_reject(zones, path)?;
    let absolute = zones.data_dir().join(&rel);
    let metadata = absolute.metadata()?;
    if !metadata.is_file() {
        return Err(GardenerError::InvalidPath {
            path: rel,
            reason: "not a regular file".to_string(),
        });
    }

    let mtime = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);

    let record = FileRecord {
        zone: zones.classify(&rel),
        content_hash: hash_file(&absolute)?,
        mtime,
        size: metadata.len(),
        checked_at: store.now(),
        path: rel,
    };
    store.upsert_file_record(&record)?;
    debug!(path = %record.path, zone = %record.zone, "file record updated");
    Ok(record)
}

/// Forgets `path`. Returns whether a record existed.
pub fn remove_file_record(store: &StateStore, zones: &ZoneMap, path: &Path) -> Result<bool> {
    let rel = relative_or_reject(zones, path)?;
    store.remove_file_record(&rel)
}

/// Drops records for files that no longer exist. Returns how many.
pub fn cleanup_stale_files(store: &StateStore, zones: &ZoneMap) -> Result<usize> {
    Ok(store.remove_stale_file_records(zones.data_dir())?.len())
}
