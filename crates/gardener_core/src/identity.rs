//! Repository identity fingerprinting.
//!
//! The fingerprint is derived from the root commit of the history. A
//! force-push or rewrite that replaces the root changes the fingerprint,
//! which invalidates every stored sha.

use crate::error::Result;
use crate::store::StateStore;
use crate::vcs::Vcs;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Number of digest bytes kept in a fingerprint.
const FINGERPRINT_BYTES: usize = 8;

/// Outcome of comparing the live fingerprint with the stored one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityCheck {
    /// `false` only when both fingerprints exist and differ.
    pub valid: bool,
    /// Fingerprint computed from the current history, if any.
    pub current: Option<String>,
    /// Fingerprint stored before this check.
    pub stored: Option<String>,
}

/// Fingerprint of a root commit identifier.
pub fn fingerprint_of(root_sha: &str) -> String {
    let digest = blake3::hash(root_sha.as_bytes());
    hex::encode(&digest.as_bytes()[..FINGERPRINT_BYTES])
}

/// Fingerprint of the current history, or `None` when there are no commits
/// or the VCS cannot answer.
pub fn fingerprint(vcs: &dyn Vcs) -> Option<String> {
    match vcs.oldest_ancestor() {
        Ok(root) => root.as_deref().map(fingerprint_of),
        Err(err) => {
            debug!(error = %err, "cannot compute repository fingerprint");
            None
        }
    }
}

/// Compares the live fingerprint against the stored one.
///
/// The first successful computation is stored and reported valid. A mismatch
/// is reported but not stored; the caller decides how to invalidate.
pub fn check_identity(store: &StateStore, vcs: &dyn Vcs) -> Result<IdentityCheck> {
    let stored = store.pointer()?.repo_identity_hash;
    let Some(current) = fingerprint(vcs) else {
        return Ok(IdentityCheck {
            valid: true,
            current: None,
            stored,
        });
    };

    let valid = match stored.as_deref() {
        None => {
            store.set_identity(&current, false)?;
            debug!(fingerprint = %current, "recorded repository identity");
            true
        }
        Some(previous) if previous == current => true,
        Some(previous) => {
            warn!(
                stored = %previous,
                current = %current,
                "repository history changed; stored pointers are invalid"
            );
            false
        }
    };

    Ok(IdentityCheck {
        valid,
        current: Some(current),
        stored,
    })
}
