//! Gardener Core Library
//!
//! State tracking for a personal knowledge base kept in a plain directory of
//! markdown files under version control, providing:
//! - Zone classification (inbox, archive, atlas, meta)
//! - Reconciliation of repository history into review tasks
//! - Per-file content hashes and edit provenance
//! - Single-flight ingestion of inbox notes
//!
//! # Quick Start
//!
//! ```
//! use gardener_core::KnowledgeBase;
//! use tempfile::TempDir;
//!
//! let tmp = TempDir::new().unwrap();
//! let kb = KnowledgeBase::init(tmp.path()).unwrap();
//!
//! // Drop a note into the inbox
//! let note = kb.submit_note("remember the milk").unwrap();
//! assert!(note.is_file());
//!
//! // Every path belongs to exactly one zone
//! assert_eq!(kb.classify("inbox/archive/old.md").as_str(), "archive");
//! assert_eq!(kb.classify("atlas/topics/rust.md").as_str(), "atlas");
//! ```
//!
//! # Features
//!
//! ## State Store
//!
//! All durable bookkeeping lives in one SQLite file under `.gardener/`:
//!
//! ```
//! use gardener_core::{StateStore, StoreConfig};
//! use tempfile::TempDir;
//!
//! let tmp = TempDir::new().unwrap();
//! let store = StateStore::open(tmp.path().join("state.db"), &StoreConfig::default()).unwrap();
//!
//! let pointer = store.pointer().unwrap();
//! assert_eq!(pointer.last_reconcile_sha, None);
//! ```
//!
//! ## Provenance
//!
//! Commit messages carry the actor that made them:
//!
//! ```
//! use gardener_core::{format_commit_message, ProvenanceSource};
//!
//! let source = ProvenanceSource::External("formatter".into());
//! assert_eq!(
//!     format_commit_message(&source, "reflow"),
//!     "External[formatter]: reflow"
//! );
//! ```

mod changes;
mod config;
mod error;
mod file_state;
mod identity;
mod ingest;
mod knowledge_base;
mod maintenance;
mod provenance;
mod reconcile;
mod snapshot;
mod store;
mod tasks;
mod types;
mod vcs;
mod verify;
mod zone;

pub use changes::{changes_between, changes_since, classify_change, full_scan};
pub use config::{
    Config, FilesConfig, IngestConfig, PointerUpdate, ReconcileConfig, RetentionConfig,
    StoreConfig, VcsConfig, ZoneConfig, CONFIG_FILE,
};
pub use error::{GardenerError, Result};
pub use file_state::hash_file;
pub use identity::{check_identity, fingerprint, fingerprint_of, IdentityCheck};
pub use ingest::{
    submit_note, validate_destination, FlightGuard, IngestAction, IngestDecision, IngestOutcome,
    NoteClassifier, SingleFlight, INGEST_LOCK_FILE,
};
pub use knowledge_base::{KnowledgeBase, RepoPointerView, STATE_DB, STATE_DIR};
pub use maintenance::{maintain, MaintenanceConfig, MaintenanceReport};
pub use provenance::{format_commit_message, parse_commit_source, ProvenanceSource};
pub use reconcile::{ReconcileOptions, ReconcileRunView, Reconciler};
pub use snapshot::{snapshot, SnapshotReport, DEFAULT_SNAPSHOT_MESSAGE};
pub use store::{
    NewRun, StateStore, DEFAULT_PATH_HISTORY, DEFAULT_SOURCE_HISTORY, SCHEMA_VERSION,
};
pub use tasks::{generate_tasks, FULL_SCAN_NOTICE, VCS_UNAVAILABLE_NOTICE};
pub use types::*;
pub use vcs::{
    parse_name_status, parse_status_z, GitCli, RawChange, StatusEntry, StatusKind, Vcs, VcsError,
    VcsResult,
};
pub use verify::{verify, IntegrityReport};
pub use zone::ZoneMap;

/// Time provider trait for testing.
///
/// Allows injecting controlled time into the state store so timestamps in
/// runs, records and note names are predictable.
pub trait TimeProvider: Send + Sync {
    /// Returns the current Unix timestamp in milliseconds.
    fn now(&self) -> i64;
}

impl<F> TimeProvider for F
where
    F: Fn() -> i64 + Send + Sync,
{
    fn now(&self) -> i64 {
        self()
    }
}
