//! Durable state store.
//!
//! A single SQLite file holds five tables: the processed-commit ledger, the
//! singleton repository pointer, per-file metadata, the reconcile-run ledger
//! and the edit-provenance ledger. Every statement goes through
//! [`StateStore::with_retry`], which opens a short-lived connection and
//! retries on lock contention with capped exponential backoff.
//!
//! ```
//! use gardener_core::{StateStore, StoreConfig};
//! use tempfile::TempDir;
//!
//! let tmp = TempDir::new().unwrap();
//! let store = StateStore::open(tmp.path().join("state.db"), &StoreConfig::default()).unwrap();
//!
//! store.record_processed_commit("abc123", "main", Some("first")).unwrap();
//! let pointer = store.pointer().unwrap();
//! assert_eq!(pointer.last_processed_sha.as_deref(), Some("abc123"));
//! ```

use crate::config::StoreConfig;
use crate::error::{is_busy_error, GardenerError, Result};
use crate::provenance::ProvenanceSource;
use crate::types::{
    EditProvenance, FileRecord, ProcessedCommit, ReconcileRun, RepoPointer, Zone, ZoneCounts,
};
use crate::TimeProvider;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Store schema version for migration support.
pub const SCHEMA_VERSION: u32 = 1;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS processed_commits (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    sha TEXT NOT NULL UNIQUE,
    branch TEXT NOT NULL,
    processed_at INTEGER NOT NULL,
    note TEXT
);
CREATE INDEX IF NOT EXISTS idx_processed_commits_processed_at
    ON processed_commits(processed_at);

CREATE TABLE IF NOT EXISTS repo_pointer (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    last_seen_sha TEXT,
    last_processed_sha TEXT,
    last_reconcile_sha TEXT,
    repo_identity_hash TEXT,
    updated_at INTEGER
);

CREATE TABLE IF NOT EXISTS file_records (
    path TEXT PRIMARY KEY,
    zone TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    mtime REAL NOT NULL,
    size INTEGER NOT NULL,
    checked_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_file_records_zone ON file_records(zone);

CREATE TABLE IF NOT EXISTS reconcile_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_at INTEGER NOT NULL,
    from_sha TEXT,
    to_sha TEXT,
    files_changed INTEGER NOT NULL,
    inbox_changes INTEGER NOT NULL DEFAULT 0,
    archive_changes INTEGER NOT NULL DEFAULT 0,
    atlas_changes INTEGER NOT NULL DEFAULT 0,
    meta_changes INTEGER NOT NULL DEFAULT 0,
    root_changes INTEGER NOT NULL DEFAULT 0,
    tasks TEXT NOT NULL DEFAULT '[]'
);
CREATE INDEX IF NOT EXISTS idx_reconcile_runs_run_at ON reconcile_runs(run_at);

CREATE TABLE IF NOT EXISTS edit_provenance (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL,
    commit_sha TEXT,
    source TEXT NOT NULL,
    recorded_at INTEGER NOT NULL,
    metadata TEXT
);
CREATE INDEX IF NOT EXISTS idx_edit_provenance_path ON edit_provenance(path);
CREATE INDEX IF NOT EXISTS idx_edit_provenance_source ON edit_provenance(source);
CREATE INDEX IF NOT EXISTS idx_edit_provenance_commit ON edit_provenance(commit_sha);
"#;

const RUN_COLUMNS: &str = "id, run_at, from_sha, to_sha, files_changed, inbox_changes, \
     archive_changes, atlas_changes, meta_changes, root_changes, tasks";
const FILE_COLUMNS: &str = "path, zone, content_hash, mtime, size, checked_at";
const PROVENANCE_COLUMNS: &str = "id, path, commit_sha, source, recorded_at, metadata";

/// Default number of provenance records returned for a path.
pub const DEFAULT_PATH_HISTORY: usize = 10;
/// Default number of provenance records returned for a source.
pub const DEFAULT_SOURCE_HISTORY: usize = 50;

/// Fields of a reconcile run that the caller supplies.
#[derive(Debug, Clone, Default)]
pub struct NewRun {
    pub from_sha: Option<String>,
    pub to_sha: Option<String>,
    pub files_changed: usize,
    pub changes_by_zone: ZoneCounts,
    pub tasks: Vec<String>,
}

/// Handle to the state database.
///
/// Cheap to clone; holds no open connection between calls.
#[derive(Clone)]
pub struct StateStore {
    path: PathBuf,
    config: StoreConfig,
    clock: Arc<dyn TimeProvider>,
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("path", &self.path)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl StateStore {
    /// Opens (creating if needed) the store at `path` and ensures its schema.
    ///
    /// # Errors
    ///
    /// Returns [`GardenerError::SchemaVersionMismatch`] if the file was written
    /// by an incompatible version.
    pub fn open(path: impl AsRef<Path>, config: &StoreConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let store = Self {
            path,
            config: config.clone(),
            clock: Arc::new(system_millis),
        };
        store.ensure_schema()?;
        debug!(path = %store.path.display(), "state store initialized");
        Ok(store)
    }

    /// Sets the clock used for every timestamp the store writes.
    pub fn with_time_provider(mut self, clock: Arc<dyn TimeProvider>) -> Self {
        self.clock = clock;
        self
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current time according to the store's clock.
    pub fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.clock.now()).unwrap_or_default()
    }

    fn now_millis(&self) -> i64 {
        self.clock.now()
    }

    fn connect(&self) -> rusqlite::Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.config.busy_timeout())?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL; PRAGMA foreign_keys = ON;",
        )?;
        Ok(conn)
    }

    /// Runs `op` on a fresh connection, retrying while the database is busy.
    ///
    /// Each attempt is independent; a failed transaction is rolled back when
    /// its connection drops, so retries never observe partial writes.
    pub(crate) fn with_retry<T>(
        &self,
        operation: &'static str,
        mut op: impl FnMut(&mut Connection) -> rusqlite::Result<T>,
    ) -> Result<T> {
        let max_attempts = self.config.max_attempts.max(1);
        let max_backoff = Duration::from_millis(self.config.max_backoff_ms);
        let mut backoff = Duration::from_millis(self.config.initial_backoff_ms).min(max_backoff);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.connect().and_then(|mut conn| op(&mut conn)) {
                Ok(value) => return Ok(value),
                Err(err) if is_busy_error(&err) => {
                    if attempt >= max_attempts {
                        warn!(operation, attempts = attempt, "state store busy; giving up");
                        return Err(GardenerError::StoreBusy {
                            operation,
                            attempts: attempt,
                        });
                    }
                    debug!(
                        operation,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        "state store busy; retrying"
                    );
                    thread::sleep(backoff);
                    backoff = (backoff * 2).min(max_backoff);
                }
                Err(err) if is_corrupt_error(&err) => {
                    return Err(GardenerError::StoreCorrupted(err.to_string()));
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Creates missing tables and the singleton pointer row.
    pub fn ensure_schema(&self) -> Result<()> {
        let found = self.with_retry("ensure_schema", |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            tx.execute_batch(SCHEMA_SQL)?;
            tx.execute(
                "INSERT OR IGNORE INTO schema_version (id, version) VALUES (1, ?1)",
                [SCHEMA_VERSION],
            )?;
            tx.execute("INSERT OR IGNORE INTO repo_pointer (id) VALUES (1)", [])?;
            let version: u32 =
                tx.query_row("SELECT version FROM schema_version WHERE id = 1", [], |r| {
                    r.get(0)
                })?;
            tx.commit()?;
            Ok(version)
        })?;

        if found != SCHEMA_VERSION {
            return Err(GardenerError::SchemaVersionMismatch {
                found,
                expected: SCHEMA_VERSION,
            });
        }
        Ok(())
    }

    /// Schema version recorded in the store, if any.
    pub fn schema_version(&self) -> Result<Option<u32>> {
        self.with_retry("schema_version", |conn| {
            conn.query_row("SELECT version FROM schema_version WHERE id = 1", [], |r| {
                r.get(0)
            })
            .optional()
        })
    }

    // ===== Repository pointer =====

    /// Reads the singleton pointer row.
    pub fn pointer(&self) -> Result<RepoPointer> {
        self.with_retry("pointer", |conn| {
            conn.query_row(
                "SELECT last_seen_sha, last_processed_sha, last_reconcile_sha, \
                 repo_identity_hash, updated_at FROM repo_pointer WHERE id = 1",
                [],
                |row| {
                    Ok(RepoPointer {
                        last_seen_sha: row.get(0)?,
                        last_processed_sha: row.get(1)?,
                        last_reconcile_sha: row.get(2)?,
                        repo_identity_hash: row.get(3)?,
                        updated_at: row
                            .get::<_, Option<i64>>(4)?
                            .map(|ms| millis_to_time(ms, 4))
                            .transpose()?,
                    })
                },
            )
        })
    }

    /// Number of pointer rows. Always 1 in a healthy store.
    pub fn pointer_row_count(&self) -> Result<usize> {
        self.with_retry("pointer_row_count", |conn| {
            conn.query_row("SELECT COUNT(*) FROM repo_pointer", [], |r| {
                r.get::<_, i64>(0)
            })
        })
        .map(|n| n as usize)
    }

    /// Records the most recently observed head.
    pub fn set_last_seen(&self, sha: &str) -> Result<()> {
        let now = self.now_millis();
        self.with_retry("set_last_seen", |conn| {
            conn.execute(
                "UPDATE repo_pointer SET last_seen_sha = ?1, updated_at = ?2 WHERE id = 1",
                params![sha, now],
            )
            .map(|_| ())
        })
    }

    /// Stores the identity fingerprint.
    ///
    /// With `invalidate`, `last_reconcile_sha` is cleared in the same
    /// statement so the next reconcile performs a full scan.
    pub fn set_identity(&self, fingerprint: &str, invalidate: bool) -> Result<()> {
        let now = self.now_millis();
        self.with_retry("set_identity", |conn| {
            conn.execute(
                "UPDATE repo_pointer SET repo_identity_hash = ?1, \
                 last_reconcile_sha = CASE WHEN ?2 THEN NULL ELSE last_reconcile_sha END, \
                 updated_at = ?3 WHERE id = 1",
                params![fingerprint, invalidate, now],
            )
            .map(|_| ())
        })
    }

    /// Unconditionally sets `last_reconcile_sha`, returning the value it replaced.
    pub fn set_reconcile_pointer(&self, sha: &str) -> Result<Option<String>> {
        let now = self.now_millis();
        self.with_retry("set_reconcile_pointer", |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let previous: Option<String> = tx.query_row(
                "SELECT last_reconcile_sha FROM repo_pointer WHERE id = 1",
                [],
                |r| r.get(0),
            )?;
            tx.execute(
                "UPDATE repo_pointer SET last_reconcile_sha = ?1, updated_at = ?2 WHERE id = 1",
                params![sha, now],
            )?;
            tx.commit()?;
            Ok(previous)
        })
    }

    /// Sets `last_reconcile_sha` only if it still equals `expected`.
    ///
    /// Returns `false` when another writer moved the pointer first.
    pub fn compare_and_set_reconcile_pointer(
        &self,
        expected: Option<&str>,
        sha: &str,
    ) -> Result<bool> {
        let now = self.now_millis();
        self.with_retry("compare_and_set_reconcile_pointer", |conn| {
            let updated = conn.execute(
                "UPDATE repo_pointer SET last_reconcile_sha = ?1, updated_at = ?2 \
                 WHERE id = 1 AND last_reconcile_sha IS ?3",
                params![sha, now, expected],
            )?;
            Ok(updated == 1)
        })
    }

    // ===== Processed commits =====

    /// Records a commit made by ingestion or snapshot.
    ///
    /// Idempotent per sha. Also advances `last_processed_sha` and `last_seen_sha`.
    pub fn record_processed_commit(&self, sha: &str, branch: &str, note: Option<&str>) -> Result<()> {
        let now = self.now_millis();
        self.with_retry("record_processed_commit", |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            tx.execute(
                "INSERT INTO processed_commits (sha, branch, processed_at, note) \
                 VALUES (?1, ?2, ?3, ?4) \
                 ON CONFLICT(sha) DO UPDATE SET branch = excluded.branch, \
                 processed_at = excluded.processed_at, \
                 note = COALESCE(excluded.note, processed_commits.note)",
                params![sha, branch, now, note],
            )?;
            tx.execute(
                "UPDATE repo_pointer SET last_processed_sha = ?1, last_seen_sha = ?1, \
                 updated_at = ?2 WHERE id = 1",
                params![sha, now],
            )?;
            tx.commit()
        })
    }

    /// Most recent processed commits first.
    pub fn processed_commits(&self, limit: usize) -> Result<Vec<ProcessedCommit>> {
        self.with_retry("processed_commits", |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, sha, branch, processed_at, note FROM processed_commits \
                 ORDER BY processed_at DESC, id DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map([limit as i64], |row| {
                Ok(ProcessedCommit {
                    id: row.get(0)?,
                    sha: row.get(1)?,
                    branch: row.get(2)?,
                    processed_at: millis_to_time(row.get(3)?, 3)?,
                    note: row.get(4)?,
                })
            })?;
            rows.collect()
        })
    }

    /// Number of processed commit rows.
    pub fn processed_commit_count(&self) -> Result<usize> {
        self.count("processed_commit_count", "SELECT COUNT(*) FROM processed_commits")
    }

    /// Deletes all but the `keep` most recent processed commits.
    pub fn prune_processed_commits(&self, keep: usize) -> Result<usize> {
        self.with_retry("prune_processed_commits", |conn| {
            conn.execute(
                "DELETE FROM processed_commits WHERE id NOT IN ( \
                 SELECT id FROM processed_commits ORDER BY processed_at DESC, id DESC LIMIT ?1)",
                [keep as i64],
            )
        })
    }

    // ===== File records =====

    /// Inserts or replaces the record for `record.path`.
    pub fn upsert_file_record(&self, record: &FileRecord) -> Result<()> {
        self.with_retry("upsert_file_record", |conn| {
            conn.execute(
                "INSERT INTO file_records (path, zone, content_hash, mtime, size, checked_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
                 ON CONFLICT(path) DO UPDATE SET zone = excluded.zone, \
                 content_hash = excluded.content_hash, mtime = excluded.mtime, \
                 size = excluded.size, checked_at = excluded.checked_at",
                params![
                    record.path,
                    record.zone.as_str(),
                    record.content_hash,
                    record.mtime,
                    record.size as i64,
                    record.checked_at.timestamp_millis(),
                ],
            )
            .map(|_| ())
        })
    }

    /// Looks up the record for a repo-relative path.
    pub fn file_record(&self, path: &str) -> Result<Option<FileRecord>> {
        let sql = format!("SELECT {} FROM file_records WHERE path = ?1", FILE_COLUMNS);
        self.with_retry("file_record", |conn| {
            conn.query_row(&sql, [path], file_from_row).optional()
        })
    }

    /// Deletes the record for `path`; returns whether one existed.
    pub fn remove_file_record(&self, path: &str) -> Result<bool> {
        self.with_retry("remove_file_record", |conn| {
            conn.execute("DELETE FROM file_records WHERE path = ?1", [path])
                .map(|n| n > 0)
        })
    }

    /// Deletes the records for several paths in one transaction.
    pub fn remove_file_records(&self, paths: &[String]) -> Result<usize> {
        self.with_retry("remove_file_records", |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let mut removed = 0;
            {
                let mut stmt = tx.prepare("DELETE FROM file_records WHERE path = ?1")?;
                for path in paths {
                    removed += stmt.execute([path])?;
                }
            }
            tx.commit()?;
            Ok(removed)
        })
    }

    /// Records in one zone, ordered by path.
    pub fn files_in_zone(&self, zone: Zone) -> Result<Vec<FileRecord>> {
        let sql = format!(
            "SELECT {} FROM file_records WHERE zone = ?1 ORDER BY path",
            FILE_COLUMNS
        );
        self.with_retry("files_in_zone", |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([zone.as_str()], file_from_row)?;
            rows.collect()
        })
    }

    /// Every tracked path, ordered.
    pub fn file_paths(&self) -> Result<Vec<String>> {
        self.with_retry("file_paths", |conn| {
            let mut stmt = conn.prepare("SELECT path FROM file_records ORDER BY path")?;
            let rows = stmt.query_map([], |r| r.get(0))?;
            rows.collect()
        })
    }

    /// Tracked paths whose file no longer exists under `root`.
    pub fn stale_file_records(&self, root: &Path) -> Result<Vec<String>> {
        Ok(self
            .file_paths()?
            .into_iter()
            .filter(|path| !root.join(path).exists())
            .collect())
    }

    /// Drops records whose file no longer exists under `root`.
    ///
    /// Returns the removed paths.
    pub fn remove_stale_file_records(&self, root: &Path) -> Result<Vec<String>> {
        let stale = self.stale_file_records(root)?;
        if !stale.is_empty() {
            self.remove_file_records(&stale)?;
            debug!(count = stale.len(), "removed stale file records");
        }
        Ok(stale)
    }

    /// Number of records per zone.
    pub fn file_counts_by_zone(&self) -> Result<ZoneCounts> {
        let rows: Vec<(String, i64)> = self.with_retry("file_counts_by_zone", |conn| {
            let mut stmt = conn.prepare("SELECT zone, COUNT(*) FROM file_records GROUP BY zone")?;
            let rows = stmt.query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?;
            rows.collect()
        })?;

        let mut counts = ZoneCounts::default();
        for (zone, n) in rows {
            let zone = zone
                .parse::<Zone>()
                .map_err(GardenerError::StoreCorrupted)?;
            counts.add(zone, n as usize);
        }
        Ok(counts)
    }

    // ===== Reconcile runs =====

    /// Persists a reconcile run and returns it with its id and timestamp.
    pub fn insert_run(&self, run: &NewRun) -> Result<ReconcileRun> {
        let tasks = serde_json::to_string(&run.tasks)?;
        let now = self.now_millis();
        let counts = run.changes_by_zone;
        let id = self.with_retry("insert_run", |conn| {
            conn.execute(
                "INSERT INTO reconcile_runs (run_at, from_sha, to_sha, files_changed, \
                 inbox_changes, archive_changes, atlas_changes, meta_changes, root_changes, tasks) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    now,
                    run.from_sha,
                    run.to_sha,
                    run.files_changed as i64,
                    counts.inbox as i64,
                    counts.archive as i64,
                    counts.atlas as i64,
                    counts.meta as i64,
                    counts.root as i64,
                    tasks,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })?;

        Ok(ReconcileRun {
            id,
            run_at: DateTime::from_timestamp_millis(now).unwrap_or_default(),
            from_sha: run.from_sha.clone(),
            to_sha: run.to_sha.clone(),
            files_changed: run.files_changed,
            changes_by_zone: counts,
            tasks: run.tasks.clone(),
        })
    }

    /// The most recent run by `run_at`.
    pub fn latest_run(&self) -> Result<Option<ReconcileRun>> {
        Ok(self.recent_runs(1)?.into_iter().next())
    }

    /// Most recent runs first.
    pub fn recent_runs(&self, limit: usize) -> Result<Vec<ReconcileRun>> {
        let sql = format!(
            "SELECT {} FROM reconcile_runs ORDER BY run_at DESC, id DESC LIMIT ?1",
            RUN_COLUMNS
        );
        self.with_retry("recent_runs", |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([limit as i64], run_from_row)?;
            rows.collect()
        })
    }

    /// Ids of runs whose task list cannot be decoded.
    pub fn unreadable_runs(&self) -> Result<Vec<i64>> {
        let rows: Vec<(i64, String)> = self.with_retry("unreadable_runs", |conn| {
            let mut stmt = conn.prepare("SELECT id, tasks FROM reconcile_runs ORDER BY id")?;
            let rows = stmt.query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?;
            rows.collect()
        })?;
        Ok(rows
            .into_iter()
            .filter(|(_, tasks)| serde_json::from_str::<Vec<String>>(tasks).is_err())
            .map(|(id, _)| id)
            .collect())
    }

    // ===== Provenance =====

    /// Appends a provenance record and returns its id.
    pub fn append_provenance(
        &self,
        path: &str,
        source: &ProvenanceSource,
        commit_sha: Option<&str>,
        metadata: Option<&serde_json::Value>,
    ) -> Result<i64> {
        source.validate()?;
        let metadata = metadata.map(serde_json::to_string).transpose()?;
        let tag = source.tag();
        let now = self.now_millis();
        self.with_retry("append_provenance", |conn| {
            conn.execute(
                "INSERT INTO edit_provenance (path, commit_sha, source, recorded_at, metadata) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![path, commit_sha, tag, now, metadata],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Provenance for one path, most recent first.
    pub fn provenance_for_path(&self, path: &str, limit: usize) -> Result<Vec<EditProvenance>> {
        let sql = format!(
            "SELECT {} FROM edit_provenance WHERE path = ?1 \
             ORDER BY recorded_at DESC, id DESC LIMIT ?2",
            PROVENANCE_COLUMNS
        );
        self.with_retry("provenance_for_path", |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![path, limit as i64], provenance_from_row)?;
            rows.collect()
        })
    }

    /// Provenance recorded by one source, most recent first.
    pub fn provenance_by_source(
        &self,
        source: &ProvenanceSource,
        limit: usize,
    ) -> Result<Vec<EditProvenance>> {
        let sql = format!(
            "SELECT {} FROM edit_provenance WHERE source = ?1 \
             ORDER BY recorded_at DESC, id DESC LIMIT ?2",
            PROVENANCE_COLUMNS
        );
        let tag = source.tag();
        self.with_retry("provenance_by_source", |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![tag, limit as i64], provenance_from_row)?;
            rows.collect()
        })
    }

    /// Number of provenance rows.
    pub fn provenance_count(&self) -> Result<usize> {
        self.count("provenance_count", "SELECT COUNT(*) FROM edit_provenance")
    }

    /// Deletes all but the `keep` most recent provenance records.
    pub fn prune_provenance(&self, keep: usize) -> Result<usize> {
        self.with_retry("prune_provenance", |conn| {
            conn.execute(
                "DELETE FROM edit_provenance WHERE id NOT IN ( \
                 SELECT id FROM edit_provenance ORDER BY recorded_at DESC, id DESC LIMIT ?1)",
                [keep as i64],
            )
        })
    }

    // ===== Integrity =====

    /// Runs SQLite's integrity check. An empty list means the file is sound.
    pub fn check_integrity(&self) -> Result<Vec<String>> {
        let rows: Vec<String> = self.with_retry("check_integrity", |conn| {
            let mut stmt = conn.prepare("PRAGMA integrity_check")?;
            let rows = stmt.query_map([], |r| r.get(0))?;
            rows.collect()
        })?;
        Ok(rows.into_iter().filter(|row| row != "ok").collect())
    }

    fn count(&self, operation: &'static str, sql: &str) -> Result<usize> {
        self.with_retry(operation, |conn| {
            conn.query_row(sql, [], |r| r.get::<_, i64>(0))
        })
        .map(|n| n as usize)
    }
}

fn system_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn is_corrupt_error(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(inner, _)
            if matches!(
                inner.code,
                rusqlite::ErrorCode::DatabaseCorrupt | rusqlite::ErrorCode::NotADatabase
            )
    )
}

fn conversion_error(
    column: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err))
}

#[derive(Debug)]
struct BadValue(String);

impl std::fmt::Display for BadValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for BadValue {}

fn millis_to_time(ms: i64, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| conversion_error(column, BadValue(format!("timestamp out of range: {}", ms))))
}

fn zone_from(value: String, column: usize) -> rusqlite::Result<Zone> {
    value
        .parse()
        .map_err(|e: String| conversion_error(column, BadValue(e)))
}

fn file_from_row(row: &Row<'_>) -> rusqlite::Result<FileRecord> {
    Ok(FileRecord {
        path: row.get(0)?,
        zone: zone_from(row.get(1)?, 1)?,
        content_hash: row.get(2)?,
        mtime: row.get(3)?,
        size: row.get::<_, i64>(4)? as u64,
        checked_at: millis_to_time(row.get(5)?, 5)?,
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<ReconcileRun> {
    let count = |idx: usize| row.get::<_, i64>(idx).map(|n| n as usize);
    let tasks: String = row.get(10)?;
    Ok(ReconcileRun {
        id: row.get(0)?,
        run_at: millis_to_time(row.get(1)?, 1)?,
        from_sha: row.get(2)?,
        to_sha: row.get(3)?,
        files_changed: count(4)?,
        changes_by_zone: ZoneCounts {
            inbox: count(5)?,
            archive: count(6)?,
            atlas: count(7)?,
            meta: count(8)?,
            root: count(9)?,
        },
        tasks: serde_json::from_str(&tasks).map_err(|e| conversion_error(10, e))?,
    })
}

fn provenance_from_row(row: &Row<'_>) -> rusqlite::Result<EditProvenance> {
    let source: String = row.get(3)?;
    let metadata: Option<String> = row.get(5)?;
    Ok(EditProvenance {
        id: row.get(0)?,
        path: row.get(1)?,
        commit_sha: row.get(2)?,
        source: source
            .parse()
            .map_err(|e: String| conversion_error(3, BadValue(e)))?,
        recorded_at: millis_to_time(row.get(4)?, 4)?,
        metadata: metadata
            .map(|m| serde_json::from_str(&m))
            .transpose()
            .map_err(|e| conversion_error(5, e))?,
    })
}
