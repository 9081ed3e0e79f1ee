//! Knowledge base handle providing the main Gardener API.

use crate::changes;
use crate::config::Config;
use crate::error::{GardenerError, Result};
use crate::file_state;
use crate::identity::check_identity;
use crate::ingest::{self, IngestOutcome, Ingestor, NoteClassifier, SingleFlight, INGEST_LOCK_FILE};
use crate::maintenance::{self, MaintenanceConfig, MaintenanceReport};
use crate::provenance::{normalize_path, ProvenanceSource};
use crate::reconcile::{ReconcileOptions, ReconcileRunView, Reconciler};
use crate::snapshot::{self, SnapshotReport};
use crate::store::{StateStore, DEFAULT_PATH_HISTORY, DEFAULT_SOURCE_HISTORY};
use crate::types::{
    ChangedFile, EditProvenance, FileRecord, ProcessedCommit, ReconcileRun, RepoPointer, Zone,
    ZoneCounts,
};
use crate::vcs::{GitCli, Vcs};
use crate::verify::{self, IntegrityReport};
use crate::zone::ZoneMap;
use crate::TimeProvider;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// State directory inside the data directory.
pub const STATE_DIR: &str = ".gardener";
/// Database file inside the state directory.
pub const STATE_DB: &str = "state.db";

/// Dirty paths listed in a [`RepoPointerView`].
const DIRTY_PREVIEW: usize = 10;

/// Pointer row plus live repository facts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoPointerView {
    #[serde(flatten)]
    pub pointer: RepoPointer,
    pub vcs_available: bool,
    pub current_head: Option<String>,
    pub current_branch: String,
    pub identity_valid: bool,
    pub dirty_files: usize,
    pub dirty_by_zone: ZoneCounts,
    /// At most ten dirty paths.
    pub dirty_preview: Vec<String>,
    pub last_run: Option<ReconcileRun>,
}

/// Gardener knowledge base handle.
///
/// Cheap to clone. Clones share the ingestion guard.
#[derive(Clone)]
pub struct KnowledgeBase {
    root: PathBuf,
    config: Config,
    zones: ZoneMap,
    store: StateStore,
    vcs: Arc<dyn Vcs>,
    ingest_gate: Arc<SingleFlight>,
}

impl std::fmt::Debug for KnowledgeBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeBase")
            .field("root", &self.root)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl KnowledgeBase {
    /// Opens an existing knowledge base.
    ///
    /// # Errors
    ///
    /// Returns [`GardenerError::NotInitialized`] if `.gardener` is missing.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use gardener_core::KnowledgeBase;
    ///
    /// let kb = KnowledgeBase::open(".").unwrap();
    /// ```
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        let state_dir = root.join(STATE_DIR);
        if !state_dir.is_dir() {
            return Err(GardenerError::NotInitialized(root));
        }
        let config = Config::load(&state_dir)?;
        Self::from_parts(root, config)
    }

    /// Initializes a knowledge base in `path`.
    ///
    /// Creates the zone directories, the state directory with a default
    /// configuration, and an empty state store.
    ///
    /// # Errors
    ///
    /// Returns [`GardenerError::AlreadyInitialized`] if `.gardener` exists.
    pub fn init(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        let state_dir = root.join(STATE_DIR);
        if state_dir.exists() {
            return Err(GardenerError::AlreadyInitialized(root));
        }

        let config = Config::default();
        for dir in [
            &config.zones.inbox,
            &config.zones.archive,
            &config.zones.atlas,
            &config.zones.meta,
        ] {
            fs::create_dir_all(root.join(dir))?;
        }
        fs::create_dir_all(&state_dir)?;
        config.save(&state_dir)?;
        fs::write(state_dir.join(".gitignore"), "*\n")?;

        let kb = Self::from_parts(root, config)?;
        info!(path = %kb.root.display(), "initialized knowledge base");
        Ok(kb)
    }

    fn from_parts(root: PathBuf, config: Config) -> Result<Self> {
        let zones = ZoneMap::new(&root, &config.zones);
        let state_dir = root.join(STATE_DIR);
        let store = StateStore::open(state_dir.join(STATE_DB), &config.store)?;
        let vcs: Arc<dyn Vcs> = Arc::new(GitCli::new(zones.data_dir(), &config.vcs));
        let ingest_gate = Arc::new(SingleFlight::new(state_dir.join(INGEST_LOCK_FILE)));
        Ok(Self {
            root,
            config,
            zones,
            store,
            vcs,
            ingest_gate,
        })
    }

    /// Replaces the version-control adapter.
    pub fn with_vcs(mut self, vcs: Arc<dyn Vcs>) -> Self {
        self.vcs = vcs;
        self
    }

    /// Sets a custom time provider for testing.
    ///
    /// The provider returns Unix milliseconds.
    pub fn with_time_provider(mut self, provider: impl TimeProvider + 'static) -> Self {
        self.store = self.store.with_time_provider(Arc::new(provider));
        self
    }

    /// Data directory as given.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The `.gardener` directory.
    pub fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn zones(&self) -> &ZoneMap {
        &self.zones
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn vcs(&self) -> &dyn Vcs {
        self.vcs.as_ref()
    }

    /// Creates the repository if the VCS is present and none exists.
    ///
    /// Returns whether a repository is in place afterwards.
    pub fn ensure_repository(&self) -> Result<bool> {
        if !self.vcs.is_available() {
            warn!("version control unavailable; repository not created");
            return Ok(false);
        }
        if !self.vcs.is_repository() {
            self.vcs.init_repository()?;
            info!(path = %self.root.display(), "initialized repository");
        }
        Ok(true)
    }

    // ===== Reconcile =====

    /// Runs one reconcile and returns its record.
    pub fn reconcile(&self, options: ReconcileOptions) -> Result<ReconcileRunView> {
        Reconciler::new(
            &self.store,
            self.vcs.as_ref(),
            &self.zones,
            self.config.reconcile.pointer_update,
        )
        .run(options)
    }

    /// Changes from `from` to head. `None` lists every tracked path as added.
    ///
    /// VCS failure yields an empty list.
    pub fn changes_since(&self, from: Option<&str>) -> Vec<ChangedFile> {
        changes::changes_since(self.vcs.as_ref(), &self.zones, from).unwrap_or_else(|err| {
            warn!(error = %err, "change detection failed");
            Vec::new()
        })
    }

    /// Pointer state plus what the repository looks like right now.
    ///
    /// Observing a new head updates `last_seen_sha`.
    pub fn repo_state(&self) -> Result<RepoPointerView> {
        let last_run = self.store.latest_run()?;
        let vcs_available = self.vcs.is_available() && self.vcs.is_repository();
        if !vcs_available {
            return Ok(RepoPointerView {
                pointer: self.store.pointer()?,
                vcs_available,
                current_head: None,
                current_branch: "unknown".to_string(),
                identity_valid: true,
                dirty_files: 0,
                dirty_by_zone: ZoneCounts::default(),
                dirty_preview: Vec::new(),
                last_run,
            });
        }

        let current_head = self.vcs.head().ok().flatten();
        if let Some(head) = current_head.as_deref() {
            if self.store.pointer()?.last_seen_sha.as_deref() != Some(head) {
                self.store.set_last_seen(head)?;
            }
        }
        let identity = check_identity(&self.store, self.vcs.as_ref())?;
        let dirty = self.vcs.dirty_paths().unwrap_or_else(|err| {
            warn!(error = %err, "cannot list uncommitted files");
            Vec::new()
        });

        Ok(RepoPointerView {
            pointer: self.store.pointer()?,
            vcs_available,
            current_head,
            current_branch: self
                .vcs
                .branch()
                .unwrap_or_else(|_| "unknown".to_string()),
            identity_valid: identity.valid,
            dirty_files: dirty.len(),
            dirty_by_zone: ZoneCounts::tally(dirty.iter().map(|p| self.zones.classify(p))),
            dirty_preview: dirty.into_iter().take(DIRTY_PREVIEW).collect(),
            last_run,
        })
    }

    /// Most recent runs first.
    pub fn recent_runs(&self, limit: usize) -> Result<Vec<ReconcileRun>> {
        self.store.recent_runs(limit)
    }

    /// Most recent processed commits first.
    pub fn processed_commits(&self, limit: usize) -> Result<Vec<ProcessedCommit>> {
        self.store.processed_commits(limit)
    }

    // ===== Files and provenance =====

    /// Zone of a data-dir-relative or absolute path.
    pub fn classify(&self, path: impl AsRef<Path>) -> Zone {
        self.zones.classify(path)
    }

    pub fn update_file_record(&self, path: impl AsRef<Path>) -> Result<FileRecord> {
        file_state::update_file_record(&self.store, &self.zones, path.as_ref())
    }

    pub fn remove_file_record(&self, path: impl AsRef<Path>) -> Result<bool> {
        file_state::remove_file_record(&self.store, &self.zones, path.as_ref())
    }

    pub fn cleanup_stale_files(&self) -> Result<usize> {
        file_state::cleanup_stale_files(&self.store, &self.zones)
    }

    /// Appends a provenance record. The path is stored data-dir-relative
    /// when it lies inside the data directory.
    pub fn record_provenance(
        &self,
        path: impl AsRef<Path>,
        source: &ProvenanceSource,
        commit_sha: Option<&str>,
        metadata: Option<&serde_json::Value>,
    ) -> Result<i64> {
        let path = normalize_path(self.zones.data_dir(), path.as_ref());
        self.store
            .append_provenance(&path, source, commit_sha, metadata)
    }

    /// Provenance for a path, most recent first (default limit 10).
    pub fn provenance_for_path(
        &self,
        path: impl AsRef<Path>,
        limit: Option<usize>,
    ) -> Result<Vec<EditProvenance>> {
        let path = normalize_path(self.zones.data_dir(), path.as_ref());
        self.store
            .provenance_for_path(&path, limit.unwrap_or(DEFAULT_PATH_HISTORY))
    }

    /// Provenance by source, most recent first (default limit 50).
    pub fn provenance_by_source(
        &self,
        source: &ProvenanceSource,
        limit: Option<usize>,
    ) -> Result<Vec<EditProvenance>> {
        self.store
            .provenance_by_source(source, limit.unwrap_or(DEFAULT_SOURCE_HISTORY))
    }

    // ===== Ingestion and snapshots =====

    /// Runs one ingestion pass. Blocks while another pass is running.
    pub fn ingest(&self, classifier: &dyn NoteClassifier) -> Result<Vec<IngestOutcome>> {
        let _flight = self.ingest_gate.enter()?;
        Ingestor {
            store: &self.store,
            vcs: self.vcs.as_ref(),
            zones: &self.zones,
            config: &self.config,
        }
        .run(classifier)
    }

    /// Writes a new timestamped note into the inbox.
    pub fn submit_note(&self, content: &str) -> Result<PathBuf> {
        ingest::submit_note(&self.zones, &self.config, self.store.now(), content)
    }

    /// Commits uncommitted work as a manual edit.
    pub fn snapshot(&self, message: Option<&str>) -> Result<SnapshotReport> {
        snapshot::snapshot(&self.store, self.vcs.as_ref(), &self.zones, message)
    }

    // ===== Maintenance =====

    pub fn maintain(&self, config: &MaintenanceConfig) -> Result<MaintenanceReport> {
        maintenance::maintain(&self.store, self.zones.data_dir(), config)
    }

    /// Checks the state store. Never repairs.
    pub fn verify(&self) -> Result<IntegrityReport> {
        verify::verify(&self.store)
    }
}
