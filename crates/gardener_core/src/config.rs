//! Configuration for a gardener knowledge base.

use crate::error::{GardenerError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Name of the config file inside the state directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Comprehensive configuration for a knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Zone roots, relative to the data directory.
    #[serde(default)]
    pub zones: ZoneConfig,

    /// Well-known files in the data directory.
    #[serde(default)]
    pub files: FilesConfig,

    /// State store tuning.
    #[serde(default)]
    pub store: StoreConfig,

    /// Version control settings.
    #[serde(default)]
    pub vcs: VcsConfig,

    /// Reconcile behavior.
    #[serde(default)]
    pub reconcile: ReconcileConfig,

    /// Retention limits applied by `maintain`.
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Ingestion worker limits.
    #[serde(default)]
    pub ingest: IngestConfig,
}

impl Config {
    /// Load configuration from the state directory.
    ///
    /// A missing file yields the defaults.
    pub fn load(state_dir: &Path) -> Result<Self> {
        let path = state_dir.join(CONFIG_FILE);
        if path.exists() {
            let content = fs::read_to_string(&path)
                .map_err(|e| GardenerError::Config(format!("failed to read config: {}", e)))?;
            toml::from_str(&content)
                .map_err(|e| GardenerError::Config(format!("failed to parse config: {}", e)))
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to the state directory.
    pub fn save(&self, state_dir: &Path) -> Result<()> {
        let path = state_dir.join(CONFIG_FILE);
        let content = toml::to_string_pretty(self)
            .map_err(|e| GardenerError::Config(format!("failed to serialize config: {}", e)))?;
        fs::write(&path, content)
            .map_err(|e| GardenerError::Config(format!("failed to write config: {}", e)))?;
        Ok(())
    }
}

/// Zone roots.
///
/// `archive` nests inside `inbox` and is matched before it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ZoneConfig {
    /// Ingestion zone (default: "inbox").
    pub inbox: String,
    /// Ingestion archive subroot (default: "inbox/archive").
    pub archive: String,
    /// Durable knowledge zone (default: "atlas").
    pub atlas: String,
    /// Derived index zone (default: "meta").
    pub meta: String,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            inbox: "inbox".to_string(),
            archive: "inbox/archive".to_string(),
            atlas: "atlas".to_string(),
            meta: "meta".to_string(),
        }
    }
}

/// Well-known files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FilesConfig {
    /// Where unsorted notes and rejected destinations land (default: "tasks.md").
    pub tasks: String,
    /// System context handed to the classifier (default: "AGENTS.md").
    pub agents: String,
    /// Classification rules handed to the classifier (default: "GARDENER.md").
    pub rules: String,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            tasks: "tasks.md".to_string(),
            agents: "AGENTS.md".to_string(),
            rules: "GARDENER.md".to_string(),
        }
    }
}

/// State store tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreConfig {
    /// SQLite busy timeout per statement in milliseconds (default: 5000).
    pub busy_timeout_ms: u64,
    /// Attempts before a busy store is reported as failed (default: 10).
    pub max_attempts: u32,
    /// First retry delay in milliseconds (default: 100).
    pub initial_backoff_ms: u64,
    /// Upper bound for the retry delay in milliseconds (default: 2000).
    pub max_backoff_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            max_attempts: 10,
            initial_backoff_ms: 100,
            max_backoff_ms: 2_000,
        }
    }
}

impl StoreConfig {
    /// Returns the busy timeout as a Duration.
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

/// Version control settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VcsConfig {
    /// VCS binary (default: "git").
    pub binary: String,
    /// Per-invocation timeout in seconds (default: 30).
    pub timeout_secs: u64,
    /// Committer name written when the repository is created.
    pub author_name: String,
    /// Committer email written when the repository is created.
    pub author_email: String,
}

impl Default for VcsConfig {
    fn default() -> Self {
        Self {
            binary: "git".to_string(),
            timeout_secs: 30,
            author_name: "Gardener".to_string(),
            author_email: "gardener@localhost".to_string(),
        }
    }
}

impl VcsConfig {
    /// Returns the command timeout as a Duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// How a reconcile run advances `last_reconcile_sha`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PointerUpdate {
    /// Unconditional write; concurrent runs race and the last commit wins.
    #[default]
    LastWriterWins,
    /// Write only if the pointer still holds the value read at the start of the run.
    CompareAndSwap,
}

/// Reconcile behavior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ReconcileConfig {
    /// Pointer update policy (default: last_writer_wins).
    pub pointer_update: PointerUpdate,
}

/// Retention limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetentionConfig {
    /// Processed commits to keep (default: 100).
    pub keep_commits: usize,
    /// Provenance records to keep; unbounded when unset.
    pub keep_provenance: Option<usize>,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            keep_commits: 100,
            keep_provenance: None,
        }
    }
}

/// Ingestion worker limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestConfig {
    /// Largest inbox note accepted, in bytes (default: 100 KiB).
    pub max_note_bytes: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_note_bytes: 100 * 1024,
        }
    }
}
