//! Inbox ingestion.
//!
//! Each pass scans the inbox, asks a [`NoteClassifier`] where every note
//! belongs, writes the result into the atlas (or the tasks file), commits,
//! removes the original and records provenance. Passes are serialized by
//! [`SingleFlight`].

use crate::config::Config;
use crate::error::{GardenerError, Result};
use crate::file_state;
use crate::provenance::{format_commit_message, ProvenanceSource};
use crate::store::StateStore;
use crate::types::Zone;
use crate::vcs::Vcs;
use crate::zone::{resolve_lenient, ZoneMap};
use chrono::{DateTime, Local, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Name of the cross-process lock file inside the state directory.
pub const INGEST_LOCK_FILE: &str = "ingest.lock";

const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// What the classifier wants done with a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestAction {
    /// Write a new atlas file.
    Create,
    /// Append to an existing (or new) atlas file.
    Append,
    /// Park the note in the tasks file for a human.
    Task,
}

impl IngestAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestAction::Create => "create",
            IngestAction::Append => "append",
            IngestAction::Task => "task",
        }
    }
}

/// A classifier's decision for one note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestDecision {
    pub action: IngestAction,
    /// Destination relative to the atlas root. Ignored for `task`.
    #[serde(default)]
    pub path: String,
    pub content: String,
    #[serde(default)]
    pub reasoning: String,
}

impl IngestDecision {
    /// Parses a decision from free-form classifier output.
    ///
    /// Accepts bare JSON, JSON inside a fenced code block, or JSON embedded
    /// in surrounding prose.
    pub fn parse(response: &str) -> Result<Self> {
        let json = extract_json(response);
        serde_json::from_str(json).map_err(|err| {
            GardenerError::Classifier(format!("unparseable decision: {}", err))
        })
    }
}

fn extract_json(response: &str) -> &str {
    let text = response.trim();
    if let Some(start) = text.find("```") {
        let after = &text[start + 3..];
        let body = after.strip_prefix("json").unwrap_or(after);
        if let Some(end) = body.find("```") {
            return body[..end].trim();
        }
    }
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

/// The opaque function deciding where a note goes.
pub trait NoteClassifier {
    fn classify(&self, note: &str, filename: &str, context: &str) -> Result<IngestDecision>;
}

impl<F> NoteClassifier for F
where
    F: Fn(&str, &str, &str) -> Result<IngestDecision>,
{
    fn classify(&self, note: &str, filename: &str, context: &str) -> Result<IngestDecision> {
        self(note, filename, context)
    }
}

/// Result of processing one inbox note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestOutcome {
    /// Inbox file name.
    pub file: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<IngestAction>,
    /// Data-dir-relative path that received the content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Set when an invalid destination was redirected to the tasks file.
    #[serde(default)]
    pub redirected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set when the note was moved but its state could not be recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl IngestOutcome {
    fn failed(file: &str, err: &GardenerError) -> Self {
        Self {
            file: file.to_string(),
            success: false,
            action: None,
            target: None,
            redirected: false,
            commit: None,
            error: Some(err.to_string()),
            warning: None,
        }
    }
}

/// Serializes ingestion passes within a process and across processes.
///
/// A second caller blocks until the running pass finishes; it never skips.
#[derive(Debug)]
pub struct SingleFlight {
    gate: Mutex<()>,
    lock_path: PathBuf,
}

/// Held for the duration of one pass.
#[derive(Debug)]
pub struct FlightGuard<'a> {
    file: File,
    _gate: MutexGuard<'a, ()>,
}

impl SingleFlight {
    pub fn new(lock_path: impl Into<PathBuf>) -> Self {
        Self {
            gate: Mutex::new(()),
            lock_path: lock_path.into(),
        }
    }

    /// Blocks until this caller owns the pass.
    pub fn enter(&self) -> Result<FlightGuard<'_>> {
        let gate = match self.gate.try_lock() {
            Ok(gate) => gate,
            Err(TryLockError::WouldBlock) => {
                info!("ingestion already in progress; waiting");
                self.gate.lock().unwrap_or_else(PoisonError::into_inner)
            }
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        if let Some(parent) = self.lock_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&self.lock_path)?;
        if file.try_lock_exclusive().is_err() {
            info!(path = %self.lock_path.display(), "ingestion running in another process; waiting");
            file.lock_exclusive()?;
        }

        Ok(FlightGuard { file, _gate: gate })
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Checks a classifier-supplied destination and resolves it under `atlas_root`.
///
/// Rejects empty paths, null bytes, absolute paths, `..` segments, and
/// anything that resolves outside the atlas (for example through a symlink).
pub fn validate_destination(atlas_root: &Path, path: &str) -> Result<PathBuf> {
    let reject = |reason: &str| GardenerError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    let cleaned = path.trim();
    if cleaned.is_empty() {
        return Err(reject("empty path"));
    }
    if cleaned.contains('\0') {
        return Err(reject("null byte in path"));
    }
    let candidate = Path::new(cleaned);
    if candidate.is_absolute() || candidate.has_root() {
        return Err(reject("absolute paths are not allowed"));
    }
    if candidate
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
    {
        return Err(reject("path traversal is not allowed"));
    }

    let root = resolve_lenient(atlas_root).ok_or_else(|| reject("atlas root cannot be resolved"))?;
    let target = resolve_lenient(&root.join(candidate))
        .ok_or_else(|| reject("path cannot be resolved"))?;
    if !target.starts_with(&root) || target == root {
        return Err(reject("path escapes atlas root"));
    }
    Ok(target)
}

/// Writes `content` as a new inbox note and returns its path.
pub fn submit_note(
    zones: &ZoneMap,
    config: &Config,
    now: DateTime<Utc>,
    content: &str,
) -> Result<PathBuf> {
    let size = content.len() as u64;
    if size > config.ingest.max_note_bytes {
        return Err(GardenerError::NoteTooLarge {
            size,
            limit: config.ingest.max_note_bytes,
        });
    }
    let inbox = inbox_root(zones)?;
    fs::create_dir_all(&inbox)?;

    let id = Uuid::new_v4().simple().to_string();
    let name = format!(
        "{}-{}.md",
        now.with_timezone(&Local).format("%Y-%m-%d_%H%M"),
        &id[..8]
    );
    let path = inbox.join(name);
    fs::write(&path, content)?;
    info!(path = %path.display(), "note submitted to inbox");
    Ok(path)
}

fn inbox_root(zones: &ZoneMap) -> Result<PathBuf> {
    zones
        .root_of(Zone::Inbox)
        .map(Path::to_path_buf)
        .ok_or_else(|| GardenerError::Config("inbox zone is not configured".to_string()))
}

/// One ingestion pass over the inbox.
pub(crate) struct Ingestor<'a> {
    pub store: &'a StateStore,
    pub vcs: &'a dyn Vcs,
    pub zones: &'a ZoneMap,
    pub config: &'a Config,
}

impl Ingestor<'_> {
    /// Processes every `*.md` directly under the inbox, in name order.
    ///
    /// The caller must hold the [`SingleFlight`] guard.
    pub fn run(&self, classifier: &dyn NoteClassifier) -> Result<Vec<IngestOutcome>> {
        let inbox = inbox_root(self.zones)?;
        if !inbox.is_dir() {
            debug!(path = %inbox.display(), "inbox does not exist");
            return Ok(Vec::new());
        }

        self.ensure_repository();
        let notes = self.inbox_notes(&inbox)?;
        if notes.is_empty() {
            return Ok(Vec::new());
        }

        let context = self.read_context();
        let branch = self.vcs.branch().unwrap_or_else(|_| "unknown".to_string());
        let mut outcomes = Vec::with_capacity(notes.len());
        for note in notes {
            let name = note
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            info!(file = %name, "processing inbox note");
            match self.process_note(&note, &name, classifier, &context, &branch) {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => {
                    error!(file = %name, error = %err, "failed to process inbox note");
                    outcomes.push(IngestOutcome::failed(&name, &err));
                }
            }
        }
        Ok(outcomes)
    }

    fn ensure_repository(&self) {
        if !self.vcs.is_available() {
            warn!("version control unavailable; ingesting without commits");
            return;
        }
        if self.vcs.is_repository() {
            return;
        }
        match self.vcs.init_repository() {
            Ok(()) => info!("initialized repository in data directory"),
            Err(err) => warn!(error = %err, "failed to initialize repository"),
        }
    }

    fn inbox_notes(&self, inbox: &Path) -> Result<Vec<PathBuf>> {
        let mut notes = Vec::new();
        for entry in fs::read_dir(inbox)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "md") {
                notes.push(path);
            }
        }
        notes.sort();
        Ok(notes)
    }

    fn read_context(&self) -> String {
        let root = self.zones.data_dir();
        let sections = [
            ("# System Context", &self.config.files.agents),
            ("# Classification Rules", &self.config.files.rules),
        ];
        sections
            .iter()
            .filter_map(|(header, file)| {
                fs::read_to_string(root.join(file))
                    .ok()
                    .map(|text| format!("{}\n{}", header, text))
            })
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR)
    }

    fn process_note(
        &self,
        note: &Path,
        name: &str,
        classifier: &dyn NoteClassifier,
        context: &str,
        branch: &str,
    ) -> Result<IngestOutcome> {
        let size = note.metadata()?.len();
        let limit = self.config.ingest.max_note_bytes;
        if size > limit {
            return Err(GardenerError::NoteTooLarge { size, limit });
        }
        let content = fs::read_to_string(note)?;
        let decision = classifier.classify(&content, name, context)?;
        debug!(
            file = %name,
            action = decision.action.as_str(),
            path = %decision.path,
            reasoning = %decision.reasoning,
            "classifier decision"
        );

        let (target, redirected) = self.execute(&decision)?;
        let target_rel = self.relative(&target)?;
        let note_rel = self.relative(note)?;

        let processed = self.commit(
            &[target_rel.clone()],
            &format_commit_message(&ProvenanceSource::Organizer, &format!("Processed {}", name)),
        );
        fs::remove_file(note)?;
        let removed = self.commit(
            &[note_rel.clone()],
            &format_commit_message(
                &ProvenanceSource::Organizer,
                &format!("Removed {} from inbox", name),
            ),
        );

        // The note is gone from here on, so bookkeeping failures only warn.
        let last_commit = removed.or_else(|| processed.clone());
        let recorded = self
            .record_ingest(&target, &note_rel, name, decision.action, processed.as_deref())
            .and_then(|()| match last_commit.as_deref() {
                Some(sha) => self
                    .store
                    .record_processed_commit(sha, branch, Some(&format!("Processed {}", name))),
                None => Ok(()),
            });
        let warning = recorded.err().map(|err| {
            warn!(file = %name, error = %err, "note ingested but its state was not fully recorded");
            format!("state not fully recorded: {}", err)
        });

        info!(file = %name, target = %target_rel, redirected, "inbox note ingested");
        Ok(IngestOutcome {
            file: name.to_string(),
            success: true,
            action: Some(decision.action),
            target: Some(target_rel),
            redirected,
            commit: last_commit,
            error: None,
            warning,
        })
    }

    /// File records and provenance for one ingested note.
    fn record_ingest(
        &self,
        target: &Path,
        note_rel: &str,
        name: &str,
        action: IngestAction,
        processed: Option<&str>,
    ) -> Result<()> {
        let target_rel = self.relative(target)?;
        file_state::update_file_record(self.store, self.zones, target)?;
        self.store.remove_file_record(note_rel)?;

        let metadata = serde_json::json!({
            "action": action.as_str(),
            "source_file": name,
        });
        self.store.append_provenance(
            &target_rel,
            &ProvenanceSource::Organizer,
            processed,
            Some(&metadata),
        )?;
        Ok(())
    }

    /// Performs the file operation. Returns the written path and whether the
    /// decision was redirected to the tasks file.
    fn execute(&self, decision: &IngestDecision) -> Result<(PathBuf, bool)> {
        if decision.action == IngestAction::Task {
            return Ok((self.append_task(&decision.content, &decision.reasoning)?, false));
        }

        let atlas = self
            .zones
            .root_of(Zone::Atlas)
            .ok_or_else(|| GardenerError::Config("atlas zone is not configured".to_string()))?;
        let target = match validate_destination(atlas, &decision.path) {
            Ok(target) => target,
            Err(err) => {
                warn!(path = %decision.path, error = %err, "invalid destination; redirecting to tasks");
                let reasoning = format!("Invalid path '{}': {}", decision.path, decision.reasoning);
                return Ok((self.append_task(&decision.content, &reasoning)?, true));
            }
        };

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        if decision.action == IngestAction::Append {
            let mut file = OpenOptions::new().create(true).append(true).open(&target)?;
            write!(
                file,
                "\n\n---\n## Update {}\n{}",
                self.timestamp(),
                decision.content
            )?;
        } else {
            fs::write(&target, &decision.content)?;
        }
        Ok((target, false))
    }

    fn append_task(&self, content: &str, reasoning: &str) -> Result<PathBuf> {
        let path = self.zones.data_dir().join(&self.config.files.tasks);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        write!(
            file,
            "\n\n## Unsorted Note {}\n{}\n\n> Gardener Query: {}\n",
            self.timestamp(),
            content,
            reasoning
        )?;
        Ok(path)
    }

    fn commit(&self, paths: &[String], message: &str) -> Option<String> {
        if !self.vcs.is_available() {
            return None;
        }
        match self.vcs.commit_paths(paths, message) {
            Ok(sha) => sha,
            Err(err) => {
                warn!(error = %err, message, "commit failed");
                None
            }
        }
    }

    fn relative(&self, path: &Path) -> Result<String> {
        self.zones
            .relative(path)
            .ok_or_else(|| GardenerError::InvalidPath {
                path: path.display().to_string(),
                reason: "outside the data directory".to_string(),
            })
    }

    fn timestamp(&self) -> String {
        self.store
            .now()
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M")
            .to_string()
    }
}
