//! In-memory [`Vcs`] for unit tests.

#![allow(dead_code)]

use super::{RawChange, StatusEntry, Vcs, VcsError, VcsResult};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
pub(crate) struct FakeState {
    pub available: bool,
    pub head: Option<String>,
    pub branch: String,
    pub tracked: Vec<String>,
    pub status: Vec<StatusEntry>,
    pub diffs: HashMap<(String, String), Vec<RawChange>>,
    pub oldest: Option<String>,
    /// (ancestor, descendant) pairs.
    pub ancestry: HashSet<(String, String)>,
    pub fail_diff: bool,
    pub commits: Vec<(Vec<String>, String)>,
    next_sha: u32,
}

type Hook = Box<dyn FnOnce() + Send>;

/// Scriptable VCS double.
pub(crate) struct FakeVcs {
    state: Mutex<FakeState>,
    on_head: Mutex<Option<Hook>>,
}

impl std::fmt::Debug for FakeVcs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeVcs").field("state", &self.state).finish_non_exhaustive()
    }
}

impl FakeVcs {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                available: true,
                branch: "main".to_string(),
                ..FakeState::default()
            }),
            on_head: Mutex::new(None),
        }
    }

    pub fn unavailable() -> Self {
        let fake = Self::new();
        fake.state().available = false;
        fake
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn set_head(&self, sha: &str) {
        self.state().head = Some(sha.to_string());
    }

    pub fn set_oldest(&self, sha: &str) {
        self.state().oldest = Some(sha.to_string());
    }

    pub fn set_tracked(&self, paths: &[&str]) {
        self.state().tracked = paths.iter().map(|p| p.to_string()).collect();
    }

    pub fn set_diff(&self, from: &str, to: &str, changes: Vec<RawChange>) {
        self.state()
            .diffs
            .insert((from.to_string(), to.to_string()), changes);
    }

    pub fn set_ancestor(&self, ancestor: &str, descendant: &str) {
        self.state()
            .ancestry
            .insert((ancestor.to_string(), descendant.to_string()));
    }

    /// Runs `hook` once, the next time `head` is read.
    pub fn on_next_head(&self, hook: impl FnOnce() + Send + 'static) {
        *self.on_head.lock().unwrap_or_else(|p| p.into_inner()) = Some(Box::new(hook));
    }

    fn check(&self) -> VcsResult<()> {
        if self.state().available {
            Ok(())
        } else {
            Err(VcsError::Unavailable("fake".to_string()))
        }
    }

    fn record_commit(&self, paths: Vec<String>, message: &str) -> Option<String> {
        let mut state = self.state();
        state.next_sha += 1;
        let sha = format!("fake{:04}", state.next_sha);
        state.commits.push((paths, message.to_string()));
        state.head = Some(sha.clone());
        state.status.clear();
        Some(sha)
    }
}

impl Vcs for FakeVcs {
    fn is_available(&self) -> bool {
        self.state().available
    }

    fn is_repository(&self) -> bool {
        self.state().available
    }

    fn head(&self) -> VcsResult<Option<String>> {
        self.check()?;
        let hook = self.on_head.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(hook) = hook {
            hook();
        }
        Ok(self.state().head.clone())
    }

    fn branch(&self) -> VcsResult<String> {
        self.check()?;
        Ok(self.state().branch.clone())
    }

    fn status_entries(&self) -> VcsResult<Vec<StatusEntry>> {
        self.check()?;
        Ok(self.state().status.clone())
    }

    fn diff(&self, from: &str, to: &str) -> VcsResult<Vec<RawChange>> {
        self.check()?;
        let state = self.state();
        if state.fail_diff {
            return Err(VcsError::Failed {
                command: format!("git diff {} {}", from, to),
                code: Some(128),
                stderr: "bad revision".to_string(),
            });
        }
        Ok(state
            .diffs
            .get(&(from.to_string(), to.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    fn tracked_paths(&self) -> VcsResult<Vec<String>> {
        self.check()?;
        Ok(self.state().tracked.clone())
    }

    fn oldest_ancestor(&self) -> VcsResult<Option<String>> {
        self.check()?;
        Ok(self.state().oldest.clone())
    }

    fn is_ancestor(&self, ancestor: &str, descendant: &str) -> VcsResult<bool> {
        self.check()?;
        Ok(self
            .state()
            .ancestry
            .contains(&(ancestor.to_string(), descendant.to_string())))
    }

    fn init_repository(&self) -> VcsResult<()> {
        self.check()
    }

    fn commit_paths(&self, paths: &[String], message: &str) -> VcsResult<Option<String>> {
        self.check()?;
        Ok(self.record_commit(paths.to_vec(), message))
    }

    fn commit_all(&self, message: &str) -> VcsResult<Option<String>> {
        self.check()?;
        let paths = self
            .state()
            .status
            .iter()
            .map(|entry| entry.path.clone())
            .collect::<Vec<_>>();
        if paths.is_empty() {
            return Ok(None);
        }
        Ok(self.record_commit(paths, message))
    }
}
