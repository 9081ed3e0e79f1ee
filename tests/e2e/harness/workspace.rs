use anyhow::{anyhow, Context, Result};
use gardener_core::KnowledgeBase;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::process::Command;
use std::sync::OnceLock;
use tempfile::TempDir;

/// Manages an isolated knowledge base directory backed by a real git repository
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    /// Whether a usable `git` binary is on PATH
    pub fn git_available() -> bool {
        static AVAILABLE: OnceLock<bool> = OnceLock::new();
        *AVAILABLE.get_or_init(|| {
            Command::new("git")
                .arg("--version")
                .output()
                .map(|out| out.status.success())
                .unwrap_or(false)
        })
    }

    /// Create an empty workspace
    pub fn empty() -> Result<Self> {
        let dir = TempDir::new().context("Failed to create temp directory")?;
        Ok(Self { dir })
    }

    /// Create workspace with initial files
    pub fn with_files(files: HashMap<String, Vec<u8>>) -> Result<Self> {
        let workspace = Self::empty()?;
        for (path, content) in files {
            workspace.write_file(&path, &content)?;
        }
        Ok(workspace)
    }

    /// Get workspace path
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Initialize the knowledge base and its repository
    pub fn init_kb(&self) -> Result<KnowledgeBase> {
        let kb = KnowledgeBase::init(self.path())?;
        kb.ensure_repository()?;
        Ok(kb)
    }

    /// Open existing knowledge base
    pub fn open_kb(&self) -> Result<KnowledgeBase> {
        Ok(KnowledgeBase::open(self.path())?)
    }

    /// Write file to workspace
    pub fn write_file(&self, path: &str, content: &[u8]) -> Result<()> {
        let full_path = self.path().join(path);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directories for {}", path))?;
        }

        fs::write(&full_path, content)
            .with_context(|| format!("Failed to write file: {}", path))?;

        Ok(())
    }

    /// Read file from workspace
    pub fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.path().join(path);
        fs::read(&full_path).with_context(|| format!("Failed to read file: {}", path))
    }

    pub fn remove_file(&self, path: &str) -> Result<()> {
        fs::remove_file(self.path().join(path))
            .with_context(|| format!("Failed to remove file: {}", path))
    }

    pub fn rename_file(&self, from: &str, to: &str) -> Result<()> {
        let target = self.path().join(to);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(self.path().join(from), target)
            .with_context(|| format!("Failed to rename {} to {}", from, to))
    }

    /// Check if file exists
    pub fn file_exists(&self, path: &str) -> bool {
        self.path().join(path).exists()
    }

    /// Runs git in the workspace and returns trimmed stdout
    pub fn git(&self, args: &[&str]) -> Result<String> {
        let out = Command::new("git")
            .arg("-C")
            .arg(self.path())
            .args(args)
            .output()
            .context("Failed to run git")?;
        if !out.status.success() {
            return Err(anyhow!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&out.stderr).trim()
            ));
        }
        Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
    }

    /// Stages everything and commits, returning the new head
    pub fn commit_all(&self, message: &str) -> Result<String> {
        self.git(&["add", "-A"])?;
        self.git(&["commit", "-q", "-m", message])?;
        self.head()
    }

    pub fn head(&self) -> Result<String> {
        self.git(&["rev-parse", "HEAD"])
    }

    pub fn head_message(&self) -> Result<String> {
        self.git(&["log", "-1", "--format=%s"])
    }

    pub fn commit_count(&self) -> Result<usize> {
        Ok(self.git(&["rev-list", "--count", "HEAD"])?.parse()?)
    }

    /// Replaces history with a single new root commit holding the current tree
    pub fn rewrite_history(&self) -> Result<String> {
        self.git(&["checkout", "-q", "--orphan", "rewritten"])?;
        self.git(&["add", "-A"])?;
        self.git(&["commit", "-q", "-m", "Rewritten history"])?;
        self.head()
    }
}
