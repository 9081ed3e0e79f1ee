//! `git` subprocess implementation of [`Vcs`].
//!
//! # Example
//!
//! ```no_run
//! use gardener_core::{GitCli, Vcs, VcsConfig};
//!
//! let git = GitCli::new("/srv/kb", &VcsConfig::default());
//! if let Ok(Some(head)) = git.head() {
//!     println!("head is {}", head);
//! }
//! ```

use super::{
    parse_name_status, parse_status_z, split_nul, RawChange, StatusEntry, Vcs, VcsError, VcsResult,
};
use crate::config::VcsConfig;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Runs `git -C <root> ...` with a per-call deadline.
#[derive(Debug, Clone)]
pub struct GitCli {
    root: PathBuf,
    binary: String,
    timeout: Duration,
    author_name: String,
    author_email: String,
}

/// Captured result of one invocation.
struct Captured {
    status: ExitStatus,
    stdout: String,
    stderr: String,
}

impl GitCli {
    /// Creates an adapter for the repository at `root`.
    pub fn new(root: impl AsRef<Path>, config: &VcsConfig) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            binary: config.binary.clone(),
            timeout: config.timeout(),
            author_name: config.author_name.clone(),
            author_email: config.author_email.clone(),
        }
    }

    fn describe(args: &[&str]) -> String {
        format!("git {}", args.join(" "))
    }

    /// Runs a command and returns its output whatever the exit code.
    fn run(&self, args: &[&str]) -> VcsResult<Captured> {
        let command = Self::describe(args);
        let mut child = Command::new(&self.binary)
            .arg("-C")
            .arg(&self.root)
            .args(["-c", "core.quotepath=off"])
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                    VcsError::Unavailable(format!("{}: {}", self.binary, e))
                }
                _ => VcsError::Io(e.to_string()),
            })?;

        // Drain both pipes on their own threads so a chatty child never blocks.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = self.wait_with_deadline(&mut child, &command)?;
        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();

        debug!(command = %command, code = ?status.code(), "git finished");
        Ok(Captured {
            status,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
        })
    }

    fn wait_with_deadline(&self, child: &mut Child, command: &str) -> VcsResult<ExitStatus> {
        let deadline = Instant::now() + self.timeout;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    warn!(command = %command, timeout = ?self.timeout, "git timed out");
                    return Err(VcsError::TimedOut {
                        command: command.to_string(),
                        timeout: self.timeout,
                    });
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => return Err(VcsError::Io(e.to_string())),
            }
        }
    }

    /// Runs a command that must succeed and returns its stdout.
    fn run_ok(&self, args: &[&str]) -> VcsResult<String> {
        let out = self.run(args)?;
        if out.status.success() {
            Ok(out.stdout)
        } else {
            let err = VcsError::Failed {
                command: Self::describe(args),
                code: out.status.code(),
                stderr: out.stderr,
            };
            warn!(error = %err, "git command failed");
            Err(err)
        }
    }

    fn has_staged_changes(&self) -> VcsResult<bool> {
        let args = ["diff", "--cached", "--quiet"];
        let out = self.run(&args)?;
        match out.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            code => Err(VcsError::Failed {
                command: Self::describe(&args),
                code,
                stderr: out.stderr,
            }),
        }
    }

    fn commit_staged(&self, message: &str) -> VcsResult<Option<String>> {
        if !self.has_staged_changes()? {
            debug!("nothing staged; skipping commit");
            return Ok(None);
        }
        self.run_ok(&["commit", "-q", "-m", message])?;
        self.head()
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

fn non_empty_lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

impl Vcs for GitCli {
    fn is_available(&self) -> bool {
        self.run(&["--version"])
            .map(|out| out.status.success())
            .unwrap_or(false)
    }

    fn is_repository(&self) -> bool {
        self.root.join(".git").exists()
    }

    fn head(&self) -> VcsResult<Option<String>> {
        let args = ["rev-parse", "--verify", "--quiet", "HEAD"];
        let out = self.run(&args)?;
        if out.status.success() {
            let sha = out.stdout.trim();
            return Ok((!sha.is_empty()).then(|| sha.to_string()));
        }
        // Exit 1 with no diagnostics: the repository exists but has no commits.
        if out.status.code() == Some(1) && out.stderr.is_empty() {
            return Ok(None);
        }
        Err(VcsError::Failed {
            command: Self::describe(&args),
            code: out.status.code(),
            stderr: out.stderr,
        })
    }

    fn branch(&self) -> VcsResult<String> {
        let out = self.run_ok(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        Ok(out.trim().to_string())
    }

    fn status_entries(&self) -> VcsResult<Vec<StatusEntry>> {
        let out = self.run_ok(&["status", "--porcelain", "-z", "--untracked-files=all"])?;
        Ok(parse_status_z(&out))
    }

    fn diff(&self, from: &str, to: &str) -> VcsResult<Vec<RawChange>> {
        let out = self.run_ok(&["diff", "--name-status", "-z", "-M", from, to])?;
        Ok(parse_name_status(&out))
    }

    fn tracked_paths(&self) -> VcsResult<Vec<String>> {
        let out = self.run_ok(&["ls-files", "-z"])?;
        Ok(split_nul(&out))
    }

    fn oldest_ancestor(&self) -> VcsResult<Option<String>> {
        if self.head()?.is_none() {
            return Ok(None);
        }
        let out = self.run_ok(&["rev-list", "--max-parents=0", "HEAD"])?;
        // rev-list lists newest first; the last root is the oldest.
        Ok(non_empty_lines(&out).pop())
    }

    fn is_ancestor(&self, ancestor: &str, descendant: &str) -> VcsResult<bool> {
        let args = ["merge-base", "--is-ancestor", ancestor, descendant];
        let out = self.run(&args)?;
        match out.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            code => Err(VcsError::Failed {
                command: Self::describe(&args),
                code,
                stderr: out.stderr,
            }),
        }
    }

    fn init_repository(&self) -> VcsResult<()> {
        if self.is_repository() {
            return Ok(());
        }
        self.run_ok(&["init", "-q"])?;
        self.run_ok(&["config", "user.name", &self.author_name])?;
        self.run_ok(&["config", "user.email", &self.author_email])?;
        debug!(root = %self.root.display(), "initialized git repository");
        Ok(())
    }

    fn commit_paths(&self, paths: &[String], message: &str) -> VcsResult<Option<String>> {
        // A deleted path that was never tracked would fail the pathspec match.
        let mut stageable = Vec::with_capacity(paths.len());
        for path in paths {
            if self.root.join(path).exists()
                || !self.run_ok(&["ls-files", "--", path])?.trim().is_empty()
            {
                stageable.push(path.as_str());
            }
        }
        if stageable.is_empty() {
            return Ok(None);
        }
        let mut args = vec!["add", "-A", "--"];
        args.extend(stageable);
        self.run_ok(&args)?;
        self.commit_staged(message)
    }

    fn commit_all(&self, message: &str) -> VcsResult<Option<String>> {
        self.run_ok(&["add", "-A"])?;
        self.commit_staged(message)
    }
}
