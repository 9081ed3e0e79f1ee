//! CLI commands.

pub mod changes;
pub mod history;
pub mod ingest;
pub mod init;
pub mod maintain;
pub mod provenance;
pub mod reconcile;
pub mod snapshot;
pub mod status;
pub mod submit;
pub mod verify;

use anyhow::{Context, Result};
use console::style;
use gardener_core::{KnowledgeBase, ZoneCounts};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

/// Opens the knowledge base at `dir`.
pub fn open(dir: &Path) -> Result<KnowledgeBase> {
    KnowledgeBase::open(dir)
        .with_context(|| format!("Failed to open knowledge base at {}", dir.display()))
}

/// Starts a steady spinner on stderr.
pub fn spinner(message: &'static str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

/// Pretty-prints `value` as JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Abbreviates a commit id for display.
pub fn short(sha: Option<&str>) -> String {
    match sha {
        Some(sha) => sha.chars().take(10).collect(),
        None => style("none").dim().to_string(),
    }
}

/// Renders non-zero zone counts as `atlas 3, inbox 1`.
pub fn zone_summary(counts: &ZoneCounts) -> String {
    let parts: Vec<String> = [
        ("inbox", counts.inbox),
        ("archive", counts.archive),
        ("atlas", counts.atlas),
        ("meta", counts.meta),
        ("root", counts.root),
    ]
    .into_iter()
    .filter(|(_, n)| *n > 0)
    .map(|(name, n)| format!("{} {}", name, n))
    .collect();
    if parts.is_empty() {
        "none".to_string()
    } else {
        parts.join(", ")
    }
}
