//! Recent reconcile runs and processed commits.

use super::{open, print_json, short, zone_summary};
use anyhow::Result;
use console::style;
use gardener_core::{ProcessedCommit, ReconcileRun};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct History {
    runs: Vec<ReconcileRun>,
    commits: Vec<ProcessedCommit>,
}

pub fn run(dir: &Path, limit: usize, json: bool) -> Result<()> {
    let kb = open(dir)?;
    let history = History {
        runs: kb.recent_runs(limit)?,
        commits: kb.processed_commits(limit)?,
    };

    if json {
        return print_json(&history);
    }

    println!("{}", style("Reconcile runs:").bold());
    if history.runs.is_empty() {
        println!("  (none)");
    }
    for run in &history.runs {
        println!(
            "  #{:<4} {}  {} -> {}  {} file(s) ({})",
            run.id,
            run.run_at.format("%Y-%m-%d %H:%M"),
            short(run.from_sha.as_deref()),
            short(run.to_sha.as_deref()),
            run.files_changed,
            zone_summary(&run.changes_by_zone)
        );
    }

    println!();
    println!("{}", style("Processed commits:").bold());
    if history.commits.is_empty() {
        println!("  (none)");
    }
    for commit in &history.commits {
        println!(
            "  {}  {}  {:<10} {}",
            commit.processed_at.format("%Y-%m-%d %H:%M"),
            style(short(Some(commit.sha.as_str()))).cyan(),
            commit.branch,
            commit.note.as_deref().unwrap_or("")
        );
    }
    Ok(())
}
