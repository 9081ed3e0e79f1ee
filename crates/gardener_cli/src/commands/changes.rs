//! List classified changes.

use super::{open, print_json};
use anyhow::Result;
use console::style;
use gardener_core::ChangeStatus;
use std::path::Path;

pub fn run(dir: &Path, since: Option<&str>, json: bool) -> Result<()> {
    let kb = open(dir)?;
    let changes = kb.changes_since(since);

    if json {
        return print_json(&changes);
    }

    if changes.is_empty() {
        println!("{} No changes", style("✓").green());
        return Ok(());
    }
    for change in &changes {
        let status = match change.status {
            ChangeStatus::Added => style("A").green(),
            ChangeStatus::Deleted => style("D").red(),
            ChangeStatus::Renamed => style("R").cyan(),
            ChangeStatus::Modified => style("M").yellow(),
        };
        match &change.old_path {
            Some(old) => println!("{} [{}] {} <- {}", status, change.zone, change.path, old),
            None => println!("{} [{}] {}", status, change.zone, change.path),
        }
    }
    println!();
    println!("{} change(s)", changes.len());
    Ok(())
}
