//! Commit uncommitted work as a manual edit.

use super::{open, print_json, short};
use anyhow::Result;
use console::style;
use std::path::Path;

pub fn run(dir: &Path, message: Option<&str>, json: bool) -> Result<()> {
    let kb = open(dir)?;
    let report = kb.snapshot(message)?;

    if json {
        return print_json(&report);
    }

    if report.committed {
        println!(
            "{} {} ({})",
            style("✓").green(),
            report.message,
            style(short(report.commit.as_deref())).cyan()
        );
    } else {
        println!("{} {}", style("→").cyan(), report.message);
    }
    Ok(())
}
