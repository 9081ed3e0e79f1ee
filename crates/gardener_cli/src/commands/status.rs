//! Pointer state and uncommitted work.

use super::{open, print_json, short, zone_summary};
use anyhow::Result;
use console::style;
use std::path::Path;

pub fn run(dir: &Path, json: bool) -> Result<()> {
    let kb = open(dir)?;
    let view = kb.repo_state()?;

    if json {
        return print_json(&view);
    }

    println!("{}", style("Repository:").bold());
    if view.vcs_available {
        println!(
            "  Head:            {} on {}",
            style(short(view.current_head.as_deref())).cyan(),
            view.current_branch
        );
    } else {
        println!("  {}", style("Version control unavailable").yellow());
    }
    if !view.identity_valid {
        println!(
            "  {} History was rewritten since the last run; next reconcile does a full scan",
            style("⚠").yellow()
        );
    }

    println!();
    println!("{}", style("Pointer:").bold());
    println!("  Last seen:       {}", short(view.pointer.last_seen_sha.as_deref()));
    println!(
        "  Last processed:  {}",
        short(view.pointer.last_processed_sha.as_deref())
    );
    println!(
        "  Last reconcile:  {}",
        short(view.pointer.last_reconcile_sha.as_deref())
    );

    if view.dirty_files > 0 {
        println!();
        println!(
            "{} {} uncommitted file(s) ({})",
            style("⚠").yellow(),
            view.dirty_files,
            zone_summary(&view.dirty_by_zone)
        );
        for path in &view.dirty_preview {
            println!("    {}", path);
        }
        if view.dirty_files > view.dirty_preview.len() {
            println!("    ... and {} more", view.dirty_files - view.dirty_preview.len());
        }
    }

    if let Some(run) = &view.last_run {
        println!();
        println!(
            "Last reconcile run #{} at {}: {} file(s) changed",
            run.id,
            run.run_at.format("%Y-%m-%d %H:%M"),
            run.files_changed
        );
    }
    Ok(())
}
