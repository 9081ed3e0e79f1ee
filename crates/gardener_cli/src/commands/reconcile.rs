//! Reconcile command.

use super::{open, print_json, short, spinner, zone_summary};
use anyhow::Result;
use console::style;
use gardener_core::ReconcileOptions;
use std::path::Path;

pub fn run(dir: &Path, details: bool, json: bool) -> Result<()> {
    let kb = open(dir)?;

    let pb = spinner("Reconciling...")?;
    let view = kb.reconcile(ReconcileOptions {
        include_details: details,
    });
    pb.finish_and_clear();
    let view = view?;

    if json {
        return print_json(&view);
    }

    println!(
        "{} Run #{}: {} -> {}",
        style("✓").green(),
        view.run.id,
        short(view.run.from_sha.as_deref()),
        short(view.run.to_sha.as_deref())
    );
    println!(
        "  Files changed:   {} ({})",
        style(view.run.files_changed).cyan(),
        zone_summary(&view.run.changes_by_zone)
    );
    if !view.pointer_advanced {
        println!(
            "  {} Another reconcile moved the pointer first; it was left as is",
            style("⚠").yellow()
        );
    }

    if !view.run.tasks.is_empty() {
        println!();
        println!("{}", style("Tasks:").bold());
        for task in &view.run.tasks {
            println!("  {} {}", style("→").cyan(), task);
        }
    }

    if let Some(warning) = &view.uncommitted_warning {
        println!();
        println!("{} {}", style("⚠").yellow(), warning);
    }

    if let Some(range) = &view.skipped_range {
        println!(
            "{} Commits {} were not diffed and will not be revisited",
            style("⚠").yellow(),
            range
        );
    }

    if let Some(changes) = &view.changes {
        println!();
        println!("{}", style("Changes:").bold());
        for change in changes {
            match &change.old_path {
                Some(old) => println!(
                    "  {:<9} {:<8} {} <- {}",
                    change.status.as_str(),
                    change.zone.as_str(),
                    change.path,
                    old
                ),
                None => println!(
                    "  {:<9} {:<8} {}",
                    change.status.as_str(),
                    change.zone.as_str(),
                    change.path
                ),
            }
        }
    }
    Ok(())
}
