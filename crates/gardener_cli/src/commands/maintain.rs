//! Retention command.

use super::{open, spinner};
use anyhow::Result;
use console::style;
use gardener_core::MaintenanceConfig;
use std::path::Path;

/// Prunes processed commits, provenance and stale file records.
///
/// Unset limits fall back to `[retention]` in the config file.
pub fn run(
    dir: &Path,
    keep_commits: Option<usize>,
    keep_provenance: Option<usize>,
    dry_run: bool,
) -> Result<()> {
    let kb = open(dir)?;

    let mut config = MaintenanceConfig::from(&kb.config().retention);
    if let Some(keep) = keep_commits {
        config.keep_commits = keep;
    }
    if keep_provenance.is_some() {
        config.keep_provenance = keep_provenance;
    }
    config.dry_run = dry_run;

    if dry_run {
        println!(
            "{} Running maintenance in dry-run mode (nothing will be removed)...",
            style("→").cyan()
        );
    }

    let pb = spinner("Pruning state store...")?;
    let report = kb.maintain(&config);
    pb.finish_and_clear();
    let report = report?;

    println!();
    println!("{}", style("Maintenance Report:").bold());
    println!(
        "  Commits pruned:     {} (keeping {})",
        style(report.commits_pruned).cyan(),
        config.keep_commits
    );
    match config.keep_provenance {
        Some(keep) => println!(
            "  Provenance pruned:  {} (keeping {})",
            style(report.provenance_pruned).cyan(),
            keep
        ),
        None => println!("  Provenance pruned:  {} (unbounded)", style(0).cyan()),
    }
    println!(
        "  Stale file records: {}",
        style(report.stale_files.len()).cyan()
    );
    for path in &report.stale_files {
        println!("    {} {}", style("×").red(), path);
    }

    if dry_run && report.total() > 0 {
        println!();
        println!("This was a dry run. To actually prune, run:");
        println!("  {}", style("gardener maintain").cyan());
    } else if !dry_run && report.total() > 0 {
        println!();
        println!("{} Removed {} row(s)", style("✓").green(), report.total());
    }
    Ok(())
}
