//! State store verification command.

use super::{open, print_json, spinner};
use anyhow::Result;
use console::style;
use std::path::Path;

/// Verify state store integrity.
pub fn run(dir: &Path, json: bool) -> Result<()> {
    let kb = open(dir)?;

    let pb = spinner("Verifying state store...")?;
    let report = kb.verify();
    pb.finish_and_clear();
    let report = report?;

    if json {
        return print_json(&report);
    }

    println!();
    println!("{}", style("Verification Report:").bold());
    println!(
        "  Schema version:     {} (expected {})",
        report
            .schema_version
            .map(|v| v.to_string())
            .unwrap_or_else(|| "missing".to_string()),
        report.expected_schema_version
    );
    println!("  Pointer rows:       {}", style(report.pointer_rows).cyan());
    if !report.integrity_errors.is_empty() {
        println!(
            "  Integrity errors:   {}",
            style(report.integrity_errors.len()).red()
        );
        for line in &report.integrity_errors {
            println!("    {} {}", style("×").red(), line);
        }
    }
    if !report.unreadable_runs.is_empty() {
        println!(
            "  Unreadable runs:    {}",
            style(report.unreadable_runs.len()).yellow()
        );
        for id in &report.unreadable_runs {
            println!("    {} run #{}", style("⚠").yellow(), id);
        }
    }

    println!();
    if report.has_issues() {
        println!("{}", style(&report.summary()).yellow().bold());
        println!();
        println!("{}", style("Recommendations:").bold());
        println!(
            "  {} The store is never repaired automatically; back up .gardener/state.db first",
            style("→").cyan()
        );
        if report.schema_version != Some(report.expected_schema_version) {
            println!(
                "  {} Move the store aside and re-run {} to rebuild bookkeeping",
                style("→").cyan(),
                style("gardener reconcile").cyan()
            );
        }
    } else {
        println!("{} {}", style("✓").green(), style(&report.summary()).green());
    }
    Ok(())
}
