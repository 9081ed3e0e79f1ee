//! Initialize a new knowledge base.

use anyhow::{Context, Result};
use console::style;
use gardener_core::KnowledgeBase;
use std::path::Path;

/// Creates the zone layout, the state directory and, if git is present, a repository.
pub fn run(dir: &Path) -> Result<()> {
    let kb = KnowledgeBase::init(dir).context("Failed to initialize knowledge base")?;
    let zones = &kb.config().zones;

    println!("Initialized knowledge base in {}", dir.display());
    println!();
    println!("Directory structure:");
    println!("  {:<22}- New notes waiting for ingestion", format!("{}/", zones.inbox));
    println!("  {:<22}- Processed notes", format!("{}/", zones.archive));
    println!("  {:<22}- Organized knowledge", format!("{}/", zones.atlas));
    println!("  {:<22}- Working files", format!("{}/", zones.meta));
    println!("  {:<22}- State store (not versioned)", ".gardener/");
    println!();
    println!("Configuration written to .gardener/config.toml");

    if kb.ensure_repository()? {
        println!("{} Repository ready", style("✓").green());
    } else {
        println!(
            "{} git not found; change detection is disabled until it is installed",
            style("⚠").yellow()
        );
    }
    Ok(())
}
