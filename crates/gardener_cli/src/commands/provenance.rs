//! Edit provenance lookup.

use super::{open, print_json, short};
use anyhow::{anyhow, Result};
use console::style;
use gardener_core::ProvenanceSource;
use std::path::Path;

pub fn run(
    dir: &Path,
    path: Option<&str>,
    source: Option<&str>,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let kb = open(dir)?;

    let records = match (path, source) {
        (Some(path), _) => kb.provenance_for_path(path, limit)?,
        (None, Some(source)) => {
            let source: ProvenanceSource = source.parse().map_err(|e: String| anyhow!(e))?;
            kb.provenance_by_source(&source, limit)?
        }
        (None, None) => return Err(anyhow!("Pass --path or --source")),
    };

    if json {
        return print_json(&records);
    }

    if records.is_empty() {
        println!("No provenance recorded");
        return Ok(());
    }
    for record in &records {
        println!(
            "{}  {:<20} {}  {}",
            record.recorded_at.format("%Y-%m-%d %H:%M:%S"),
            style(&record.source).cyan(),
            short(record.commit_sha.as_deref()),
            record.path
        );
        if let Some(metadata) = &record.metadata {
            println!("    {}", style(metadata).dim());
        }
    }
    Ok(())
}
