//! Drop a note into the inbox.

use super::open;
use anyhow::{bail, Context, Result};
use console::style;
use std::io::{self, Read};
use std::path::Path;

/// Writes `text` (or stdin when `text` is `-`) as a new inbox note.
pub fn run(dir: &Path, text: &str) -> Result<()> {
    let kb = open(dir)?;

    let content = if text == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read note from stdin")?;
        buf
    } else {
        text.to_string()
    };
    if content.trim().is_empty() {
        bail!("Refusing to submit an empty note");
    }

    let path = kb.submit_note(&content)?;
    let shown = path.strip_prefix(kb.root()).unwrap_or(&path);
    println!("{} Submitted {}", style("✓").green(), shown.display());
    Ok(())
}
