//! Edit provenance: who changed a file, and how to recover that from commit text.
//!
//! Every mutation the system knows about is attributed to a [`ProvenanceSource`].
//! Commit messages carry the same tag as a prefix, so attribution survives the
//! loss of the state store:
//!
//! | Source | Stored tag | Commit message |
//! |---|---|---|
//! | organizer | `organizer` | `Gardener: <action>` |
//! | human | `manual` | `Manual: <action>` |
//! | tool | `external:<tool>` | `External[<tool>]: <action>` |
//!
//! ```
//! use gardener_core::{format_commit_message, parse_commit_source, ProvenanceSource};
//!
//! let msg = format_commit_message(&ProvenanceSource::Manual, "did X");
//! assert_eq!(msg, "Manual: did X");
//! assert_eq!(parse_commit_source(&msg), Some(ProvenanceSource::Manual));
//! ```

use crate::error::{GardenerError, Result as GardenerResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path};
use std::str::FromStr;

const ORGANIZER_PREFIX: &str = "Gardener:";
const MANUAL_PREFIX: &str = "Manual:";
const EXTERNAL_OPEN: &str = "External[";
const EXTERNAL_CLOSE: &str = "]:";

/// Actor responsible for a file mutation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ProvenanceSource {
    /// The automated organizer (ingestion worker).
    Organizer,
    /// A human editing files directly.
    Manual,
    /// A named outside tool.
    External(String),
}

impl ProvenanceSource {
    /// An outside tool, rejecting names its stored tag could not carry.
    pub fn external(tool: impl Into<String>) -> GardenerResult<Self> {
        let source = Self::External(tool.into());
        source.validate()?;
        Ok(source)
    }

    /// Checks that the stored tag parses back to this source.
    pub fn validate(&self) -> GardenerResult<()> {
        match self {
            Self::External(tool) if !valid_tool_name(tool) => {
                Err(GardenerError::InvalidSource(format!(
                    "external tool name {:?} must be non-empty and free of ']' and newlines",
                    tool
                )))
            }
            _ => Ok(()),
        }
    }

    /// Returns the stored tag.
    pub fn tag(&self) -> String {
        match self {
            Self::Organizer => "organizer".to_string(),
            Self::Manual => "manual".to_string(),
            Self::External(tool) => format!("external:{}", tool),
        }
    }
}

impl fmt::Display for ProvenanceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag())
    }
}

impl FromStr for ProvenanceSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            // "gardener" is the tag older stores used for the organizer.
            "organizer" | "gardener" => Ok(Self::Organizer),
            "manual" => Ok(Self::Manual),
            other => match other.strip_prefix("external:") {
                Some(tool) if valid_tool_name(tool) => Ok(Self::External(tool.to_string())),
                Some(tool) => Err(format!("invalid external tool name: {:?}", tool)),
                None => Err(format!("unknown provenance source: {}", other)),
            },
        }
    }
}

impl From<ProvenanceSource> for String {
    fn from(source: ProvenanceSource) -> Self {
        source.tag()
    }
}

impl TryFrom<String> for ProvenanceSource {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

fn valid_tool_name(tool: &str) -> bool {
    !tool.trim().is_empty() && !tool.contains(']') && !tool.contains('\n')
}

/// Formats a commit message carrying the source tag.
pub fn format_commit_message(source: &ProvenanceSource, action: &str) -> String {
    match source {
        ProvenanceSource::Organizer => format!("{} {}", ORGANIZER_PREFIX, action),
        ProvenanceSource::Manual => format!("{} {}", MANUAL_PREFIX, action),
        ProvenanceSource::External(tool) => {
            format!("{}{}{} {}", EXTERNAL_OPEN, tool, EXTERNAL_CLOSE, action)
        }
    }
}

/// Recovers the source tag from a commit message, if it carries one.
pub fn parse_commit_source(message: &str) -> Option<ProvenanceSource> {
    if message.starts_with(ORGANIZER_PREFIX) {
        return Some(ProvenanceSource::Organizer);
    }
    if message.starts_with(MANUAL_PREFIX) {
        return Some(ProvenanceSource::Manual);
    }
    let rest = message.strip_prefix(EXTERNAL_OPEN)?;
    let end = rest.find(EXTERNAL_CLOSE)?;
    let tool = &rest[..end];
    valid_tool_name(tool).then(|| ProvenanceSource::External(tool.to_string()))
}

/// Normalizes a path for storage.
///
/// Paths under `root` become root-relative with `/` separators. Anything else
/// is kept as given.
pub(crate) fn normalize_path(root: &Path, path: &Path) -> String {
    if path.is_absolute() {
        if let Ok(rel) = path.strip_prefix(root) {
            return slash_path(rel);
        }
        if let (Ok(canon_root), Ok(canon_path)) = (root.canonicalize(), path.canonicalize()) {
            if let Ok(rel) = canon_path.strip_prefix(&canon_root) {
                return slash_path(rel);
            }
        }
        return path.to_string_lossy().into_owned();
    }
    slash_path(path)
}

/// Joins normal components with `/`, dropping `.` segments.
pub(crate) fn slash_path(path: &Path) -> String {
    let parts: Vec<String> = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    parts.join("/")
}
