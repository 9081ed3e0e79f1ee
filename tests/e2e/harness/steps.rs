use std::time::Duration;

use gardener_core::{IngestDecision, MaintenanceConfig, ProvenanceSource};

use super::assertions::Assertion;

/// All possible actions in a test scenario
#[derive(Debug)]
pub enum ScenarioStep {
    // Working tree edits (by hand, outside the system)
    WriteFile {
        path: String,
        content: Vec<u8>,
    },
    DeleteFile {
        path: String,
    },
    RenameFile {
        from: String,
        to: String,
    },

    // Repository operations
    Commit {
        message: String,
    },
    RewriteHistory,

    // System operations
    Reconcile {
        details: bool,
    },
    SubmitNote {
        content: String,
    },
    /// Ingest with a classifier that returns these decisions in order
    Ingest {
        decisions: Vec<IngestDecision>,
    },
    Snapshot {
        message: Option<String>,
    },
    UpdateFileRecord {
        path: String,
    },
    RecordProvenance {
        path: String,
        source: ProvenanceSource,
    },
    Maintain {
        config: MaintenanceConfig,
    },

    // Time control
    Wait {
        duration: Duration,
    },

    // Process lifecycle
    Reopen,

    // Assertions (can be interspersed)
    Assert {
        assertion: Assertion,
    },
}
