use anyhow::Result;
use gardener_core::{ChangedFile, KnowledgeBase, ProvenanceSource, Zone};

/// Declarative assertions on knowledge base state
pub enum Assertion {
    // Last reconcile run
    RunFilesChanged(usize),
    RunFromNull,
    RunFromPreviousRun,
    RunZoneCount {
        zone: Zone,
        count: usize,
    },
    RunIdentityValid(bool),
    TasksEqual(Vec<String>),
    FirstTask(String),
    TasksWithPrefix {
        prefix: String,
        count: usize,
    },
    ChangesEqual(Vec<ChangedFile>),
    UncommittedFiles(usize),
    RunCount(usize),

    // Pointer
    PointerAtHead,
    ProcessedAtHead,

    // Full scans
    FullScanStable,

    // Repository
    CommitCount(usize),
    HeadMessageContains(String),

    // Files
    FileContains {
        path: String,
        content: String,
    },
    FileExists(String),
    FileMissing(String),
    InboxEmpty,

    // State store
    FileRecordExists(String),
    NoFileRecord(String),
    ProvenanceCount {
        path: String,
        source: Option<ProvenanceSource>,
        count: usize,
    },
    ProcessedCommitCount(usize),
    StoreHealthy,

    // Ingestion and snapshots
    IngestOutcomes {
        succeeded: usize,
        failed: usize,
    },
    IngestRedirected(usize),
    SnapshotCommitted(bool),

    // Custom
    Custom(Box<dyn Fn(&KnowledgeBase) -> Result<()> + Send + Sync>),
}

impl std::fmt::Debug for Assertion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RunFilesChanged(n) => write!(f, "RunFilesChanged({})", n),
            Self::RunFromNull => write!(f, "RunFromNull"),
            Self::RunFromPreviousRun => write!(f, "RunFromPreviousRun"),
            Self::RunZoneCount { zone, count } => {
                write!(f, "RunZoneCount {{ zone: {}, count: {} }}", zone, count)
            }
            Self::RunIdentityValid(v) => write!(f, "RunIdentityValid({})", v),
            Self::TasksEqual(tasks) => write!(f, "TasksEqual({:?})", tasks),
            Self::FirstTask(s) => write!(f, "FirstTask({:?})", s),
            Self::TasksWithPrefix { prefix, count } => {
                write!(f, "TasksWithPrefix {{ prefix: {:?}, count: {} }}", prefix, count)
            }
            Self::ChangesEqual(changes) => write!(f, "ChangesEqual({:?})", changes),
            Self::UncommittedFiles(n) => write!(f, "UncommittedFiles({})", n),
            Self::RunCount(n) => write!(f, "RunCount({})", n),
            Self::PointerAtHead => write!(f, "PointerAtHead"),
            Self::ProcessedAtHead => write!(f, "ProcessedAtHead"),
            Self::FullScanStable => write!(f, "FullScanStable"),
            Self::CommitCount(n) => write!(f, "CommitCount({})", n),
            Self::HeadMessageContains(s) => write!(f, "HeadMessageContains({:?})", s),
            Self::FileContains { path, content } => {
                write!(f, "FileContains {{ path: {:?}, content: {:?} }}", path, content)
            }
            Self::FileExists(p) => write!(f, "FileExists({:?})", p),
            Self::FileMissing(p) => write!(f, "FileMissing({:?})", p),
            Self::InboxEmpty => write!(f, "InboxEmpty"),
            Self::FileRecordExists(p) => write!(f, "FileRecordExists({:?})", p),
            Self::NoFileRecord(p) => write!(f, "NoFileRecord({:?})", p),
            Self::ProvenanceCount {
                path,
                source,
                count,
            } => write!(
                f,
                "ProvenanceCount {{ path: {:?}, source: {:?}, count: {} }}",
                path, source, count
            ),
            Self::ProcessedCommitCount(n) => write!(f, "ProcessedCommitCount({})", n),
            Self::StoreHealthy => write!(f, "StoreHealthy"),
            Self::IngestOutcomes { succeeded, failed } => write!(
                f,
                "IngestOutcomes {{ succeeded: {}, failed: {} }}",
                succeeded, failed
            ),
            Self::IngestRedirected(n) => write!(f, "IngestRedirected({})", n),
            Self::SnapshotCommitted(v) => write!(f, "SnapshotCommitted({})", v),
            Self::Custom(_) => write!(f, "Custom(<fn>)"),
        }
    }
}
