use super::assertions::Assertion;
use super::runner::ScenarioRunner;
use super::steps::ScenarioStep;
use super::workspace::TestWorkspace;
use gardener_core::{
    ChangedFile, IngestAction, IngestDecision, MaintenanceConfig, ProvenanceSource, Zone,
};
use std::collections::HashMap;
use std::time::Duration;

/// Fluent DSL for building test scenarios
pub struct Scenario {
    name: String,
    initial_files: HashMap<String, Vec<u8>>,
    steps: Vec<ScenarioStep>,
}

impl Scenario {
    /// Create a new scenario with the given name
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            initial_files: HashMap::new(),
            steps: Vec::new(),
        }
    }

    // ===== Initial setup =====

    /// Add a single file to the data directory before init
    pub fn with_file(mut self, path: &str, content: &[u8]) -> Self {
        self.initial_files
            .insert(path.to_string(), content.to_vec());
        self
    }

    // ===== Working tree edits =====

    /// Someone writes a file by hand
    pub fn write(mut self, path: &str, content: &str) -> Self {
        self.steps.push(ScenarioStep::WriteFile {
            path: path.to_string(),
            content: content.as_bytes().to_vec(),
        });
        self
    }

    pub fn delete(mut self, path: &str) -> Self {
        self.steps.push(ScenarioStep::DeleteFile {
            path: path.to_string(),
        });
        self
    }

    pub fn rename(mut self, from: &str, to: &str) -> Self {
        self.steps.push(ScenarioStep::RenameFile {
            from: from.to_string(),
            to: to.to_string(),
        });
        self
    }

    // ===== Repository operations =====

    /// Commit everything with plain git, outside the system
    pub fn commit(mut self, message: &str) -> Self {
        self.steps.push(ScenarioStep::Commit {
            message: message.to_string(),
        });
        self
    }

    /// Replace history with a new root commit
    pub fn rewrite_history(mut self) -> Self {
        self.steps.push(ScenarioStep::RewriteHistory);
        self
    }

    // ===== System operations =====

    pub fn reconcile(mut self) -> Self {
        self.steps.push(ScenarioStep::Reconcile { details: false });
        self
    }

    /// Reconcile and keep the classified change list
    pub fn reconcile_with_details(mut self) -> Self {
        self.steps.push(ScenarioStep::Reconcile { details: true });
        self
    }

    pub fn submit(mut self, content: &str) -> Self {
        self.steps.push(ScenarioStep::SubmitNote {
            content: content.to_string(),
        });
        self
    }

    /// Ingest the inbox; each note gets the next decision
    pub fn ingest(mut self, decisions: Vec<IngestDecision>) -> Self {
        self.steps.push(ScenarioStep::Ingest { decisions });
        self
    }

    pub fn snapshot(mut self, message: Option<&str>) -> Self {
        self.steps.push(ScenarioStep::Snapshot {
            message: message.map(str::to_string),
        });
        self
    }

    pub fn update_record(mut self, path: &str) -> Self {
        self.steps.push(ScenarioStep::UpdateFileRecord {
            path: path.to_string(),
        });
        self
    }

    pub fn record_provenance(mut self, path: &str, source: ProvenanceSource) -> Self {
        self.steps.push(ScenarioStep::RecordProvenance {
            path: path.to_string(),
            source,
        });
        self
    }

    pub fn maintain(mut self, config: MaintenanceConfig) -> Self {
        self.steps.push(ScenarioStep::Maintain { config });
        self
    }

    // ===== Time and lifecycle =====

    pub fn wait(mut self, duration: Duration) -> Self {
        self.steps.push(ScenarioStep::Wait { duration });
        self
    }

    /// Drop the handle and open the knowledge base again
    pub fn reopen(mut self) -> Self {
        self.steps.push(ScenarioStep::Reopen);
        self
    }

    // ===== Assertions =====

    /// Add a general assertion
    pub fn assert(mut self, assertion: Assertion) -> Self {
        self.steps.push(ScenarioStep::Assert { assertion });
        self
    }

    pub fn assert_files_changed(self, n: usize) -> Self {
        self.assert(Assertion::RunFilesChanged(n))
    }

    pub fn assert_from_null(self) -> Self {
        self.assert(Assertion::RunFromNull)
    }

    pub fn assert_zone_count(self, zone: Zone, count: usize) -> Self {
        self.assert(Assertion::RunZoneCount { zone, count })
    }

    pub fn assert_tasks(self, tasks: &[&str]) -> Self {
        self.assert(Assertion::TasksEqual(
            tasks.iter().map(|t| t.to_string()).collect(),
        ))
    }

    pub fn assert_first_task(self, task: &str) -> Self {
        self.assert(Assertion::FirstTask(task.to_string()))
    }

    pub fn assert_changes(self, changes: Vec<ChangedFile>) -> Self {
        self.assert(Assertion::ChangesEqual(changes))
    }

    pub fn assert_pointer_at_head(self) -> Self {
        self.assert(Assertion::PointerAtHead)
    }

    pub fn assert_head_contains(self, text: &str) -> Self {
        self.assert(Assertion::HeadMessageContains(text.to_string()))
    }

    pub fn assert_file_contains(self, path: &str, content: &str) -> Self {
        self.assert(Assertion::FileContains {
            path: path.to_string(),
            content: content.to_string(),
        })
    }

    pub fn assert_provenance(
        self,
        path: &str,
        source: Option<ProvenanceSource>,
        count: usize,
    ) -> Self {
        self.assert(Assertion::ProvenanceCount {
            path: path.to_string(),
            source,
            count,
        })
    }

    // ===== Execution =====

    /// Execute the scenario and return results
    pub fn run(self) -> ScenarioResult {
        if !TestWorkspace::git_available() {
            return ScenarioResult {
                name: self.name,
                success: true,
                skipped: true,
                steps_executed: 0,
                failure_step: None,
                error: None,
            };
        }

        let mut runner = match ScenarioRunner::new(self.initial_files.clone()) {
            Ok(r) => r,
            Err(e) => {
                return ScenarioResult {
                    name: self.name.clone(),
                    success: false,
                    skipped: false,
                    steps_executed: 0,
                    failure_step: Some(0),
                    error: Some(format!("Failed to create runner: {:?}", e)),
                }
            }
        };

        match runner.execute(&self.steps) {
            Ok(()) => ScenarioResult {
                name: self.name,
                success: true,
                skipped: false,
                steps_executed: self.steps.len(),
                failure_step: None,
                error: None,
            },
            Err(e) => {
                let failure_step = runner.current_step();
                ScenarioResult {
                    name: self.name,
                    success: false,
                    skipped: false,
                    steps_executed: failure_step,
                    failure_step: Some(failure_step),
                    error: Some(format!("{:?}", e)),
                }
            }
        }
    }
}

/// Builds a classifier decision
pub fn decision(action: IngestAction, path: &str, content: &str) -> IngestDecision {
    IngestDecision {
        action,
        path: path.to_string(),
        content: content.to_string(),
        reasoning: "scripted".to_string(),
    }
}

/// Result of running a scenario
#[derive(Debug)]
pub struct ScenarioResult {
    pub name: String,
    pub success: bool,
    pub skipped: bool,
    pub steps_executed: usize,
    pub failure_step: Option<usize>,
    pub error: Option<String>,
}

impl ScenarioResult {
    /// Unwrap the result, panicking if it failed
    pub fn unwrap(self) {
        self.expect("scenario failed")
    }

    /// Expect the result to be successful
    pub fn expect(self, msg: &str) {
        if self.skipped {
            eprintln!("skipping scenario '{}': git is not available", self.name);
            return;
        }
        if !self.success {
            panic!(
                "{}: Scenario '{}' failed at step {}: {}",
                msg,
                self.name,
                self.failure_step.unwrap_or(0),
                self.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
    }
}
