use crate::harness::{decision, Assertion, Scenario, TestWorkspace};
use anyhow::ensure;
use gardener_core::{
    IngestAction, IngestDecision, KnowledgeBase, ProvenanceSource, ReconcileOptions, Zone,
};
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_ingest_creates_atlas_note() {
    Scenario::new("ingest_create")
        .submit("Rust ownership notes")
        .ingest(vec![decision(
            IngestAction::Create,
            "topics/rust.md",
            "# Rust\n\nOwnership and borrowing.\n",
        )])
        .assert(Assertion::IngestOutcomes {
            succeeded: 1,
            failed: 0,
        })
        .assert(Assertion::InboxEmpty)
        .assert_file_contains("atlas/topics/rust.md", "Ownership and borrowing.")
        .assert_head_contains("Gardener: Processed")
        .assert_provenance("atlas/topics/rust.md", Some(ProvenanceSource::Organizer), 1)
        .assert(Assertion::FileRecordExists("atlas/topics/rust.md".into()))
        .assert(Assertion::ProcessedCommitCount(1))
        .assert(Assertion::ProcessedAtHead)
        // The processed commit is already accounted for.
        .reconcile()
        .assert_files_changed(0)
        .run()
        .expect("scenario should pass");
}

#[test]
fn test_ingest_removes_tracked_note_in_second_commit() {
    Scenario::new("ingest_tracked_note")
        .submit("meeting notes")
        .commit("Capture note")
        .ingest(vec![decision(IngestAction::Create, "meetings.md", "meeting notes")])
        .assert(Assertion::InboxEmpty)
        .assert(Assertion::CommitCount(3))
        .assert_head_contains("from inbox")
        .assert(Assertion::ProcessedAtHead)
        .run()
        .unwrap();
}

#[test]
fn test_ingest_append_adds_update_section() {
    Scenario::new("ingest_append")
        .write("atlas/log.md", "# Log\n")
        .commit("Seed log")
        .submit("another entry")
        .ingest(vec![decision(IngestAction::Append, "log.md", "another entry")])
        .assert_file_contains("atlas/log.md", "# Log\n\n\n---\n## Update ")
        .assert_file_contains("atlas/log.md", "another entry")
        .assert_provenance("atlas/log.md", Some(ProvenanceSource::Organizer), 1)
        .run()
        .unwrap();
}

#[test]
fn test_invalid_destination_is_redirected() {
    Scenario::new("ingest_invalid_destination")
        .submit("sneaky")
        .ingest(vec![decision(IngestAction::Create, "../../outside.md", "sneaky")])
        .assert(Assertion::IngestOutcomes {
            succeeded: 1,
            failed: 0,
        })
        .assert(Assertion::IngestRedirected(1))
        .assert_file_contains("tasks.md", "## Unsorted Note ")
        .assert_file_contains("tasks.md", "> Gardener Query: Invalid path '../../outside.md': scripted")
        .assert(Assertion::FileMissing("atlas/outside.md".into()))
        .assert(Assertion::FileMissing("../outside.md".into()))
        .assert(Assertion::InboxEmpty)
        .run()
        .unwrap();
}

#[test]
fn test_failed_classification_keeps_note() {
    Scenario::new("ingest_failure")
        .submit("nobody knows where this goes")
        .ingest(vec![])
        .assert(Assertion::IngestOutcomes {
            succeeded: 0,
            failed: 1,
        })
        .assert(Assertion::ProcessedCommitCount(0))
        .assert(Assertion::Custom(Box::new(|kb: &KnowledgeBase| {
            let inbox = kb
                .zones()
                .root_of(Zone::Inbox)
                .ok_or_else(|| anyhow::anyhow!("no inbox"))?;
            let notes = fs::read_dir(inbox)?
                .filter_map(|e| e.ok())
                .filter(|e| e.path().is_file())
                .count();
            ensure!(notes == 1, "expected the note to stay in the inbox, found {}", notes);
            Ok(())
        })))
        .run()
        .unwrap();
}

#[test]
fn test_concurrent_ingestion_is_single_flight() {
    let workspace = TestWorkspace::empty().unwrap();
    let kb = workspace.init_kb().unwrap();
    for i in 0..3 {
        kb.submit_note(&format!("note {}", i)).unwrap();
    }

    let active = Arc::new(AtomicUsize::new(0));
    let overlap = Arc::new(AtomicUsize::new(0));
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let kb = kb.clone();
            let active = Arc::clone(&active);
            let overlap = Arc::clone(&overlap);
            thread::spawn(move || {
                let classifier = |note: &str, _: &str, _: &str| -> gardener_core::Result<IngestDecision> {
                    if active.fetch_add(1, Ordering::SeqCst) > 0 {
                        overlap.fetch_add(1, Ordering::SeqCst);
                    }
                    thread::sleep(Duration::from_millis(25));
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok(IngestDecision {
                        action: IngestAction::Task,
                        path: String::new(),
                        content: note.to_string(),
                        reasoning: "parked".to_string(),
                    })
                };
                kb.ingest(&classifier).unwrap()
            })
        })
        .collect();

    let outcomes: Vec<_> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();

    // The second pass waited and then found an empty inbox.
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes.iter().all(|o| o.success));
    assert_eq!(overlap.load(Ordering::SeqCst), 0);

    let tasks = fs::read_to_string(workspace.path().join("tasks.md")).unwrap();
    assert_eq!(tasks.matches("## Unsorted Note ").count(), 3);

    // Reconcile may run alongside; it is not guarded.
    kb.reconcile(ReconcileOptions::default()).unwrap();
}
