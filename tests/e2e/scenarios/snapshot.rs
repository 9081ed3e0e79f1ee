use crate::harness::{Assertion, Scenario};
use anyhow::ensure;
use gardener_core::{KnowledgeBase, ProvenanceSource, DEFAULT_SNAPSHOT_MESSAGE};

#[test]
fn test_snapshot_records_manual_provenance() {
    Scenario::new("snapshot_provenance")
        .write("atlas/a.md", "a\n")
        .commit("Seed")
        .reconcile()
        .write("atlas/a.md", "edited by hand\n")
        .write("atlas/new.md", "brand new\n")
        .snapshot(Some("Manual: hand edits"))
        .assert(Assertion::SnapshotCommitted(true))
        .assert_head_contains("Manual: hand edits")
        .assert_provenance("atlas/a.md", Some(ProvenanceSource::Manual), 1)
        .assert_provenance("atlas/new.md", Some(ProvenanceSource::Manual), 1)
        .assert(Assertion::FileRecordExists("atlas/a.md".into()))
        .assert(Assertion::FileRecordExists("atlas/new.md".into()))
        .assert(Assertion::ProcessedAtHead)
        // The snapshot descends from the last reconcile, so it wins as starting point.
        .reconcile()
        .assert_files_changed(0)
        .assert_pointer_at_head()
        .run()
        .expect("scenario should pass");
}

#[test]
fn test_snapshot_with_nothing_to_commit() {
    Scenario::new("snapshot_clean")
        .write("atlas/a.md", "a\n")
        .commit("Seed")
        .snapshot(None)
        .assert(Assertion::SnapshotCommitted(false))
        .assert(Assertion::CommitCount(1))
        .assert(Assertion::ProcessedCommitCount(0))
        .run()
        .unwrap();
}

#[test]
fn test_snapshot_default_message_and_deletion() {
    Scenario::new("snapshot_delete")
        .write("atlas/gone.md", "soon gone\n")
        .commit("Seed")
        .update_record("atlas/gone.md")
        .delete("atlas/gone.md")
        .snapshot(None)
        .assert(Assertion::SnapshotCommitted(true))
        .assert_head_contains(DEFAULT_SNAPSHOT_MESSAGE)
        .assert(Assertion::NoFileRecord("atlas/gone.md".into()))
        .assert(Assertion::Custom(Box::new(|kb: &KnowledgeBase| {
            let history = kb.provenance_for_path("atlas/gone.md", None)?;
            ensure!(history.len() == 1, "expected one record, got {:?}", history);
            ensure!(
                history[0].metadata == Some(serde_json::json!({ "action": "delete" })),
                "unexpected metadata {:?}",
                history[0].metadata
            );
            Ok(())
        })))
        .run()
        .unwrap();
}

#[test]
fn test_external_tool_provenance_round_trip() {
    Scenario::new("external_provenance")
        .write("atlas/a.md", "a\n")
        .commit("Seed")
        .record_provenance("atlas/a.md", ProvenanceSource::External("formatter".into()))
        .record_provenance("./atlas/a.md", ProvenanceSource::Manual)
        .assert_provenance("atlas/a.md", None, 2)
        .assert_provenance(
            "atlas/a.md",
            Some(ProvenanceSource::External("formatter".into())),
            1,
        )
        .run()
        .unwrap();
}
