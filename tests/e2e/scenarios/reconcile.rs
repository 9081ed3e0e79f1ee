use crate::harness::{Assertion, Scenario};
use gardener_core::{ChangeStatus, ChangedFile, Zone, FULL_SCAN_NOTICE};

#[test]
fn test_first_reconcile_is_full_scan() {
    Scenario::new("first_reconcile_full_scan")
        .write("atlas/x.md", "# X\n")
        .commit("Add x")
        .reconcile()
        .assert_from_null()
        .assert_files_changed(1)
        .assert_zone_count(Zone::Atlas, 1)
        .assert_zone_count(Zone::Inbox, 0)
        .assert_tasks(&[
            "Index 1 new note(s) added to atlas",
            "Run consistency check on knowledge base",
        ])
        .assert_pointer_at_head()
        .run()
        .expect("scenario should pass");
}

#[test]
fn test_manual_edit_produces_review_task() {
    Scenario::new("manual_edit_review")
        .write("atlas/topic.md", "first draft\n")
        .commit("Add topic")
        .reconcile()
        .write("atlas/topic.md", "rewritten by hand\n")
        .commit("Edit topic")
        .reconcile()
        .assert(Assertion::RunFromPreviousRun)
        .assert(Assertion::TasksWithPrefix {
            prefix: "Review 1 modified note(s)".into(),
            count: 1,
        })
        .assert_tasks(&[
            "Review 1 modified note(s) in atlas (manual edits preserved)",
            "Run consistency check on knowledge base",
        ])
        // Reconcile never touches content or history.
        .assert_file_contains("atlas/topic.md", "rewritten by hand")
        .assert(Assertion::CommitCount(2))
        .assert_pointer_at_head()
        .run()
        .unwrap();
}

#[test]
fn test_history_rewrite_forces_full_scan() {
    Scenario::new("history_rewrite")
        .write("atlas/a.md", "a\n")
        .commit("First")
        .reconcile()
        .write("atlas/b.md", "b\n")
        .commit("Second")
        .reconcile()
        .assert(Assertion::RunIdentityValid(true))
        .rewrite_history()
        .reconcile()
        .assert_from_null()
        .assert(Assertion::RunIdentityValid(false))
        .assert_first_task(FULL_SCAN_NOTICE)
        .assert_files_changed(2)
        .assert_pointer_at_head()
        // The new fingerprint is accepted from here on.
        .reconcile()
        .assert(Assertion::RunIdentityValid(true))
        .assert(Assertion::RunFromPreviousRun)
        .assert_files_changed(0)
        .assert_tasks(&[])
        .run()
        .unwrap();
}

#[test]
fn test_rename_is_one_change() {
    Scenario::new("rename_pairing")
        .write("atlas/a.md", "a note whose content stays the same across the move\n")
        .commit("Add a")
        .reconcile()
        .rename("atlas/a.md", "atlas/b.md")
        .commit("Rename a to b")
        .reconcile_with_details()
        .assert_changes(vec![ChangedFile {
            path: "atlas/b.md".into(),
            zone: Zone::Atlas,
            status: ChangeStatus::Renamed,
            old_path: Some("atlas/a.md".into()),
        }])
        .assert_tasks(&[
            "Update links for 1 renamed note(s)",
            "Refresh backlinks and cross-references",
            "Run consistency check on knowledge base",
        ])
        .run()
        .unwrap();
}

#[test]
fn test_full_scan_is_idempotent() {
    Scenario::new("idempotent_full_scan")
        .write("atlas/a.md", "a\n")
        .write("inbox/new.md", "n\n")
        .write("inbox/archive/old.md", "o\n")
        .write("meta/index.md", "i\n")
        .commit("Seed")
        .assert(Assertion::FullScanStable)
        .reconcile()
        .assert_files_changed(4)
        .assert_zone_count(Zone::Inbox, 1)
        .assert_zone_count(Zone::Archive, 1)
        .assert_zone_count(Zone::Atlas, 1)
        .assert_zone_count(Zone::Meta, 1)
        .assert_tasks(&[
            "Process 1 new inbox file(s)",
            "Index 1 new note(s) added to atlas",
            "Regenerate meta indexes (derived artifacts may be stale)",
            "Run consistency check on knowledge base",
        ])
        .assert(Assertion::FullScanStable)
        .run()
        .unwrap();
}

#[test]
fn test_uncommitted_work_is_reported() {
    Scenario::new("uncommitted_warning")
        .write("atlas/a.md", "a\n")
        .commit("Seed")
        .reconcile()
        .write("atlas/draft.md", "not yet committed\n")
        .reconcile()
        .assert_files_changed(0)
        .assert(Assertion::UncommittedFiles(1))
        .run()
        .unwrap();
}

#[test]
fn test_state_survives_reopen() {
    Scenario::new("reopen")
        .write("atlas/a.md", "a\n")
        .commit("Seed")
        .reconcile()
        .reopen()
        .write("atlas/a.md", "changed\n")
        .commit("Change")
        .reconcile()
        .assert(Assertion::RunFromPreviousRun)
        .assert(Assertion::RunCount(2))
        .assert_files_changed(1)
        .assert(Assertion::StoreHealthy)
        .run()
        .unwrap();
}

#[test]
fn test_names_git_would_quote_keep_their_zone() {
    Scenario::new("quoted_names")
        .write("atlas/say \"hi\".md", "quoted\n")
        .write("atlas/back\\slash.md", "escaped\n")
        .commit("Odd names")
        .reconcile_with_details()
        .assert_files_changed(2)
        .assert_zone_count(Zone::Atlas, 2)
        .assert_zone_count(Zone::Root, 0)
        .assert_tasks(&[
            "Index 2 new note(s) added to atlas",
            "Run consistency check on knowledge base",
        ])
        .assert_changes(vec![
            ChangedFile {
                path: "atlas/back\\slash.md".into(),
                zone: Zone::Atlas,
                status: ChangeStatus::Added,
                old_path: None,
            },
            ChangedFile {
                path: "atlas/say \"hi\".md".into(),
                zone: Zone::Atlas,
                status: ChangeStatus::Added,
                old_path: None,
            },
        ])
        .run()
        .unwrap();
}
