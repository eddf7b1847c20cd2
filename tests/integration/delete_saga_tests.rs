use std::fs;
use std::sync::Barrier;
use std::thread;

use photovault::VaultError;
use photovault::storage::{BlobLocation, RecordState, SagaState};

use crate::fixture::TestVault;

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn deleted_photo_is_no_longer_fetchable() {
    let vault = TestVault::new();
    vault.add_photo("abc", b"pixels");

    let outcome = vault.coordinator.delete("abc").unwrap();

    assert_eq!(outcome.id, "abc");
    assert!(outcome.finalized());
    assert!(vault.metadata.get_active("abc").unwrap().is_none());
    let record = vault.metadata.get_any("abc").unwrap().unwrap();
    assert_eq!(record.deleted_at.as_deref(), Some(outcome.deleted_at.as_str()));
    assert_eq!(fs::read(vault.objects.deleted_path("abc")).unwrap(), b"pixels");
    assert!(!vault.objects.primary_path("abc").exists());
}

#[test]
fn second_delete_is_not_found() {
    let vault = TestVault::new();
    vault.add_photo("abc", b"pixels");
    vault.coordinator.delete("abc").unwrap();
    let record_before = vault.metadata.get_any("abc").unwrap();

    let err = vault.coordinator.delete("abc").unwrap_err();

    assert!(matches!(err, VaultError::PhotoNotFound(ref id) if id == "abc"));
    assert_eq!(vault.metadata.get_any("abc").unwrap(), record_before);
    assert_eq!(fs::read(vault.objects.deleted_path("abc")).unwrap(), b"pixels");
}

#[test]
fn unknown_id_is_not_found_without_mutation() {
    let vault = TestVault::new();
    vault.add_photo("abc", b"pixels");

    let err = vault.coordinator.delete("zzz").unwrap_err();

    assert!(matches!(err, VaultError::PhotoNotFound(_)));
    assert!(vault.metadata.get_active("abc").unwrap().is_some());
    assert!(vault.objects.exists("abc"));
    assert!(vault.objects.staged().unwrap().is_empty());
    assert!(vault.observer.transitions.lock().is_empty());
}

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn concurrent_deletes_have_exactly_one_winner() {
    for round in 0..10 {
        let vault = TestVault::new();
        let id = format!("photo-{round}");
        vault.add_photo(&id, b"pixels");

        let barrier = Barrier::new(2);
        let results: Vec<_> = thread::scope(|scope| {
            let handles: Vec<_> = (0..2)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        vault.coordinator.delete(&id)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let successes = results.iter().filter(|r| r.is_ok()).count();
        let not_found = results
            .iter()
            .filter(|r| matches!(r, Err(VaultError::PhotoNotFound(_))))
            .count();
        assert_eq!(successes, 1, "round {round}: {results:?}");
        assert_eq!(not_found, 1, "round {round}: {results:?}");

        assert!(vault.metadata.get_active(&id).unwrap().is_none());
        assert_eq!(fs::read(vault.objects.deleted_path(&id)).unwrap(), b"pixels");
        assert!(vault.objects.find_staged(&id).unwrap().is_empty());
    }
}

// =============================================================================
// Failure handling
// =============================================================================

#[test]
fn commit_failure_restores_blob_byte_for_byte() {
    let vault = TestVault::new();
    let bytes: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
    vault.add_photo("abc", &bytes);
    vault.refuse_commits();

    let err = vault.coordinator.delete("abc").unwrap_err();

    match &err {
        VaultError::CommitFailed { id, restored, .. } => {
            assert_eq!(id, "abc");
            assert!(*restored);
        }
        other => panic!("expected CommitFailed, got {other:?}"),
    }
    assert!(err.left_state_unchanged());
    assert_eq!(vault.objects.read("abc").unwrap(), bytes);
    assert!(vault.metadata.get_active("abc").unwrap().is_some());
    assert!(vault.objects.staged().unwrap().is_empty());
    assert_eq!(
        vault.observer.transitions.lock().last().map(|t| (t.1, t.2)),
        Some((SagaState::BackedUp, SagaState::RolledBack))
    );
    assert!(vault.observer.events.lock().is_empty());
}

#[test]
fn finalize_failure_still_reports_success() {
    let vault = TestVault::new();
    vault.add_photo("abc", b"pixels");
    vault.block_finalize("abc");

    let outcome = vault.coordinator.delete("abc").unwrap();

    assert!(!outcome.finalized());
    let BlobLocation::Staged(staged) = &outcome.blob else {
        panic!("expected staged blob, got {:?}", outcome.blob);
    };
    assert_eq!(fs::read(staged).unwrap(), b"pixels");
    assert!(vault.metadata.get_active("abc").unwrap().is_none());
    assert_eq!(*vault.observer.deferred.lock(), vec!["abc".to_string()]);
    assert_eq!(vault.observer.events.lock().len(), 1);

    // Recoverable from staging by id
    let found = vault.objects.find_staged("abc").unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(&found[0].path, staged);

    let report = vault.coordinator.staged_report().unwrap();
    assert_eq!(report.len(), 1);
    assert_eq!(report[0].record, RecordState::Deleted);
}

#[test]
fn missing_blob_fails_backup_and_leaves_record() {
    let vault = TestVault::new();
    vault.add_photo("abc", b"pixels");
    fs::remove_file(vault.objects.primary_path("abc")).unwrap();

    let err = vault.coordinator.delete("abc").unwrap_err();

    assert!(matches!(err, VaultError::BackupFailed { .. }));
    assert!(vault.metadata.get_active("abc").unwrap().is_some());
}

#[test]
fn deletes_of_different_ids_do_not_interfere() {
    let vault = TestVault::new();
    let ids: Vec<String> = (0..8).map(|i| format!("img-{i}")).collect();
    for id in &ids {
        vault.add_photo(id, id.as_bytes());
    }

    thread::scope(|scope| {
        for id in &ids {
            let vault = &vault;
            scope.spawn(move || vault.coordinator.delete(id).unwrap());
        }
    });

    assert_eq!(vault.metadata.count_active().unwrap(), 0);
    for id in &ids {
        assert_eq!(fs::read(vault.objects.deleted_path(id)).unwrap(), id.as_bytes());
    }
    assert!(vault.objects.staged().unwrap().is_empty());
}
