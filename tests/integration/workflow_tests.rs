use std::fs;

use crate::fixture::TestVault;
use crate::{assert_command_success, assert_stdout_contains};

#[test]
fn import_list_delete_roundtrip() {
    let vault = TestVault::new();
    let file = vault.temp_dir.path().join("sunset.jpg");
    fs::write(&file, b"orange").unwrap();

    let import = vault.run(&["--robot", "import", file.to_str().unwrap(), "--id", "sunset"]);
    assert_command_success!(import);
    let json = import.json();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["data"]["photo"]["id"], "sunset");
    assert_eq!(json["data"]["photo"]["content_type"], "image/jpeg");

    let list = vault.run(&["--robot", "list"]);
    assert_command_success!(list);
    assert_eq!(list.json()["data"]["total"], 1);

    let delete = vault.run(&["--robot", "delete", "sunset"]);
    assert_command_success!(delete);
    let json = delete.json();
    assert_eq!(json["data"]["id"], "sunset");
    assert_eq!(json["data"]["finalized"], true);

    let list = vault.run(&["--robot", "list"]);
    assert_eq!(list.json()["data"]["total"], 0);
    assert_eq!(fs::read(vault.objects.deleted_path("sunset")).unwrap(), b"orange");
}

#[test]
fn delete_unknown_photo_reports_structured_error() {
    let vault = TestVault::new();

    let output = vault.run(&["--robot", "delete", "zzz"]);

    assert!(!output.success);
    let json = output.json();
    assert_eq!(json["status"]["error"]["code"], "PHOTO_NOT_FOUND");
    assert_eq!(json["status"]["error"]["context"]["photo_id"], "zzz");
}

#[test]
fn show_hides_deleted_photos() {
    let vault = TestVault::new();
    vault.add_photo("abc", b"pixels");

    let show = vault.run(&["show", "abc"]);
    assert_command_success!(show);
    assert_stdout_contains!(show, "abc.jpg");

    vault.coordinator.delete("abc").unwrap();
    let show = vault.run(&["show", "abc"]);
    assert!(!show.success);
    assert!(show.stderr.contains("E101"), "stderr: {}", show.stderr);
}

#[test]
fn show_treats_staged_blob_as_delete_in_flight() {
    let vault = TestVault::new();
    vault.add_photo("abc", b"pixels");
    // Where a delete leaves the blob between prepare and commit
    let staged = vault.objects.staging_path("abc", &chrono::Utc::now());
    fs::rename(vault.objects.primary_path("abc"), &staged).unwrap();

    let show = vault.run(&["--robot", "show", "abc"]);
    assert!(!show.success);
    assert_eq!(show.json()["status"]["error"]["code"], "PHOTO_NOT_FOUND");

    let show = vault.run(&["show", "abc"]);
    assert!(!show.success);
    assert!(show.stderr.contains("E101"), "stderr: {}", show.stderr);
    assert!(!show.stdout.contains("abc.jpg"), "stdout: {}", show.stdout);
}

#[test]
fn migrate_status_reports_applied_versions() {
    let vault = TestVault::new();

    let output = vault.run(&["--robot", "migrate", "--status"]);
    assert_command_success!(output);
    let json = output.json();
    assert_eq!(json["data"]["pending"], 0);
    let versions: Vec<&str> = json["data"]["migrations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["version"].as_str().unwrap())
        .collect();
    assert_eq!(versions, vec!["001", "002"]);
}

#[test]
fn staging_lists_blob_left_by_failed_finalize() {
    let vault = TestVault::new();
    vault.add_photo("abc", b"pixels");
    vault.block_finalize("abc");
    vault.coordinator.delete("abc").unwrap();

    let output = vault.run(&["--robot", "staging"]);
    assert_command_success!(output);
    let json = output.json();
    assert_eq!(json["data"]["count"], 1);
    assert_eq!(json["data"]["staged"][0]["id"], "abc");
    assert_eq!(json["data"]["staged"][0]["record"], "deleted");
}
