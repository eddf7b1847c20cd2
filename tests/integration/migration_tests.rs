use std::fs;
use std::path::Path;

use photovault::VaultError;
use photovault::storage::{DirectoryMigrations, SchemaMigrator, VersionLedger};
use rusqlite::Connection;
use tempfile::TempDir;

const INITIAL: &str = "CREATE TABLE photos (id TEXT PRIMARY KEY NOT NULL, original_name TEXT NOT NULL);";
const DELETED_AT: &str = "ALTER TABLE photos ADD COLUMN deleted_at TEXT;";
const ALBUMS: &str = "CREATE TABLE albums (id TEXT PRIMARY KEY NOT NULL);";

fn write(dir: &Path, name: &str, script: &str) {
    fs::write(dir.join(name), script).unwrap();
}

fn ledger(conn: &Connection) -> Vec<String> {
    VersionLedger::entries(conn)
        .unwrap()
        .into_iter()
        .map(|e| e.version)
        .collect()
}

fn table_exists(conn: &Connection, name: &str) -> bool {
    conn.query_row(
        "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        [name],
        |row| row.get::<_, i64>(0),
    )
    .unwrap()
        == 1
}

struct MigrationDir {
    _tmp: TempDir,
    dir: std::path::PathBuf,
    conn: Connection,
}

fn setup() -> MigrationDir {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("migrations");
    fs::create_dir_all(&dir).unwrap();
    let conn = Connection::open(tmp.path().join("vault.db")).unwrap();
    MigrationDir {
        _tmp: tmp,
        dir,
        conn,
    }
}

#[test]
fn applies_in_numeric_order_regardless_of_enumeration() {
    let mut m = setup();
    // Written (and therefore usually enumerated) out of order
    write(&m.dir, "003_albums.sql", ALBUMS);
    write(&m.dir, "001_initial.sql", INITIAL);
    write(&m.dir, "002_add_deleted_at.sql", DELETED_AT);

    let report = SchemaMigrator::new(DirectoryMigrations::new(&m.dir))
        .run_all(&mut m.conn)
        .unwrap();

    let applied: Vec<&str> = report.applied.iter().map(|e| e.version.as_str()).collect();
    assert_eq!(applied, vec!["001", "002", "003"]);
    assert_eq!(ledger(&m.conn), vec!["001", "002", "003"]);
}

#[test]
fn two_migration_scenario_records_both_versions() {
    let mut m = setup();
    write(&m.dir, "001_initial.sql", INITIAL);
    write(&m.dir, "002_add_deleted_at.sql", DELETED_AT);

    SchemaMigrator::new(DirectoryMigrations::new(&m.dir))
        .run_all(&mut m.conn)
        .unwrap();

    assert_eq!(ledger(&m.conn), vec!["001", "002"]);
    let names: Vec<String> = VersionLedger::entries(&m.conn)
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(names, vec!["initial", "add_deleted_at"]);
}

#[test]
fn rerun_applies_nothing() {
    let mut m = setup();
    write(&m.dir, "001_initial.sql", INITIAL);
    write(&m.dir, "002_add_deleted_at.sql", DELETED_AT);
    let migrator = SchemaMigrator::new(DirectoryMigrations::new(&m.dir));

    migrator.run_all(&mut m.conn).unwrap();
    let before = VersionLedger::entries(&m.conn).unwrap();
    let second = migrator.run_all(&mut m.conn).unwrap();

    assert!(second.applied.is_empty());
    assert_eq!(second.already_applied, 2);
    assert_eq!(VersionLedger::entries(&m.conn).unwrap(), before);
}

#[test]
fn new_migration_is_picked_up_on_next_run() {
    let mut m = setup();
    write(&m.dir, "001_initial.sql", INITIAL);
    let migrator = SchemaMigrator::new(DirectoryMigrations::new(&m.dir));
    migrator.run_all(&mut m.conn).unwrap();

    write(&m.dir, "002_add_deleted_at.sql", DELETED_AT);
    let report = migrator.run_all(&mut m.conn).unwrap();

    assert_eq!(report.applied.len(), 1);
    assert_eq!(report.applied[0].version, "002");
    assert_eq!(ledger(&m.conn), vec!["001", "002"]);
}

#[test]
fn failing_script_rolls_back_and_stops_the_run() {
    let mut m = setup();
    write(&m.dir, "001_initial.sql", INITIAL);
    // Creates a table, then fails: the table must not survive
    write(
        &m.dir,
        "002_broken.sql",
        "CREATE TABLE half_done (x INTEGER); INSERT INTO no_such_table VALUES (1);",
    );
    write(&m.dir, "003_albums.sql", ALBUMS);

    let err = SchemaMigrator::new(DirectoryMigrations::new(&m.dir))
        .run_all(&mut m.conn)
        .unwrap_err();

    match err {
        VaultError::MigrationFailed { version, name, .. } => {
            assert_eq!(version, "002");
            assert_eq!(name, "broken");
        }
        other => panic!("expected MigrationFailed, got {other:?}"),
    }
    assert_eq!(ledger(&m.conn), vec!["001"]);
    assert!(table_exists(&m.conn, "photos"));
    assert!(!table_exists(&m.conn, "half_done"));
    assert!(!table_exists(&m.conn, "albums"));
}

#[test]
fn malformed_file_names_are_reported_not_applied() {
    let mut m = setup();
    write(&m.dir, "001_initial.sql", INITIAL);
    write(&m.dir, "README.md", "# notes");
    write(&m.dir, "initial_backup.sql", "DROP TABLE photos;");
    fs::create_dir_all(m.dir.join("002_subdir.sql")).unwrap();

    let report = SchemaMigrator::new(DirectoryMigrations::new(&m.dir))
        .run_all(&mut m.conn)
        .unwrap();

    assert_eq!(ledger(&m.conn), vec!["001"]);
    let mut skipped: Vec<&str> = report.warnings.iter().map(|w| w.file_name.as_str()).collect();
    skipped.sort_unstable();
    assert_eq!(skipped, vec!["README.md", "initial_backup.sql"]);
    assert!(table_exists(&m.conn, "photos"));
}

#[test]
fn duplicate_numeric_versions_are_fatal() {
    let mut m = setup();
    write(&m.dir, "001_initial.sql", INITIAL);
    write(&m.dir, "1_again.sql", INITIAL);

    let err = SchemaMigrator::new(DirectoryMigrations::new(&m.dir))
        .run_all(&mut m.conn)
        .unwrap_err();

    assert!(matches!(err, VaultError::DuplicateMigration { version: 1, .. }));
    assert!(ledger(&m.conn).is_empty());
}

#[test]
fn pending_version_below_applied_is_fatal() {
    let mut m = setup();
    write(&m.dir, "001_initial.sql", INITIAL);
    write(&m.dir, "003_albums.sql", ALBUMS);
    let migrator = SchemaMigrator::new(DirectoryMigrations::new(&m.dir));
    migrator.run_all(&mut m.conn).unwrap();

    write(&m.dir, "002_add_deleted_at.sql", DELETED_AT);
    let err = migrator.run_all(&mut m.conn).unwrap_err();

    assert!(matches!(err, VaultError::MigrationOutOfOrder { .. }));
    assert_eq!(ledger(&m.conn), vec!["001", "003"]);
}

#[test]
fn applied_version_missing_from_source_is_reported() {
    let mut m = setup();
    write(&m.dir, "001_initial.sql", INITIAL);
    write(&m.dir, "002_add_deleted_at.sql", DELETED_AT);
    let migrator = SchemaMigrator::new(DirectoryMigrations::new(&m.dir));
    migrator.run_all(&mut m.conn).unwrap();

    fs::remove_file(m.dir.join("002_add_deleted_at.sql")).unwrap();
    let report = migrator.run_all(&mut m.conn).unwrap();

    assert_eq!(report.unknown_applied, vec!["002"]);
    assert_eq!(report.already_applied, 1);
}

#[test]
fn unreadable_source_is_an_error() {
    let mut m = setup();
    let err = SchemaMigrator::new(DirectoryMigrations::new(m.dir.join("absent")))
        .run_all(&mut m.conn)
        .unwrap_err();
    assert!(matches!(err, VaultError::MigrationSource(_)));
}
