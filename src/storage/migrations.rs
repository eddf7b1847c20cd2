//! Database migrations
//!
//! Migrations are discovered from a [`MigrationSource`], ordered by the numeric
//! value of their version and applied one transaction at a time. The ledger
//! ([`VersionLedger`]) is consulted on every run, so running twice is a no-op.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::PathBuf;
use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Result, VaultError};

use super::ledger::{LedgerEntry, VersionLedger};

const BUILTIN: [(&str, &str); 2] = [
    (
        "001_initial.sql",
        include_str!("../../migrations/001_initial.sql"),
    ),
    (
        "002_add_deleted_at.sql",
        include_str!("../../migrations/002_add_deleted_at.sql"),
    ),
];

static FILE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<version>\d+)_(?P<name>[^/\\]+)\.(?P<ext>[A-Za-z0-9]+)$")
        .expect("migration file name pattern is valid")
});

/// A single schema migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    /// Numeric sort key parsed from `version`.
    pub number: u64,
    /// Version as written in the file name (zero padding preserved).
    pub version: String,
    pub name: String,
    pub script: String,
}

impl Migration {
    /// `<version>_<name>`, as used in logs.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}_{}", self.version, self.name)
    }
}

/// Raw entry yielded by a migration source.
#[derive(Debug, Clone)]
pub struct MigrationFile {
    pub file_name: String,
    pub script: String,
}

/// A file that was skipped during discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationWarning {
    pub file_name: String,
    pub reason: String,
}

/// Where migrations come from. Enumeration order carries no meaning.
pub trait MigrationSource {
    /// All candidate entries, in whatever order the backing store yields them.
    fn entries(&self) -> Result<Vec<MigrationFile>>;

    /// Short description for logs.
    fn describe(&self) -> String;
}

impl<T: MigrationSource + ?Sized> MigrationSource for Box<T> {
    fn entries(&self) -> Result<Vec<MigrationFile>> {
        (**self).entries()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Migrations compiled into the binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedMigrations;

impl MigrationSource for EmbeddedMigrations {
    fn entries(&self) -> Result<Vec<MigrationFile>> {
        Ok(BUILTIN
            .iter()
            .map(|(file_name, script)| MigrationFile {
                file_name: (*file_name).to_string(),
                script: (*script).to_string(),
            })
            .collect())
    }

    fn describe(&self) -> String {
        "embedded".to_string()
    }
}

/// Migrations read from the files of a directory (subdirectories ignored).
#[derive(Debug, Clone)]
pub struct DirectoryMigrations {
    dir: PathBuf,
}

impl DirectoryMigrations {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl MigrationSource for DirectoryMigrations {
    fn entries(&self) -> Result<Vec<MigrationFile>> {
        let read_dir = fs::read_dir(&self.dir).map_err(|err| {
            VaultError::MigrationSource(format!("read {}: {err}", self.dir.display()))
        })?;

        let mut files = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|err| {
                VaultError::MigrationSource(format!("list {}: {err}", self.dir.display()))
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let script = fs::read_to_string(&path).map_err(|err| {
                VaultError::MigrationSource(format!("read {}: {err}", path.display()))
            })?;
            files.push(MigrationFile {
                file_name: entry.file_name().to_string_lossy().into_owned(),
                script,
            });
        }
        Ok(files)
    }

    fn describe(&self) -> String {
        self.dir.display().to_string()
    }
}

/// Split `<digits>_<name>.<ext>` into `(number, version, name)`.
pub fn parse_file_name(file_name: &str) -> std::result::Result<(u64, String, String), String> {
    let caps = FILE_NAME
        .captures(file_name)
        .ok_or_else(|| "expected <digits>_<name>.<ext>".to_string())?;
    let version = &caps["version"];
    let number = version
        .parse::<u64>()
        .map_err(|err| format!("version {version} out of range: {err}"))?;
    Ok((number, version.to_string(), caps["name"].to_string()))
}

/// Result of parsing a source: migrations in ascending numeric order plus
/// whatever had to be skipped.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub migrations: Vec<Migration>,
    pub warnings: Vec<MigrationWarning>,
}

/// Parse and order every entry of `source`.
///
/// Unparseable names become warnings. Two files with the same numeric
/// version are an error, since either order would be a guess.
pub fn discover(source: &dyn MigrationSource) -> Result<Discovery> {
    let mut by_number: BTreeMap<u64, Migration> = BTreeMap::new();
    let mut warnings = Vec::new();

    for file in source.entries()? {
        let (number, version, name) = match parse_file_name(&file.file_name) {
            Ok(parsed) => parsed,
            Err(reason) => {
                warn!(file = %file.file_name, %reason, "Skipping migration file");
                warnings.push(MigrationWarning {
                    file_name: file.file_name,
                    reason,
                });
                continue;
            }
        };

        let migration = Migration {
            number,
            version,
            name,
            script: file.script,
        };
        if let Some(existing) = by_number.get(&number) {
            return Err(VaultError::DuplicateMigration {
                version: number,
                first: existing.label(),
                second: migration.label(),
            });
        }
        by_number.insert(number, migration);
    }

    Ok(Discovery {
        migrations: by_number.into_values().collect(),
        warnings,
    })
}

/// Outcome of [`SchemaMigrator::run_all`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationReport {
    /// Entries appended by this run, in application order.
    pub applied: Vec<LedgerEntry>,
    /// Migrations that were already in the ledger.
    pub already_applied: usize,
    /// Files skipped during discovery.
    pub warnings: Vec<MigrationWarning>,
    /// Ledger versions with no matching file in the source.
    pub unknown_applied: Vec<String>,
}

impl MigrationReport {
    #[must_use]
    pub fn had_work(&self) -> bool {
        !self.applied.is_empty()
    }
}

/// Status line for one discovered migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub version: String,
    pub name: String,
    pub applied_at: Option<String>,
}

/// Applies pending migrations from a source against a connection.
#[derive(Debug, Clone)]
pub struct SchemaMigrator<S> {
    source: S,
}

impl<S: MigrationSource> SchemaMigrator<S> {
    pub const fn new(source: S) -> Self {
        Self { source }
    }

    pub const fn source(&self) -> &S {
        &self.source
    }

    /// Apply every pending migration in ascending numeric order.
    ///
    /// Each migration runs in its own IMMEDIATE transaction together with its
    /// ledger row. The first failure stops the run; migrations after it are
    /// not attempted.
    pub fn run_all(&self, conn: &mut Connection) -> Result<MigrationReport> {
        VersionLedger::ensure(conn)?;

        let discovery = discover(&self.source)?;
        let applied = VersionLedger::applied_numbers(conn)?;
        let discovered: BTreeSet<u64> = discovery.migrations.iter().map(|m| m.number).collect();

        let mut report = MigrationReport {
            warnings: discovery.warnings,
            ..MigrationReport::default()
        };

        for entry in VersionLedger::entries(conn)? {
            if entry.number().is_some_and(|n| !discovered.contains(&n)) {
                warn!(
                    version = %entry.version,
                    name = %entry.name,
                    source = %self.source.describe(),
                    "Applied migration missing from source"
                );
                report.unknown_applied.push(entry.version);
            }
        }

        let (done, pending): (Vec<&Migration>, Vec<&Migration>) = discovery
            .migrations
            .iter()
            .partition(|m| applied.contains(&m.number));
        report.already_applied = done.len();

        // Pending is sorted, so only its head can sit below an applied version.
        if let (Some(first), Some(&highest)) = (pending.first(), applied.last()) {
            if first.number < highest {
                let applied_version = done
                    .iter()
                    .find(|m| m.number == highest)
                    .map_or_else(|| highest.to_string(), |m| m.version.clone());
                return Err(VaultError::MigrationOutOfOrder {
                    version: first.version.clone(),
                    name: first.name.clone(),
                    applied: applied_version,
                });
            }
        }

        debug!(
            pending = pending.len(),
            applied = report.already_applied,
            source = %self.source.describe(),
            "Migration plan"
        );

        for migration in pending {
            if let Some(entry) = apply_one(conn, migration)? {
                report.applied.push(entry);
            } else {
                report.already_applied += 1;
            }
        }

        if report.had_work() {
            info!(count = report.applied.len(), "Schema migrations applied");
        }
        Ok(report)
    }

    /// Read-only view of every discovered migration and when it was applied.
    pub fn status(&self, conn: &Connection) -> Result<Vec<MigrationStatus>> {
        let discovery = discover(&self.source)?;
        let applied: BTreeMap<u64, LedgerEntry> = VersionLedger::entries(conn)?
            .into_iter()
            .filter_map(|e| e.number().map(|n| (n, e)))
            .collect();

        Ok(discovery
            .migrations
            .into_iter()
            .map(|m| MigrationStatus {
                applied_at: applied.get(&m.number).map(|e| e.applied_at.clone()),
                version: m.version,
                name: m.name,
            })
            .collect())
    }
}

/// Apply one migration. Returns `None` if another process recorded it
/// between planning and acquiring the write lock.
fn apply_one(conn: &mut Connection, migration: &Migration) -> Result<Option<LedgerEntry>> {
    let failed = |reason: String| VaultError::MigrationFailed {
        version: migration.version.clone(),
        name: migration.name.clone(),
        reason,
    };

    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|err| failed(format!("begin transaction: {err}")))?;

    if VersionLedger::applied_numbers(&tx)?.contains(&migration.number) {
        debug!(migration = %migration.label(), "Already applied by another process");
        return Ok(None);
    }

    // Dropping `tx` on any early return rolls it back.
    tx.execute_batch(&migration.script)
        .map_err(|err| failed(err.to_string()))?;
    let entry = VersionLedger::record(&tx, migration, Utc::now())
        .map_err(|err| failed(format!("record in ledger: {err}")))?;
    tx.commit()
        .map_err(|err| failed(format!("commit: {err}")))?;

    info!(version = %entry.version, name = %entry.name, "Applied migration");
    Ok(Some(entry))
}
