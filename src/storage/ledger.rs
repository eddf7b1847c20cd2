//! Applied-migration ledger.
//!
//! The ledger lives in the same database as the schema it describes, so a
//! migration's script and its ledger row commit (or roll back) together.

use std::collections::BTreeSet;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use tracing::warn;

use crate::error::Result;

use super::migrations::Migration;

const LEDGER_SCHEMA: &str = "CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL
)";

/// One successfully applied migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub version: String,
    pub name: String,
    pub applied_at: String,
}

impl LedgerEntry {
    /// Numeric value of the version, if it still parses.
    #[must_use]
    pub fn number(&self) -> Option<u64> {
        self.version.parse().ok()
    }

    #[must_use]
    pub fn label(&self) -> String {
        format!("{}_{}", self.version, self.name)
    }
}

/// Append-only record of applied migrations (`schema_migrations`).
///
/// Rows are only ever inserted, inside the transaction of the migration they
/// describe. Nothing here updates or deletes them.
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionLedger;

impl VersionLedger {
    /// Create the ledger table if it does not exist yet.
    pub fn ensure(conn: &Connection) -> Result<()> {
        conn.execute_batch(LEDGER_SCHEMA)?;
        Ok(())
    }

    /// Whether the ledger table exists. Read-only callers use this to avoid
    /// creating it as a side effect.
    pub fn exists(conn: &Connection) -> Result<bool> {
        let found = conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_migrations'",
                [],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// All entries in the order they were applied.
    pub fn entries(conn: &Connection) -> Result<Vec<LedgerEntry>> {
        if !Self::exists(conn)? {
            return Ok(Vec::new());
        }

        let mut stmt =
            conn.prepare("SELECT version, name, applied_at FROM schema_migrations ORDER BY rowid")?;
        let rows = stmt.query_map([], |row| {
            Ok(LedgerEntry {
                version: row.get(0)?,
                name: row.get(1)?,
                applied_at: row.get(2)?,
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    /// Numeric versions currently recorded. Entries whose version no longer
    /// parses are logged and ignored.
    pub fn applied_numbers(conn: &Connection) -> Result<BTreeSet<u64>> {
        let mut numbers = BTreeSet::new();
        for entry in Self::entries(conn)? {
            match entry.number() {
                Some(number) => {
                    numbers.insert(number);
                }
                None => warn!(
                    version = %entry.version,
                    name = %entry.name,
                    "Ignoring ledger entry with non-numeric version"
                ),
            }
        }
        Ok(numbers)
    }

    /// Append the row for `migration`. Call inside the migration's transaction.
    pub fn record(
        conn: &Connection,
        migration: &Migration,
        applied_at: DateTime<Utc>,
    ) -> Result<LedgerEntry> {
        let entry = LedgerEntry {
            version: migration.version.clone(),
            name: migration.name.clone(),
            applied_at: applied_at.to_rfc3339_opts(SecondsFormat::Micros, true),
        };
        conn.execute(
            "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?, ?, ?)",
            params![entry.version, entry.name, entry.applied_at],
        )?;
        Ok(entry)
    }
}
