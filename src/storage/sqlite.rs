//! SQLite metadata store for photo records.
//!
//! A connection is opened per operation. Nothing here holds a connection or
//! a transaction across calls, so blob relocations in the delete saga never
//! run while a write lock is held.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};
use serde::Serialize;

use crate::error::{Result, VaultError};
use crate::storage::migrations::{MigrationReport, MigrationSource, MigrationStatus, SchemaMigrator};

const PHOTO_COLUMNS: &str = "id, original_name, content_type, size_bytes, created_at, deleted_at";

/// Format a timestamp the way every column in the store holds it.
#[must_use]
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhotoRecord {
    pub id: String,
    pub original_name: String,
    pub content_type: Option<String>,
    pub size_bytes: u64,
    pub created_at: String,
    pub deleted_at: Option<String>,
}

impl PhotoRecord {
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// Fields supplied when importing a photo.
#[derive(Debug, Clone)]
pub struct NewPhoto {
    pub id: String,
    pub original_name: String,
    pub content_type: Option<String>,
    pub size_bytes: u64,
}

/// SQLite-backed photo metadata.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    path: PathBuf,
    busy_timeout: Duration,
}

impl MetadataStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let store = Self {
            path: path.to_path_buf(),
            busy_timeout,
        };
        // journal_mode is persistent; set it once up front.
        store
            .connect()?
            .execute_batch("PRAGMA journal_mode = WAL;")?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a fresh connection configured for this store.
    pub fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.busy_timeout)?;
        Self::configure_pragmas(&conn)?;
        Ok(conn)
    }

    /// Run the schema migrator against this database.
    pub fn migrate<S: MigrationSource>(
        &self,
        migrator: &SchemaMigrator<S>,
    ) -> Result<MigrationReport> {
        let mut conn = self.connect()?;
        migrator.run_all(&mut conn)
    }

    /// Migration status without applying anything.
    pub fn migration_status<S: MigrationSource>(
        &self,
        migrator: &SchemaMigrator<S>,
    ) -> Result<Vec<MigrationStatus>> {
        let conn = self.connect()?;
        migrator.status(&conn)
    }

    pub fn insert_photo(&self, photo: &NewPhoto) -> Result<PhotoRecord> {
        let record = PhotoRecord {
            id: photo.id.clone(),
            original_name: photo.original_name.clone(),
            content_type: photo.content_type.clone(),
            size_bytes: photo.size_bytes,
            created_at: format_timestamp(&Utc::now()),
            deleted_at: None,
        };
        let size = i64::try_from(record.size_bytes)
            .map_err(|_| VaultError::Config(format!("photo too large: {} bytes", record.size_bytes)))?;

        let conn = self.connect()?;
        let inserted = conn.execute(
            "INSERT INTO photos (id, original_name, content_type, size_bytes, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO NOTHING",
            params![
                record.id,
                record.original_name,
                record.content_type,
                size,
                record.created_at
            ],
        )?;
        if inserted == 0 {
            return Err(VaultError::PhotoExists(record.id));
        }
        Ok(record)
    }

    /// Fetch a photo that has not been deleted.
    pub fn get_active(&self, id: &str) -> Result<Option<PhotoRecord>> {
        let conn = self.connect()?;
        let record = conn
            .query_row(
                &format!("SELECT {PHOTO_COLUMNS} FROM photos WHERE id = ? AND deleted_at IS NULL"),
                [id],
                photo_from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Fetch a photo regardless of deletion state. Used by consistency
    /// reporting only; read paths go through [`Self::get_active`].
    pub fn get_any(&self, id: &str) -> Result<Option<PhotoRecord>> {
        let conn = self.connect()?;
        let record = conn
            .query_row(
                &format!("SELECT {PHOTO_COLUMNS} FROM photos WHERE id = ?"),
                [id],
                photo_from_row,
            )
            .optional()?;
        Ok(record)
    }

    pub fn list_active(&self, limit: usize, offset: usize) -> Result<Vec<PhotoRecord>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {PHOTO_COLUMNS} FROM photos WHERE deleted_at IS NULL \
             ORDER BY created_at DESC, id LIMIT ? OFFSET ?"
        ))?;
        let rows = stmt.query_map(
            params![
                i64::try_from(limit).unwrap_or(i64::MAX),
                i64::try_from(offset).unwrap_or(i64::MAX)
            ],
            photo_from_row,
        )?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    pub fn count_active(&self) -> Result<u64> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM photos WHERE deleted_at IS NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count.max(0).unsigned_abs())
    }

    /// Mark a photo deleted if, and only if, it is still active.
    ///
    /// The `deleted_at IS NULL` predicate is the compare-and-swap: of two
    /// concurrent callers for the same id, exactly one sees a row change.
    /// Returns whether this call performed the transition. Any error means
    /// the transaction did not commit.
    pub fn mark_deleted(&self, id: &str, deleted_at: &str) -> Result<bool> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "UPDATE photos SET deleted_at = ? WHERE id = ? AND deleted_at IS NULL",
            params![deleted_at, id],
        )?;
        tx.commit()?;
        Ok(changed == 1)
    }

    fn configure_pragmas(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA synchronous = NORMAL;
             PRAGMA temp_store = MEMORY;
             PRAGMA foreign_keys = ON;",
        )?;
        Ok(())
    }
}

fn photo_from_row(row: &Row<'_>) -> rusqlite::Result<PhotoRecord> {
    let size: i64 = row.get(3)?;
    Ok(PhotoRecord {
        id: row.get(0)?,
        original_name: row.get(1)?,
        content_type: row.get(2)?,
        size_bytes: size.max(0).unsigned_abs(),
        created_at: row.get(4)?,
        deleted_at: row.get(5)?,
    })
}
