//! Standardized error codes for machine-parseable output.
//!
//! Error codes follow a numeric taxonomy:
//! - 1xx: Photo errors
//! - 2xx: Migration errors
//! - 3xx: Config errors
//! - 4xx: Delete saga errors
//! - 6xx: Storage errors
//! - 9xx: Internal errors

use serde::{Deserialize, Serialize};

/// Standardized error codes for robot mode output.
///
/// Each variant maps to a numeric code (e.g., `PhotoNotFound` -> E101).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================
    // Photo errors (1xx)
    // ========================================
    /// E101: Photo is absent or already deleted
    PhotoNotFound,
    /// E102: Photo id already exists
    PhotoExists,
    /// E103: Photo id is not usable as a blob file name
    PhotoIdInvalid,

    // ========================================
    // Migration errors (2xx)
    // ========================================
    /// E201: A migration script or its ledger insert failed
    MigrationFailed,
    /// E202: Two migrations share a numeric version
    MigrationDuplicate,
    /// E203: A pending migration sorts below an applied one
    MigrationOutOfOrder,
    /// E204: The migration source could not be read
    MigrationSourceUnreadable,

    // ========================================
    // Config errors (3xx)
    // ========================================
    /// E302: Config file has invalid syntax or values
    ConfigInvalid,
    /// E304: Required config value is missing
    ConfigMissingRequired,

    // ========================================
    // Delete saga errors (4xx)
    // ========================================
    /// E401: Blob could not be moved to staging; nothing changed
    BackupFailed,
    /// E402: Relational commit failed; blob restored
    CommitFailed,
    /// E403: Relational commit failed and the blob could not be restored
    CompensationFailed,

    // ========================================
    // Storage errors (6xx)
    // ========================================
    /// E601: Blob missing from the object store
    BlobMissing,
    /// E604: Database operation failed
    DatabaseError,
    /// E605: Serialization/deserialization failed
    SerializationError,
    /// E606: IO operation failed
    IoError,

    // ========================================
    // Internal errors (9xx)
    // ========================================
    /// E901: Unexpected internal error
    InternalError,
}

impl ErrorCode {
    /// Get the numeric error code (e.g., `PhotoNotFound` -> 101).
    #[must_use]
    pub const fn numeric(&self) -> u16 {
        match self {
            Self::PhotoNotFound => 101,
            Self::PhotoExists => 102,
            Self::PhotoIdInvalid => 103,

            Self::MigrationFailed => 201,
            Self::MigrationDuplicate => 202,
            Self::MigrationOutOfOrder => 203,
            Self::MigrationSourceUnreadable => 204,

            Self::ConfigInvalid => 302,
            Self::ConfigMissingRequired => 304,

            Self::BackupFailed => 401,
            Self::CommitFailed => 402,
            Self::CompensationFailed => 403,

            Self::BlobMissing => 601,
            Self::DatabaseError => 604,
            Self::SerializationError => 605,
            Self::IoError => 606,

            Self::InternalError => 901,
        }
    }

    /// Get the error code as a formatted string (e.g., "E101").
    #[must_use]
    pub fn code_string(&self) -> String {
        format!("E{}", self.numeric())
    }

    /// Get the default suggestion for this error code.
    #[must_use]
    pub const fn suggestion(&self) -> &'static str {
        match self {
            Self::PhotoNotFound => "Run `photovault list` to see active photos. Deleted photos are not listed",
            Self::PhotoExists => "Choose a different id with --id, or omit it to generate one",
            Self::PhotoIdInvalid => "Photo ids may contain letters, digits, '-' and '_' only",

            Self::MigrationFailed => "Fix the failing migration script. Nothing from it was recorded; rerun `photovault migrate`",
            Self::MigrationDuplicate => "Rename one of the migration files so every version number is unique",
            Self::MigrationOutOfOrder => "A migration was added below an already-applied version. Renumber it above the latest applied version",
            Self::MigrationSourceUnreadable => "Check that the migrations directory exists and is readable",

            Self::ConfigInvalid => "Check TOML syntax and values in the config file",
            Self::ConfigMissingRequired => "Set the required value in config.toml or via PHOTOVAULT_* environment variables",

            Self::BackupFailed => "The photo was left untouched. Check that its blob exists and the staging directory is writable",
            Self::CommitFailed => "The delete was rolled back and the blob restored. Retry the delete",
            Self::CompensationFailed => "The delete was rolled back but the blob is still in staging. Run `photovault staging` to locate it",

            Self::BlobMissing => "The blob file is missing from the object store. Check the blob root directory",
            Self::DatabaseError => "Check the database file for corruption and that no other process holds a write lock",
            Self::SerializationError => "The data format may be corrupted. Check input data for validity",
            Self::IoError => "File operation failed. Check path exists and permissions are correct",

            Self::InternalError => "An unexpected error occurred. Please report this issue with full error output",
        }
    }

    /// Check if this error is potentially recoverable by the user.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        match self {
            Self::PhotoNotFound
            | Self::PhotoExists
            | Self::PhotoIdInvalid
            | Self::MigrationSourceUnreadable
            | Self::ConfigInvalid
            | Self::ConfigMissingRequired
            | Self::BackupFailed
            | Self::CommitFailed
            | Self::BlobMissing
            | Self::IoError => true,

            // Schema integrity is a prerequisite for everything else
            Self::MigrationFailed
            | Self::MigrationDuplicate
            | Self::MigrationOutOfOrder
            | Self::CompensationFailed
            | Self::DatabaseError
            | Self::SerializationError
            | Self::InternalError => false,
        }
    }

    /// Get the error category name.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self.numeric() / 100 {
            1 => "photo",
            2 => "migration",
            3 => "config",
            4 => "delete",
            6 => "storage",
            9 => "internal",
            _ => "unknown",
        }
    }

    /// Iterate over all error codes.
    pub fn all() -> impl Iterator<Item = Self> {
        [
            Self::PhotoNotFound,
            Self::PhotoExists,
            Self::PhotoIdInvalid,
            Self::MigrationFailed,
            Self::MigrationDuplicate,
            Self::MigrationOutOfOrder,
            Self::MigrationSourceUnreadable,
            Self::ConfigInvalid,
            Self::ConfigMissingRequired,
            Self::BackupFailed,
            Self::CommitFailed,
            Self::CompensationFailed,
            Self::BlobMissing,
            Self::DatabaseError,
            Self::SerializationError,
            Self::IoError,
            Self::InternalError,
        ]
        .into_iter()
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code_string())
    }
}
