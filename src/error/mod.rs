//! Error handling for photovault.
//!
//! This module provides:
//! - [`VaultError`]: The main error enum for all vault operations
//! - [`ErrorCode`]: Standardized error codes for machine parsing
//! - [`StructuredError`]: Rich error type with suggestions and context

mod codes;
mod suggestions;

use std::io;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use codes::ErrorCode;
pub use suggestions::suggest_for_error;

/// Main error type for photovault operations.
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Photo not found: {0}")]
    PhotoNotFound(String),

    #[error("Photo already exists: {0}")]
    PhotoExists(String),

    #[error("Invalid photo id: {0:?}")]
    InvalidPhotoId(String),

    #[error("Blob missing for photo: {0}")]
    BlobMissing(String),

    #[error("Migration source error: {0}")]
    MigrationSource(String),

    #[error("Duplicate migration version {version}: {first} and {second}")]
    DuplicateMigration {
        version: u64,
        first: String,
        second: String,
    },

    #[error("Migration {version}_{name} is pending but version {applied} is already applied")]
    MigrationOutOfOrder {
        version: String,
        name: String,
        applied: String,
    },

    #[error("Migration {version}_{name} failed: {reason}")]
    MigrationFailed {
        version: String,
        name: String,
        reason: String,
    },

    #[error("Backup of photo {id} failed: {source}")]
    BackupFailed {
        id: String,
        #[source]
        source: io::Error,
    },

    #[error("Commit of delete for photo {id} failed ({}): {reason}", restore_note(.restored))]
    CommitFailed {
        id: String,
        reason: String,
        restored: bool,
    },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Missing required config: {0}")]
    MissingConfig(String),
}

const fn restore_note(restored: &bool) -> &'static str {
    if *restored {
        "blob restored"
    } else {
        "blob left in staging"
    }
}

impl VaultError {
    /// Get the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::SerializationError,
            Self::PhotoNotFound(_) => ErrorCode::PhotoNotFound,
            Self::PhotoExists(_) => ErrorCode::PhotoExists,
            Self::InvalidPhotoId(_) => ErrorCode::PhotoIdInvalid,
            Self::BlobMissing(_) => ErrorCode::BlobMissing,
            Self::MigrationSource(_) => ErrorCode::MigrationSourceUnreadable,
            Self::DuplicateMigration { .. } => ErrorCode::MigrationDuplicate,
            Self::MigrationOutOfOrder { .. } => ErrorCode::MigrationOutOfOrder,
            Self::MigrationFailed { .. } => ErrorCode::MigrationFailed,
            Self::BackupFailed { .. } => ErrorCode::BackupFailed,
            Self::CommitFailed { restored: true, .. } => ErrorCode::CommitFailed,
            Self::CommitFailed {
                restored: false, ..
            } => ErrorCode::CompensationFailed,
            Self::Config(_) => ErrorCode::ConfigInvalid,
            Self::MissingConfig(_) => ErrorCode::ConfigMissingRequired,
        }
    }

    /// True when the failed operation left both stores exactly as they were.
    #[must_use]
    pub const fn left_state_unchanged(&self) -> bool {
        matches!(
            self,
            Self::PhotoNotFound(_)
                | Self::BackupFailed { .. }
                | Self::CommitFailed { restored: true, .. }
        )
    }

    /// Get context information for this error as JSON.
    #[must_use]
    pub fn context(&self) -> Option<Value> {
        match self {
            Self::PhotoNotFound(id)
            | Self::PhotoExists(id)
            | Self::BlobMissing(id)
            | Self::BackupFailed { id, .. } => Some(serde_json::json!({ "photo_id": id })),
            Self::CommitFailed { id, restored, .. } => {
                Some(serde_json::json!({ "photo_id": id, "restored": restored }))
            }
            Self::MigrationFailed { version, name, .. }
            | Self::MigrationOutOfOrder { version, name, .. } => {
                Some(serde_json::json!({ "version": version, "name": name }))
            }
            Self::DuplicateMigration {
                version,
                first,
                second,
            } => Some(serde_json::json!({ "version": version, "files": [first, second] })),
            Self::MissingConfig(key) => Some(serde_json::json!({ "config_key": key })),
            _ => None,
        }
    }

    /// Convert this error to a structured error.
    #[must_use]
    pub fn to_structured(&self) -> StructuredError {
        StructuredError::from_vault_error(self)
    }
}

/// A structured error with machine-readable code, suggestion, and context.
///
/// Used for robot mode output where callers parse errors and decide
/// whether to retry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// The error code (e.g., "PHOTO_NOT_FOUND")
    pub code: ErrorCode,

    /// The numeric error code (e.g., 101)
    pub numeric_code: u16,

    /// Human-readable error message
    pub message: String,

    /// Actionable suggestion for recovery
    pub suggestion: String,

    /// Additional context for debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,

    /// Whether this error is potentially recoverable by the user
    pub recoverable: bool,

    /// Error category (e.g., "photo", "migration", "delete")
    pub category: String,
}

impl StructuredError {
    /// Create a new structured error.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            numeric_code: code.numeric(),
            suggestion: code.suggestion().to_string(),
            context: None,
            recoverable: code.is_recoverable(),
            category: code.category().to_string(),
            code,
            message: message.into(),
        }
    }

    /// Create a structured error from a `VaultError`.
    #[must_use]
    pub fn from_vault_error(err: &VaultError) -> Self {
        let code = err.code();
        let context = err.context();
        let suggestion = suggest_for_error(code, context.as_ref());

        Self {
            code,
            numeric_code: code.numeric(),
            message: err.to_string(),
            suggestion,
            context,
            recoverable: code.is_recoverable(),
            category: code.category().to_string(),
        }
    }
}

impl std::fmt::Display for StructuredError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl From<&VaultError> for StructuredError {
    fn from(err: &VaultError) -> Self {
        Self::from_vault_error(err)
    }
}

/// Result type alias using `VaultError`.
pub type Result<T> = std::result::Result<T, VaultError>;
