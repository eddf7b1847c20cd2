//! Soft-delete saga across the metadata store and the object store.
//!
//! Neither store can join the other's transaction, so a delete is a sequence
//! of forward steps with one compensating step:
//!
//! 1. **Prepare**: rename the blob from its primary path into staging.
//! 2. **Commit**: conditionally set `deleted_at` in one SQLite transaction.
//!    On failure the staged blob is renamed back (compensation).
//! 3. **Finalize**: rename the staged blob into `deleted/`. Failure here is
//!    only deferred housekeeping; the relational state is already final.
//!
//! Step 2 is the consistency boundary. Nothing before it is visible to
//! readers; everything after it is.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::{Result, VaultError};

use super::objects::{ObjectStore, StagedBlob, validate_id};
use super::sqlite::{MetadataStore, PhotoRecord, format_timestamp};

/// Saga states. Only `Active` and the post-commit states are visible to
/// metadata readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SagaState {
    Active,
    BackedUp,
    Committed,
    Finalized,
    RolledBack,
}

impl fmt::Display for SagaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::BackedUp => write!(f, "backed_up"),
            Self::Committed => write!(f, "committed"),
            Self::Finalized => write!(f, "finalized"),
            Self::RolledBack => write!(f, "rolled_back"),
        }
    }
}

/// Where the blob of a deleted photo ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "path", rename_all = "snake_case")]
pub enum BlobLocation {
    /// Terminal location under `deleted/`.
    Deleted(PathBuf),
    /// Finalize failed; the blob is still in staging.
    Staged(PathBuf),
}

impl BlobLocation {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Deleted(path) | Self::Staged(path) => path,
        }
    }
}

/// Completion event emitted after a successful delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteEvent {
    pub id: String,
    pub original_name: String,
    pub deleted_at: String,
}

/// Result of a successful delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    pub id: String,
    pub original_name: String,
    pub deleted_at: String,
    pub blob: BlobLocation,
}

impl DeleteOutcome {
    /// False when the record is deleted but the blob still sits in staging.
    #[must_use]
    pub const fn finalized(&self) -> bool {
        matches!(self.blob, BlobLocation::Deleted(_))
    }
}

/// Logging capability handed to the coordinator.
pub trait DeleteObserver: Send + Sync {
    fn transition(&self, id: &str, from: SagaState, to: SagaState);

    /// Final relocation failed after a successful commit.
    fn finalize_deferred(&self, id: &str, staged: &Path, error: &io::Error);

    /// Commit failed and the staged blob could not be moved back.
    fn compensation_failed(&self, id: &str, staged: &Path, error: &io::Error);

    fn deleted(&self, event: &DeleteEvent);
}

/// Default observer: forwards everything to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl DeleteObserver for TracingObserver {
    fn transition(&self, id: &str, from: SagaState, to: SagaState) {
        debug!(photo_id = id, %from, %to, "Delete saga transition");
    }

    fn finalize_deferred(&self, id: &str, staged: &Path, error: &io::Error) {
        warn!(
            photo_id = id,
            staged = %staged.display(),
            %error,
            "Photo deleted but blob left in staging"
        );
    }

    fn compensation_failed(&self, id: &str, staged: &Path, error: &io::Error) {
        error!(
            photo_id = id,
            staged = %staged.display(),
            %error,
            "Could not restore staged blob after failed commit"
        );
    }

    fn deleted(&self, event: &DeleteEvent) {
        info!(
            photo_id = %event.id,
            original_name = %event.original_name,
            deleted_at = %event.deleted_at,
            "Photo deleted"
        );
    }
}

/// Relational state of the photo a staged blob belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    Active,
    Deleted,
    Missing,
}

/// A staged blob paired with the state of its record.
#[derive(Debug, Clone, Serialize)]
pub struct StagedReport {
    #[serde(flatten)]
    pub blob: StagedBlob,
    pub record: RecordState,
}

/// Sequences the soft-delete saga. Holds no state of its own beyond handles
/// to the two stores and the observer.
#[derive(Clone)]
pub struct ConsistencyCoordinator {
    metadata: MetadataStore,
    objects: ObjectStore,
    observer: Arc<dyn DeleteObserver>,
}

impl fmt::Debug for ConsistencyCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsistencyCoordinator")
            .field("metadata", &self.metadata)
            .field("objects", &self.objects)
            .finish_non_exhaustive()
    }
}

impl ConsistencyCoordinator {
    pub fn new(metadata: MetadataStore, objects: ObjectStore) -> Self {
        Self {
            metadata,
            objects,
            observer: Arc::new(TracingObserver),
        }
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn DeleteObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Soft-delete a photo.
    ///
    /// Absent and already-deleted ids both yield `PhotoNotFound`. Of several
    /// concurrent calls for one id, exactly one succeeds.
    pub fn delete(&self, id: &str) -> Result<DeleteOutcome> {
        validate_id(id).map_err(|_| VaultError::PhotoNotFound(id.to_string()))?;

        let record = self
            .metadata
            .get_active(id)?
            .ok_or_else(|| VaultError::PhotoNotFound(id.to_string()))?;

        let now = Utc::now();
        let deleted_at = format_timestamp(&now);
        let primary = self.objects.primary_path(id);
        let staged = self.objects.staging_path(id, &now);

        // Prepare
        if let Err(source) = ObjectStore::relocate(&primary, &staged) {
            if source.kind() == io::ErrorKind::NotFound && self.lost_race(id) {
                return Err(VaultError::PhotoNotFound(id.to_string()));
            }
            return Err(VaultError::BackupFailed {
                id: id.to_string(),
                source,
            });
        }
        self.observer
            .transition(id, SagaState::Active, SagaState::BackedUp);

        // Commit
        match self.metadata.mark_deleted(id, &deleted_at) {
            Ok(true) => {
                self.observer
                    .transition(id, SagaState::BackedUp, SagaState::Committed);
            }
            Ok(false) => return Err(self.settle_unmatched_commit(id, &staged, &primary)),
            Err(err) => {
                let restored = self.compensate(id, &staged, &primary);
                return Err(VaultError::CommitFailed {
                    id: id.to_string(),
                    reason: err.to_string(),
                    restored,
                });
            }
        }

        // Finalize
        let final_path = self.objects.deleted_path(id);
        let blob = match ObjectStore::relocate(&staged, &final_path) {
            Ok(()) => {
                self.observer
                    .transition(id, SagaState::Committed, SagaState::Finalized);
                BlobLocation::Deleted(final_path)
            }
            Err(err) => {
                self.observer.finalize_deferred(id, &staged, &err);
                BlobLocation::Staged(staged)
            }
        };

        let event = DeleteEvent {
            id: record.id,
            original_name: record.original_name,
            deleted_at,
        };
        self.observer.deleted(&event);

        Ok(DeleteOutcome {
            id: event.id,
            original_name: event.original_name,
            deleted_at: event.deleted_at,
            blob,
        })
    }

    /// The active photo `id` as readers see it.
    ///
    /// A record that is still active while its blob sits in staging belongs
    /// to a delete between prepare and commit. That photo is not found rather
    /// than active without a blob. `BlobMissing` is left for a blob that is
    /// gone with no delete to account for it.
    pub fn fetch(&self, id: &str) -> Result<PhotoRecord> {
        let not_found = || VaultError::PhotoNotFound(id.to_string());
        validate_id(id).map_err(|_| not_found())?;

        let record = self.metadata.get_active(id)?.ok_or_else(not_found)?;
        if self.objects.exists(id) {
            return Ok(record);
        }
        if !self.objects.find_staged(id)?.is_empty() || self.metadata.get_active(id)?.is_none() {
            return Err(not_found());
        }
        // Compensated between the checks above
        if self.objects.exists(id) {
            return Ok(record);
        }
        Err(VaultError::BlobMissing(id.to_string()))
    }

    /// Staging directory contents with the state of each blob's record.
    /// Read-only: nothing is moved.
    pub fn staged_report(&self) -> Result<Vec<StagedReport>> {
        let mut report = Vec::new();
        for blob in self.objects.staged()? {
            let record = match self.metadata.get_any(&blob.id)? {
                Some(record) if record.is_active() => RecordState::Active,
                Some(_) => RecordState::Deleted,
                None => RecordState::Missing,
            };
            report.push(StagedReport { blob, record });
        }
        Ok(report)
    }

    /// Move the staged blob back to its primary path.
    fn compensate(&self, id: &str, staged: &Path, primary: &Path) -> bool {
        match ObjectStore::relocate(staged, primary) {
            Ok(()) => {
                self.observer
                    .transition(id, SagaState::BackedUp, SagaState::RolledBack);
                true
            }
            Err(err) => {
                self.observer.compensation_failed(id, staged, &err);
                false
            }
        }
    }

    /// The conditional update matched no row although the record was active
    /// at the precondition check. A record deleted in between keeps its blob
    /// out of the primary path: the staged blob moves on to `deleted/`, or
    /// stays staged when that fails. Only a record still active gets its
    /// blob back.
    fn settle_unmatched_commit(&self, id: &str, staged: &Path, primary: &Path) -> VaultError {
        match self.metadata.get_active(id) {
            Ok(None) => {
                match ObjectStore::relocate(staged, &self.objects.deleted_path(id)) {
                    Ok(()) => self
                        .observer
                        .transition(id, SagaState::BackedUp, SagaState::Finalized),
                    Err(err) => self.observer.finalize_deferred(id, staged, &err),
                }
                VaultError::PhotoNotFound(id.to_string())
            }
            Ok(Some(_)) => {
                let restored = self.compensate(id, staged, primary);
                VaultError::CommitFailed {
                    id: id.to_string(),
                    reason: "conditional update matched no row".to_string(),
                    restored,
                }
            }
            // Record state unknown: leave the blob staged for the staging report
            Err(err) => VaultError::CommitFailed {
                id: id.to_string(),
                reason: err.to_string(),
                restored: false,
            },
        }
    }

    /// After a failed prepare with a missing source: did a concurrent delete
    /// of the same id get there first? Staging is checked before the record
    /// so a winner finalizing in between is still seen as deleted.
    fn lost_race(&self, id: &str) -> bool {
        let staged_elsewhere = self
            .objects
            .find_staged(id)
            .is_ok_and(|blobs| !blobs.is_empty());
        staged_elsewhere || matches!(self.metadata.get_active(id), Ok(None))
    }
}
