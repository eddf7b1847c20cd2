//! Flat-file blob store.
//!
//! Layout under the blob root:
//!
//! ```text
//! <root>/<id>                         active blob
//! <root>/staging/<id>.backup.<stamp>  blob held by an in-flight delete
//! <root>/deleted/<id>                 blob of a deleted photo
//! ```
//!
//! Relocation is a plain `rename`, so all three locations must live on the
//! same filesystem.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{Result, VaultError};

const STAGING_DIR: &str = "staging";
const DELETED_DIR: &str = "deleted";
const BACKUP_MARKER: &str = ".backup.";
const STAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.6fZ";

/// Reject ids that are unusable as a single file name or that collide with
/// the store's own subdirectories.
pub fn validate_id(id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        && id != STAGING_DIR
        && id != DELETED_DIR;
    if valid {
        Ok(())
    } else {
        Err(VaultError::InvalidPhotoId(id.to_string()))
    }
}

/// A blob sitting in the staging directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StagedBlob {
    pub id: String,
    /// Timestamp embedded in the file name.
    pub stamp: String,
    pub path: PathBuf,
    pub size_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct ObjectStore {
    root: PathBuf,
    staging: PathBuf,
    deleted: PathBuf,
}

impl ObjectStore {
    /// Open the store, creating the root and both subdirectories if absent.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let staging = root.join(STAGING_DIR);
        let deleted = root.join(DELETED_DIR);
        fs::create_dir_all(&staging)?;
        fs::create_dir_all(&deleted)?;
        Ok(Self {
            root,
            staging,
            deleted,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging
    }

    pub fn deleted_dir(&self) -> &Path {
        &self.deleted
    }

    #[must_use]
    pub fn primary_path(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    #[must_use]
    pub fn deleted_path(&self, id: &str) -> PathBuf {
        self.deleted.join(id)
    }

    /// Staging file name embeds id and timestamp, so concurrent deletes of
    /// different ids never collide.
    #[must_use]
    pub fn staging_path(&self, id: &str, stamp: &DateTime<Utc>) -> PathBuf {
        self.staging
            .join(format!("{id}{BACKUP_MARKER}{}", stamp.format(STAMP_FORMAT)))
    }

    /// Write a new active blob.
    ///
    /// The bytes land in a synced temporary file that is then hard-linked to
    /// the primary path. Linking never replaces an existing file, so of two
    /// writers racing on one id exactly one publishes and the other gets
    /// `PhotoExists`.
    pub fn put(&self, id: &str, bytes: &[u8]) -> Result<PathBuf> {
        validate_id(id)?;
        let target = self.primary_path(id);
        if target.exists() {
            return Err(VaultError::PhotoExists(id.to_string()));
        }

        let tmp = self.root.join(format!(".{id}.{}.tmp", Uuid::new_v4()));
        let write = || -> io::Result<()> {
            let mut file = OpenOptions::new().write(true).create_new(true).open(&tmp)?;
            file.write_all(bytes)?;
            file.sync_all()?;
            fs::hard_link(&tmp, &target)
        };
        let published = write();
        fs::remove_file(&tmp).ok();
        match published {
            Ok(()) => Ok(target),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                Err(VaultError::PhotoExists(id.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Read the blob at the primary path. This is raw storage access; the
    /// photo read path is `ConsistencyCoordinator::fetch`.
    pub fn read(&self, id: &str) -> Result<Vec<u8>> {
        validate_id(id)?;
        fs::read(self.primary_path(id)).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => VaultError::BlobMissing(id.to_string()),
            _ => VaultError::Io(err),
        })
    }

    #[must_use]
    pub fn exists(&self, id: &str) -> bool {
        validate_id(id).is_ok() && self.primary_path(id).is_file()
    }

    /// Remove an active blob. Missing blobs are not an error.
    pub fn remove(&self, id: &str) -> Result<()> {
        validate_id(id)?;
        match fs::remove_file(self.primary_path(id)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Atomically move a blob. The raw `io::Error` is returned so callers can
    /// tell a missing source from other failures.
    pub fn relocate(from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    /// Every blob in the staging directory, oldest stamp first.
    pub fn staged(&self) -> Result<Vec<StagedBlob>> {
        let mut blobs = Vec::new();
        for entry in fs::read_dir(&self.staging)? {
            let entry = entry?;
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let Some((id, stamp)) = file_name.split_once(BACKUP_MARKER) else {
                continue;
            };
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            blobs.push(StagedBlob {
                id: id.to_string(),
                stamp: stamp.to_string(),
                path: entry.path(),
                size_bytes: metadata.len(),
            });
        }
        blobs.sort_by(|a, b| a.stamp.cmp(&b.stamp).then_with(|| a.id.cmp(&b.id)));
        Ok(blobs)
    }

    /// Staged blobs belonging to `id`.
    pub fn find_staged(&self, id: &str) -> Result<Vec<StagedBlob>> {
        Ok(self
            .staged()?
            .into_iter()
            .filter(|blob| blob.id == id)
            .collect())
    }
}
