//! Application context shared by every command.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{Result, VaultError};
use crate::storage::migrations::{
    DirectoryMigrations, EmbeddedMigrations, MigrationReport, MigrationSource, MigrationStatus,
    SchemaMigrator,
};
use crate::storage::objects::validate_id;
use crate::storage::{ConsistencyCoordinator, MetadataStore, NewPhoto, ObjectStore, PhotoRecord};

pub type DynMigrator = SchemaMigrator<Box<dyn MigrationSource + Send + Sync>>;

pub struct AppContext {
    pub root: PathBuf,
    pub config: Config,
    pub metadata: MetadataStore,
    pub objects: ObjectStore,
    pub coordinator: ConsistencyCoordinator,
    pub migrator: DynMigrator,
    pub robot_mode: bool,
}

impl AppContext {
    /// Build the context from a loaded config.
    ///
    /// Unless `skip_migrations` is set, pending schema migrations run before
    /// anything else and a migration failure aborts startup.
    pub fn from_config(
        root: PathBuf,
        config: Config,
        robot_mode: bool,
        skip_migrations: bool,
    ) -> Result<Self> {
        let ctx = Self::open(root, config, robot_mode)?;
        if !skip_migrations {
            ctx.migrate()?;
        }
        Ok(ctx)
    }

    /// Open both stores under `root` without touching the schema.
    pub fn open(root: PathBuf, config: Config, robot_mode: bool) -> Result<Self> {
        std::fs::create_dir_all(&root)?;

        let storage = &config.storage;
        let metadata = MetadataStore::open(storage.db_path(&root), storage.busy_timeout())?;
        let objects = ObjectStore::open(storage.blob_root(&root))?;
        let coordinator = ConsistencyCoordinator::new(metadata.clone(), objects.clone());

        let source: Box<dyn MigrationSource + Send + Sync> = match storage.migrations_dir(&root) {
            Some(dir) => Box::new(DirectoryMigrations::new(dir)),
            None => Box::new(EmbeddedMigrations),
        };
        debug!(
            root = %root.display(),
            db = %metadata.path().display(),
            blobs = %objects.root().display(),
            migrations = %source.describe(),
            "Opened vault"
        );

        Ok(Self {
            root,
            config,
            metadata,
            objects,
            coordinator,
            migrator: SchemaMigrator::new(source),
            robot_mode,
        })
    }

    pub fn migrate(&self) -> Result<MigrationReport> {
        self.metadata.migrate(&self.migrator)
    }

    pub fn migration_status(&self) -> Result<Vec<MigrationStatus>> {
        self.metadata.migration_status(&self.migrator)
    }

    /// Import a file as a new photo.
    ///
    /// The blob is written first. `put` only succeeds for the writer that
    /// published the blob, so when the record insert then fails the blob is
    /// ours to remove. A failed cleanup is logged and the insert error wins.
    pub fn import_photo(
        &self,
        file: &Path,
        id: Option<&str>,
        content_type: Option<&str>,
    ) -> Result<PhotoRecord> {
        let id = id.map_or_else(|| Uuid::new_v4().simple().to_string(), str::to_string);
        validate_id(&id)?;

        if self.metadata.get_any(&id)?.is_some() {
            return Err(VaultError::PhotoExists(id));
        }

        let bytes = std::fs::read(file)?;
        let original_name = file
            .file_name()
            .map_or_else(|| id.clone(), |name| name.to_string_lossy().into_owned());
        let content_type = content_type
            .map(str::to_string)
            .or_else(|| guess_content_type(file).map(str::to_string));

        self.objects.put(&id, &bytes)?;
        let photo = NewPhoto {
            id: id.clone(),
            original_name,
            content_type,
            size_bytes: bytes.len() as u64,
        };
        match self.metadata.insert_photo(&photo) {
            Ok(record) => {
                info!(id = %record.id, size = record.size_bytes, "Imported photo");
                Ok(record)
            }
            Err(err) => {
                if let Err(cleanup) = self.objects.remove(&id) {
                    warn!(id = %id, error = %cleanup, "Failed to remove blob of rejected import");
                }
                Err(err)
            }
        }
    }
}

fn guess_content_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_string_lossy().to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "heic" => Some("image/heic"),
        "tif" | "tiff" => Some("image/tiff"),
        _ => None,
    }
}
