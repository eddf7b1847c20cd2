//! Storage layer for photovault
//!
//! Dual persistence: SQLite for photo metadata, a flat directory tree for blob
//! bytes. The two are kept consistent by the delete saga in [`coordinator`].

pub mod coordinator;
pub mod ledger;
pub mod migrations;
pub mod objects;
pub mod sqlite;

pub use coordinator::{
    BlobLocation, ConsistencyCoordinator, DeleteEvent, DeleteObserver, DeleteOutcome,
    RecordState, SagaState, StagedReport, TracingObserver,
};
pub use ledger::{LedgerEntry, VersionLedger};
pub use migrations::{
    DirectoryMigrations, EmbeddedMigrations, Migration, MigrationReport, MigrationSource,
    MigrationStatus, MigrationWarning, SchemaMigrator,
};
pub use objects::{ObjectStore, StagedBlob};
pub use sqlite::{MetadataStore, NewPhoto, PhotoRecord};
