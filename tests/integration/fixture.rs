use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use photovault::storage::{
    ConsistencyCoordinator, DeleteEvent, DeleteObserver, EmbeddedMigrations, MetadataStore,
    NewPhoto, ObjectStore, SagaState, SchemaMigrator,
};
use tempfile::TempDir;

/// Assert stdout contains expected text
#[macro_export]
macro_rules! assert_stdout_contains {
    ($output:expr, $expected:expr) => {
        assert!(
            $output.stdout.contains($expected),
            "stdout does not contain '{}'\nActual stdout:\n{}",
            $expected,
            $output.stdout
        );
    };
}

/// Assert command succeeded
#[macro_export]
macro_rules! assert_command_success {
    ($output:expr) => {
        assert!(
            $output.success,
            "Command failed with exit code {}\nstdout: {}\nstderr: {}",
            $output.exit_code, $output.stdout, $output.stderr
        );
    };
}

/// Observer that keeps every callback for later inspection.
#[derive(Default)]
pub struct RecordingObserver {
    pub transitions: Mutex<Vec<(String, SagaState, SagaState)>>,
    pub deferred: Mutex<Vec<String>>,
    pub compensation_failures: Mutex<Vec<String>>,
    pub events: Mutex<Vec<DeleteEvent>>,
}

impl DeleteObserver for RecordingObserver {
    fn transition(&self, id: &str, from: SagaState, to: SagaState) {
        self.transitions.lock().push((id.to_string(), from, to));
    }

    fn finalize_deferred(&self, id: &str, _staged: &Path, _error: &std::io::Error) {
        self.deferred.lock().push(id.to_string());
    }

    fn compensation_failed(&self, id: &str, _staged: &Path, _error: &std::io::Error) {
        self.compensation_failures.lock().push(id.to_string());
    }

    fn deleted(&self, event: &DeleteEvent) {
        self.events.lock().push(event.clone());
    }
}

#[derive(Debug)]
pub struct CommandOutput {
    pub success: bool,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.stdout)
            .unwrap_or_else(|err| panic!("stdout is not JSON ({err}):\n{}", self.stdout))
    }
}

/// A migrated vault in a temporary directory.
pub struct TestVault {
    pub temp_dir: TempDir,
    pub root: PathBuf,
    pub metadata: MetadataStore,
    pub objects: ObjectStore,
    pub observer: Arc<RecordingObserver>,
    pub coordinator: ConsistencyCoordinator,
}

impl TestVault {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path().join("vault");

        // Same layout the CLI uses with default config
        let metadata = MetadataStore::open(root.join("vault.db"), Duration::from_secs(5))
            .expect("Failed to open metadata store");
        metadata
            .migrate(&SchemaMigrator::new(EmbeddedMigrations))
            .expect("Failed to migrate");
        let objects = ObjectStore::open(root.join("blobs")).expect("Failed to open object store");

        let observer = Arc::new(RecordingObserver::default());
        let coordinator = ConsistencyCoordinator::new(metadata.clone(), objects.clone())
            .with_observer(observer.clone());

        Self {
            temp_dir,
            root,
            metadata,
            objects,
            observer,
            coordinator,
        }
    }

    /// Store a blob and its record.
    pub fn add_photo(&self, id: &str, bytes: &[u8]) {
        self.objects.put(id, bytes).expect("Failed to put blob");
        self.metadata
            .insert_photo(&NewPhoto {
                id: id.to_string(),
                original_name: format!("{id}.jpg"),
                content_type: Some("image/jpeg".to_string()),
                size_bytes: bytes.len() as u64,
            })
            .expect("Failed to insert photo");
    }

    /// Make every `deleted_at` update fail inside SQLite.
    pub fn refuse_commits(&self) {
        self.metadata
            .connect()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER refuse_delete BEFORE UPDATE OF deleted_at ON photos
                 BEGIN SELECT RAISE(ABORT, 'delete refused by test trigger'); END;",
            )
            .unwrap();
    }

    /// Occupy the final blob location so the finalize rename fails.
    pub fn block_finalize(&self, id: &str) {
        let target = self.objects.deleted_path(id);
        std::fs::create_dir_all(target.join("occupied")).unwrap();
    }

    /// Run the CLI binary against this vault.
    pub fn run(&self, args: &[&str]) -> CommandOutput {
        let output = Command::new(env!("CARGO_BIN_EXE_photovault"))
            .args(args)
            .env("PHOTOVAULT_ROOT", &self.root)
            .env_remove("PHOTOVAULT_CONFIG")
            .env_remove("PHOTOVAULT_ROBOT")
            .env("NO_COLOR", "1")
            .current_dir(self.temp_dir.path())
            .output()
            .expect("Failed to execute photovault");

        CommandOutput {
            success: output.status.success(),
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }
    }
}
