use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VaultError};

/// Environment variable naming the vault root directory.
pub const ROOT_ENV: &str = "PHOTOVAULT_ROOT";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub robot: RobotConfig,
}

impl Config {
    /// Defaults, then `--config` / `PHOTOVAULT_CONFIG` or `<root>/config.toml`,
    /// then `PHOTOVAULT_*` environment overrides.
    pub fn load(explicit_path: Option<&Path>, root: &Path) -> Result<Self> {
        let mut config = Self::default();

        let path = explicit_path
            .map(PathBuf::from)
            .or_else(|| env_string("PHOTOVAULT_CONFIG").map(PathBuf::from))
            .unwrap_or_else(|| root.join("config.toml"));

        if let Some(patch) = Self::load_patch(&path)? {
            config.merge_patch(patch);
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Whether commands should answer in the robot JSON envelope.
    #[must_use]
    pub fn robot_output(&self) -> bool {
        self.robot.format == "json"
    }

    fn load_patch(path: &Path) -> Result<Option<ConfigPatch>> {
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|err| VaultError::Config(format!("read config {}: {err}", path.display())))?;
        let patch = toml::from_str(&raw)
            .map_err(|err| VaultError::Config(format!("parse config {}: {err}", path.display())))?;
        Ok(Some(patch))
    }

    fn merge_patch(&mut self, patch: ConfigPatch) {
        if let Some(patch) = patch.storage {
            self.storage.merge(patch);
        }
        if let Some(patch) = patch.robot {
            self.robot.merge(patch);
        }
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if robot_requested_by_env() {
            self.robot.format = "json".to_string();
        }
        if let Some(value) = env_string("PHOTOVAULT_DB_PATH") {
            self.storage.db_path = value;
        }
        if let Some(value) = env_string("PHOTOVAULT_BLOB_ROOT") {
            self.storage.blob_root = value;
        }
        if let Some(value) = env_string("PHOTOVAULT_MIGRATIONS_DIR") {
            self.storage.migrations_dir = Some(value);
        }
        if let Some(value) = env_u64("PHOTOVAULT_BUSY_TIMEOUT_MS")? {
            self.storage.busy_timeout_ms = value;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.storage.db_path.trim().is_empty() {
            return Err(VaultError::MissingConfig("storage.db_path".to_string()));
        }
        if self.storage.blob_root.trim().is_empty() {
            return Err(VaultError::MissingConfig("storage.blob_root".to_string()));
        }
        if !matches!(self.robot.format.as_str(), "human" | "json") {
            return Err(VaultError::Config(format!(
                "invalid robot.format {} (expected human|json)",
                self.robot.format
            )));
        }
        Ok(())
    }
}

/// `PHOTOVAULT_ROBOT` on its own, for when the config file could not be loaded.
#[must_use]
pub fn robot_requested_by_env() -> bool {
    env_bool("PHOTOVAULT_ROBOT").unwrap_or(false)
}

/// Default vault root: `$PHOTOVAULT_ROOT`, else the platform data directory.
#[must_use]
pub fn default_root() -> PathBuf {
    env_string(ROOT_ENV).map_or_else(
        || {
            dirs::data_dir()
                .map(|dir| dir.join("photovault"))
                .unwrap_or_else(|| PathBuf::from(".photovault"))
        },
        PathBuf::from,
    )
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database file, relative paths resolve against the vault root.
    #[serde(default)]
    pub db_path: String,
    /// Blob root directory, relative paths resolve against the vault root.
    #[serde(default)]
    pub blob_root: String,
    /// Read migrations from this directory instead of the embedded set.
    #[serde(default)]
    pub migrations_dir: Option<String>,
    #[serde(default)]
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: "vault.db".to_string(),
            blob_root: "blobs".to_string(),
            migrations_dir: None,
            busy_timeout_ms: 5_000,
        }
    }
}

impl StorageConfig {
    fn merge(&mut self, patch: StoragePatch) {
        if let Some(value) = patch.db_path {
            self.db_path = value;
        }
        if let Some(value) = patch.blob_root {
            self.blob_root = value;
        }
        if let Some(value) = patch.migrations_dir {
            self.migrations_dir = Some(value);
        }
        if let Some(value) = patch.busy_timeout_ms {
            self.busy_timeout_ms = value;
        }
    }

    #[must_use]
    pub fn db_path(&self, root: &Path) -> PathBuf {
        resolve(root, &self.db_path)
    }

    #[must_use]
    pub fn blob_root(&self, root: &Path) -> PathBuf {
        resolve(root, &self.blob_root)
    }

    #[must_use]
    pub fn migrations_dir(&self, root: &Path) -> Option<PathBuf> {
        self.migrations_dir.as_deref().map(|dir| resolve(root, dir))
    }

    #[must_use]
    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobotConfig {
    #[serde(default)]
    pub format: String,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            format: "human".to_string(),
        }
    }
}

impl RobotConfig {
    fn merge(&mut self, patch: RobotPatch) {
        if let Some(value) = patch.format {
            self.format = value;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigPatch {
    pub storage: Option<StoragePatch>,
    pub robot: Option<RobotPatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct StoragePatch {
    pub db_path: Option<String>,
    pub blob_root: Option<String>,
    pub migrations_dir: Option<String>,
    pub busy_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RobotPatch {
    pub format: Option<String>,
}

fn resolve(root: &Path, value: &str) -> PathBuf {
    let path = PathBuf::from(shellexpand_home(value));
    if path.is_absolute() {
        path
    } else {
        root.join(path)
    }
}

fn shellexpand_home(value: &str) -> String {
    match (value.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest).to_string_lossy().into_owned(),
        _ => value.to_string(),
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key).ok().map(|value| {
        matches!(
            value.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn env_u64(key: &str) -> Result<Option<u64>> {
    match std::env::var(key) {
        Ok(value) => value.parse::<u64>().map(Some).map_err(|err| {
            VaultError::Config(format!("invalid {key} value {value}: {err}"))
        }),
        Err(_) => Ok(None),
    }
}
