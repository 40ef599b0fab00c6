//! Durable grant persistence
//!
//! Directory references and account identities survive restarts through a
//! [`SettingsStore`]. Pending authorization flows are never stored.

use crate::destination::RegistrySnapshot;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Load the last saved snapshot, `None` if nothing was saved yet
    async fn load(&self) -> Result<Option<RegistrySnapshot>, StorageError>;

    async fn save(&self, snapshot: &RegistrySnapshot) -> Result<(), StorageError>;
}

/// JSON file store, written through a temporary file and renamed
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "backup-settings.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SettingsStore for FileSettingsStore {
    async fn load(&self) -> Result<Option<RegistrySnapshot>, StorageError> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StorageError::Io(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        let snapshot = serde_json::from_str(&contents).map_err(|e| {
            StorageError::Serialization(format!("Failed to parse backup settings: {}", e))
        })?;
        Ok(Some(snapshot))
    }

    async fn save(&self, snapshot: &RegistrySnapshot) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    StorageError::Io(format!("Failed to create settings directory: {}", e))
                })?;
            }
        }

        let json = serde_json::to_string_pretty(snapshot).map_err(|e| {
            StorageError::Serialization(format!("Failed to serialize backup settings: {}", e))
        })?;

        let temp = self.temp_path();
        fs::write(&temp, json)
            .await
            .map_err(|e| StorageError::Io(format!("Failed to write settings: {}", e)))?;
        fs::rename(&temp, &self.path)
            .await
            .map_err(|e| StorageError::Io(format!("Failed to replace settings: {}", e)))?;

        debug!(path = %self.path.display(), "backup settings saved");
        Ok(())
    }
}

/// In-memory store, the default when no settings path is configured
#[derive(Default)]
pub struct MemorySettingsStore {
    snapshot: Mutex<Option<RegistrySnapshot>>,
    saves: Mutex<usize>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: RegistrySnapshot) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
            saves: Mutex::new(0),
        }
    }

    pub fn current(&self) -> Option<RegistrySnapshot> {
        self.snapshot.lock().clone()
    }

    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn load(&self) -> Result<Option<RegistrySnapshot>, StorageError> {
        Ok(self.snapshot.lock().clone())
    }

    async fn save(&self, snapshot: &RegistrySnapshot) -> Result<(), StorageError> {
        *self.snapshot.lock() = Some(snapshot.clone());
        *self.saves.lock() += 1;
        Ok(())
    }
}
