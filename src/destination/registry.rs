//! Single source of truth for destination configuration

use super::hub::StatusObserverHub;
use super::{DestinationConfig, DestinationKind};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Persistable image of all three destination configurations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    #[serde(default)]
    pub local_file: DestinationConfig,
    #[serde(default)]
    pub cloud_drive: DestinationConfig,
    #[serde(default)]
    pub system_backup: DestinationConfig,
}

impl RegistrySnapshot {
    pub fn get(&self, kind: DestinationKind) -> &DestinationConfig {
        match kind {
            DestinationKind::LocalFile => &self.local_file,
            DestinationKind::CloudDrive => &self.cloud_drive,
            DestinationKind::SystemBackup => &self.system_backup,
        }
    }

    fn get_mut(&mut self, kind: DestinationKind) -> &mut DestinationConfig {
        match kind {
            DestinationKind::LocalFile => &mut self.local_file,
            DestinationKind::CloudDrive => &mut self.cloud_drive,
            DestinationKind::SystemBackup => &mut self.system_backup,
        }
    }
}

/// Exclusive owner of every [`DestinationConfig`]
///
/// Reads are allowed from any context. Writes are expected to come from the
/// controller's task only; each `set` publishes exactly one update.
pub struct DestinationRegistry {
    configs: RwLock<HashMap<DestinationKind, DestinationConfig>>,
    hub: Arc<StatusObserverHub>,
}

impl DestinationRegistry {
    pub fn new(hub: Arc<StatusObserverHub>) -> Self {
        Self {
            configs: RwLock::new(HashMap::new()),
            hub,
        }
    }

    /// Build a registry from a persisted snapshot without publishing
    pub fn from_snapshot(snapshot: RegistrySnapshot, hub: Arc<StatusObserverHub>) -> Self {
        let configs = DestinationKind::ALL
            .iter()
            .map(|kind| (*kind, snapshot.get(*kind).clone()))
            .collect();

        Self {
            configs: RwLock::new(configs),
            hub,
        }
    }

    /// Current configuration, the zero value if none was ever set
    pub fn get(&self, kind: DestinationKind) -> DestinationConfig {
        self.configs.read().get(&kind).cloned().unwrap_or_default()
    }

    /// Replace the configuration and return the previous one
    pub fn set(&self, kind: DestinationKind, config: DestinationConfig) -> DestinationConfig {
        let previous = {
            let mut configs = self.configs.write();
            configs.insert(kind, config.clone()).unwrap_or_default()
        };

        debug!(
            kind = %kind,
            enabled = config.enabled,
            has_identity = config.has_identity(),
            "destination updated"
        );
        self.on_change(kind, config);
        previous
    }

    /// Apply `change` to the current configuration and store the result
    pub fn update<F>(&self, kind: DestinationKind, change: F) -> DestinationConfig
    where
        F: FnOnce(&mut DestinationConfig),
    {
        let mut config = self.get(kind);
        change(&mut config);
        self.set(kind, config.clone());
        config
    }

    fn on_change(&self, kind: DestinationKind, config: DestinationConfig) {
        self.hub.publish(kind, config);
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        let configs = self.configs.read();
        let mut snapshot = RegistrySnapshot::default();
        for (kind, config) in configs.iter() {
            *snapshot.get_mut(*kind) = config.clone();
        }
        snapshot
    }

    pub fn hub(&self) -> &Arc<StatusObserverHub> {
        &self.hub
    }
}
