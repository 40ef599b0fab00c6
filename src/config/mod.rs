//! Controller configuration

use crate::validation::DEFAULT_ACCEPTED_EXTENSIONS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to read configuration: {0}")]
    Io(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Configuration for a [`BackupController`](crate::controller::BackupController)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Import extensions accepted by the validation gate, lowercase
    pub accepted_extensions: Vec<String>,

    /// Cancel authorization requests still pending after this many seconds
    pub authorization_timeout_secs: Option<u64>,

    /// Surface denials of background re-authorization to the user
    pub notify_background_failures: bool,

    /// Where durable grants are stored; in memory when unset
    pub settings_path: Option<PathBuf>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            accepted_extensions: DEFAULT_ACCEPTED_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            authorization_timeout_secs: None,
            notify_background_failures: false,
            settings_path: None,
        }
    }
}

impl ControllerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: ControllerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading backup controller configuration");
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&contents)
    }

    pub fn with_authorization_timeout(mut self, timeout: Duration) -> Self {
        self.authorization_timeout_secs = Some(timeout.as_secs().max(1));
        self
    }

    pub fn with_settings_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings_path = Some(path.into());
        self
    }

    pub fn authorization_timeout(&self) -> Option<Duration> {
        self.authorization_timeout_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.accepted_extensions.is_empty() {
            return Err(ConfigError::Invalid(
                "accepted_extensions must not be empty".to_string(),
            ));
        }

        for ext in &self.accepted_extensions {
            if ext.trim().is_empty() {
                return Err(ConfigError::Invalid("empty import extension".to_string()));
            }
            if ext.starts_with('.') {
                return Err(ConfigError::Invalid(format!(
                    "extension {:?} must not start with a dot",
                    ext
                )));
            }
            if ext.to_lowercase() != *ext {
                return Err(ConfigError::Invalid(format!(
                    "extension {:?} must be lowercase",
                    ext
                )));
            }
        }

        if self.authorization_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "authorization_timeout_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
