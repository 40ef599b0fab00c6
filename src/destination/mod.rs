//! Backup destinations and their observable status
//!
//! Every destination has exactly one [`DestinationConfig`], owned by the
//! [`DestinationRegistry`]. Changes fan out through the
//! [`StatusObserverHub`].

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod hub;
pub mod registry;
pub mod summary;

pub use hub::{StatusObserver, StatusObserverHub, StatusUpdate};
pub use registry::{DestinationRegistry, RegistrySnapshot};
pub use summary::{ChronoFormatter, DestinationSummary, DisplayFormatter, SummaryBoard};

/// The places a backup can be written to or restored from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationKind {
    /// A user-chosen local directory
    LocalFile,
    /// A cloud drive account
    CloudDrive,
    /// The operating system's backup mechanism
    SystemBackup,
}

impl DestinationKind {
    /// All destination kinds, in display order
    pub const ALL: [DestinationKind; 3] = [
        DestinationKind::LocalFile,
        DestinationKind::CloudDrive,
        DestinationKind::SystemBackup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DestinationKind::LocalFile => "local_file",
            DestinationKind::CloudDrive => "cloud_drive",
            DestinationKind::SystemBackup => "system_backup",
        }
    }

    /// Whether an active destination of this kind must carry an identity
    pub fn requires_identity(&self) -> bool {
        matches!(self, DestinationKind::LocalFile | DestinationKind::CloudDrive)
    }

    /// Whether this kind stores an identity at all
    pub fn has_identity(&self) -> bool {
        !matches!(self, DestinationKind::SystemBackup)
    }
}

impl fmt::Display for DestinationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration and status of a single destination
///
/// `identity` is the directory reference for [`DestinationKind::LocalFile`]
/// and the account identifier for [`DestinationKind::CloudDrive`]. It is only
/// ever written from a completed authorization grant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationConfig {
    /// Whether the destination is switched on
    #[serde(default)]
    pub enabled: bool,

    /// Directory or account identity
    #[serde(default)]
    pub identity: Option<String>,

    /// Last successful backup, epoch milliseconds
    #[serde(default)]
    pub last_success_millis: Option<i64>,
}

impl DestinationConfig {
    /// The zero-value configuration
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Enabled configuration carrying an identity
    pub fn enabled_with(identity: Option<String>) -> Self {
        Self {
            enabled: true,
            identity,
            last_success_millis: None,
        }
    }

    /// Keep the last success timestamp from another configuration
    pub fn with_last_success(mut self, millis: Option<i64>) -> Self {
        self.last_success_millis = millis;
        self
    }

    /// Identity, if present and not blank
    pub fn identity(&self) -> Option<&str> {
        self.identity
            .as_deref()
            .filter(|identity| !identity.trim().is_empty())
    }

    pub fn has_identity(&self) -> bool {
        self.identity().is_some()
    }

    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        self.last_success_millis
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
    }
}

/// Lifecycle state of a destination as seen by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DestinationState {
    Disabled,
    AwaitingAuthorization,
    Enabled,
}
