//! # Backup Control
//!
//! Controller logic for a task manager's backup and restore settings.
//!
//! ## Overview
//!
//! Backups can be written to three independent destinations: a local
//! directory, a cloud drive account and the operating system's own backup
//! mechanism. Each destination may need an out-of-band authorization step
//! (directory picker, account chooser, permission prompt) before it becomes
//! active. This crate coordinates those flows, validates import candidates
//! before they reach the import pipeline, keeps the durable grants and
//! publishes every status change to observers.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use backup_control::auth::{AuthorizationBroker, AuthorizationOutcome};
//! use backup_control::controller::BackupController;
//! use backup_control::destination::DestinationKind;
//! # use backup_control::auth::{AuthorizationProvider, AuthorizationRequest};
//! # use backup_control::pipeline::{ExportPipeline, ExportReport, ImportPipeline, ImportSummary, PipelineError};
//! # use std::sync::Arc;
//! # struct Prompt;
//! # impl AuthorizationProvider for Prompt { fn start(&self, _: &AuthorizationRequest) {} }
//! # struct Pipes;
//! # #[async_trait::async_trait]
//! # impl ExportPipeline for Pipes {
//! #     async fn export(&self) -> Result<ExportReport, PipelineError> { Ok(ExportReport::now(None)) }
//! # }
//! # #[async_trait::async_trait]
//! # impl ImportPipeline for Pipes {
//! #     async fn import(&self, _: &str, _: &str) -> Result<ImportSummary, PipelineError> { Ok(ImportSummary::default()) }
//! # }
//!
//! # async fn example() -> backup_control::Result<()> {
//! let broker = Arc::new(AuthorizationBroker::new(Arc::new(Prompt)));
//! let handle = BackupController::new(broker.clone(), Arc::new(Pipes), Arc::new(Pipes))
//!     .spawn()
//!     .await?;
//!
//! let mut updates = handle.subscribe();
//! let outcome = handle.request_enable(DestinationKind::CloudDrive).await?;
//!
//! // Later, when the account chooser answers:
//! if let Some(id) = outcome.request_id() {
//!     broker.resolve(id, AuthorizationOutcome::Granted(Some("alice@example.com".into())))?;
//! }
//! let update = updates.recv().await.ok();
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`destination`]: destination kinds, the registry and status fan-out
//! - [`auth`]: correlation-token authorization broker
//! - [`validation`]: import candidate validation
//! - [`pipeline`]: export/import collaborator contracts
//! - [`controller`]: the controller task and its handle
//! - [`storage`]: durable grant persistence
//! - [`config`]: controller configuration

#![warn(rustdoc::missing_crate_level_docs)]

use thiserror::Error;

/// Result type for backup control operations
pub type Result<T> = std::result::Result<T, BackupControlError>;

/// Main error type for backup control operations
#[derive(Error, Debug)]
pub enum BackupControlError {
    /// An import candidate had an extension outside the accepted set
    #[error("Unsupported import format: {0:?}")]
    UnsupportedFormat(String),

    /// Broker protocol violation (unknown or already resolved request)
    #[error("Authorization error: {0}")]
    Authorization(#[from] auth::AuthorizationError),

    /// Failure reported by the export or import pipeline
    #[error("Pipeline failure: {0}")]
    PipelineFailure(#[from] pipeline::PipelineError),

    /// Durable grant persistence error
    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// The operation needs an enabled destination
    #[error("Destination {0} is not enabled")]
    NotEnabled(destination::DestinationKind),

    /// A directory or account reference was empty
    #[error("Invalid resource reference: {0:?}")]
    InvalidResource(String),

    /// The controller task is no longer running
    #[error("Backup controller has stopped")]
    ControllerStopped,
}

/// Destination kinds, configuration registry and status fan-out
pub mod destination;

/// Authorization broker and correlation tokens
pub mod auth;

/// Import candidate validation
pub mod validation;

/// Export and import pipeline contracts
pub mod pipeline;

/// Controller task orchestrating user intents
pub mod controller;

/// Durable grant persistence
pub mod storage;

/// Controller configuration
pub mod config;

pub use auth::{AuthorizationBroker, AuthorizationOutcome, AuthorizationPurpose, RequestId};
pub use controller::{BackupController, ControllerHandle, EnableOutcome};
pub use destination::{DestinationConfig, DestinationKind, DestinationRegistry, DestinationState};
pub use validation::{ImportCandidate, ValidationGate, ValidationOutcome};
