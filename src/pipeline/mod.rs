//! Export and import collaborator contracts
//!
//! The byte-level work lives outside this crate. The controller only triggers
//! these pipelines and reports what they return.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Merge conflict: {0}")]
    MergeConflict(String),

    #[error("{0}")]
    Other(String),
}

/// Result of a completed export
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportReport {
    pub completed_at: DateTime<Utc>,
    /// Where the backup was written, if the exporter reports it
    pub location: Option<String>,
}

impl ExportReport {
    pub fn now(location: Option<String>) -> Self {
        Self {
            completed_at: Utc::now(),
            location,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
}

#[async_trait]
pub trait ExportPipeline: Send + Sync {
    async fn export(&self) -> Result<ExportReport, PipelineError>;
}

/// Receives only candidates that passed the validation gate
#[async_trait]
pub trait ImportPipeline: Send + Sync {
    async fn import(&self, location: &str, extension: &str) -> Result<ImportSummary, PipelineError>;
}
