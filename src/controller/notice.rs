//! User-visible notices

use crate::destination::DestinationKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

/// A single, specific message for the user about a failed flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserNotice {
    AuthorizationDenied { kind: DestinationKind },
    UnsupportedFormat { extension: String },
    /// Reported verbatim from the export or import pipeline
    PipelineFailure { message: String },
}

impl fmt::Display for UserNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserNotice::AuthorizationDenied { kind } => {
                write!(f, "Authorization for {} was not granted", kind)
            }
            UserNotice::UnsupportedFormat { extension } if extension.is_empty() => {
                f.write_str("Invalid backup file")
            }
            UserNotice::UnsupportedFormat { extension } => {
                write!(f, "Invalid backup file (.{})", extension)
            }
            UserNotice::PipelineFailure { message } => f.write_str(message),
        }
    }
}

/// Where notices go; typically a toast or snackbar in the host application
pub trait NoticeSink: Send + Sync {
    fn notify(&self, notice: UserNotice);
}

/// Sink that only logs, used when the host does not provide one
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNoticeSink;

impl NoticeSink for LogNoticeSink {
    fn notify(&self, notice: UserNotice) {
        match &notice {
            UserNotice::PipelineFailure { .. } => warn!(notice = %notice, "user notice"),
            _ => info!(notice = %notice, "user notice"),
        }
    }
}
