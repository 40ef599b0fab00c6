//! Import candidate validation
//!
//! The import pipeline parses and merges data, so anything it cannot read is
//! turned away here, before any I/O happens.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Extensions accepted by default
pub const DEFAULT_ACCEPTED_EXTENSIONS: [&str; 2] = ["json", "xml"];

/// A user-picked artifact proposed for restore
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImportCandidate {
    /// Opaque resource reference (path or content URI)
    pub location: String,
    /// Lowercase extension without the leading dot; empty when absent
    pub extension: String,
}

impl ImportCandidate {
    pub fn new(location: impl Into<String>, extension: Option<&str>) -> Self {
        Self {
            location: location.into(),
            extension: extension.map(normalize_extension).unwrap_or_default(),
        }
    }

    /// Derive the extension from the last path segment of `location`
    pub fn from_location(location: impl Into<String>) -> Self {
        let location = location.into();
        let extension = extension_of(&location).map(str::to_string);
        Self::new(location, extension.as_deref())
    }
}

fn extension_of(location: &str) -> Option<&str> {
    let segment = location
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(location);
    match segment.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
        _ => None,
    }
}

fn normalize_extension(extension: &str) -> String {
    extension.trim().trim_start_matches('.').to_lowercase()
}

/// Why a candidate was turned away
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    UnsupportedFormat { extension: String },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::UnsupportedFormat { extension } if extension.is_empty() => {
                f.write_str("file has no extension")
            }
            RejectReason::UnsupportedFormat { extension } => {
                write!(f, "unsupported backup format: .{}", extension)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// Candidate with its extension normalized
    Accept(ImportCandidate),
    Reject(RejectReason),
}

impl ValidationOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ValidationOutcome::Accept(_))
    }
}

/// Pure accept/reject decision over import candidates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationGate {
    accepted: Vec<String>,
}

impl ValidationGate {
    pub fn new<I, S>(accepted: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            accepted: accepted
                .into_iter()
                .map(|ext| normalize_extension(ext.as_ref()))
                .filter(|ext| !ext.is_empty())
                .collect(),
        }
    }

    pub fn accepted_extensions(&self) -> &[String] {
        &self.accepted
    }

    pub fn validate_import(&self, candidate: &ImportCandidate) -> ValidationOutcome {
        let extension = normalize_extension(&candidate.extension);

        if !extension.is_empty() && self.accepted.iter().any(|ext| *ext == extension) {
            ValidationOutcome::Accept(ImportCandidate {
                location: candidate.location.clone(),
                extension,
            })
        } else {
            ValidationOutcome::Reject(RejectReason::UnsupportedFormat { extension })
        }
    }
}

impl Default for ValidationGate {
    fn default() -> Self {
        Self::new(DEFAULT_ACCEPTED_EXTENSIONS)
    }
}
