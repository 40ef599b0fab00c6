//! Human-readable destination summaries
//!
//! Formatting is delegated to a [`DisplayFormatter`] so localization stays
//! outside this crate. [`SummaryBoard`] is a ready-made observer that keeps the
//! latest summary for each destination.

use super::hub::{StatusObserver, StatusUpdate};
use super::{DestinationConfig, DestinationKind};
use crate::config::ConfigError;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

pub trait DisplayFormatter: Send + Sync {
    fn format_timestamp(&self, at: DateTime<Utc>) -> String;

    fn last_backup(&self, formatted: &str) -> String {
        format!("Last backup: {}", formatted)
    }

    fn never(&self) -> String {
        "never".to_string()
    }

    fn none(&self) -> String {
        "none".to_string()
    }
}

/// `strftime`-style formatter in UTC
#[derive(Debug, Clone)]
pub struct ChronoFormatter {
    pattern: String,
}

impl ChronoFormatter {
    pub const DEFAULT_PATTERN: &'static str = "%Y-%m-%d %H:%M";

    /// Fails if `pattern` contains a specifier chrono cannot render
    pub fn new(pattern: impl Into<String>) -> Result<Self, ConfigError> {
        let pattern = pattern.into();
        if StrftimeItems::new(&pattern).any(|item| matches!(item, Item::Error)) {
            return Err(ConfigError::Invalid(format!(
                "invalid timestamp pattern {:?}",
                pattern
            )));
        }
        Ok(Self { pattern })
    }
}

impl Default for ChronoFormatter {
    fn default() -> Self {
        Self {
            pattern: Self::DEFAULT_PATTERN.to_string(),
        }
    }
}

impl DisplayFormatter for ChronoFormatter {
    fn format_timestamp(&self, at: DateTime<Utc>) -> String {
        at.format(&self.pattern).to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationSummary {
    pub kind: DestinationKind,
    pub enabled: bool,
    pub last_backup: String,
    /// Directory or account line; `None` for destinations without identity
    pub identity: Option<String>,
}

impl DestinationSummary {
    pub fn render(
        kind: DestinationKind,
        config: &DestinationConfig,
        formatter: &dyn DisplayFormatter,
    ) -> Self {
        let when = config
            .last_success()
            .map(|at| formatter.format_timestamp(at))
            .unwrap_or_else(|| formatter.never());

        let identity = kind.has_identity().then(|| {
            config
                .identity()
                .map(str::to_string)
                .unwrap_or_else(|| formatter.none())
        });

        Self {
            kind,
            enabled: config.enabled,
            last_backup: formatter.last_backup(&when),
            identity,
        }
    }
}

/// Observer keeping the most recent summary per destination
pub struct SummaryBoard {
    formatter: Arc<dyn DisplayFormatter>,
    summaries: RwLock<HashMap<DestinationKind, DestinationSummary>>,
}

impl SummaryBoard {
    pub fn new(formatter: Arc<dyn DisplayFormatter>) -> Self {
        Self {
            formatter,
            summaries: RwLock::new(HashMap::new()),
        }
    }

    /// Latest summary, rendered from the zero value if nothing was published yet
    pub fn get(&self, kind: DestinationKind) -> DestinationSummary {
        self.summaries.read().get(&kind).cloned().unwrap_or_else(|| {
            DestinationSummary::render(kind, &DestinationConfig::default(), self.formatter.as_ref())
        })
    }
}

impl StatusObserver for SummaryBoard {
    fn on_status(&self, update: &StatusUpdate) {
        let summary = DestinationSummary::render(update.kind, &update.config, self.formatter.as_ref());
        self.summaries.write().insert(update.kind, summary);
    }
}
