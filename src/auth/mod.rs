//! Out-of-band authorization flows
//!
//! A destination that needs a capability (directory access, an account token,
//! the OS backup toggle) asks the [`AuthorizationBroker`] for it. The broker
//! hands out a single-use [`RequestId`], arms the external
//! [`AuthorizationProvider`] and later routes the provider's answer to the
//! continuation registered for that id.

use crate::destination::DestinationKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

pub mod broker;

pub use broker::{AuthorizationBroker, Continuation, Resolution, TOMBSTONE_CAPACITY};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthorizationError {
    /// The id was never issued or has already been resolved
    #[error("Unknown authorization request: {0}")]
    UnknownRequest(RequestId),
}

/// Opaque correlation token pairing a request with its single resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthorizationPurpose {
    EnableDestination,
    ReauthorizeAccount,
    GrantDirectoryAccess,
}

/// Who started a flow; background flows fail silently
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Initiator {
    User,
    Background,
}

/// How an authorization flow ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthorizationOutcome {
    /// Capability granted, with the account or directory reference if any
    Granted(Option<String>),
    Denied,
    Cancelled,
}

impl AuthorizationOutcome {
    pub fn is_granted(&self) -> bool {
        matches!(self, AuthorizationOutcome::Granted(_))
    }
}

/// A pending authorization flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub id: RequestId,
    pub kind: DestinationKind,
    pub purpose: AuthorizationPurpose,
    /// Starting location for pickers, or the account to preselect
    pub hint: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// External agent that runs the actual flow (permission prompt, account
/// chooser, directory picker)
///
/// `start` only arms the flow and must not block. The provider answers later
/// through [`AuthorizationBroker::resolve`], from any thread.
pub trait AuthorizationProvider: Send + Sync {
    fn start(&self, request: &AuthorizationRequest);
}
