use super::{
    AuthorizationError, AuthorizationOutcome, AuthorizationProvider, AuthorizationPurpose,
    AuthorizationRequest, RequestId,
};
use crate::destination::DestinationKind;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Called exactly once with the request and how it ended
pub type Continuation = Box<dyn FnOnce(AuthorizationRequest, AuthorizationOutcome) + Send + Sync>;

/// What `resolve` did with an outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The registered continuation received the outcome
    Delivered,
    /// The request had been cancelled; the late answer was discarded
    Dropped,
}

struct PendingRequest {
    request: AuthorizationRequest,
    continuation: Continuation,
}

/// Cancelled ids remembered for late answers; the oldest is forgotten first
pub const TOMBSTONE_CAPACITY: usize = 256;

/// Correlation-token bookkeeping for out-of-band authorization flows
pub struct AuthorizationBroker {
    pending: DashMap<RequestId, PendingRequest>,
    /// Cancelled ids still owed one late answer from their provider
    cancelled: Mutex<VecDeque<(RequestId, DestinationKind)>>,
    provider: Arc<dyn AuthorizationProvider>,
}

impl AuthorizationBroker {
    pub fn new(provider: Arc<dyn AuthorizationProvider>) -> Self {
        Self {
            pending: DashMap::with_capacity(8),
            cancelled: Mutex::new(VecDeque::new()),
            provider,
        }
    }

    /// Register a request and arm the external provider
    ///
    /// Returns immediately; `continuation` runs when the request is resolved
    /// or cancelled.
    pub fn begin_request(
        &self,
        kind: DestinationKind,
        purpose: AuthorizationPurpose,
        hint: Option<String>,
        continuation: Continuation,
    ) -> AuthorizationRequest {
        let request = AuthorizationRequest {
            id: RequestId::new(),
            kind,
            purpose,
            hint,
            created_at: Utc::now(),
        };

        self.pending.insert(
            request.id,
            PendingRequest {
                request: request.clone(),
                continuation,
            },
        );

        info!(
            request_id = %request.id,
            kind = %kind,
            purpose = ?purpose,
            "authorization requested"
        );

        // The pending entry must exist before the provider can answer
        self.provider.start(&request);
        request
    }

    /// Deliver the provider's answer for `id`
    pub fn resolve(
        &self,
        id: RequestId,
        outcome: AuthorizationOutcome,
    ) -> Result<Resolution, AuthorizationError> {
        if let Some((_, pending)) = self.pending.remove(&id) {
            debug!(
                request_id = %id,
                kind = %pending.request.kind,
                granted = outcome.is_granted(),
                "authorization resolved"
            );
            (pending.continuation)(pending.request, outcome);
            return Ok(Resolution::Delivered);
        }

        if let Some(kind) = self.take_tombstone(id) {
            debug!(request_id = %id, kind = %kind, "dropping late answer to cancelled request");
            return Ok(Resolution::Dropped);
        }

        error!(request_id = %id, "resolution for unknown or already resolved request");
        Err(AuthorizationError::UnknownRequest(id))
    }

    /// Cancel one pending request; returns false if it was not pending
    pub fn cancel(&self, id: RequestId) -> bool {
        match self.pending.remove(&id) {
            Some((_, pending)) => {
                self.finish_cancelled(pending);
                true
            }
            None => false,
        }
    }

    /// Resolve every pending request for `kind` as cancelled
    pub fn cancel_all(&self, kind: DestinationKind) -> usize {
        let ids: Vec<RequestId> = self
            .pending
            .iter()
            .filter(|entry| entry.value().request.kind == kind)
            .map(|entry| *entry.key())
            .collect();

        let mut cancelled = 0;
        for id in ids {
            if self.cancel(id) {
                cancelled += 1;
            }
        }

        if cancelled > 0 {
            info!(kind = %kind, cancelled, "cancelled pending authorization requests");
        }
        cancelled
    }

    fn finish_cancelled(&self, pending: PendingRequest) {
        let PendingRequest {
            request,
            continuation,
        } = pending;
        {
            let mut cancelled = self.cancelled.lock();
            if cancelled.len() == TOMBSTONE_CAPACITY {
                cancelled.pop_front();
            }
            cancelled.push_back((request.id, request.kind));
        }
        continuation(request, AuthorizationOutcome::Cancelled);
    }

    fn take_tombstone(&self, id: RequestId) -> Option<DestinationKind> {
        let mut cancelled = self.cancelled.lock();
        let position = cancelled.iter().position(|(cancelled_id, _)| *cancelled_id == id)?;
        cancelled.remove(position).map(|(_, kind)| kind)
    }

    pub fn is_pending(&self, id: RequestId) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn pending_for(&self, kind: DestinationKind) -> Vec<AuthorizationRequest> {
        self.pending
            .iter()
            .filter(|entry| entry.value().request.kind == kind)
            .map(|entry| entry.value().request.clone())
            .collect()
    }
}
