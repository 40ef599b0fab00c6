use super::Message;
use crate::auth::{AuthorizationBroker, Initiator, RequestId};
use crate::destination::{
    DestinationConfig, DestinationKind, DestinationRegistry, DestinationState, StatusObserver,
    StatusUpdate,
};
use crate::pipeline::{ExportReport, ImportSummary};
use crate::validation::ImportCandidate;
use crate::{BackupControlError, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::instrument;

/// Immediate answer to an enable request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnableOutcome {
    AlreadyEnabled,
    /// The external flow is armed; the destination is enabled once it is granted
    AwaitingAuthorization(RequestId),
}

impl EnableOutcome {
    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            EnableOutcome::AlreadyEnabled => None,
            EnableOutcome::AwaitingAuthorization(id) => Some(*id),
        }
    }
}

/// Cloneable handle to a running controller task
///
/// Every method is answered by the controller task, so a call made after an
/// authorization has been resolved observes its effect.
#[derive(Clone)]
pub struct ControllerHandle {
    mailbox: mpsc::UnboundedSender<Message>,
    registry: Arc<DestinationRegistry>,
    broker: Arc<AuthorizationBroker>,
}

impl ControllerHandle {
    pub(crate) fn new(
        mailbox: mpsc::UnboundedSender<Message>,
        registry: Arc<DestinationRegistry>,
        broker: Arc<AuthorizationBroker>,
    ) -> Self {
        Self {
            mailbox,
            registry,
            broker,
        }
    }

    async fn call<T>(&self, message: impl FnOnce(oneshot::Sender<T>) -> Message) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.mailbox
            .send(message(tx))
            .map_err(|_| BackupControlError::ControllerStopped)?;
        rx.await.map_err(|_| BackupControlError::ControllerStopped)
    }

    #[instrument(skip(self))]
    pub async fn request_enable(&self, kind: DestinationKind) -> Result<EnableOutcome> {
        self.call(|reply| Message::RequestEnable { kind, reply }).await
    }

    #[instrument(skip(self))]
    pub async fn request_disable(&self, kind: DestinationKind) -> Result<DestinationConfig> {
        self.call(|reply| Message::RequestDisable { kind, reply }).await
    }

    /// Store a granted directory reference as the local backup location
    #[instrument(skip(self, resource))]
    pub async fn choose_local_directory(
        &self,
        resource: impl Into<String>,
    ) -> Result<DestinationConfig> {
        let resource = resource.into();
        self.call(|reply| Message::ChooseLocalDirectory { resource, reply })
            .await?
    }

    /// Arm the directory picker, starting at the current directory
    #[instrument(skip(self))]
    pub async fn pick_local_directory(&self) -> Result<RequestId> {
        self.call(|reply| Message::PickLocalDirectory { reply }).await
    }

    /// Refresh the account behind an enabled destination
    #[instrument(skip(self))]
    pub async fn reauthorize(&self, kind: DestinationKind, initiator: Initiator) -> Result<RequestId> {
        self.call(|reply| Message::Reauthorize {
            kind,
            initiator,
            reply,
        })
        .await?
    }

    /// Validate `candidate` and, if accepted, wait for the import pipeline
    #[instrument(skip(self))]
    pub async fn import_from(&self, candidate: ImportCandidate) -> Result<ImportSummary> {
        self.call(|reply| Message::ImportFrom { candidate, reply })
            .await?
    }

    /// Trigger the export pipeline; the returned future may be dropped
    #[instrument(skip(self))]
    pub async fn export_now(&self) -> Result<ExportReport> {
        self.call(|reply| Message::ExportNow { reply }).await?
    }

    /// External success signal; returns false when the destination is not active
    pub async fn record_success(&self, kind: DestinationKind, at: DateTime<Utc>) -> Result<bool> {
        let at_millis = at.timestamp_millis();
        self.call(|reply| Message::RecordSuccess {
            kind,
            at_millis,
            reply: Some(reply),
        })
        .await
    }

    pub async fn snapshot(&self, kind: DestinationKind) -> Result<DestinationConfig> {
        self.call(|reply| Message::Snapshot { kind, reply }).await
    }

    pub async fn state(&self, kind: DestinationKind) -> Result<DestinationState> {
        self.call(|reply| Message::State { kind, reply }).await
    }

    /// Cancel pending authorization flows and stop the controller task
    pub async fn shutdown(&self) -> Result<()> {
        self.call(Message::Shutdown).await
    }

    /// Read the registry directly, without waiting for queued work
    pub fn current(&self, kind: DestinationKind) -> DestinationConfig {
        self.registry.get(kind)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusUpdate> {
        self.registry.hub().subscribe()
    }

    pub fn register_observer(&self, observer: Arc<dyn StatusObserver>) {
        self.registry.hub().register(observer);
    }

    pub fn broker(&self) -> &Arc<AuthorizationBroker> {
        &self.broker
    }

    pub fn is_running(&self) -> bool {
        !self.mailbox.is_closed()
    }
}
