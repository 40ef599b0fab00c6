//! Controller task orchestrating backup destinations
//!
//! A [`BackupController`] is configured with its collaborators and then
//! spawned onto the tokio runtime. The spawned task is the only place the
//! [`DestinationRegistry`] is mutated: user intents arrive over the
//! [`ControllerHandle`], and authorization outcomes are forwarded into the
//! same mailbox by the broker continuations, so every change is applied on
//! the owning task in arrival order.
//!
//! Per destination the task drives
//!
//! ```text
//! Disabled --request_enable--> AwaitingAuthorization --granted--> Enabled
//! AwaitingAuthorization --denied/cancelled--> Disabled
//! Enabled --request_disable--> Disabled
//! Enabled --success signal--> Enabled (last success updated)
//! ```

mod handle;
pub mod notice;

pub use handle::{ControllerHandle, EnableOutcome};
pub use notice::{LogNoticeSink, NoticeSink, UserNotice};

use crate::auth::{
    AuthorizationBroker, AuthorizationOutcome, AuthorizationPurpose, AuthorizationRequest,
    Initiator, RequestId,
};
use crate::config::ControllerConfig;
use crate::destination::{
    DestinationConfig, DestinationKind, DestinationRegistry, DestinationState, RegistrySnapshot,
    StatusObserver, StatusObserverHub,
};
use crate::pipeline::{ExportPipeline, ExportReport, ImportPipeline, ImportSummary};
use crate::storage::{FileSettingsStore, MemorySettingsStore, SettingsStore};
use crate::validation::{ImportCandidate, RejectReason, ValidationGate, ValidationOutcome};
use crate::{BackupControlError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

pub(crate) enum Message {
    RequestEnable {
        kind: DestinationKind,
        reply: oneshot::Sender<EnableOutcome>,
    },
    RequestDisable {
        kind: DestinationKind,
        reply: oneshot::Sender<DestinationConfig>,
    },
    ChooseLocalDirectory {
        resource: String,
        reply: oneshot::Sender<Result<DestinationConfig>>,
    },
    PickLocalDirectory {
        reply: oneshot::Sender<RequestId>,
    },
    Reauthorize {
        kind: DestinationKind,
        initiator: Initiator,
        reply: oneshot::Sender<Result<RequestId>>,
    },
    ImportFrom {
        candidate: ImportCandidate,
        reply: oneshot::Sender<Result<ImportSummary>>,
    },
    ExportNow {
        reply: oneshot::Sender<Result<ExportReport>>,
    },
    RecordSuccess {
        kind: DestinationKind,
        at_millis: i64,
        reply: Option<oneshot::Sender<bool>>,
    },
    Snapshot {
        kind: DestinationKind,
        reply: oneshot::Sender<DestinationConfig>,
    },
    State {
        kind: DestinationKind,
        reply: oneshot::Sender<DestinationState>,
    },
    Resolved {
        request: AuthorizationRequest,
        outcome: AuthorizationOutcome,
    },
    WatchdogExpired(RequestId),
    Shutdown(oneshot::Sender<()>),
}

/// Builder for the controller task
pub struct BackupController {
    config: ControllerConfig,
    broker: Arc<AuthorizationBroker>,
    exporter: Arc<dyn ExportPipeline>,
    importer: Arc<dyn ImportPipeline>,
    notices: Arc<dyn NoticeSink>,
    store: Option<Arc<dyn SettingsStore>>,
    hub: Arc<StatusObserverHub>,
}

impl BackupController {
    pub fn new(
        broker: Arc<AuthorizationBroker>,
        exporter: Arc<dyn ExportPipeline>,
        importer: Arc<dyn ImportPipeline>,
    ) -> Self {
        Self {
            config: ControllerConfig::default(),
            broker,
            exporter,
            importer,
            notices: Arc::new(LogNoticeSink),
            store: None,
            hub: Arc::new(StatusObserverHub::new()),
        }
    }

    pub fn with_config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_notices(mut self, notices: Arc<dyn NoticeSink>) -> Self {
        self.notices = notices;
        self
    }

    /// Use `store` for durable grants instead of the configured settings path
    pub fn with_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_hub(mut self, hub: Arc<StatusObserverHub>) -> Self {
        self.hub = hub;
        self
    }

    pub fn with_observer(self, observer: Arc<dyn StatusObserver>) -> Self {
        self.hub.register(observer);
        self
    }

    /// Load durable grants and start the controller task
    pub async fn spawn(self) -> Result<ControllerHandle> {
        self.config.validate()?;

        let store: Arc<dyn SettingsStore> = match (self.store, &self.config.settings_path) {
            (Some(store), _) => store,
            (None, Some(path)) => Arc::new(FileSettingsStore::new(path)),
            (None, None) => Arc::new(MemorySettingsStore::new()),
        };

        let snapshot = store
            .load()
            .await?
            .map(sanitize_snapshot)
            .unwrap_or_default();
        let registry = Arc::new(DestinationRegistry::from_snapshot(snapshot, self.hub));

        let (tx, rx) = mpsc::unbounded_channel();
        let task = ControllerTask {
            gate: ValidationGate::new(&self.config.accepted_extensions),
            config: self.config,
            registry: registry.clone(),
            broker: self.broker.clone(),
            exporter: self.exporter,
            importer: self.importer,
            notices: self.notices,
            store,
            mailbox: tx.downgrade(),
            flows: HashMap::new(),
        };
        tokio::spawn(task.run(rx));

        Ok(ControllerHandle::new(tx, registry, self.broker))
    }
}

/// Drop enablement that a stored snapshot cannot back with an identity
fn sanitize_snapshot(mut snapshot: RegistrySnapshot) -> RegistrySnapshot {
    for kind in DestinationKind::ALL {
        let config = match kind {
            DestinationKind::LocalFile => &mut snapshot.local_file,
            DestinationKind::CloudDrive => &mut snapshot.cloud_drive,
            DestinationKind::SystemBackup => &mut snapshot.system_backup,
        };
        if config.enabled && kind.requires_identity() && !config.has_identity() {
            warn!(kind = %kind, "stored destination enabled without identity, disabling");
            config.enabled = false;
            config.identity = None;
        }
        if !kind.has_identity() && config.identity.is_some() {
            debug!(kind = %kind, "discarding stored identity");
            config.identity = None;
        }
    }
    snapshot
}

#[derive(Debug, Clone, Copy)]
struct PendingFlow {
    kind: DestinationKind,
    purpose: AuthorizationPurpose,
    initiator: Initiator,
}

struct ControllerTask {
    config: ControllerConfig,
    registry: Arc<DestinationRegistry>,
    broker: Arc<AuthorizationBroker>,
    gate: ValidationGate,
    exporter: Arc<dyn ExportPipeline>,
    importer: Arc<dyn ImportPipeline>,
    notices: Arc<dyn NoticeSink>,
    store: Arc<dyn SettingsStore>,
    /// Weak so the task stops once every handle is gone
    mailbox: mpsc::WeakUnboundedSender<Message>,
    flows: HashMap<RequestId, PendingFlow>,
}

impl ControllerTask {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Message>) {
        info!("backup controller started");

        while let Some(message) = rx.recv().await {
            if let Message::Shutdown(reply) = message {
                self.teardown();
                let _ = reply.send(());
                return;
            }
            self.handle(message).await;
        }

        self.teardown();
    }

    async fn handle(&mut self, message: Message) {
        match message {
            Message::RequestEnable { kind, reply } => {
                let _ = reply.send(self.request_enable(kind));
            }
            Message::RequestDisable { kind, reply } => {
                let config = self.request_disable(kind).await;
                let _ = reply.send(config);
            }
            Message::ChooseLocalDirectory { resource, reply } => {
                let result = self.choose_local_directory(resource).await;
                let _ = reply.send(result);
            }
            Message::PickLocalDirectory { reply } => {
                let _ = reply.send(self.pick_local_directory());
            }
            Message::Reauthorize {
                kind,
                initiator,
                reply,
            } => {
                let _ = reply.send(self.reauthorize(kind, initiator));
            }
            Message::ImportFrom { candidate, reply } => self.import_from(candidate, reply),
            Message::ExportNow { reply } => self.export_now(reply),
            Message::RecordSuccess {
                kind,
                at_millis,
                reply,
            } => {
                let recorded = self.record_success(kind, at_millis).await;
                if let Some(reply) = reply {
                    let _ = reply.send(recorded);
                }
            }
            Message::Snapshot { kind, reply } => {
                let _ = reply.send(self.registry.get(kind));
            }
            Message::State { kind, reply } => {
                let _ = reply.send(self.state(kind));
            }
            Message::Resolved { request, outcome } => self.on_resolved(request, outcome).await,
            Message::WatchdogExpired(id) => self.on_watchdog(id),
            Message::Shutdown(reply) => {
                let _ = reply.send(());
            }
        }
    }

    fn request_enable(&mut self, kind: DestinationKind) -> EnableOutcome {
        if self.registry.get(kind).enabled {
            debug!(kind = %kind, "destination already enabled");
            return EnableOutcome::AlreadyEnabled;
        }

        if let Some(id) = self.pending_flow(kind, AuthorizationPurpose::EnableDestination) {
            debug!(kind = %kind, request_id = %id, "enable already awaiting authorization");
            return EnableOutcome::AwaitingAuthorization(id);
        }

        let id = self.begin(kind, AuthorizationPurpose::EnableDestination, Initiator::User);
        EnableOutcome::AwaitingAuthorization(id)
    }

    async fn request_disable(&mut self, kind: DestinationKind) -> DestinationConfig {
        let stale: Vec<RequestId> = self
            .flows
            .iter()
            .filter(|(_, flow)| flow.kind == kind)
            .map(|(id, _)| *id)
            .collect();
        for id in stale {
            self.flows.remove(&id);
            self.broker.cancel(id);
        }

        let config = cleared(&self.registry.get(kind));
        self.registry.set(kind, config.clone());
        self.persist().await;

        info!(kind = %kind, "destination disabled");
        config
    }

    async fn choose_local_directory(&mut self, resource: String) -> Result<DestinationConfig> {
        let resource = resource.trim().to_string();
        if resource.is_empty() {
            return Err(BackupControlError::InvalidResource(resource));
        }

        let config = self.registry.update(DestinationKind::LocalFile, |config| {
            config.identity = Some(resource.clone());
        });
        self.persist().await;

        info!(directory = %resource, "backup directory selected");
        Ok(config)
    }

    fn pick_local_directory(&mut self) -> RequestId {
        let kind = DestinationKind::LocalFile;
        self.pending_flow(kind, AuthorizationPurpose::GrantDirectoryAccess)
            .unwrap_or_else(|| {
                self.begin(kind, AuthorizationPurpose::GrantDirectoryAccess, Initiator::User)
            })
    }

    fn reauthorize(&mut self, kind: DestinationKind, initiator: Initiator) -> Result<RequestId> {
        if !self.registry.get(kind).enabled {
            return Err(BackupControlError::NotEnabled(kind));
        }

        Ok(self
            .pending_flow(kind, AuthorizationPurpose::ReauthorizeAccount)
            .unwrap_or_else(|| self.begin(kind, AuthorizationPurpose::ReauthorizeAccount, initiator)))
    }

    fn import_from(
        &self,
        candidate: ImportCandidate,
        reply: oneshot::Sender<Result<ImportSummary>>,
    ) {
        match self.gate.validate_import(&candidate) {
            ValidationOutcome::Reject(RejectReason::UnsupportedFormat { extension }) => {
                warn!(
                    location = %candidate.location,
                    extension = %extension,
                    "rejected import candidate"
                );
                self.notices.notify(UserNotice::UnsupportedFormat {
                    extension: extension.clone(),
                });
                let _ = reply.send(Err(BackupControlError::UnsupportedFormat(extension)));
            }
            ValidationOutcome::Accept(candidate) => {
                let importer = self.importer.clone();
                let notices = self.notices.clone();

                tokio::spawn(async move {
                    info!(location = %candidate.location, extension = %candidate.extension, "import started");
                    let result = importer
                        .import(&candidate.location, &candidate.extension)
                        .await;

                    match &result {
                        Ok(summary) => info!(
                            imported = summary.imported,
                            skipped = summary.skipped,
                            "import finished"
                        ),
                        Err(e) => {
                            error!(error = %e, "import failed");
                            notices.notify(UserNotice::PipelineFailure {
                                message: e.to_string(),
                            });
                        }
                    }
                    let _ = reply.send(result.map_err(BackupControlError::from));
                });
            }
        }
    }

    fn export_now(&self, reply: oneshot::Sender<Result<ExportReport>>) {
        let exporter = self.exporter.clone();
        let notices = self.notices.clone();
        let mailbox = self.mailbox.clone();

        tokio::spawn(async move {
            let result = exporter.export().await;

            match &result {
                Ok(report) => {
                    info!(location = ?report.location, "export finished");
                    // Queue the success signal before replying so later queries see it
                    if let Some(tx) = mailbox.upgrade() {
                        let _ = tx.send(Message::RecordSuccess {
                            kind: DestinationKind::LocalFile,
                            at_millis: report.completed_at.timestamp_millis(),
                            reply: None,
                        });
                    }
                }
                Err(e) => {
                    error!(error = %e, "export failed");
                    notices.notify(UserNotice::PipelineFailure {
                        message: e.to_string(),
                    });
                }
            }
            let _ = reply.send(result.map_err(BackupControlError::from));
        });
    }

    async fn record_success(&mut self, kind: DestinationKind, at_millis: i64) -> bool {
        let current = self.registry.get(kind);

        // Local exports have no account, so their successes always count
        if kind != DestinationKind::LocalFile && !current.enabled {
            debug!(kind = %kind, "ignoring success signal for disabled destination");
            return false;
        }

        let latest = current
            .last_success_millis
            .map_or(at_millis, |previous| previous.max(at_millis));
        self.registry.set(
            kind,
            DestinationConfig {
                last_success_millis: Some(latest),
                ..current
            },
        );
        self.persist().await;
        true
    }

    fn state(&self, kind: DestinationKind) -> DestinationState {
        if self
            .pending_flow(kind, AuthorizationPurpose::EnableDestination)
            .is_some()
        {
            DestinationState::AwaitingAuthorization
        } else if self.registry.get(kind).enabled {
            DestinationState::Enabled
        } else {
            DestinationState::Disabled
        }
    }

    async fn on_resolved(&mut self, request: AuthorizationRequest, outcome: AuthorizationOutcome) {
        let Some(flow) = self.flows.remove(&request.id) else {
            debug!(request_id = %request.id, "outcome for a flow that is no longer tracked");
            return;
        };

        match (flow.purpose, outcome) {
            (AuthorizationPurpose::GrantDirectoryAccess, AuthorizationOutcome::Granted(Some(resource))) => {
                if let Err(e) = self.choose_local_directory(resource).await {
                    warn!(request_id = %request.id, error = %e, "directory grant rejected");
                }
            }
            (AuthorizationPurpose::GrantDirectoryAccess, outcome) => {
                debug!(request_id = %request.id, outcome = ?outcome, "directory picker closed without a selection");
            }
            (_, AuthorizationOutcome::Granted(payload)) => self.apply_grant(flow, payload).await,
            (_, outcome) => self.apply_denial(flow, outcome).await,
        }
    }

    async fn apply_grant(&mut self, flow: PendingFlow, payload: Option<String>) {
        let current = self.registry.get(flow.kind);
        let granted = payload.filter(|identity| !identity.trim().is_empty());

        let identity = match flow.kind {
            DestinationKind::SystemBackup => None,
            DestinationKind::CloudDrive => granted,
            DestinationKind::LocalFile => granted.or_else(|| current.identity().map(str::to_string)),
        };

        if flow.kind.requires_identity() && identity.is_none() {
            warn!(kind = %flow.kind, "grant carried no identity, treating as denied");
            self.apply_denial(flow, AuthorizationOutcome::Denied).await;
            return;
        }

        let config =
            DestinationConfig::enabled_with(identity).with_last_success(current.last_success_millis);
        self.registry.set(flow.kind, config);
        self.persist().await;

        info!(kind = %flow.kind, purpose = ?flow.purpose, "destination authorized");
    }

    async fn apply_denial(&mut self, flow: PendingFlow, outcome: AuthorizationOutcome) {
        let current = self.registry.get(flow.kind);
        if current.enabled {
            self.registry.set(flow.kind, cleared(&current));
            self.persist().await;
        }

        info!(kind = %flow.kind, outcome = ?outcome, "authorization not granted");

        if flow.initiator == Initiator::User || self.config.notify_background_failures {
            self.notices
                .notify(UserNotice::AuthorizationDenied { kind: flow.kind });
        }
    }

    fn on_watchdog(&mut self, id: RequestId) {
        if self.flows.contains_key(&id) {
            warn!(request_id = %id, "authorization request timed out, cancelling");
            self.broker.cancel(id);
        }
    }

    fn begin(
        &mut self,
        kind: DestinationKind,
        purpose: AuthorizationPurpose,
        initiator: Initiator,
    ) -> RequestId {
        let hint = self.registry.get(kind).identity().map(str::to_string);
        let mailbox = self.mailbox.clone();

        let request = self.broker.begin_request(
            kind,
            purpose,
            hint,
            Box::new(move |request: AuthorizationRequest, outcome: AuthorizationOutcome| {
                let id = request.id;
                let Some(tx) = mailbox.upgrade() else {
                    debug!(request_id = %id, "controller gone, authorization outcome dropped");
                    return;
                };
                if tx.send(Message::Resolved { request, outcome }).is_err() {
                    debug!(request_id = %id, "controller stopped, authorization outcome dropped");
                }
            }),
        );

        self.flows.insert(
            request.id,
            PendingFlow {
                kind,
                purpose,
                initiator,
            },
        );

        if let Some(timeout) = self.config.authorization_timeout() {
            let mailbox = self.mailbox.clone();
            let id = request.id;
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                if let Some(tx) = mailbox.upgrade() {
                    let _ = tx.send(Message::WatchdogExpired(id));
                }
            });
        }

        request.id
    }

    fn pending_flow(&self, kind: DestinationKind, purpose: AuthorizationPurpose) -> Option<RequestId> {
        self.flows
            .iter()
            .find(|(_, flow)| flow.kind == kind && flow.purpose == purpose)
            .map(|(id, _)| *id)
    }

    async fn persist(&self) {
        if let Err(e) = self.store.save(&self.registry.snapshot()).await {
            error!(error = %e, "failed to persist backup settings");
        }
    }

    /// Cancel the requests this controller is still waiting on
    ///
    /// Only ids tracked in `flows` are touched, the broker may be shared
    /// with other controllers.
    fn teardown(&mut self) {
        let cancelled = self
            .flows
            .drain()
            .filter(|(id, _)| self.broker.cancel(*id))
            .count();
        info!(cancelled, "backup controller stopped");
    }
}

impl Drop for ControllerTask {
    fn drop(&mut self) {
        // Reached with flows left only when `run` did not finish normally
        if !self.flows.is_empty() {
            warn!(
                pending = self.flows.len(),
                "backup controller exited abnormally, cancelling its requests"
            );
            self.teardown();
        }
    }
}

/// Disabled configuration that keeps only the last success timestamp
fn cleared(current: &DestinationConfig) -> DestinationConfig {
    DestinationConfig::disabled().with_last_success(current.last_success_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_disables_cloud_without_account() {
        let snapshot = RegistrySnapshot {
            cloud_drive: DestinationConfig::enabled_with(Some(String::new())),
            system_backup: DestinationConfig::enabled_with(None),
            ..Default::default()
        };

        let sanitized = sanitize_snapshot(snapshot);
        assert!(!sanitized.cloud_drive.enabled);
        assert!(sanitized.system_backup.enabled);
    }

    #[test]
    fn test_sanitize_drops_system_backup_identity() {
        let snapshot = RegistrySnapshot {
            system_backup: DestinationConfig::enabled_with(Some("device".to_string()))
                .with_last_success(Some(7)),
            local_file: DestinationConfig::enabled_with(Some("/backups".to_string())),
            ..Default::default()
        };

        let sanitized = sanitize_snapshot(snapshot);
        assert_eq!(
            sanitized.system_backup,
            DestinationConfig::enabled_with(None).with_last_success(Some(7))
        );
        assert_eq!(sanitized.local_file.identity(), Some("/backups"));
    }

    #[test]
    fn test_cleared_keeps_timestamp() {
        let current = DestinationConfig::enabled_with(Some("alice@example.com".to_string()))
            .with_last_success(Some(99));
        let config = cleared(&current);
        assert!(!config.enabled);
        assert_eq!(config.identity, None);
        assert_eq!(config.last_success_millis, Some(99));
    }
}
