// Shared test doubles for the controller integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use backup_control::auth::{
    AuthorizationBroker, AuthorizationOutcome, AuthorizationProvider, AuthorizationRequest,
};
use backup_control::config::ControllerConfig;
use backup_control::controller::{BackupController, ControllerHandle, NoticeSink, UserNotice};
use backup_control::pipeline::{
    ExportPipeline, ExportReport, ImportPipeline, ImportSummary, PipelineError,
};
use backup_control::storage::{MemorySettingsStore, SettingsStore};
use parking_lot::Mutex;
use std::sync::Arc;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Records every armed request; tests answer through the broker
#[derive(Default)]
pub struct RecordingProvider {
    pub started: Mutex<Vec<AuthorizationRequest>>,
}

impl RecordingProvider {
    pub fn last(&self) -> Option<AuthorizationRequest> {
        self.started.lock().last().cloned()
    }

    pub fn count(&self) -> usize {
        self.started.lock().len()
    }
}

impl AuthorizationProvider for RecordingProvider {
    fn start(&self, request: &AuthorizationRequest) {
        self.started.lock().push(request.clone());
    }
}

pub struct ScriptedExporter {
    pub result: Mutex<Result<ExportReport, PipelineError>>,
    pub calls: Mutex<usize>,
}

impl ScriptedExporter {
    pub fn succeeding(report: ExportReport) -> Self {
        Self {
            result: Mutex::new(Ok(report)),
            calls: Mutex::new(0),
        }
    }

    pub fn failing(error: PipelineError) -> Self {
        Self {
            result: Mutex::new(Err(error)),
            calls: Mutex::new(0),
        }
    }
}

#[async_trait]
impl ExportPipeline for ScriptedExporter {
    async fn export(&self) -> Result<ExportReport, PipelineError> {
        *self.calls.lock() += 1;
        self.result.lock().clone()
    }
}

#[derive(Default)]
pub struct RecordingImporter {
    pub calls: Mutex<Vec<(String, String)>>,
    pub failure: Mutex<Option<PipelineError>>,
}

impl RecordingImporter {
    pub fn failing(error: PipelineError) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failure: Mutex::new(Some(error)),
        }
    }
}

#[async_trait]
impl ImportPipeline for RecordingImporter {
    async fn import(&self, location: &str, extension: &str) -> Result<ImportSummary, PipelineError> {
        self.calls
            .lock()
            .push((location.to_string(), extension.to_string()));
        match self.failure.lock().clone() {
            Some(error) => Err(error),
            None => Ok(ImportSummary {
                imported: 3,
                skipped: 0,
            }),
        }
    }
}

#[derive(Default)]
pub struct RecordingNotices {
    pub notices: Mutex<Vec<UserNotice>>,
}

impl RecordingNotices {
    pub fn all(&self) -> Vec<UserNotice> {
        self.notices.lock().clone()
    }
}

impl NoticeSink for RecordingNotices {
    fn notify(&self, notice: UserNotice) {
        self.notices.lock().push(notice);
    }
}

pub struct Harness {
    pub handle: ControllerHandle,
    pub broker: Arc<AuthorizationBroker>,
    pub provider: Arc<RecordingProvider>,
    pub exporter: Arc<ScriptedExporter>,
    pub importer: Arc<RecordingImporter>,
    pub notices: Arc<RecordingNotices>,
    pub store: Arc<MemorySettingsStore>,
}

impl Harness {
    pub async fn start() -> Self {
        Self::builder().start().await
    }

    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::default()
    }

    /// Answer the most recently armed request
    pub fn answer_last(&self, outcome: AuthorizationOutcome) {
        let request = self.provider.last().expect("no request was armed");
        self.broker
            .resolve(request.id, outcome)
            .expect("request should be pending");
    }
}

#[derive(Default)]
pub struct HarnessBuilder {
    config: Option<ControllerConfig>,
    exporter: Option<ScriptedExporter>,
    importer: Option<RecordingImporter>,
    store: Option<MemorySettingsStore>,
    shared: Option<(Arc<AuthorizationBroker>, Arc<RecordingProvider>)>,
}

impl HarnessBuilder {
    pub fn config(mut self, config: ControllerConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn exporter(mut self, exporter: ScriptedExporter) -> Self {
        self.exporter = Some(exporter);
        self
    }

    pub fn importer(mut self, importer: RecordingImporter) -> Self {
        self.importer = Some(importer);
        self
    }

    pub fn store(mut self, store: MemorySettingsStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Drive the new controller through another harness's broker
    pub fn sharing_broker_with(mut self, other: &Harness) -> Self {
        self.shared = Some((other.broker.clone(), other.provider.clone()));
        self
    }

    pub async fn start(self) -> Harness {
        init_tracing();

        let (broker, provider) = self.shared.unwrap_or_else(|| {
            let provider = Arc::new(RecordingProvider::default());
            (Arc::new(AuthorizationBroker::new(provider.clone())), provider)
        });
        let exporter = Arc::new(
            self.exporter
                .unwrap_or_else(|| ScriptedExporter::succeeding(ExportReport::now(None))),
        );
        let importer = Arc::new(self.importer.unwrap_or_default());
        let notices = Arc::new(RecordingNotices::default());
        let store = Arc::new(self.store.unwrap_or_default());

        let handle = BackupController::new(broker.clone(), exporter.clone(), importer.clone())
            .with_config(self.config.unwrap_or_default())
            .with_notices(notices.clone())
            .with_store(store.clone() as Arc<dyn SettingsStore>)
            .spawn()
            .await
            .expect("controller should start");

        Harness {
            handle,
            broker,
            provider,
            exporter,
            importer,
            notices,
            store,
        }
    }
}
