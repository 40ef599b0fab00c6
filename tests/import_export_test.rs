// Integration tests for import validation, pipeline hand-off and success
// signals

mod common;

use backup_control::auth::AuthorizationOutcome;
use backup_control::controller::UserNotice;
use backup_control::destination::DestinationKind;
use backup_control::pipeline::{ExportReport, PipelineError};
use backup_control::validation::ImportCandidate;
use backup_control::BackupControlError;
use chrono::{TimeZone, Utc};
use common::{Harness, RecordingImporter, ScriptedExporter};
use pretty_assertions::assert_eq;
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn test_uppercase_xml_forwarded_lowercase() {
    let harness = Harness::start().await;

    let candidate = ImportCandidate {
        location: "content://downloads/tasks-backup.XML".to_string(),
        extension: "XML".to_string(),
    };
    let summary = assert_ok!(harness.handle.import_from(candidate).await);
    assert_eq!(summary.imported, 3);

    assert_eq!(
        *harness.importer.calls.lock(),
        vec![(
            "content://downloads/tasks-backup.XML".to_string(),
            "xml".to_string()
        )]
    );
    assert!(harness.notices.all().is_empty());
}

#[tokio::test]
async fn test_csv_rejected_before_pipeline() {
    let harness = Harness::start().await;

    let candidate = ImportCandidate::from_location("/sdcard/Download/tasks.csv");
    let err = assert_err!(harness.handle.import_from(candidate).await);

    assert!(matches!(err, BackupControlError::UnsupportedFormat(ref ext) if ext == "csv"));
    assert!(harness.importer.calls.lock().is_empty());
    assert_eq!(
        harness.notices.all(),
        vec![UserNotice::UnsupportedFormat {
            extension: "csv".to_string()
        }]
    );
}

#[tokio::test]
async fn test_missing_extension_rejected() {
    let harness = Harness::start().await;

    let candidate = ImportCandidate::new("content://picker/12345", None);
    assert_err!(harness.handle.import_from(candidate).await);
    assert!(harness.importer.calls.lock().is_empty());
}

#[tokio::test]
async fn test_import_failure_reported_verbatim() {
    let harness = Harness::builder()
        .importer(RecordingImporter::failing(PipelineError::MergeConflict(
            "task 42 changed on both sides".to_string(),
        )))
        .start()
        .await;

    let err = assert_err!(
        harness
            .handle
            .import_from(ImportCandidate::from_location("/backups/tasks.json"))
            .await
    );
    assert!(matches!(
        err,
        BackupControlError::PipelineFailure(PipelineError::MergeConflict(_))
    ));
    assert_eq!(
        harness.notices.all(),
        vec![UserNotice::PipelineFailure {
            message: "Merge conflict: task 42 changed on both sides".to_string()
        }]
    );
}

#[tokio::test]
async fn test_export_records_local_success() {
    let completed_at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let harness = Harness::builder()
        .exporter(ScriptedExporter::succeeding(ExportReport {
            completed_at,
            location: Some("/backups/auto.json".to_string()),
        }))
        .start()
        .await;

    let report = assert_ok!(harness.handle.export_now().await);
    assert_eq!(report.completed_at, completed_at);
    assert_eq!(*harness.exporter.calls.lock(), 1);

    let config = harness.handle.snapshot(DestinationKind::LocalFile).await.unwrap();
    assert_eq!(config.last_success(), Some(completed_at));
    assert!(!config.enabled);
}

#[tokio::test]
async fn test_export_failure_leaves_status_unchanged() {
    let harness = Harness::builder()
        .exporter(ScriptedExporter::failing(PipelineError::Io("disk full".to_string())))
        .start()
        .await;

    let err = assert_err!(harness.handle.export_now().await);
    assert!(matches!(err, BackupControlError::PipelineFailure(PipelineError::Io(_))));

    let config = harness.handle.snapshot(DestinationKind::LocalFile).await.unwrap();
    assert_eq!(config.last_success_millis, None);
    assert_eq!(
        harness.notices.all(),
        vec![UserNotice::PipelineFailure {
            message: "I/O error: disk full".to_string()
        }]
    );
}

#[tokio::test]
async fn test_success_signal_ignored_for_disabled_cloud() {
    let harness = Harness::start().await;
    let mut updates = harness.handle.subscribe();

    let recorded = harness
        .handle
        .record_success(DestinationKind::CloudDrive, Utc::now())
        .await
        .unwrap();
    assert!(!recorded);
    assert!(updates.try_recv().is_err());
    assert_eq!(
        harness.handle.snapshot(DestinationKind::CloudDrive).await.unwrap().last_success_millis,
        None
    );
}

#[tokio::test]
async fn test_success_signal_keeps_latest_timestamp() {
    let harness = Harness::start().await;

    harness.handle.request_enable(DestinationKind::SystemBackup).await.unwrap();
    harness.answer_last(AuthorizationOutcome::Granted(None));

    let newer = Utc.with_ymd_and_hms(2024, 5, 2, 8, 30, 0).unwrap();
    let older = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();

    assert!(harness.handle.record_success(DestinationKind::SystemBackup, newer).await.unwrap());
    assert!(harness.handle.record_success(DestinationKind::SystemBackup, older).await.unwrap());

    let config = harness.handle.snapshot(DestinationKind::SystemBackup).await.unwrap();
    assert!(config.enabled);
    assert_eq!(config.last_success(), Some(newer));
}

#[tokio::test]
async fn test_pick_directory_flow() {
    let harness = Harness::start().await;
    harness
        .handle
        .choose_local_directory("content://tree/primary:Backups")
        .await
        .unwrap();

    let id = harness.handle.pick_local_directory().await.unwrap();
    let armed = harness.provider.last().unwrap();
    assert_eq!(armed.id, id);
    assert_eq!(armed.hint.as_deref(), Some("content://tree/primary:Backups"));

    harness
        .broker
        .resolve(
            id,
            AuthorizationOutcome::Granted(Some("content://tree/primary:Tasks".to_string())),
        )
        .unwrap();

    let config = harness.handle.snapshot(DestinationKind::LocalFile).await.unwrap();
    assert_eq!(config.identity(), Some("content://tree/primary:Tasks"));
    // Choosing a directory does not toggle enablement
    assert!(!config.enabled);
}

#[tokio::test]
async fn test_dismissed_picker_keeps_directory() {
    let harness = Harness::start().await;
    harness.handle.choose_local_directory("/backups").await.unwrap();

    harness.handle.pick_local_directory().await.unwrap();
    harness.answer_last(AuthorizationOutcome::Granted(None));

    harness.handle.pick_local_directory().await.unwrap();
    harness.answer_last(AuthorizationOutcome::Denied);

    let config = harness.handle.snapshot(DestinationKind::LocalFile).await.unwrap();
    assert_eq!(config.identity(), Some("/backups"));
    assert!(harness.notices.all().is_empty());
}

#[tokio::test]
async fn test_blank_directory_rejected() {
    let harness = Harness::start().await;

    let err = assert_err!(harness.handle.choose_local_directory("   ").await);
    assert!(matches!(err, BackupControlError::InvalidResource(_)));
    assert_eq!(harness.handle.current(DestinationKind::LocalFile).identity, None);
}

#[tokio::test]
async fn test_local_enable_falls_back_to_chosen_directory() {
    let harness = Harness::start().await;
    harness.handle.choose_local_directory("/backups").await.unwrap();

    harness.handle.request_enable(DestinationKind::LocalFile).await.unwrap();
    harness.answer_last(AuthorizationOutcome::Granted(None));

    let config = harness.handle.snapshot(DestinationKind::LocalFile).await.unwrap();
    assert!(config.enabled);
    assert_eq!(config.identity(), Some("/backups"));
}
