//! End-to-end controller tests against the filesystem media store

use procamera::permissions::{PermissionGate, StaticPermissions};
use procamera::platform::{FaultPlan, SimulatedCamera};
use procamera::recording::{CountingEncoder, VideoEncoder};
use procamera::storage::{FsMediaStore, MemoryMediaStore};
use procamera::{
    CameraError, CaptureConfig, ControllerSettings, FailureStage, RecorderState,
    RecordingController, Resolution,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn controller(camera: Arc<SimulatedCamera>, root: &Path) -> RecordingController {
    RecordingController::new(
        camera,
        Arc::new(FsMediaStore::new(root)),
        Box::new(|| Box::new(CountingEncoder::new()) as Box<dyn VideoEncoder>),
        PermissionGate::new(Arc::new(StaticPermissions::granted())),
        ControllerSettings::default(),
    )
}

fn visible_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|e| e.file_name().to_string_lossy().to_string())
                .filter(|name| !name.starts_with('.'))
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

#[tokio::test]
async fn test_file_hidden_until_stop() {
    let root = tempfile::tempdir().unwrap();
    let collection = root.path().join("DCIM/ProCamera240fps");
    let mut controller = controller(Arc::new(SimulatedCamera::new()), root.path());

    let info = controller
        .start(CaptureConfig::new(Resolution::hd(), 240, 100, 1_000_000))
        .await
        .unwrap();
    assert!(visible_files(&collection).is_empty());

    tokio::time::sleep(Duration::from_millis(50)).await;
    let saved = controller.stop().unwrap();
    assert_eq!(visible_files(&collection), vec![info.output.display_name.clone()]);
    assert_eq!(saved.output.path, info.output.path);
}

#[tokio::test]
async fn test_failed_start_leaves_no_file() {
    let root = tempfile::tempdir().unwrap();
    let camera = Arc::new(SimulatedCamera::new().with_faults(FaultPlan {
        fail_configure: true,
        ..FaultPlan::default()
    }));
    let mut controller = controller(camera, root.path());

    let err = controller.start(CaptureConfig::default()).await.unwrap_err();
    assert!(matches!(err, CameraError::SessionConfigurationFailed(_)));
    assert_eq!(controller.state(), RecorderState::Failed(FailureStage::Configure));

    let collection = root.path().join("DCIM/ProCamera240fps");
    let leftovers = std::fs::read_dir(&collection).map(|d| d.count()).unwrap_or(0);
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn test_device_error_while_recording() {
    let root = tempfile::tempdir().unwrap();
    let camera = Arc::new(SimulatedCamera::new());
    let mut controller = controller(camera.clone(), root.path());

    controller.start(CaptureConfig::default()).await.unwrap();
    camera.set_faults(FaultPlan {
        error_after_frames: Some((1, 4)),
        ..FaultPlan::default()
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let err = controller.process_events().unwrap_err();
    assert_eq!(
        err,
        CameraError::DeviceError {
            device_id: "0".to_string(),
            code: 4
        }
    );
    assert_eq!(controller.state(), RecorderState::Failed(FailureStage::Device));
    assert!(controller.status().last_error.is_some());

    // The camera is reopened on the next start.
    camera.set_faults(FaultPlan::default());
    controller.start(CaptureConfig::default()).await.unwrap();
    controller.stop().unwrap();
    assert_eq!(camera.log().opened_devices.len(), 2);
}

fn impatient_controller(camera: Arc<SimulatedCamera>, store: Arc<MemoryMediaStore>) -> RecordingController {
    RecordingController::new(
        camera,
        store,
        Box::new(|| Box::new(CountingEncoder::new()) as Box<dyn VideoEncoder>),
        PermissionGate::new(Arc::new(StaticPermissions::granted())),
        ControllerSettings {
            open_timeout: Duration::from_millis(100),
            configure_timeout: Duration::from_millis(100),
            ..ControllerSettings::default()
        },
    )
}

#[tokio::test]
async fn test_configure_timeout() {
    let camera = Arc::new(SimulatedCamera::new().with_faults(FaultPlan {
        withhold_configured: true,
        ..FaultPlan::default()
    }));
    let store = Arc::new(MemoryMediaStore::new());
    let mut controller = impatient_controller(camera.clone(), store.clone());

    let err = controller.start(CaptureConfig::default()).await.unwrap_err();
    assert!(matches!(err, CameraError::Timeout(_)), "got {err:?}");
    assert_eq!(controller.state(), RecorderState::Failed(FailureStage::Configure));

    let log = camera.log();
    assert_eq!(log.sessions.len(), 1);
    assert_eq!(log.closed_sessions, vec![log.sessions[0].0]);
    assert!(log.repeating_requests.is_empty());
    assert!(store.entries().is_empty());
    assert_eq!(store.discarded().len(), 1);

    // The device stays open and a well-behaved camera records on retry.
    camera.set_faults(FaultPlan::default());
    controller.start(CaptureConfig::default()).await.unwrap();
    controller.stop().unwrap();
    assert_eq!(camera.log().opened_devices.len(), 1);
}

#[tokio::test]
async fn test_open_timeout() {
    let camera = Arc::new(SimulatedCamera::new().with_faults(FaultPlan {
        withhold_opened: true,
        ..FaultPlan::default()
    }));
    let store = Arc::new(MemoryMediaStore::new());
    let mut controller = impatient_controller(camera.clone(), store.clone());

    let err = controller.start(CaptureConfig::default()).await.unwrap_err();
    assert!(matches!(err, CameraError::Timeout(_)), "got {err:?}");
    assert_eq!(controller.state(), RecorderState::Failed(FailureStage::Device));
    assert_eq!(controller.device_id(), None);

    let log = camera.log();
    assert_eq!(log.closed_devices, vec!["0".to_string()]);
    assert!(log.sessions.is_empty());
    assert!(store.entries().is_empty());
    assert!(store.discarded().is_empty());

    let err = controller.open_camera().await.unwrap_err();
    assert!(matches!(err, CameraError::Timeout(_)));
    assert_eq!(controller.state(), RecorderState::Failed(FailureStage::Device));
}
