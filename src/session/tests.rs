use super::*;
use crate::permissions::{PermissionGate, StaticPermissions};
use crate::platform::{FaultPlan, SimulatedCamera};
use crate::recording::{CountingEncoder, EncoderFaults};
use crate::request::{AeMode, ControlMode};
use crate::storage::MemoryMediaStore;
use crate::types::Resolution;

struct Harness {
    camera: Arc<SimulatedCamera>,
    store: Arc<MemoryMediaStore>,
    controller: RecordingController,
}

fn harness_with(camera: SimulatedCamera, permissions: StaticPermissions, faults: EncoderFaults) -> Harness {
    let camera = Arc::new(camera);
    let store = Arc::new(MemoryMediaStore::new());
    let encoders = move || Box::new(CountingEncoder::with_faults(faults)) as Box<dyn VideoEncoder>;
    let settings = ControllerSettings {
        open_timeout: Duration::from_secs(2),
        configure_timeout: Duration::from_secs(2),
        ..ControllerSettings::default()
    };
    let controller = RecordingController::new(
        camera.clone(),
        store.clone(),
        Box::new(encoders),
        PermissionGate::new(Arc::new(permissions)),
        settings,
    );
    Harness {
        camera,
        store,
        controller,
    }
}

fn harness() -> Harness {
    harness_with(SimulatedCamera::new(), StaticPermissions::granted(), EncoderFaults::default())
}

fn standard_config() -> CaptureConfig {
    CaptureConfig::new(Resolution::hd(), 120, 400, 8_000_000)
}

fn high_speed_config() -> CaptureConfig {
    CaptureConfig::new(Resolution::full_hd(), 240, 100, 1_000_000)
}

async fn record_for(h: &mut Harness, config: CaptureConfig, millis: u64) -> SavedRecording {
    h.controller.start(config).await.unwrap();
    tokio::time::sleep(Duration::from_millis(millis)).await;
    h.controller.stop().unwrap()
}

#[tokio::test]
async fn test_standard_recording_round_trip() {
    let mut h = harness();
    let info = h.controller.start(standard_config()).await.unwrap();
    assert_eq!(h.controller.state(), RecorderState::Recording);
    assert_eq!(info.session_kind, SessionKind::Standard);
    assert!(info.output.display_name.starts_with("ManualCinema_"));
    assert!(info.output.display_name.ends_with(".mp4"));
    assert_eq!(info.output.relative_path, "DCIM/ProCamera240fps");
    assert!(h.store.is_pending(&info.output).unwrap());

    tokio::time::sleep(Duration::from_millis(100)).await;
    let saved = h.controller.stop().unwrap();
    assert_eq!(h.controller.state(), RecorderState::Idle);
    assert_eq!(saved.id, info.id);
    assert!(saved.frames_encoded > 0);
    assert!(saved.warnings.is_empty());
    assert_eq!(h.store.pending_history(&saved.output), vec![true, false]);
    assert_eq!(h.store.mime_type(&saved.output).as_deref(), Some("video/mp4"));

    let log = h.camera.log();
    assert_eq!(log.opened_devices, vec!["0".to_string()]);
    assert_eq!(log.repeating_requests.len(), 1);
    assert!(log.repeating_bursts.is_empty());
    let request = &log.repeating_requests[0];
    assert_eq!(request.control_mode, ControlMode::Off);
    assert_eq!(request.ae_mode, Some(AeMode::Off));
    assert_eq!(request.sensor_sensitivity, Some(400));
    assert_eq!(request.sensor_exposure_time_ns, Some(8_000_000));
}

#[tokio::test]
async fn test_high_speed_installs_single_burst() {
    let mut h = harness();
    let saved = record_for(&mut h, high_speed_config(), 50).await;
    assert_eq!(saved.session_kind, SessionKind::HighSpeed);

    let log = h.camera.log();
    assert!(log.repeating_requests.is_empty());
    assert_eq!(log.repeating_bursts.len(), 1);
    assert_eq!(log.repeating_bursts[0].len(), 8);
    assert!(log.repeating_bursts[0]
        .iter()
        .all(|r| r.control_mode == ControlMode::Auto && r.sensor_sensitivity.is_none()));
}

#[tokio::test]
async fn test_device_reused_across_recordings() {
    let mut h = harness();
    record_for(&mut h, standard_config(), 20).await;
    record_for(&mut h, high_speed_config(), 20).await;
    assert_eq!(h.camera.log().opened_devices.len(), 1);
    assert_eq!(h.store.entries().len(), 2);
    assert_eq!(h.controller.status().notice.as_deref(), Some(SAVED_NOTICE));
}

#[tokio::test]
async fn test_double_start_and_idle_stop_rejected() {
    let mut h = harness();
    assert!(matches!(
        h.controller.stop(),
        Err(CameraError::InvalidState { .. })
    ));

    h.controller.start(standard_config()).await.unwrap();
    assert!(matches!(
        h.controller.start(standard_config()).await,
        Err(CameraError::InvalidState { .. })
    ));
    assert_eq!(h.controller.state(), RecorderState::Recording);
    assert_eq!(h.store.entries().len(), 1);
    h.controller.stop().unwrap();
}

#[tokio::test]
async fn test_permission_denied() {
    let mut h = harness_with(
        SimulatedCamera::new(),
        StaticPermissions::deny_on_request(),
        EncoderFaults::default(),
    );
    let err = h.controller.start(standard_config()).await.unwrap_err();
    assert!(matches!(err, CameraError::PermissionDenied(_)));
    assert_eq!(h.controller.state(), RecorderState::Failed(FailureStage::Permission));
    assert!(h.camera.log().opened_devices.is_empty());
    assert!(h.store.entries().is_empty());
}

#[tokio::test]
async fn test_configure_failure_discards_entry() {
    let camera = SimulatedCamera::new().with_faults(FaultPlan {
        fail_configure: true,
        ..FaultPlan::default()
    });
    let mut h = harness_with(camera, StaticPermissions::granted(), EncoderFaults::default());
    let err = h.controller.start(standard_config()).await.unwrap_err();
    assert!(matches!(err, CameraError::SessionConfigurationFailed(_)));
    assert_eq!(h.controller.state(), RecorderState::Failed(FailureStage::Configure));

    assert!(h.store.entries().is_empty());
    assert_eq!(h.store.discarded().len(), 1);
    assert_eq!(h.camera.log().closed_sessions.len(), 1);

    // A later attempt on a healthy camera succeeds.
    h.camera.set_faults(FaultPlan::default());
    h.controller.start(standard_config()).await.unwrap();
    h.controller.stop().unwrap();
}

#[tokio::test]
async fn test_encoder_prepare_failure() {
    let mut h = harness_with(
        SimulatedCamera::new(),
        StaticPermissions::granted(),
        EncoderFaults {
            fail_prepare: true,
            ..EncoderFaults::default()
        },
    );
    let err = h.controller.start(standard_config()).await.unwrap_err();
    assert!(matches!(err, CameraError::EncoderError(_)));
    assert_eq!(h.controller.state(), RecorderState::Failed(FailureStage::Encoder));
    assert!(h.camera.log().sessions.is_empty());
    assert_eq!(h.store.discarded().len(), 1);
}

#[tokio::test]
async fn test_encoder_stop_failure_discards_output() {
    let mut h = harness_with(
        SimulatedCamera::new(),
        StaticPermissions::granted(),
        EncoderFaults {
            fail_stop: true,
            ..EncoderFaults::default()
        },
    );
    let info = h.controller.start(standard_config()).await.unwrap();
    let err = h.controller.stop().unwrap_err();
    assert!(matches!(err, CameraError::EncoderError(_)));
    assert_eq!(h.controller.state(), RecorderState::Failed(FailureStage::Encoder));
    assert!(h.store.is_discarded(&info.output));
    assert_eq!(h.store.pending_history(&info.output), vec![true]);
}

#[tokio::test]
async fn test_storage_finalize_failure() {
    let mut h = harness();
    let info = h.controller.start(standard_config()).await.unwrap();
    h.store.set_fail_finalize(true);
    let err = h.controller.stop().unwrap_err();
    assert!(matches!(err, CameraError::StorageError(_)));
    assert_eq!(h.controller.state(), RecorderState::Failed(FailureStage::Stop));
    assert!(h.store.is_pending(&info.output).unwrap());
}

#[tokio::test]
async fn test_teardown_failure_is_a_warning() {
    let mut h = harness();
    h.controller.start(standard_config()).await.unwrap();
    h.camera.set_faults(FaultPlan {
        fail_session_teardown: true,
        ..FaultPlan::default()
    });
    let saved = h.controller.stop().unwrap();
    assert_eq!(saved.warnings.len(), 1);
    assert!(saved.warnings[0].starts_with("stop repeating"));
    assert_eq!(h.store.pending_history(&saved.output), vec![true, false]);
}

#[tokio::test]
async fn test_unsupported_config_rejected_before_storage() {
    let mut h = harness();
    let config = CaptureConfig::new(Resolution::vga(), 240, 100, 1_000_000);
    let err = h.controller.start(config).await.unwrap_err();
    assert!(matches!(err, CameraError::InvalidConfiguration(_)));
    assert_eq!(h.controller.state(), RecorderState::Failed(FailureStage::Configure));
    assert!(h.store.entries().is_empty());
    assert!(h.store.discarded().is_empty());
}

#[tokio::test]
async fn test_open_failure() {
    let camera = SimulatedCamera::new().with_faults(FaultPlan {
        fail_open: true,
        ..FaultPlan::default()
    });
    let mut h = harness_with(camera, StaticPermissions::granted(), EncoderFaults::default());
    let err = h.controller.open_camera().await.unwrap_err();
    assert!(matches!(err, CameraError::DeviceUnavailable(_)));
    assert_eq!(h.controller.state(), RecorderState::Failed(FailureStage::Device));
    assert_eq!(h.controller.device_id(), None);
}

#[tokio::test]
async fn test_disconnect_while_recording_saves_partial_file() {
    let camera = SimulatedCamera::new().with_faults(FaultPlan {
        disconnect_after_frames: Some(3),
        ..FaultPlan::default()
    });
    let mut h = harness_with(camera, StaticPermissions::granted(), EncoderFaults::default());
    h.controller.start(standard_config()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let err = h.controller.process_events().unwrap_err();
    assert!(matches!(err, CameraError::DeviceDisconnected(_)));
    assert_eq!(h.controller.state(), RecorderState::Failed(FailureStage::Device));
    assert_eq!(h.controller.device_id(), None);

    let saved = h.controller.last_saved().cloned().unwrap();
    assert!(saved.warnings.iter().any(|w| w.contains("interrupted")));
    assert_eq!(h.store.pending_history(&saved.output), vec![true, false]);
    assert_eq!(h.camera.log().closed_devices, vec!["0".to_string()]);
}

#[tokio::test]
async fn test_toggle_record_uses_panel() {
    let mut h = harness();
    let mut panel = ControlPanel::default();
    panel.select_fps(3);
    panel.select_resolution(2);
    panel.set_iso(800.0);

    let started = h.controller.toggle_record(&mut panel).await.unwrap();
    let ToggleOutcome::Started(info) = started else {
        panic!("expected a start");
    };
    assert_eq!(info.config.target_fps, 240);
    assert_eq!(info.config.resolution(), Resolution::full_hd());
    assert_eq!(info.session_kind, SessionKind::HighSpeed);

    let stopped = h.controller.toggle_record(&mut panel).await.unwrap();
    assert!(matches!(stopped, ToggleOutcome::Stopped(_)));
    assert_eq!(h.controller.state(), RecorderState::Idle);
}

#[tokio::test]
async fn test_status_serializes() {
    let mut h = harness();
    h.controller.start(standard_config()).await.unwrap();
    let status = h.controller.status();
    assert!(status.is_recording);
    assert!(status.recording_id.is_some());
    assert_eq!(status.device_id.as_deref(), Some("0"));

    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["state"], "Recording");
    assert_eq!(json["config"]["target_fps"], 120);
    h.controller.stop().unwrap();
}

#[tokio::test]
async fn test_close_stops_recording() {
    let mut h = harness();
    h.controller.start(standard_config()).await.unwrap();
    let saved = h.controller.close().unwrap();
    assert!(saved.is_some());
    assert_eq!(h.controller.state(), RecorderState::Idle);
    assert_eq!(h.camera.log().closed_devices.len(), 1);
}
