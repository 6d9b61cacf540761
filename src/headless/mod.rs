//! Headless recording without a UI
//!
//! Drives a [`RecordingController`] on the simulated camera platform from
//! option labels and slider positions, the same inputs the recording screen
//! produces. Used by `procamera-cli` and for end-to-end tests.

use crate::config::ProCameraConfig;
use crate::controls::OptionGroup;
use crate::errors::CameraError;
use crate::permissions::{PermissionGate, StaticPermissions};
use crate::platform::{CameraBackend, CameraCharacteristics, SimulatedCamera};
use crate::recording::default_encoder_factory;
use crate::session::{RecordingController, SavedRecording};
use crate::storage::FsMediaStore;
use crate::types::{CaptureConfig, SessionKind};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const POLL: Duration = Duration::from_millis(50);

/// A camera the platform reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraSummary {
    pub id: String,
    pub characteristics: CameraCharacteristics,
}

/// What to record
#[derive(Debug, Clone)]
pub struct HeadlessOptions {
    pub fps_label: String,
    pub resolution_label: String,
    pub iso_position: f32,
    pub shutter_position: f32,
    pub duration: Duration,
    pub output_dir: PathBuf,
    pub config: ProCameraConfig,
}

impl HeadlessOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            fps_label: "120 FPS".to_string(),
            resolution_label: "720p".to_string(),
            iso_position: 100.0,
            shutter_position: 7.0,
            duration: Duration::from_secs(3),
            output_dir: output_dir.into(),
            config: ProCameraConfig::default(),
        }
    }
}

/// Outcome of a headless recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadlessReport {
    pub config: CaptureConfig,
    pub session_kind: SessionKind,
    pub saved: SavedRecording,
    /// Stopped early by the stop flag or by the camera going away
    pub interrupted: bool,
    pub frames_delivered: u64,
}

/// Cameras of the simulated platform
pub fn list_cameras() -> Result<Vec<CameraSummary>, CameraError> {
    let camera = SimulatedCamera::new();
    camera
        .camera_ids()?
        .into_iter()
        .map(|id| {
            let characteristics = camera.characteristics(&id)?;
            Ok(CameraSummary { id, characteristics })
        })
        .collect()
}

/// Record on a fresh simulated camera until `options.duration` passes or `stop` is raised
pub async fn record(options: &HeadlessOptions, stop: Arc<AtomicBool>) -> Result<HeadlessReport, CameraError> {
    record_on(Arc::new(SimulatedCamera::new()), options, stop).await
}

/// Record on a caller-provided simulated camera
pub async fn record_on(
    camera: Arc<SimulatedCamera>,
    options: &HeadlessOptions,
    stop: Arc<AtomicBool>,
) -> Result<HeadlessReport, CameraError> {
    options.config.validate().map_err(CameraError::ConfigError)?;

    let mut panel = options.config.control_panel()?;
    panel.fps_group = OptionGroup::new([options.fps_label.as_str()]).with_checked(0);
    panel.resolution_group = OptionGroup::new([options.resolution_label.as_str()]).with_checked(0);
    panel.set_iso(options.iso_position);
    panel.set_shutter(options.shutter_position);
    log::info!("{}, {}", panel.iso_label(), panel.shutter_label());
    let config = panel.collect();

    let mut controller = RecordingController::new(
        camera.clone(),
        Arc::new(FsMediaStore::new(&options.output_dir)),
        default_encoder_factory(),
        PermissionGate::new(Arc::new(StaticPermissions::granted())),
        options.config.controller_settings(),
    );

    let info = controller.start(config).await?;
    let started = Instant::now();
    let mut interrupted = false;

    while started.elapsed() < options.duration {
        if stop.load(Ordering::Relaxed) {
            log::info!("Stop requested");
            interrupted = true;
            break;
        }
        if let Err(e) = controller.process_events() {
            // The controller already saved what it could.
            return match controller.last_saved().cloned() {
                Some(saved) if saved.id == info.id => Ok(HeadlessReport {
                    config,
                    session_kind: info.session_kind,
                    saved,
                    interrupted: true,
                    frames_delivered: camera.log().frames_delivered,
                }),
                _ => Err(e),
            };
        }
        tokio::time::sleep(POLL.min(options.duration.saturating_sub(started.elapsed()))).await;
    }

    let saved = controller.stop()?;
    controller.close()?;
    Ok(HeadlessReport {
        config,
        session_kind: info.session_kind,
        saved,
        interrupted,
        frames_delivered: camera.log().frames_delivered,
    })
}
