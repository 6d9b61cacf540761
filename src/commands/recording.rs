//! Tauri commands for recording
//!
//! One controller serves the whole app. Hosts with a native camera stack
//! install theirs with [`install_controller`]; otherwise the simulated
//! platform writing into the configured output directory is used.

use std::sync::Arc;
use tauri::command;
use tokio::sync::{Mutex as AsyncMutex, MappedMutexGuard, MutexGuard};

use crate::config::ProCameraConfig;
use crate::permissions::{PermissionGate, StaticPermissions};
use crate::platform::SimulatedCamera;
use crate::recording::default_encoder_factory;
use crate::session::{
    ControllerSettings, RecorderStatus, RecordingController, RecordingInfo, SavedRecording,
    ToggleOutcome,
};
use crate::storage::FsMediaStore;

lazy_static::lazy_static! {
    static ref CONTROLLER: AsyncMutex<Option<RecordingController>> = AsyncMutex::new(None);
}

fn default_controller(config: &ProCameraConfig) -> RecordingController {
    log::info!(
        "No camera platform installed, using the simulated camera writing to {}",
        config.storage.output_directory
    );
    RecordingController::new(
        Arc::new(SimulatedCamera::new()),
        Arc::new(FsMediaStore::new(config.output_directory())),
        default_encoder_factory(),
        PermissionGate::new(Arc::new(StaticPermissions::granted())),
        config.controller_settings(),
    )
}

pub(crate) async fn controller() -> MappedMutexGuard<'static, RecordingController> {
    let guard = CONTROLLER.lock().await;
    MutexGuard::map(guard, |slot| {
        slot.get_or_insert_with(|| default_controller(&super::config::current_config()))
    })
}

pub(crate) async fn apply_settings(settings: ControllerSettings) {
    if let Some(controller) = CONTROLLER.lock().await.as_mut() {
        controller.update_settings(settings);
    }
}

/// Replace the app-wide controller, closing the previous one
pub async fn install_controller(controller: RecordingController) {
    let previous = CONTROLLER.lock().await.replace(controller);
    if let Some(mut previous) = previous {
        if let Err(e) = previous.close() {
            log::warn!("Error closing previous controller: {}", e);
        }
    }
}

/// Open the camera, as the screen does when it comes to the foreground
#[command]
pub async fn open_camera() -> Result<String, String> {
    let mut controller = controller().await;
    controller.open_camera().await.map_err(|e| e.to_string())
}

/// Stop any recording and release the camera
#[command]
pub async fn close_camera() -> Result<Option<SavedRecording>, String> {
    let mut controller = controller().await;
    controller.close().map_err(|e| e.to_string())
}

/// Start recording with the values currently on the control panel
#[command]
pub async fn start_recording() -> Result<RecordingInfo, String> {
    let mut controller = controller().await;
    let config = super::controls::panel().await.collect();
    log::info!("Starting recording: {:?}", config);
    controller.start(config).await.map_err(|e| e.to_string())
}

#[command]
pub async fn stop_recording() -> Result<SavedRecording, String> {
    let mut controller = controller().await;
    controller.stop().map_err(|e| e.to_string())
}

/// The record button
#[command]
pub async fn toggle_recording() -> Result<ToggleOutcome, String> {
    let mut controller = controller().await;
    let mut panel = super::controls::panel().await;
    controller.toggle_record(&mut panel).await.map_err(|e| e.to_string())
}

/// Status for the UI; camera events received since the last call are applied first
#[command]
pub async fn get_recording_status() -> Result<RecorderStatus, String> {
    let mut controller = controller().await;
    if let Err(e) = controller.process_events() {
        log::warn!("Camera event: {}", e);
    }
    Ok(controller.status())
}
