use crate::permissions::PermissionInfo;
use tauri::command;

/// Ask for camera access if it has not been decided yet
#[command]
pub async fn request_camera_permission() -> Result<PermissionInfo, String> {
    log::info!("Requesting camera permission");
    let controller = super::recording::controller().await;
    Ok(controller.permissions().request())
}

/// Current camera permission without prompting
#[command]
pub async fn check_camera_permission_status() -> Result<PermissionInfo, String> {
    let controller = super::recording::controller().await;
    Ok(controller.permissions().check())
}
