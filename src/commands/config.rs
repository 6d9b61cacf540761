use crate::config::ProCameraConfig;
use std::sync::{Arc, RwLock};
use tauri::command;

lazy_static::lazy_static! {
    static ref GLOBAL_CONFIG: Arc<RwLock<ProCameraConfig>> = Arc::new(RwLock::new(ProCameraConfig::load_or_default()));
}

/// Snapshot of the active configuration
pub(crate) fn current_config() -> ProCameraConfig {
    GLOBAL_CONFIG
        .read()
        .map(|config| config.clone())
        .unwrap_or_default()
}

/// Get the current configuration
#[command]
pub async fn get_config() -> Result<ProCameraConfig, String> {
    let config = GLOBAL_CONFIG.read().map_err(|e| e.to_string())?;
    Ok(config.clone())
}

/// Update configuration; controller settings apply from the next recording
#[command]
pub async fn update_config(new_config: ProCameraConfig) -> Result<(), String> {
    new_config.validate()?;

    {
        let mut config = GLOBAL_CONFIG.write().map_err(|e| e.to_string())?;
        *config = new_config.clone();
    }
    super::recording::apply_settings(new_config.controller_settings()).await;

    new_config
        .save_to_file(ProCameraConfig::default_path())
        .map_err(|e| e.to_string())?;

    Ok(())
}

/// Reset configuration to defaults
#[command]
pub async fn reset_config() -> Result<ProCameraConfig, String> {
    let default_config = ProCameraConfig::default();

    {
        let mut config = GLOBAL_CONFIG
            .write()
            .map_err(|e| format!("Failed to write config: {}", e))?;
        *config = default_config.clone();
    }
    super::recording::apply_settings(default_config.controller_settings()).await;

    default_config
        .save_to_file(ProCameraConfig::default_path())
        .map_err(|e| e.to_string())?;

    Ok(default_config)
}
