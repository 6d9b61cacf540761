//! Tauri commands backing the recording screen's controls

use crate::controls::ControlPanel;
use serde::{Deserialize, Serialize};
use tauri::command;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};

lazy_static::lazy_static! {
    static ref CONTROL_PANEL: AsyncMutex<ControlPanel> =
        AsyncMutex::new(super::config::current_config().control_panel().unwrap_or_else(|e| {
            log::warn!("Configured controls unusable, using defaults: {}", e);
            ControlPanel::default()
        }));
}

pub(crate) async fn panel() -> MutexGuard<'static, ControlPanel> {
    CONTROL_PANEL.lock().await
}

/// Panel state plus the slider captions the UI shows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlPanelView {
    pub panel: ControlPanel,
    pub iso_label: String,
    pub shutter_label: String,
}

impl ControlPanelView {
    fn of(panel: &ControlPanel) -> Self {
        Self {
            panel: panel.clone(),
            iso_label: panel.iso_label(),
            shutter_label: panel.shutter_label(),
        }
    }
}

/// Check a frame-rate option
#[command]
pub async fn select_fps(index: usize) -> Result<ControlPanelView, String> {
    let mut panel = panel().await;
    if !panel.select_fps(index) {
        return Err(format!("No frame rate option at index {}", index));
    }
    Ok(ControlPanelView::of(&panel))
}

/// Check a resolution option
#[command]
pub async fn select_resolution(index: usize) -> Result<ControlPanelView, String> {
    let mut panel = panel().await;
    if !panel.select_resolution(index) {
        return Err(format!("No resolution option at index {}", index));
    }
    Ok(ControlPanelView::of(&panel))
}

/// Move the ISO slider and return the new caption
#[command]
pub async fn set_iso(position: f32) -> Result<String, String> {
    let mut panel = panel().await;
    panel.set_iso(position);
    Ok(panel.iso_label())
}

/// Move the shutter slider and return the new caption
#[command]
pub async fn set_shutter(position: f32) -> Result<String, String> {
    let mut panel = panel().await;
    panel.set_shutter(position);
    Ok(panel.shutter_label())
}

#[command]
pub async fn get_control_panel() -> Result<ControlPanelView, String> {
    let panel = panel().await;
    Ok(ControlPanelView::of(&panel))
}
