//! ProCamera: manual-exposure, high-frame-rate video recording for Tauri applications
//!
//! This crate drives a "pro camera" recording screen: frame-rate and
//! resolution choices, ISO and shutter sliders, and a record toggle that
//! switches between standard capture sessions and constrained high-speed
//! sessions (240 fps and up). The camera framework, the video encoder and the
//! media library sit behind traits so a host platform can plug in its own.
//!
//! # Features
//! - Manual ISO / exposure time on standard sessions
//! - High-speed request bursts for 240 fps recording
//! - Pending media entries that only become visible once finalized
//! - Typed errors and an explicit recorder state machine
//! - MP4 / H.264 output with the `recording` feature
//!
//! # Usage
//! Add this to your `Cargo.toml`:
//! ```toml
//! [dependencies]
//! procamera = { version = "0.1", features = ["recording"] }
//! tauri = { version = "2.0", features = ["protocol-asset"] }
//! ```
//!
//! Then in your Tauri app:
//! ```rust,ignore
//! fn main() {
//!     tauri::Builder::default()
//!         .plugin(procamera::init())
//!         .run(tauri::generate_context!())
//!         .expect("error while running tauri application");
//! }
//! ```
pub mod commands;
pub mod config;
pub mod controls;
pub mod errors;
#[cfg(feature = "headless")]
pub mod headless;
pub mod permissions;
pub mod platform;
pub mod recording;
pub mod request;
pub mod session;
pub mod storage;
pub mod timing;
pub mod types;

// Testing utilities - synthetic frames for offline testing
pub mod testing;

// Re-exports for convenience
pub use config::ProCameraConfig;
pub use controls::ControlPanel;
pub use errors::CameraError;
pub use session::{
    ControllerSettings, FailureStage, RecorderState, RecorderStatus, RecordingController,
    RecordingInfo, SavedRecording, ToggleOutcome,
};
pub use types::{CameraFrame, CaptureConfig, Resolution, SessionKind};

#[cfg(feature = "headless")]
pub use headless::{list_cameras, record, HeadlessOptions, HeadlessReport};

use tauri::{
    plugin::{Builder, TauriPlugin},
    Runtime,
};

/// Initialize the ProCamera plugin with all commands
pub fn init<R: Runtime>() -> TauriPlugin<R> {
    Builder::new("procamera")
        .invoke_handler(tauri::generate_handler![
            // Permission commands
            commands::permissions::request_camera_permission,
            commands::permissions::check_camera_permission_status,
            // Control panel commands
            commands::controls::select_fps,
            commands::controls::select_resolution,
            commands::controls::set_iso,
            commands::controls::set_shutter,
            commands::controls::get_control_panel,
            // Recording commands
            commands::recording::open_camera,
            commands::recording::close_camera,
            commands::recording::start_recording,
            commands::recording::stop_recording,
            commands::recording::toggle_recording,
            commands::recording::get_recording_status,
            // Configuration commands
            commands::config::get_config,
            commands::config::update_config,
            commands::config::reset_config,
        ])
        .build()
}

/// Initialize logging for the recorder
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "procamera=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
        mp4_output: cfg!(feature = "recording"),
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    /// Whether recordings are encoded to MP4 or only counted
    pub mp4_output: bool,
}
