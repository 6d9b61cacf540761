//! Configuration management for ProCamera
//!
//! Provides loading, saving and validation of camera, recording, storage and
//! control-panel settings. Files are TOML; `PROCAMERA__SECTION__KEY`
//! environment variables override file values when loaded with
//! [`ProCameraConfig::load`].

use crate::controls::{ControlPanel, OptionGroup, Slider};
use crate::errors::CameraError;
use crate::session::ControllerSettings;
use crate::types::{CaptureConfig, Resolution};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProCameraConfig {
    pub camera: CameraConfig,
    pub recording: RecordingConfig,
    pub storage: StorageConfig,
    pub controls: ControlsConfig,
}

/// Camera selection and session negotiation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Camera to open; the first one reported by the platform when unset
    pub camera_id: Option<String>,
    /// How long to wait for the device to open, in milliseconds
    pub open_timeout_ms: u64,
    /// How long to wait for a session to configure, in milliseconds
    pub configure_timeout_ms: u64,
    /// Frame rates at or above this use a constrained high-speed session
    pub high_speed_threshold: u32,
}

/// Encoder configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Video bit rate in bits per second
    pub bitrate: u32,
    /// Frames buffered between camera and encoder
    pub surface_capacity: usize,
}

/// Where recordings go
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root of the media library
    pub output_directory: String,
    /// Collection path inside the library
    pub relative_path: String,
    /// File names are `<prefix>_<millis>.mp4`
    pub file_prefix: String,
}

/// Control panel options and starting values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    pub fps_options: Vec<String>,
    pub resolution_options: Vec<String>,
    pub default_fps_index: usize,
    pub default_resolution_index: usize,
    pub default_resolution: [u32; 2],
    pub default_fps: u32,
    pub default_iso: u32,
    pub default_shutter_ns: u64,
    /// Maximum ISO slider position
    pub iso_slider_max: f32,
    /// Maximum shutter slider position
    pub shutter_slider_max: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            camera_id: None,
            open_timeout_ms: 5000,
            configure_timeout_ms: 5000,
            high_speed_threshold: crate::types::HIGH_SPEED_THRESHOLD_FPS,
        }
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            bitrate: crate::recording::DEFAULT_BITRATE,
            surface_capacity: 16,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_directory: "./recordings".to_string(),
            relative_path: "DCIM/ProCamera240fps".to_string(),
            file_prefix: "ManualCinema".to_string(),
        }
    }
}

impl Default for ControlsConfig {
    fn default() -> Self {
        let initial = CaptureConfig::default();
        Self {
            fps_options: ["30 FPS", "60 FPS", "120 FPS", "240 FPS"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            resolution_options: ["480p", "720p", "1080p"].iter().map(|s| s.to_string()).collect(),
            default_fps_index: 2,
            default_resolution_index: 1,
            default_resolution: [initial.width, initial.height],
            default_fps: initial.target_fps,
            default_iso: initial.iso,
            default_shutter_ns: initial.shutter_duration_ns,
            iso_slider_max: 3200.0,
            shutter_slider_max: 99.0,
        }
    }
}

impl ProCameraConfig {
    /// Layered load: defaults, then `path` if it exists, then environment
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CameraError> {
        let path = path.as_ref();
        let loaded: ProCameraConfig = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Toml).required(false))
            .add_source(
                config::Environment::with_prefix("PROCAMERA")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| CameraError::ConfigError(format!("Failed to load configuration: {}", e)))?;

        loaded.validate().map_err(CameraError::ConfigError)?;
        log::info!("Loaded configuration from {:?} and environment", path);
        Ok(loaded)
    }

    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CameraError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| CameraError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config: ProCameraConfig = toml::from_str(&contents)
            .map_err(|e| CameraError::ConfigError(format!("Failed to parse config file: {}", e)))?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CameraError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                CameraError::ConfigError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| CameraError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| CameraError::ConfigError(format!("Failed to write config file: {}", e)))?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        PathBuf::from("procamera.toml")
    }

    /// Load from the default location, falling back to defaults
    pub fn load_or_default() -> Self {
        Self::load(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.camera.open_timeout_ms == 0 || self.camera.configure_timeout_ms == 0 {
            return Err("Timeouts must be greater than zero".to_string());
        }
        if self.camera.high_speed_threshold == 0 {
            return Err("High-speed threshold must be greater than zero".to_string());
        }
        if matches!(self.camera.camera_id.as_deref(), Some("")) {
            return Err("Camera id must not be empty".to_string());
        }

        if self.recording.bitrate < 100_000 {
            return Err("Bitrate must be at least 100 kbps".to_string());
        }
        if self.recording.surface_capacity == 0 {
            return Err("Surface capacity must be at least 1".to_string());
        }

        if self.storage.output_directory.trim().is_empty() {
            return Err("Output directory must not be empty".to_string());
        }
        let relative = Path::new(&self.storage.relative_path);
        let escapes = relative.is_absolute()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err("Relative path must stay inside the output directory".to_string());
        }
        if self.storage.file_prefix.trim().is_empty() || self.storage.file_prefix.contains('/') {
            return Err("File prefix must be a non-empty name without '/'".to_string());
        }

        let controls = &self.controls;
        if controls.fps_options.is_empty() || controls.resolution_options.is_empty() {
            return Err("Control options must not be empty".to_string());
        }
        if controls.default_fps_index >= controls.fps_options.len() {
            return Err("Default FPS index out of range".to_string());
        }
        if controls.default_resolution_index >= controls.resolution_options.len() {
            return Err("Default resolution index out of range".to_string());
        }
        if controls.default_resolution[0] == 0 || controls.default_resolution[1] == 0 {
            return Err("Invalid default resolution".to_string());
        }
        if controls.default_fps == 0 {
            return Err("Invalid default FPS".to_string());
        }
        let usable = |max: f32| max.is_finite() && max > 0.0;
        if !usable(controls.iso_slider_max) || !usable(controls.shutter_slider_max) {
            return Err("Slider ranges must be finite and positive".to_string());
        }

        Ok(())
    }

    pub fn output_directory(&self) -> PathBuf {
        PathBuf::from(&self.storage.output_directory)
    }

    /// Controller tunables described by this configuration
    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            camera_id: self.camera.camera_id.clone(),
            open_timeout: Duration::from_millis(self.camera.open_timeout_ms),
            configure_timeout: Duration::from_millis(self.camera.configure_timeout_ms),
            high_speed_threshold: self.camera.high_speed_threshold,
            bitrate: self.recording.bitrate,
            surface_capacity: self.recording.surface_capacity,
            relative_path: self.storage.relative_path.clone(),
            file_prefix: self.storage.file_prefix.clone(),
        }
    }

    /// A control panel laid out and pre-set as configured
    pub fn control_panel(&self) -> Result<ControlPanel, CameraError> {
        let c = &self.controls;
        let initial = CaptureConfig::new(
            Resolution::new(c.default_resolution[0], c.default_resolution[1]),
            c.default_fps,
            c.default_iso,
            c.default_shutter_ns,
        );
        // Slider thumbs start where the default values sit.
        let iso_position = (initial.iso as f32).min(c.iso_slider_max);
        let shutter_position = (initial.shutter_duration_ns / 1_000_000) as f32 - 1.0;
        let iso_slider = Slider::new(0.0, c.iso_slider_max, iso_position)?;
        let shutter_slider = Slider::new(0.0, c.shutter_slider_max, shutter_position)?;

        Ok(ControlPanel::new(
            OptionGroup::new(c.fps_options.iter().cloned()).with_checked(c.default_fps_index),
            OptionGroup::new(c.resolution_options.iter().cloned()).with_checked(c.default_resolution_index),
        )
        .with_sliders(iso_slider, shutter_slider)
        .with_initial(initial))
    }
}
