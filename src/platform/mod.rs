//! Camera framework abstraction
//!
//! The controller never talks to a camera stack directly. A platform provides
//! a [`CameraBackend`] that enumerates and opens devices; devices negotiate
//! capture sessions; sessions accept repeating requests. Everything the
//! platform reports asynchronously (device opened, session configured,
//! disconnects) arrives as a [`CameraEvent`] on the channel handed to
//! [`CameraBackend::open_device`].

pub mod simulated;
pub mod surface;

pub use simulated::{FaultPlan, FramePayload, SimulatedCamera, SimulatedLog};
pub use surface::{Surface, SurfaceId, SurfaceReader};

use crate::errors::CameraError;
use crate::request::{self, CaptureRequest};
use crate::types::{CaptureConfig, Resolution, SessionKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

pub type EventSender = mpsc::UnboundedSender<CameraEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<CameraEvent>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Asynchronous notifications from the camera framework
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraEvent {
    DeviceOpened { device_id: String },
    DeviceDisconnected { device_id: String },
    DeviceError { device_id: String, code: i32 },
    SessionConfigured { session: SessionId },
    SessionConfigureFailed { session: SessionId, reason: String },
    SessionClosed { session: SessionId },
}

/// High-speed mode supported by a sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighSpeedMode {
    pub resolution: Resolution,
    pub max_fps: u32,
}

/// Static capabilities of one camera
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraCharacteristics {
    pub iso_range: (u32, u32),
    pub exposure_range_ns: (u64, u64),
    pub max_standard_fps: u32,
    pub standard_resolutions: Vec<Resolution>,
    pub high_speed_modes: Vec<HighSpeedMode>,
}

impl CameraCharacteristics {
    /// Check that the camera can run `config` on a session of `kind`
    pub fn validate(&self, config: &CaptureConfig, kind: SessionKind) -> Result<(), CameraError> {
        let resolution = config.resolution();
        match kind {
            SessionKind::Standard => {
                if !self.standard_resolutions.contains(&resolution) {
                    return Err(CameraError::InvalidConfiguration(format!(
                        "resolution {} not supported",
                        resolution
                    )));
                }
                if config.target_fps == 0 || config.target_fps > self.max_standard_fps {
                    return Err(CameraError::InvalidConfiguration(format!(
                        "{} fps outside standard range 1-{}",
                        config.target_fps, self.max_standard_fps
                    )));
                }
                let (iso_min, iso_max) = self.iso_range;
                if config.iso < iso_min || config.iso > iso_max {
                    return Err(CameraError::InvalidConfiguration(format!(
                        "ISO {} outside {}-{}",
                        config.iso, iso_min, iso_max
                    )));
                }
                let (exp_min, exp_max) = self.exposure_range_ns;
                if config.shutter_duration_ns < exp_min || config.shutter_duration_ns > exp_max {
                    return Err(CameraError::InvalidConfiguration(format!(
                        "exposure {} ns outside {}-{} ns",
                        config.shutter_duration_ns, exp_min, exp_max
                    )));
                }
                Ok(())
            }
            SessionKind::HighSpeed => {
                let supported = self
                    .high_speed_modes
                    .iter()
                    .any(|m| m.resolution == resolution && config.target_fps <= m.max_fps);
                if supported {
                    Ok(())
                } else {
                    Err(CameraError::InvalidConfiguration(format!(
                        "high-speed {}@{} not supported",
                        resolution, config.target_fps
                    )))
                }
            }
        }
    }
}

/// Entry point into a camera framework
pub trait CameraBackend: Send + Sync {
    fn name(&self) -> &str;

    fn camera_ids(&self) -> Result<Vec<String>, CameraError>;

    fn characteristics(&self, camera_id: &str) -> Result<CameraCharacteristics, CameraError>;

    /// Open a device. Completion is reported with [`CameraEvent::DeviceOpened`].
    fn open_device(
        &self,
        camera_id: &str,
        events: EventSender,
    ) -> Result<Box<dyn CameraDevice>, CameraError>;
}

/// An opened camera
pub trait CameraDevice: Send {
    fn id(&self) -> &str;

    /// Request a session targeting `outputs`. The returned handle is usable once
    /// [`CameraEvent::SessionConfigured`] arrives for its id.
    fn create_session(
        &mut self,
        kind: SessionKind,
        outputs: &[Surface],
    ) -> Result<Box<dyn CaptureSession>, CameraError>;

    fn close(&mut self);
}

/// A negotiated capture session
pub trait CaptureSession: Send {
    fn id(&self) -> SessionId;

    fn kind(&self) -> SessionKind;

    fn set_repeating_request(&mut self, request: &CaptureRequest) -> Result<(), CameraError>;

    fn set_repeating_burst(&mut self, requests: &[CaptureRequest]) -> Result<(), CameraError>;

    /// Expand a request into the burst a constrained high-speed session needs
    fn high_speed_request_list(
        &self,
        request: &CaptureRequest,
    ) -> Result<Vec<CaptureRequest>, CameraError> {
        if self.kind() != SessionKind::HighSpeed {
            return Err(CameraError::SessionConfigurationFailed(format!(
                "{} is not a high-speed session",
                self.id()
            )));
        }
        Ok(request::high_speed_request_list(request))
    }

    fn stop_repeating(&mut self) -> Result<(), CameraError>;

    fn close(&mut self) -> Result<(), CameraError>;
}
