//! Capture request construction
//!
//! A [`CaptureRequest`] is the platform-neutral description of what the sensor
//! should do for each frame. Which fields get set depends on the session kind:
//! high-speed sessions leave exposure to the camera, standard sessions run
//! fully manual.

use crate::platform::SurfaceId;
use crate::types::{CaptureConfig, SessionKind};
use serde::{Deserialize, Serialize};

/// Frames per request batch in constrained high-speed mode
pub const HIGH_SPEED_BATCH_BASE_FPS: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestTemplate {
    Preview,
    Record,
}

/// Overall 3A control mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlMode {
    Auto,
    Off,
}

/// Auto-exposure mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AeMode {
    On,
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FpsRange {
    pub min: u32,
    pub max: u32,
}

impl FpsRange {
    pub fn fixed(fps: u32) -> Self {
        Self { min: fps, max: fps }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRequest {
    pub template: RequestTemplate,
    pub targets: Vec<SurfaceId>,
    pub control_mode: ControlMode,
    pub ae_mode: Option<AeMode>,
    pub sensor_sensitivity: Option<u32>,
    pub sensor_exposure_time_ns: Option<u64>,
    pub ae_target_fps_range: Option<FpsRange>,
}

impl CaptureRequest {
    pub fn builder(template: RequestTemplate) -> CaptureRequestBuilder {
        CaptureRequestBuilder {
            request: CaptureRequest {
                template,
                targets: Vec::new(),
                control_mode: ControlMode::Auto,
                ae_mode: None,
                sensor_sensitivity: None,
                sensor_exposure_time_ns: None,
                ae_target_fps_range: None,
            },
        }
    }

    pub fn is_manual_exposure(&self) -> bool {
        self.control_mode == ControlMode::Off && self.ae_mode == Some(AeMode::Off)
    }
}

#[derive(Debug, Clone)]
pub struct CaptureRequestBuilder {
    request: CaptureRequest,
}

impl CaptureRequestBuilder {
    pub fn add_target(mut self, surface: SurfaceId) -> Self {
        if !self.request.targets.contains(&surface) {
            self.request.targets.push(surface);
        }
        self
    }

    pub fn control_mode(mut self, mode: ControlMode) -> Self {
        self.request.control_mode = mode;
        self
    }

    pub fn ae_mode(mut self, mode: AeMode) -> Self {
        self.request.ae_mode = Some(mode);
        self
    }

    pub fn sensor_sensitivity(mut self, iso: u32) -> Self {
        self.request.sensor_sensitivity = Some(iso);
        self
    }

    pub fn sensor_exposure_time(mut self, nanos: u64) -> Self {
        self.request.sensor_exposure_time_ns = Some(nanos);
        self
    }

    pub fn ae_target_fps_range(mut self, range: FpsRange) -> Self {
        self.request.ae_target_fps_range = Some(range);
        self
    }

    pub fn build(self) -> CaptureRequest {
        self.request
    }
}

/// Build the repeating request for a recording.
pub fn build_capture_request(
    config: &CaptureConfig,
    kind: SessionKind,
    surface: SurfaceId,
) -> CaptureRequest {
    let builder = CaptureRequest::builder(RequestTemplate::Record)
        .add_target(surface)
        .ae_target_fps_range(FpsRange::fixed(config.target_fps));

    match kind {
        SessionKind::HighSpeed => builder.control_mode(ControlMode::Auto).build(),
        SessionKind::Standard => builder
            .control_mode(ControlMode::Off)
            .ae_mode(AeMode::Off)
            .sensor_sensitivity(config.iso)
            .sensor_exposure_time(config.shutter_duration_ns)
            .build(),
    }
}

/// Expand one high-speed request into the per-frame burst the sensor consumes.
///
/// The burst holds `max_fps / 30` copies (at least one).
pub fn high_speed_request_list(request: &CaptureRequest) -> Vec<CaptureRequest> {
    let max_fps = request
        .ae_target_fps_range
        .map(|r| r.max)
        .unwrap_or(HIGH_SPEED_BATCH_BASE_FPS);
    let batch = (max_fps / HIGH_SPEED_BATCH_BASE_FPS).max(1) as usize;
    vec![request.clone(); batch]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Resolution;

    fn config(fps: u32) -> CaptureConfig {
        CaptureConfig::new(Resolution::full_hd(), fps, 800, 4_000_000)
    }

    #[test]
    fn test_standard_request_is_manual() {
        let req = build_capture_request(&config(120), SessionKind::Standard, SurfaceId(7));
        assert_eq!(req.template, RequestTemplate::Record);
        assert_eq!(req.targets, vec![SurfaceId(7)]);
        assert!(req.is_manual_exposure());
        assert_eq!(req.sensor_sensitivity, Some(800));
        assert_eq!(req.sensor_exposure_time_ns, Some(4_000_000));
        assert_eq!(req.ae_target_fps_range, Some(FpsRange::fixed(120)));
    }

    #[test]
    fn test_high_speed_request_is_auto() {
        let req = build_capture_request(&config(240), SessionKind::HighSpeed, SurfaceId(1));
        assert_eq!(req.control_mode, ControlMode::Auto);
        assert!(!req.is_manual_exposure());
        assert_eq!(req.sensor_sensitivity, None);
        assert_eq!(req.sensor_exposure_time_ns, None);
        assert_eq!(req.ae_target_fps_range, Some(FpsRange::fixed(240)));
    }

    #[test]
    fn test_high_speed_burst_size() {
        let req = build_capture_request(&config(240), SessionKind::HighSpeed, SurfaceId(1));
        assert_eq!(high_speed_request_list(&req).len(), 8);

        let req = build_capture_request(&config(960), SessionKind::HighSpeed, SurfaceId(1));
        assert_eq!(high_speed_request_list(&req).len(), 32);

        let slow = CaptureRequest::builder(RequestTemplate::Record).build();
        assert_eq!(high_speed_request_list(&slow).len(), 1);
    }

    #[test]
    fn test_builder_deduplicates_targets() {
        let req = CaptureRequest::builder(RequestTemplate::Preview)
            .add_target(SurfaceId(3))
            .add_target(SurfaceId(3))
            .build();
        assert_eq!(req.targets.len(), 1);
    }
}
