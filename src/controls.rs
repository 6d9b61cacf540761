//! Manual camera controls and parameter collection
//!
//! Models the control surface of the recording screen: two mutually exclusive
//! option groups (frame rate, resolution) and two sliders (ISO, shutter).
//! Slider moves take effect immediately; option groups are read when a
//! recording starts. Labels that cannot be parsed never overwrite the value
//! that was last accepted.

use crate::errors::CameraError;
use crate::types::{CaptureConfig, Resolution};
use serde::{Deserialize, Serialize};

pub const MIN_ISO: u32 = 100;
const NANOS_PER_MILLI: u64 = 1_000_000;

/// Mutually exclusive set of labelled options (a radio group)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionGroup {
    pub options: Vec<String>,
    pub checked: Option<usize>,
}

impl OptionGroup {
    pub fn new<I, S>(options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            options: options.into_iter().map(Into::into).collect(),
            checked: None,
        }
    }

    pub fn with_checked(mut self, index: usize) -> Self {
        if index < self.options.len() {
            self.checked = Some(index);
        }
        self
    }

    /// Check the option at `index`. Returns false when out of range.
    pub fn check(&mut self, index: usize) -> bool {
        if index >= self.options.len() {
            return false;
        }
        self.checked = Some(index);
        true
    }

    /// Check the first option whose label matches exactly
    pub fn check_label(&mut self, label: &str) -> bool {
        match self.options.iter().position(|o| o == label) {
            Some(index) => self.check(index),
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.checked = None;
    }

    pub fn checked_label(&self) -> Option<&str> {
        self.checked
            .and_then(|i| self.options.get(i))
            .map(String::as_str)
    }
}

/// Continuous control with a bounded value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Slider {
    pub min: f32,
    pub max: f32,
    pub value: f32,
}

impl Slider {
    /// A slider over `[min, max]`; the range must be finite and not inverted
    pub fn new(min: f32, max: f32, value: f32) -> Result<Self, CameraError> {
        if !min.is_finite() || !max.is_finite() || min > max {
            return Err(CameraError::InvalidConfiguration(format!(
                "invalid slider range [{}, {}]",
                min, max
            )));
        }
        let mut slider = Self { min, max, value: min };
        slider.set(value);
        Ok(slider)
    }

    const fn fixed(min: f32, max: f32, value: f32) -> Self {
        Self { min, max, value }
    }

    /// Move the slider, limiting it to its range. Returns the stored position.
    ///
    /// NaN moves the thumb to `min`. A range corrupted through the public
    /// fields never panics; the position is bounded by whichever end is usable.
    pub fn set(&mut self, value: f32) -> f32 {
        self.value = if value.is_nan() {
            self.min
        } else {
            value.max(self.min).min(self.max)
        };
        self.value
    }
}

/// Extract the frame rate from an option label such as `"240 FPS"`.
///
/// Every non-digit character is discarded before parsing, so `"120fps"` and
/// `"FPS: 120"` both yield 120. Labels without digits, with a value that does
/// not fit in a `u32`, or with a value of zero yield `None`.
pub fn parse_fps_label(label: &str) -> Option<u32> {
    let digits: String = label.chars().filter(|c| c.is_ascii_digit()).collect();
    match digits.parse::<u32>() {
        Ok(0) | Err(_) => None,
        Ok(fps) => Some(fps),
    }
}

/// Parse a resolution option label.
///
/// `"WxH"` labels (spaces allowed, case-insensitive) must split into exactly
/// two integers. Labels without an `x` are matched by name: `720`, `1080`
/// and `480` map to their 16:9 / 4:3 sizes, checked in that order.
pub fn parse_resolution_label(label: &str) -> Option<Resolution> {
    let text = label.trim().to_lowercase();

    if text.contains('x') {
        let compact = text.replace(' ', "");
        let parts: Vec<&str> = compact.split('x').collect();
        if parts.len() != 2 {
            return None;
        }
        let width = parts[0].parse::<u32>().ok()?;
        let height = parts[1].parse::<u32>().ok()?;
        if width == 0 || height == 0 {
            return None;
        }
        return Some(Resolution::new(width, height));
    }

    if text.contains("720") {
        Some(Resolution::hd())
    } else if text.contains("1080") {
        Some(Resolution::full_hd())
    } else if text.contains("480") {
        Some(Resolution::vga())
    } else {
        None
    }
}

/// ISO for a slider position, never below [`MIN_ISO`]
pub fn iso_from_slider(position: f32) -> u32 {
    let position = if position.is_nan() { 0.0 } else { position.max(0.0) };
    (position as u32).max(MIN_ISO)
}

/// Shutter duration in nanoseconds for a slider position: `(p + 1)` ms
pub fn shutter_from_slider(position: f32) -> u64 {
    let position = if position.is_nan() { 0.0 } else { position.max(0.0) };
    NANOS_PER_MILLI * (position as u64 + 1)
}

/// Live state of the recording screen's controls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlPanel {
    pub fps_group: OptionGroup,
    pub resolution_group: OptionGroup,
    pub iso_slider: Slider,
    pub shutter_slider: Slider,
    current: CaptureConfig,
}

impl ControlPanel {
    pub fn new(fps_group: OptionGroup, resolution_group: OptionGroup) -> Self {
        Self {
            fps_group,
            resolution_group,
            iso_slider: Slider::fixed(0.0, 3200.0, MIN_ISO as f32),
            shutter_slider: Slider::fixed(0.0, 99.0, 7.0),
            current: CaptureConfig::default(),
        }
    }

    /// Start from explicit values instead of the built-in defaults
    pub fn with_initial(mut self, initial: CaptureConfig) -> Self {
        self.current = initial;
        self
    }

    pub fn with_sliders(mut self, iso_slider: Slider, shutter_slider: Slider) -> Self {
        self.iso_slider = iso_slider;
        self.shutter_slider = shutter_slider;
        self
    }

    pub fn select_fps(&mut self, index: usize) -> bool {
        self.fps_group.check(index)
    }

    pub fn select_resolution(&mut self, index: usize) -> bool {
        self.resolution_group.check(index)
    }

    /// Move the ISO slider; the new value applies immediately
    pub fn set_iso(&mut self, position: f32) -> u32 {
        let position = self.iso_slider.set(position);
        self.current.iso = iso_from_slider(position);
        self.current.iso
    }

    /// Move the shutter slider; the new value applies immediately
    pub fn set_shutter(&mut self, position: f32) -> u64 {
        let position = self.shutter_slider.set(position);
        self.current.shutter_duration_ns = shutter_from_slider(position);
        self.current.shutter_duration_ns
    }

    pub fn iso_label(&self) -> String {
        format!("ISO: {}", self.current.iso)
    }

    pub fn shutter_label(&self) -> String {
        format!(
            "Exposure: {} ms",
            self.current.shutter_duration_ns / NANOS_PER_MILLI
        )
    }

    /// Values accepted so far, without reading the option groups
    pub fn current(&self) -> CaptureConfig {
        self.current
    }

    /// Read the checked options into the current values and return a snapshot.
    pub fn collect(&mut self) -> CaptureConfig {
        if let Some(label) = self.fps_group.checked_label() {
            match parse_fps_label(label) {
                Some(fps) => self.current.target_fps = fps,
                None => log::debug!("Ignoring unparsable frame rate option {:?}", label),
            }
        }

        if let Some(label) = self.resolution_group.checked_label() {
            match parse_resolution_label(label) {
                Some(resolution) => {
                    self.current.width = resolution.width;
                    self.current.height = resolution.height;
                }
                None => log::debug!("Ignoring unparsable resolution option {:?}", label),
            }
        }

        self.current
    }
}

impl Default for ControlPanel {
    fn default() -> Self {
        Self::new(
            OptionGroup::new(["30 FPS", "60 FPS", "120 FPS", "240 FPS"]).with_checked(2),
            OptionGroup::new(["480p", "720p", "1080p"]).with_checked(1),
        )
    }
}
