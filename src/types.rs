//! Core value types shared across the crate

use serde::{Deserialize, Serialize};
use std::fmt;

/// Frame rate at which recordings switch to a constrained high-speed session
pub const HIGH_SPEED_THRESHOLD_FPS: u32 = 240;

/// Frame size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// 640x480
    pub const fn vga() -> Self {
        Self::new(640, 480)
    }

    /// 1280x720
    pub const fn hd() -> Self {
        Self::new(1280, 720)
    }

    /// 1920x1080
    pub const fn full_hd() -> Self {
        Self::new(1920, 1080)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Capture parameters for one recording.
///
/// Built from the control panel right before a recording starts and never
/// mutated afterwards; the next start builds a fresh value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConfig {
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
    pub iso: u32,
    pub shutter_duration_ns: u64,
}

impl CaptureConfig {
    pub fn new(resolution: Resolution, target_fps: u32, iso: u32, shutter_duration_ns: u64) -> Self {
        Self {
            width: resolution.width,
            height: resolution.height,
            target_fps,
            iso,
            shutter_duration_ns,
        }
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// Session kind this configuration needs for the given threshold
    pub fn session_kind(&self, high_speed_threshold: u32) -> SessionKind {
        SessionKind::for_fps(self.target_fps, high_speed_threshold)
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self::new(Resolution::hd(), 120, 100, 8_000_000)
    }
}

/// Which kind of capture session a recording runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionKind {
    /// Regular session with manual exposure
    Standard,
    /// Constrained high-speed session driven by repeating bursts
    HighSpeed,
}

impl SessionKind {
    pub fn for_fps(target_fps: u32, high_speed_threshold: u32) -> Self {
        if target_fps >= high_speed_threshold {
            SessionKind::HighSpeed
        } else {
            SessionKind::Standard
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKind::Standard => "standard",
            SessionKind::HighSpeed => "high_speed",
        }
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A frame delivered by the camera into an encoder surface
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub sequence: u64,
    pub timestamp_us: u64,
    pub width: u32,
    pub height: u32,
    /// RGB24 pixels; empty when the producer only reports timing
    pub data: Vec<u8>,
    pub device_id: String,
}

impl CameraFrame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, device_id: String) -> Self {
        Self {
            sequence: 0,
            timestamp_us: 0,
            width,
            height,
            data,
            device_id,
        }
    }

    pub fn with_timing(mut self, sequence: u64, timestamp_us: u64) -> Self {
        self.sequence = sequence;
        self.timestamp_us = timestamp_us;
        self
    }

    pub fn has_pixels(&self) -> bool {
        !self.data.is_empty()
    }
}
