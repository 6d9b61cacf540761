//! Encoder configuration types

use crate::types::{CaptureConfig, Resolution};
use serde::{Deserialize, Serialize};

/// Default video bit rate: 20 Mbps
pub const DEFAULT_BITRATE: u32 = 20_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerFormat {
    Mpeg4,
}

impl ContainerFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ContainerFormat::Mpeg4 => "video/mp4",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoCodec {
    H264,
}

/// What the encoder is asked to produce
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderSettings {
    pub container: ContainerFormat,
    pub codec: VideoCodec,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Target bitrate in bits per second
    pub bitrate: u32,
    /// Frames the input surface buffers before dropping
    pub surface_capacity: usize,
    pub title: Option<String>,
}

impl EncoderSettings {
    /// MPEG-4 / H.264 settings matching a capture configuration
    pub fn for_capture(config: &CaptureConfig, bitrate: u32) -> Self {
        Self {
            container: ContainerFormat::Mpeg4,
            codec: VideoCodec::H264,
            width: config.width,
            height: config.height,
            fps: config.target_fps,
            bitrate,
            surface_capacity: 16,
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_surface_capacity(mut self, capacity: usize) -> Self {
        self.surface_capacity = capacity;
        self
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }
}

/// Statistics returned after the encoder finalizes its output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EncoderStats {
    /// Frames written into the container
    pub frames_encoded: u64,
    /// Frames received but not written, plus frames the surface had to drop
    pub frames_dropped: u64,
    pub bytes_written: u64,
    /// Media duration in seconds
    pub duration_secs: f64,
}

impl EncoderStats {
    /// Average bitrate achieved
    pub fn avg_bitrate(&self) -> f64 {
        if self.duration_secs > 0.0 {
            (self.bytes_written as f64 * 8.0) / self.duration_secs
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_for_capture() {
        let config = CaptureConfig::new(Resolution::full_hd(), 240, 100, 1_000_000);
        let settings = EncoderSettings::for_capture(&config, DEFAULT_BITRATE);
        assert_eq!(settings.container, ContainerFormat::Mpeg4);
        assert_eq!(settings.codec, VideoCodec::H264);
        assert_eq!(settings.resolution(), Resolution::full_hd());
        assert_eq!(settings.fps, 240);
        assert_eq!(settings.bitrate, 20_000_000);
        assert_eq!(settings.container.mime_type(), "video/mp4");
    }

    #[test]
    fn test_avg_bitrate() {
        let stats = EncoderStats {
            frames_encoded: 240,
            frames_dropped: 0,
            bytes_written: 2_500_000,
            duration_secs: 1.0,
        };
        assert_eq!(stats.avg_bitrate(), 20_000_000.0);
        assert_eq!(EncoderStats::default().avg_bitrate(), 0.0);
    }
}
