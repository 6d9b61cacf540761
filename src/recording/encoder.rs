//! H.264 encoder wrapper using openh264

use crate::errors::CameraError;
use openh264::encoder::{BitRate, Encoder, EncoderConfig, FrameRate, FrameType, RateControlMode};
use openh264::formats::YUVBuffer;
use openh264::OpenH264API;

/// H.264 encoder using openh264
pub struct H264Encoder {
    encoder: Encoder,
    width: u32,
    height: u32,
    frame_count: u64,
    /// Substitute picture for frames that carry no pixels
    blank: Option<Vec<u8>>,
}

impl H264Encoder {
    /// Create an encoder for `width`x`height` RGB24 input, rate controlled
    /// to `bitrate` bits per second at `fps` frames per second.
    ///
    /// openh264 picks the picture size from the first YUV source, so only the
    /// dimensions are kept for validation.
    pub fn new(width: u32, height: u32, bitrate: u32, fps: u32) -> Result<Self, CameraError> {
        if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
            return Err(CameraError::EncoderError(format!(
                "H.264 needs even, non-zero dimensions, got {}x{}",
                width, height
            )));
        }
        if bitrate == 0 || fps == 0 {
            return Err(CameraError::EncoderError(format!(
                "H.264 needs a non-zero bitrate and frame rate, got {} bps @ {} fps",
                bitrate, fps
            )));
        }

        let config = EncoderConfig::new()
            .bitrate(BitRate::from_bps(bitrate))
            .max_frame_rate(FrameRate::from_hz(fps as f32))
            .rate_control_mode(RateControlMode::Bitrate);
        let encoder = Encoder::with_api_config(OpenH264API::from_source(), config)
            .map_err(|e| CameraError::EncoderError(format!("Failed to create encoder: {}", e)))?;

        Ok(Self {
            encoder,
            width,
            height,
            frame_count: 0,
            blank: None,
        })
    }

    /// Encode an RGB24 frame to Annex B NAL units.
    ///
    /// An empty buffer stands for a frame whose pixels stayed on the GPU side
    /// and is encoded as black.
    pub fn encode_rgb(&mut self, rgb_data: &[u8]) -> Result<EncodedFrame, CameraError> {
        let yuv = if rgb_data.is_empty() {
            let (w, h) = (self.width, self.height);
            self.blank
                .get_or_insert_with(|| black_yuv420(w, h))
                .clone()
        } else {
            let expected_size = (self.width * self.height * 3) as usize;
            if rgb_data.len() != expected_size {
                return Err(CameraError::EncoderError(format!(
                    "Invalid frame size: expected {} bytes, got {}",
                    expected_size,
                    rgb_data.len()
                )));
            }
            rgb_to_yuv420(rgb_data, self.width, self.height)
        };

        let yuv_buffer = YUVBuffer::from_vec(yuv, self.width as usize, self.height as usize);
        let bitstream = self
            .encoder
            .encode(&yuv_buffer)
            .map_err(|e| CameraError::EncoderError(format!("Encoding failed: {}", e)))?;

        self.frame_count += 1;
        let is_keyframe = matches!(bitstream.frame_type(), FrameType::IDR | FrameType::I);

        Ok(EncodedFrame {
            data: bitstream.to_vec(),
            is_keyframe,
        })
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

/// Result of encoding a single frame
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    /// Annex B data (with start codes)
    pub data: Vec<u8>,
    pub is_keyframe: bool,
}

fn black_yuv420(width: u32, height: u32) -> Vec<u8> {
    let y_size = (width * height) as usize;
    let uv_size = y_size / 4;
    let mut yuv = vec![16u8; y_size + uv_size * 2];
    yuv[y_size..].fill(128);
    yuv
}

/// RGB24 to planar YUV420, BT.601
fn rgb_to_yuv420(rgb: &[u8], width: u32, height: u32) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;

    let y_size = w * h;
    let uv_size = (w / 2) * (h / 2);
    let mut yuv = vec![0u8; y_size + uv_size * 2];

    let (y_plane, uv_planes) = yuv.split_at_mut(y_size);
    let (u_plane, v_plane) = uv_planes.split_at_mut(uv_size);

    for y in 0..h {
        for x in 0..w {
            let idx = (y * w + x) * 3;
            let r = rgb[idx] as i32;
            let g = rgb[idx + 1] as i32;
            let b = rgb[idx + 2] as i32;

            let luma = ((66 * r + 129 * g + 25 * b + 128) >> 8) + 16;
            y_plane[y * w + x] = luma.clamp(0, 255) as u8;

            // 2x2 chroma subsampling
            if y % 2 == 0 && x % 2 == 0 {
                let uv_idx = (y / 2) * (w / 2) + (x / 2);
                let u = ((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128;
                let v = ((112 * r - 94 * g - 18 * b + 128) >> 8) + 128;
                u_plane[uv_idx] = u.clamp(0, 255) as u8;
                v_plane[uv_idx] = v.clamp(0, 255) as u8;
            }
        }
    }

    yuv
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::DEFAULT_BITRATE;

    #[test]
    fn test_yuv_plane_sizes() {
        let rgb = vec![128u8; 640 * 480 * 3];
        assert_eq!(rgb_to_yuv420(&rgb, 640, 480).len(), 640 * 480 * 3 / 2);
        assert_eq!(black_yuv420(640, 480).len(), 640 * 480 * 3 / 2);
    }

    #[test]
    fn test_rejects_odd_dimensions() {
        assert!(matches!(
            H264Encoder::new(641, 480, DEFAULT_BITRATE, 30),
            Err(CameraError::EncoderError(_))
        ));
    }

    #[test]
    fn test_rejects_zero_rate() {
        assert!(H264Encoder::new(320, 240, 0, 30).is_err());
        assert!(H264Encoder::new(320, 240, DEFAULT_BITRATE, 0).is_err());
    }

    #[test]
    fn test_first_frame_is_keyframe() {
        let mut encoder = H264Encoder::new(320, 240, DEFAULT_BITRATE, 30).expect("encoder");
        let encoded = encoder.encode_rgb(&vec![128u8; 320 * 240 * 3]).expect("encode");
        assert!(
            encoded.data.starts_with(&[0x00, 0x00, 0x00, 0x01])
                || encoded.data.starts_with(&[0x00, 0x00, 0x01])
        );
        assert!(encoded.is_keyframe);
    }

    #[test]
    fn test_empty_frame_encodes_black() {
        let mut encoder = H264Encoder::new(320, 240, DEFAULT_BITRATE, 30).expect("encoder");
        let encoded = encoder.encode_rgb(&[]).expect("encode");
        assert!(!encoded.data.is_empty());
        assert!(matches!(
            encoder.encode_rgb(&[0u8; 12]),
            Err(CameraError::EncoderError(_))
        ));
    }
}
