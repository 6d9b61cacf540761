//! Synthetic frames for running the pipeline without a sensor

use crate::types::CameraFrame;

/// RGB24 frame with a moving gradient so consecutive frames differ
pub fn synthetic_video_frame(frame_number: u64, width: u32, height: u32) -> CameraFrame {
    let mut data = vec![0u8; (width * height * 3) as usize];

    let base = (frame_number % 256) as u8;
    for y in 0..height {
        for x in 0..width {
            let idx = ((y * width + x) * 3) as usize;
            data[idx] = base.wrapping_add((x % 256) as u8);
            data[idx + 1] = base.wrapping_add((y % 256) as u8);
            data[idx + 2] = base.wrapping_add(((x + y) % 256) as u8);
        }
    }

    CameraFrame::new(data, width, height, "synthetic".to_string())
}

/// Frame carrying only size and timing, for pipelines that never look at pixels
pub fn timing_only_frame(width: u32, height: u32, device_id: &str) -> CameraFrame {
    CameraFrame::new(Vec::new(), width, height, device_id.to_string())
}
