//! MP4 encoder combining openh264 and the muxide muxer

use std::fs::File;
use std::io::BufWriter;

use muxide::api::{Metadata, Muxer, MuxerBuilder, VideoCodec as MuxCodec};

use super::encoder::H264Encoder;
use super::worker::{FrameSink, SurfaceWorker};
use super::{EncoderSettings, EncoderStats, VideoCodec, VideoEncoder};
use crate::errors::CameraError;
use crate::platform::{Surface, SurfaceReader};
use crate::storage::{MediaStore, OutputRef};
use crate::types::CameraFrame;

/// Encodes surface frames to H.264 and muxes them into the output's file
struct Mp4Writer {
    encoder: H264Encoder,
    muxer: Muxer<BufWriter<File>>,
    width: u32,
    height: u32,
    frame_duration_secs: f64,
    frame_count: u64,
    dropped_frames: u64,
}

impl Mp4Writer {
    fn new(settings: &EncoderSettings, file: File) -> Result<Self, CameraError> {
        let encoder = H264Encoder::new(settings.width, settings.height, settings.bitrate, settings.fps)?;
        let codec = match settings.codec {
            VideoCodec::H264 => MuxCodec::H264,
        };

        let mut metadata = Metadata::new().with_current_time();
        if let Some(ref title) = settings.title {
            metadata = metadata.with_title(title);
        }
        let muxer = MuxerBuilder::new(BufWriter::new(file))
            .video(codec, settings.width, settings.height, settings.fps as f64)
            .with_fast_start(true)
            .with_metadata(metadata)
            .build()
            .map_err(|e| CameraError::EncoderError(format!("Failed to create muxer: {}", e)))?;

        Ok(Self {
            encoder,
            muxer,
            width: settings.width,
            height: settings.height,
            frame_duration_secs: 1.0 / settings.fps.max(1) as f64,
            frame_count: 0,
            dropped_frames: 0,
        })
    }

    fn finish(self) -> Result<EncoderStats, CameraError> {
        let stats = self
            .muxer
            .finish_with_stats()
            .map_err(|e| CameraError::EncoderError(format!("Failed to finalize recording: {}", e)))?;

        Ok(EncoderStats {
            frames_encoded: stats.video_frames,
            frames_dropped: self.dropped_frames,
            bytes_written: stats.bytes_written,
            duration_secs: stats.duration_secs,
        })
    }
}

impl FrameSink for Mp4Writer {
    fn write(&mut self, frame: CameraFrame) -> Result<(), CameraError> {
        if frame.width != self.width || frame.height != self.height {
            return Err(CameraError::EncoderError(format!(
                "Frame dimensions {}x{} don't match encoder {}x{}",
                frame.width, frame.height, self.width, self.height
            )));
        }

        let encoded = self.encoder.encode_rgb(&frame.data)?;
        // openh264 may hold a frame back while rate control settles
        if encoded.data.is_empty() {
            self.dropped_frames += 1;
            return Ok(());
        }

        let pts = self.frame_count as f64 * self.frame_duration_secs;
        self.muxer
            .write_video(pts, &encoded.data, encoded.is_keyframe)
            .map_err(|e| CameraError::EncoderError(format!("Failed to write frame: {}", e)))?;
        self.frame_count += 1;
        Ok(())
    }
}

enum Stage {
    Idle,
    Prepared {
        writer: Mp4Writer,
        reader: SurfaceReader,
    },
    Running(SurfaceWorker<Mp4Writer>),
}

/// MPEG-4 / H.264 encoder writing into a media store entry
pub struct Mp4Encoder {
    stage: Stage,
}

impl Mp4Encoder {
    pub fn new() -> Self {
        Self { stage: Stage::Idle }
    }
}

impl Default for Mp4Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoEncoder for Mp4Encoder {
    fn prepare(
        &mut self,
        settings: &EncoderSettings,
        store: &dyn MediaStore,
        output: &OutputRef,
    ) -> Result<Surface, CameraError> {
        if !matches!(self.stage, Stage::Idle) {
            return Err(CameraError::EncoderError("encoder already prepared".to_string()));
        }
        let file = store.open_file(output)?;
        let writer = Mp4Writer::new(settings, file)?;
        let (surface, reader) = Surface::new(settings.resolution(), settings.surface_capacity);
        log::info!(
            "MP4 encoder prepared: {} {}@{} {} bps -> {}",
            settings.container.mime_type(),
            settings.resolution(),
            settings.fps,
            settings.bitrate,
            output.uri
        );
        self.stage = Stage::Prepared { writer, reader };
        Ok(surface)
    }

    fn start(&mut self) -> Result<(), CameraError> {
        match std::mem::replace(&mut self.stage, Stage::Idle) {
            Stage::Prepared { writer, reader } => {
                self.stage = Stage::Running(SurfaceWorker::spawn(reader, writer)?);
                Ok(())
            }
            other => {
                self.stage = other;
                Err(CameraError::EncoderError("encoder is not prepared".to_string()))
            }
        }
    }

    fn stop(&mut self) -> Result<EncoderStats, CameraError> {
        let worker = match std::mem::replace(&mut self.stage, Stage::Idle) {
            Stage::Running(worker) => worker,
            other => {
                self.stage = other;
                return Err(CameraError::EncoderError("encoder is not running".to_string()));
            }
        };

        let (reader, result) = worker.finish();
        let mut stats = result?.finish()?;
        stats.frames_dropped += reader.as_ref().map(SurfaceReader::dropped).unwrap_or(0);
        log::info!(
            "MP4 finalized: {} frames, {} bytes, {:.2}s",
            stats.frames_encoded,
            stats.bytes_written,
            stats.duration_secs
        );
        Ok(stats)
    }

    fn reset(&mut self) {
        if let Stage::Running(worker) = std::mem::replace(&mut self.stage, Stage::Idle) {
            let _ = worker.finish();
        }
    }
}
