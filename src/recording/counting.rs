//! Encoder that only counts frames

use super::worker::{FrameSink, SurfaceWorker};
use super::{EncoderSettings, EncoderStats, VideoEncoder};
use crate::errors::CameraError;
use crate::platform::{Surface, SurfaceReader};
use crate::storage::{MediaStore, OutputRef};
use crate::types::CameraFrame;
use std::time::Instant;

/// Failures to inject into a [`CountingEncoder`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncoderFaults {
    pub fail_prepare: bool,
    pub fail_start: bool,
    pub fail_stop: bool,
}

struct Counter {
    frames: u64,
}

impl FrameSink for Counter {
    fn write(&mut self, _frame: CameraFrame) -> Result<(), CameraError> {
        self.frames += 1;
        Ok(())
    }
}

enum Stage {
    Idle,
    Prepared(SurfaceReader),
    Running {
        worker: SurfaceWorker<Counter>,
        started: Instant,
    },
}

/// Drains its surface and reports how many frames arrived.
///
/// Used when no real codec is compiled in, and to observe pipelines in tests.
pub struct CountingEncoder {
    faults: EncoderFaults,
    fps: u32,
    stage: Stage,
}

impl CountingEncoder {
    pub fn new() -> Self {
        Self::with_faults(EncoderFaults::default())
    }

    pub fn with_faults(faults: EncoderFaults) -> Self {
        Self {
            faults,
            fps: 0,
            stage: Stage::Idle,
        }
    }
}

impl Default for CountingEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoEncoder for CountingEncoder {
    fn prepare(
        &mut self,
        settings: &EncoderSettings,
        _store: &dyn MediaStore,
        output: &OutputRef,
    ) -> Result<Surface, CameraError> {
        if !matches!(self.stage, Stage::Idle) {
            return Err(CameraError::EncoderError("encoder already prepared".to_string()));
        }
        if self.faults.fail_prepare {
            return Err(CameraError::EncoderError(format!(
                "codec rejected {}@{}",
                settings.resolution(),
                settings.fps
            )));
        }
        let (surface, reader) = Surface::new(settings.resolution(), settings.surface_capacity);
        self.fps = settings.fps;
        self.stage = Stage::Prepared(reader);
        log::debug!("Counting encoder prepared for {}", output.uri);
        Ok(surface)
    }

    fn start(&mut self) -> Result<(), CameraError> {
        if self.faults.fail_start {
            return Err(CameraError::EncoderError("encoder failed to start".to_string()));
        }
        match std::mem::replace(&mut self.stage, Stage::Idle) {
            Stage::Prepared(reader) => {
                let worker = SurfaceWorker::spawn(reader, Counter { frames: 0 })?;
                self.stage = Stage::Running {
                    worker,
                    started: Instant::now(),
                };
                Ok(())
            }
            other => {
                self.stage = other;
                Err(CameraError::EncoderError("encoder is not prepared".to_string()))
            }
        }
    }

    fn stop(&mut self) -> Result<EncoderStats, CameraError> {
        let (worker, started) = match std::mem::replace(&mut self.stage, Stage::Idle) {
            Stage::Running { worker, started } => (worker, started),
            other => {
                self.stage = other;
                return Err(CameraError::EncoderError("encoder is not running".to_string()));
            }
        };

        let (reader, result) = worker.finish();
        let counter = result?;
        if self.faults.fail_stop {
            return Err(CameraError::EncoderError(
                "stop failed: container could not be finalized".to_string(),
            ));
        }

        let surface_dropped = reader.as_ref().map(SurfaceReader::dropped).unwrap_or(0);
        let duration_secs = if self.fps > 0 {
            counter.frames as f64 / self.fps as f64
        } else {
            started.elapsed().as_secs_f64()
        };
        Ok(EncoderStats {
            frames_encoded: counter.frames,
            frames_dropped: surface_dropped,
            bytes_written: 0,
            duration_secs,
        })
    }

    fn reset(&mut self) {
        if let Stage::Running { worker, .. } = std::mem::replace(&mut self.stage, Stage::Idle) {
            let _ = worker.finish();
        }
        self.fps = 0;
    }
}
