//! Encoder thread draining a surface

use crate::errors::CameraError;
use crate::platform::SurfaceReader;
use crate::types::CameraFrame;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

const POLL: Duration = Duration::from_millis(20);

/// Consumer of the frames arriving on an encoder surface
pub(crate) trait FrameSink: Send + 'static {
    fn write(&mut self, frame: CameraFrame) -> Result<(), CameraError>;
}

pub(crate) struct SurfaceWorker<S: FrameSink> {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<(SurfaceReader, Result<S, CameraError>)>,
}

impl<S: FrameSink> SurfaceWorker<S> {
    /// Start draining `reader` into `sink` on a `procamera-encoder` thread
    pub(crate) fn spawn(reader: SurfaceReader, mut sink: S) -> Result<Self, CameraError> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let handle = std::thread::Builder::new()
            .name("procamera-encoder".to_string())
            .spawn(move || {
                let result = drain(&reader, &mut sink, &flag).map(|_| sink);
                (reader, result)
            })
            .map_err(|e| CameraError::EncoderError(format!("encoder thread spawn failed: {e}")))?;
        Ok(Self { stop, handle })
    }

    /// Drain what is queued, stop the thread and hand back the sink
    pub(crate) fn finish(self) -> (Option<SurfaceReader>, Result<S, CameraError>) {
        self.stop.store(true, Ordering::Relaxed);
        match self.handle.join() {
            Ok((reader, result)) => (Some(reader), result),
            Err(_) => (
                None,
                Err(CameraError::EncoderError("encoder thread panicked".to_string())),
            ),
        }
    }
}

fn drain<S: FrameSink>(
    reader: &SurfaceReader,
    sink: &mut S,
    stop: &AtomicBool,
) -> Result<(), CameraError> {
    loop {
        if stop.load(Ordering::Relaxed) {
            while let Some(frame) = reader.try_recv() {
                sink.write(frame)?;
            }
            return Ok(());
        }
        if let Some(frame) = reader.recv_timeout(POLL) {
            sink.write(frame)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Surface;
    use crate::types::Resolution;

    struct Collect(Vec<u64>);

    impl FrameSink for Collect {
        fn write(&mut self, frame: CameraFrame) -> Result<(), CameraError> {
            self.0.push(frame.sequence);
            Ok(())
        }
    }

    #[test]
    fn test_worker_drains_queued_frames_on_finish() {
        let (surface, reader) = Surface::new(Resolution::vga(), 8);
        for seq in 1..=3 {
            let frame = CameraFrame::new(Vec::new(), 640, 480, "t".to_string()).with_timing(seq, 0);
            surface.submit(frame);
        }
        let worker = SurfaceWorker::spawn(reader, Collect(Vec::new())).unwrap();
        let (reader, result) = worker.finish();
        assert!(reader.is_some());
        assert_eq!(result.unwrap().0, vec![1, 2, 3]);
    }
}
