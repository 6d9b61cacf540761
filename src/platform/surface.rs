//! Frame surfaces connecting a capture session to an encoder

use crate::types::{CameraFrame, Resolution};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

static NEXT_SURFACE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfaceId(pub u64);

impl SurfaceId {
    pub fn next() -> Self {
        SurfaceId(NEXT_SURFACE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Default)]
struct SurfaceCounters {
    submitted: AtomicU64,
    dropped: AtomicU64,
}

/// Producer end of a surface. Cloned into capture sessions.
#[derive(Debug, Clone)]
pub struct Surface {
    id: SurfaceId,
    resolution: Resolution,
    tx: Sender<CameraFrame>,
    counters: Arc<SurfaceCounters>,
}

/// Consumer end of a surface, owned by the encoder
#[derive(Debug)]
pub struct SurfaceReader {
    id: SurfaceId,
    rx: Receiver<CameraFrame>,
    counters: Arc<SurfaceCounters>,
}

impl Surface {
    /// Create a surface of the given frame size buffering at most `capacity` frames
    pub fn new(resolution: Resolution, capacity: usize) -> (Surface, SurfaceReader) {
        let id = SurfaceId::next();
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        let counters = Arc::new(SurfaceCounters::default());
        (
            Surface {
                id,
                resolution,
                tx,
                counters: counters.clone(),
            },
            SurfaceReader { id, rx, counters },
        )
    }

    pub fn id(&self) -> SurfaceId {
        self.id
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Queue a frame. A full buffer drops the new frame; returns whether it was queued.
    pub fn submit(&self, frame: CameraFrame) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }
}

impl SurfaceReader {
    pub fn id(&self) -> SurfaceId {
        self.id
    }

    /// Wait up to `timeout` for the next frame
    pub fn recv_timeout(&self, timeout: Duration) -> Option<CameraFrame> {
        match self.rx.recv_timeout(timeout) {
            Ok(frame) => Some(frame),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn try_recv(&self) -> Option<CameraFrame> {
        self.rx.try_recv().ok()
    }

    pub fn dropped(&self) -> u64 {
        self.counters.dropped.load(Ordering::Relaxed)
    }

    pub fn submitted(&self) -> u64 {
        self.counters.submitted.load(Ordering::Relaxed)
    }
}
