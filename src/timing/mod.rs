//! Frame timing helpers
//!
//! One monotonic timebase per opened device; every frame timestamp and
//! encoder presentation time derives from it.

use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic clock for presentation timestamps
#[derive(Debug, Clone)]
pub struct PTSClock {
    start: Arc<Instant>,
}

impl PTSClock {
    /// Create a new PTS clock with the current instant as time zero
    pub fn new() -> Self {
        Self {
            start: Arc::new(Instant::now()),
        }
    }

    /// Seconds since the clock started
    #[inline]
    pub fn pts(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// Microseconds since the clock started
    #[inline]
    pub fn pts_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

impl Default for PTSClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Time between frames at `fps` (30 fps when zero)
pub fn frame_interval(fps: u32) -> Duration {
    let fps = if fps == 0 { 30 } else { fps };
    Duration::from_nanos(1_000_000_000 / fps as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_interval() {
        assert_eq!(frame_interval(240), Duration::from_nanos(4_166_666));
        assert_eq!(frame_interval(0), frame_interval(30));
    }

    #[test]
    fn test_clock_is_monotonic() {
        let clock = PTSClock::new();
        let a = clock.pts_us();
        std::thread::sleep(Duration::from_millis(2));
        assert!(clock.pts_us() > a);
        assert!(clock.pts() > 0.0);
    }
}
