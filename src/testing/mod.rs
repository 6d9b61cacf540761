//! Testing utilities for procamera
//!
//! Synthetic frames used by the simulated camera and by offline tests.

pub mod synthetic_data;

pub use synthetic_data::{synthetic_video_frame, timing_only_frame};
