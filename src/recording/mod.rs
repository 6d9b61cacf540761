//! Surface-bound video encoders
//!
//! An encoder is prepared against a media store entry, hands out the
//! [`Surface`] the capture session renders into, and finalizes the container
//! on stop. Two implementations ship:
//! - [`CountingEncoder`] drains the surface and reports frame counts
//! - `Mp4Encoder` (feature `recording`) encodes H.264 with openh264 and muxes
//!   MP4 with muxide
//!
//! # Example
//! ```rust,ignore
//! use procamera::recording::{EncoderSettings, Mp4Encoder, VideoEncoder};
//!
//! let settings = EncoderSettings::for_capture(&config, 20_000_000);
//! let mut encoder = Mp4Encoder::new();
//! let surface = encoder.prepare(&settings, &store, &output)?;
//! // hand `surface` to the capture session, then:
//! encoder.start()?;
//! let stats = encoder.stop()?;
//! ```

mod config;
mod counting;
#[cfg(feature = "recording")]
mod encoder;
#[cfg(feature = "recording")]
mod recorder;
mod worker;

pub use config::{ContainerFormat, EncoderSettings, EncoderStats, VideoCodec, DEFAULT_BITRATE};
pub use counting::{CountingEncoder, EncoderFaults};
#[cfg(feature = "recording")]
pub use encoder::{EncodedFrame, H264Encoder};
#[cfg(feature = "recording")]
pub use recorder::Mp4Encoder;

use crate::errors::CameraError;
use crate::platform::Surface;
use crate::storage::{MediaStore, OutputRef};

/// Media encoder fed through a surface
pub trait VideoEncoder: Send {
    /// Configure for `settings`, bind to `output` and create the input surface
    fn prepare(
        &mut self,
        settings: &EncoderSettings,
        store: &dyn MediaStore,
        output: &OutputRef,
    ) -> Result<Surface, CameraError>;

    /// Begin consuming frames from the surface
    fn start(&mut self) -> Result<(), CameraError>;

    /// Finish the stream and finalize the container
    fn stop(&mut self) -> Result<EncoderStats, CameraError>;

    /// Release everything so the encoder can be prepared again
    fn reset(&mut self);
}

/// Creates a fresh encoder for every recording
pub trait EncoderFactory: Send + Sync {
    fn create(&self) -> Box<dyn VideoEncoder>;
}

impl<F> EncoderFactory for F
where
    F: Fn() -> Box<dyn VideoEncoder> + Send + Sync,
{
    fn create(&self) -> Box<dyn VideoEncoder> {
        self()
    }
}

/// Factory for the best encoder this build has
pub fn default_encoder_factory() -> Box<dyn EncoderFactory> {
    #[cfg(feature = "recording")]
    {
        Box::new(|| Box::new(Mp4Encoder::new()) as Box<dyn VideoEncoder>)
    }

    #[cfg(not(feature = "recording"))]
    {
        Box::new(|| Box::new(CountingEncoder::new()) as Box<dyn VideoEncoder>)
    }
}
