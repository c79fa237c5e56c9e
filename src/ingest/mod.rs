//! Frame sources.
//!
//! A source fills the capture loop's single `Frame` buffer on demand:
//! - Local camera devices via OpenCV `videoio` (feature: opencv)
//! - Synthetic `stub://` devices (testing, demos)
//!
//! `read` returning `false` is a device failure. An empty frame after a
//! successful read is not a failure; the capture loop retries it.

pub mod camera;

pub use camera::{CameraConfig, CameraSource, DeviceId};

use crate::error::Result;
use crate::frame::Frame;

/// A device that produces frames into a caller-owned buffer.
pub trait FrameSource {
    /// Human-readable device identifier for logs and errors.
    fn device(&self) -> &str;

    /// Read the next frame into `frame`, overwriting it.
    ///
    /// Returns `false` when the device could not be read.
    fn read(&mut self, frame: &mut Frame) -> bool;

    /// Release the device handle. Calling it more than once is a no-op.
    fn close(&mut self) -> Result<()>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn device(&self) -> &str {
        (**self).device()
    }

    fn read(&mut self, frame: &mut Frame) -> bool {
        (**self).read(frame)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}
