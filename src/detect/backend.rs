use crate::error::Result;
use crate::frame::{Frame, Region};

/// Face detector backend.
///
/// Implementations read the frame in place and must not retain it past the
/// `detect` call; the capture loop overwrites the buffer on the next read.
pub trait FaceDetector {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Locate faces in `frame`.
    ///
    /// An empty result is not an error. Region order is unspecified.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Region>>;

    /// Release classifier resources. Calling it more than once is a no-op.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<D: FaceDetector + ?Sized> FaceDetector for Box<D> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Region>> {
        (**self).detect(frame)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}
