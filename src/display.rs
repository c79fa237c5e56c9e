//! Local preview of annotated frames.
//!
//! Display is a visualization aid only: failures are logged, never returned.

use std::time::Duration;

use crate::frame::Frame;

/// Shows frames locally.
pub trait DisplaySink {
    fn show(&mut self, frame: &Frame);

    /// Block for up to `duration`, or until the user dismisses the window.
    fn wait_for(&mut self, duration: Duration);

    fn close(&mut self) {}
}

impl<D: DisplaySink + ?Sized> DisplaySink for Box<D> {
    fn show(&mut self, frame: &Frame) {
        (**self).show(frame)
    }

    fn wait_for(&mut self, duration: Duration) {
        (**self).wait_for(duration)
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// No window: logs the frame size and sleeps for the wait duration.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeadlessDisplay;

impl DisplaySink for HeadlessDisplay {
    fn show(&mut self, frame: &Frame) {
        log::debug!("display: {}x{} frame", frame.width(), frame.height());
    }

    fn wait_for(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// OpenCV `highgui` window.
#[cfg(feature = "opencv")]
pub struct WindowDisplay {
    title: String,
    bgr: opencv::core::Mat,
    open: bool,
}

#[cfg(feature = "opencv")]
impl WindowDisplay {
    pub fn open(title: &str) -> Self {
        use opencv::highgui;

        let open = match highgui::named_window(title, highgui::WINDOW_AUTOSIZE) {
            Ok(()) => true,
            Err(err) => {
                log::warn!("display: could not open window '{}': {}", title, err);
                false
            }
        };
        Self {
            title: title.to_string(),
            bgr: opencv::core::Mat::default(),
            open,
        }
    }

    fn render(&mut self, frame: &Frame) -> opencv::Result<()> {
        use opencv::core::Mat;
        use opencv::prelude::*;
        use opencv::{highgui, imgproc};

        let flat = Mat::from_slice(frame.as_bytes())?;
        let rgb = flat.reshape(3, frame.height() as i32)?;
        imgproc::cvt_color_def(&rgb, &mut self.bgr, imgproc::COLOR_RGB2BGR)?;
        highgui::imshow(&self.title, &self.bgr)
    }
}

#[cfg(feature = "opencv")]
impl DisplaySink for WindowDisplay {
    fn show(&mut self, frame: &Frame) {
        if !self.open || frame.is_empty() {
            return;
        }
        if let Err(err) = self.render(frame) {
            log::warn!("display: could not show frame: {}", err);
        }
    }

    fn wait_for(&mut self, duration: Duration) {
        if !self.open {
            std::thread::sleep(duration);
            return;
        }
        let millis = duration.as_millis().clamp(1, i32::MAX as u128) as i32;
        if let Err(err) = opencv::highgui::wait_key(millis) {
            log::warn!("display: wait failed: {}", err);
        }
    }

    fn close(&mut self) {
        if !std::mem::take(&mut self.open) {
            return;
        }
        if let Err(err) = opencv::highgui::destroy_window(&self.title) {
            log::warn!("could not close window '{}': {}", self.title, err);
        }
    }
}

/// Window when available and requested, headless otherwise.
pub fn open(title: &str, headless: bool) -> Box<dyn DisplaySink> {
    #[cfg(feature = "opencv")]
    if !headless {
        return Box::new(WindowDisplay::open(title));
    }
    #[cfg(not(feature = "opencv"))]
    if !headless {
        log::info!(
            "display: built without opencv; '{}' preview disabled",
            title
        );
    }
    Box::new(HeadlessDisplay)
}
