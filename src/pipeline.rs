//! Orchestrator: capture, annotate, export, display, wait.
//!
//! Components are acquired by the caller in this order: exporter, then
//! frame source and detector, then display. The pipeline releases them in
//! reverse when dropped. Release failures are logged and never escalated.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::annotate::{Annotator, Color};
use crate::capture::{Capture, CaptureLoop, Sleeper};
use crate::detect::FaceDetector;
use crate::display::DisplaySink;
use crate::error::{Error, Result};
use crate::export::ImageExporter;
use crate::ingest::FrameSource;

/// Title of the preview window.
pub const WINDOW_TITLE: &str = "Face Detect";

/// How many capture cycles to run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RunMode {
    /// One cycle, then exit.
    #[default]
    Once,
    /// Repeat until shutdown is requested or a fatal error occurs.
    Continuous,
}

/// Rectangle style used by the annotator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MarkerStyle {
    pub color: Color,
    pub thickness: u32,
}

impl Default for MarkerStyle {
    fn default() -> Self {
        Self {
            color: Color::BLUE,
            thickness: 3,
        }
    }
}

/// Totals for a finished run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub faces: u64,
}

/// Source of frames with at least one face.
pub trait FaceCapture {
    fn next_capture(&mut self) -> Result<Capture<'_>>;

    /// Time to wait between cycles.
    fn interval(&self) -> Duration;
}

impl<S: FrameSource, D: FaceDetector, Z: Sleeper> FaceCapture for CaptureLoop<S, D, Z> {
    fn next_capture(&mut self) -> Result<Capture<'_>> {
        CaptureLoop::next_capture(self)
    }

    fn interval(&self) -> Duration {
        self.policy().interval
    }
}

/// Closes the exporter when dropped.
struct ExporterGuard<E: ImageExporter>(E);

impl<E: ImageExporter> Drop for ExporterGuard<E> {
    fn drop(&mut self) {
        if let Err(err) = self.0.close() {
            log::warn!("failed to close exporter for {}: {}", self.0.destination(), err);
        }
    }
}

pub struct Pipeline<C: FaceCapture, A: Annotator, E: ImageExporter, V: DisplaySink> {
    // Field order is release order.
    display: V,
    capture: C,
    annotator: A,
    exporter: ExporterGuard<E>,
    style: MarkerStyle,
}

impl<C: FaceCapture, A: Annotator, E: ImageExporter, V: DisplaySink> Pipeline<C, A, E, V> {
    pub fn new(capture: C, annotator: A, exporter: E, display: V, style: MarkerStyle) -> Self {
        Self {
            display,
            capture,
            annotator,
            exporter: ExporterGuard(exporter),
            style,
        }
    }

    pub fn exporter(&self) -> &E {
        &self.exporter.0
    }

    pub fn display(&self) -> &V {
        &self.display
    }

    pub fn annotator(&self) -> &A {
        &self.annotator
    }

    pub fn capture(&self) -> &C {
        &self.capture
    }

    /// Run one cycle. Returns the number of faces published.
    pub fn run_once(&mut self) -> Result<usize> {
        let interval = self.capture.interval();
        let capture = self.capture.next_capture()?;
        let faces = capture.regions.len();
        log::info!("detected {} faces", faces);

        self.annotator.mark(
            capture.frame,
            &capture.regions,
            self.style.color,
            self.style.thickness,
        );
        self.exporter.0.send(capture.frame)?;
        self.display.show(capture.frame);
        self.display.wait_for(interval);
        Ok(faces)
    }

    /// Run cycles according to `mode`. `shutdown` is checked between cycles.
    pub fn run(&mut self, mode: RunMode, shutdown: &AtomicBool) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        loop {
            if shutdown.load(Ordering::SeqCst) {
                log::info!("shutdown requested, stopping after {} cycles", summary.cycles);
                break;
            }
            let faces = match self.run_once() {
                Err(Error::Cancelled { attempts }) => {
                    log::info!(
                        "shutdown requested while waiting for a face ({} attempts), stopping after {} cycles",
                        attempts,
                        summary.cycles
                    );
                    break;
                }
                other => other?,
            };
            summary.cycles += 1;
            summary.faces += faces as u64;
            if mode == RunMode::Once {
                break;
            }
        }
        Ok(summary)
    }
}

impl<C: FaceCapture, A: Annotator, E: ImageExporter, V: DisplaySink> Drop
    for Pipeline<C, A, E, V>
{
    fn drop(&mut self) {
        self.display.close();
    }
}
