//! facecast: camera face detection with broker export.
//!
//! Each cycle captures frames until one contains at least one face,
//! outlines the faces, publishes the annotated frame with one broker call,
//! then shows it locally.
//!
//! # Module Structure
//!
//! - `frame`: the reusable RGB frame buffer and face regions
//! - `ingest`: frame sources (OpenCV cameras, synthetic `stub://` devices)
//! - `detect`: face detectors (OpenCV cascade, scripted stub)
//! - `capture`: the read/detect/retry loop
//! - `annotate`: rectangle markers
//! - `export`: Kafka-Pixy gRPC and MQTT exporters, payload encoding, basic auth
//! - `transport`: endpoint parsing and TLS materials
//! - `display`: preview window or headless sink
//! - `pipeline`: the orchestrator
//! - `config`: flag, environment and file configuration

pub mod annotate;
pub mod capture;
pub mod config;
pub mod detect;
pub mod display;
pub mod error;
pub mod export;
pub mod frame;
pub mod ingest;
pub mod pipeline;
pub mod transport;

pub use annotate::{Annotator, Color, RectangleMarker};
pub use capture::{Capture, CaptureLoop, RetryPolicy, Sleeper, ThreadSleeper};
pub use config::{Args, FacecastConfig};
pub use detect::{FaceDetector, StubDetector, StubFallback};
pub use display::{DisplaySink, HeadlessDisplay};
pub use error::{Error, Result};
pub use export::{Credentials, ExporterSettings, ImageEncoding, ImageExporter, TransportKind};
pub use frame::{Frame, Region};
pub use ingest::{CameraConfig, CameraSource, DeviceId, FrameSource};
pub use pipeline::{FaceCapture, MarkerStyle, Pipeline, RunMode, RunSummary};
