//! Camera frame source.
//!
//! `CameraSource` captures frames from a local camera through OpenCV
//! (feature: opencv), with a synthetic fallback for `stub://` device
//! identifiers.
//!
//! The source owns the device handle only. Frames are written into the
//! buffer the caller passes to `read`, so no pixel data is retained here
//! between reads.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::ingest::FrameSource;

/// Camera selector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceId {
    /// Zero-based camera index (`1`, `/dev/video1`).
    Index(i32),
    /// Device path or stream URL handed to the capture backend as-is.
    Path(String),
    /// Synthetic device (`stub://name`).
    Stub(String),
}

impl FromStr for DeviceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::Config("device identifier must not be empty".into()));
        }
        if let Some(name) = s.strip_prefix("stub://") {
            return Ok(Self::Stub(name.to_string()));
        }
        if let Some(index) = parse_device_index(s) {
            return Ok(Self::Index(index));
        }
        Ok(Self::Path(s.to_string()))
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{}", index),
            Self::Path(path) => write!(f, "{}", path),
            Self::Stub(name) => write!(f, "stub://{}", name),
        }
    }
}

/// Parse a plain index or a `/dev/videoN` path into a camera index.
fn parse_device_index(value: &str) -> Option<i32> {
    if let Ok(index) = value.parse::<i32>() {
        return Some(index);
    }
    let digits = value.strip_prefix("/dev/video")?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Configuration for a camera source.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    pub device: DeviceId,
    /// Preferred frame width (synthetic frames use it verbatim).
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
    /// Number of empty frames a synthetic device yields before real ones,
    /// mimicking camera warm-up.
    pub warmup_frames: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: DeviceId::Index(1),
            width: 640,
            height: 480,
            warmup_frames: 0,
        }
    }
}

/// Camera frame source.
pub struct CameraSource {
    label: String,
    backend: CameraBackend,
    closed: bool,
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
    #[cfg(feature = "opencv")]
    Device(DeviceCamera),
}

impl CameraSource {
    /// Open the configured device.
    pub fn open(config: &CameraConfig) -> Result<Self> {
        let label = config.device.to_string();
        let backend = match &config.device {
            DeviceId::Stub(_) => CameraBackend::Synthetic(SyntheticCamera::new(config)),
            #[cfg(feature = "opencv")]
            DeviceId::Index(_) | DeviceId::Path(_) => {
                CameraBackend::Device(DeviceCamera::open(config)?)
            }
            #[cfg(not(feature = "opencv"))]
            DeviceId::Index(_) | DeviceId::Path(_) => {
                return Err(Error::DeviceOpen {
                    device: label,
                    reason: "camera capture requires the opencv feature".into(),
                })
            }
        };
        log::info!("CameraSource: opened {}", label);
        Ok(Self {
            label,
            backend,
            closed: false,
        })
    }
}

impl FrameSource for CameraSource {
    fn device(&self) -> &str {
        &self.label
    }

    fn read(&mut self, frame: &mut Frame) -> bool {
        if self.closed {
            return false;
        }
        match &mut self.backend {
            CameraBackend::Synthetic(camera) => camera.read(frame),
            #[cfg(feature = "opencv")]
            CameraBackend::Device(camera) => camera.read(frame),
        }
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        match &mut self.backend {
            CameraBackend::Synthetic(_) => Ok(()),
            #[cfg(feature = "opencv")]
            CameraBackend::Device(camera) => camera.close(&self.label),
        }
    }
}

impl CameraSource {
    /// Close the device, logging a failure. Returns false if already closed.
    fn release(&mut self) -> bool {
        if self.closed {
            return false;
        }
        if let Err(err) = self.close() {
            log::warn!("could not close video capture {}: {}", self.label, err);
        }
        true
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.release();
    }
}

// ----------------------------------------------------------------------------
// Synthetic camera (stub://)
// ----------------------------------------------------------------------------

struct SyntheticCamera {
    width: u32,
    height: u32,
    warmup_remaining: u32,
    frame_count: u64,
    scratch: Vec<u8>,
}

impl SyntheticCamera {
    fn new(config: &CameraConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            warmup_remaining: config.warmup_frames,
            frame_count: 0,
            scratch: Vec::new(),
        }
    }

    fn read(&mut self, frame: &mut Frame) -> bool {
        if self.warmup_remaining > 0 {
            self.warmup_remaining -= 1;
            frame.clear();
            return true;
        }
        self.frame_count += 1;

        let len = self.width as usize * self.height as usize * 3;
        self.scratch.clear();
        self.scratch.extend((0..len).map(|i| ((i as u64 + self.frame_count) % 256) as u8));
        frame.overwrite(self.width, self.height, &self.scratch);
        true
    }
}

// ----------------------------------------------------------------------------
// OpenCV camera
// ----------------------------------------------------------------------------

#[cfg(feature = "opencv")]
struct DeviceCamera {
    capture: opencv::videoio::VideoCapture,
    bgr: opencv::core::Mat,
    rgb: opencv::core::Mat,
}

#[cfg(feature = "opencv")]
impl DeviceCamera {
    fn open(config: &CameraConfig) -> Result<Self> {
        use opencv::prelude::*;
        use opencv::videoio::{self, VideoCapture};

        let device = config.device.to_string();
        let open_err = |reason: String| Error::DeviceOpen {
            device: device.clone(),
            reason,
        };

        let mut capture = match &config.device {
            DeviceId::Index(index) => VideoCapture::new(*index, videoio::CAP_ANY),
            DeviceId::Path(path) => VideoCapture::from_file(path, videoio::CAP_ANY),
            DeviceId::Stub(_) => unreachable!("stub devices use the synthetic backend"),
        }
        .map_err(|e| open_err(e.to_string()))?;

        if !capture.is_opened().map_err(|e| open_err(e.to_string()))? {
            return Err(open_err("device did not open".into()));
        }

        for (prop, value) in [
            (videoio::CAP_PROP_FRAME_WIDTH, config.width),
            (videoio::CAP_PROP_FRAME_HEIGHT, config.height),
        ] {
            if let Err(err) = capture.set(prop, value as f64) {
                log::warn!("CameraSource: failed to set property {} on {}: {}", prop, device, err);
            }
        }

        Ok(Self {
            capture,
            bgr: opencv::core::Mat::default(),
            rgb: opencv::core::Mat::default(),
        })
    }

    fn read(&mut self, frame: &mut Frame) -> bool {
        use opencv::imgproc;
        use opencv::prelude::*;

        match self.capture.read(&mut self.bgr) {
            Ok(true) => {}
            Ok(false) => return false,
            Err(err) => {
                log::debug!("CameraSource: read failed: {}", err);
                return false;
            }
        }

        if self.bgr.empty() {
            frame.clear();
            return true;
        }

        if let Err(err) = imgproc::cvt_color_def(&self.bgr, &mut self.rgb, imgproc::COLOR_BGR2RGB)
        {
            log::debug!("CameraSource: color conversion failed: {}", err);
            return false;
        }

        let (width, height) = (self.rgb.cols().max(0) as u32, self.rgb.rows().max(0) as u32);
        match self.rgb.data_bytes() {
            Ok(bytes) => {
                frame.overwrite(width, height, bytes);
                true
            }
            Err(err) => {
                log::debug!("CameraSource: frame not contiguous: {}", err);
                false
            }
        }
    }

    fn close(&mut self, device: &str) -> Result<()> {
        use opencv::prelude::*;

        self.capture.release().map_err(|e| Error::DeviceRelease {
            device: device.to_string(),
            reason: e.to_string(),
        })
    }
}
