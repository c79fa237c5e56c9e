use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the capture, detection and export stages.
///
/// Transient conditions (empty frames, frames without faces) never appear
/// here; the capture loop retries them internally.
#[derive(Debug, Error)]
pub enum Error {
    #[error("could not open video capture on device {device}: {reason}")]
    DeviceOpen { device: String, reason: String },

    #[error("cannot read device {device}")]
    DeviceRead { device: String },

    #[error("could not release device {device}: {reason}")]
    DeviceRelease { device: String, reason: String },

    #[error("error reading classifier file {path}: {reason}")]
    ClassifierLoad { path: String, reason: String },

    #[error("face detection failed: {0}")]
    Detection(String),

    #[error("could not connect to {endpoint}: {reason}")]
    Connection { endpoint: String, reason: String },

    #[error("could not produce to {topic}: {reason}")]
    Publish { topic: String, reason: String },

    #[error("could not encode frame: {0}")]
    Encode(String),

    #[error(
        "refusing to send credentials to {endpoint} over a plaintext channel \
         (enable TLS or pass --allow-insecure-credentials)"
    )]
    InsecureCredentials { endpoint: String },

    #[error("no usable frame after {attempts} capture attempts ({elapsed:?})")]
    RetriesExhausted { attempts: u32, elapsed: Duration },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("capture stopped by shutdown request after {attempts} attempts")]
    Cancelled { attempts: u32 },
}

impl Error {
    /// True for errors raised while reading from the frame source.
    pub fn is_device_read(&self) -> bool {
        matches!(self, Self::DeviceRead { .. })
    }

    /// True for errors raised by the remote broker call.
    pub fn is_publish(&self) -> bool {
        matches!(self, Self::Publish { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
