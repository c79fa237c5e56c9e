use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use image::ImageFormat;

use crate::error::{Error, Result};
use crate::frame::Frame;

/// Wire format of the published image payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ImageEncoding {
    /// Row-major BGR pixel bytes with no header, the layout of an OpenCV
    /// capture Mat.
    #[default]
    Raw,
    /// Row-major RGB pixel bytes with no header.
    RawRgb,
    Jpeg,
    Png,
}

impl FromStr for ImageEncoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "raw" | "raw-bgr" | "bytes" => Ok(Self::Raw),
            "raw-rgb" => Ok(Self::RawRgb),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            other => Err(Error::Config(format!(
                "unknown encoding '{}': expected raw, raw-rgb, jpeg or png",
                other
            ))),
        }
    }
}

impl fmt::Display for ImageEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw => write!(f, "raw"),
            Self::RawRgb => write!(f, "raw-rgb"),
            Self::Jpeg => write!(f, "jpeg"),
            Self::Png => write!(f, "png"),
        }
    }
}

impl ImageEncoding {
    /// Serialize the frame into a payload.
    pub fn encode(&self, frame: &Frame) -> Result<Vec<u8>> {
        let format = match self {
            Self::Raw => return Ok(bgr_bytes(frame)),
            Self::RawRgb => return Ok(frame.as_bytes().to_vec()),
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Png => ImageFormat::Png,
        };
        if frame.is_empty() {
            return Err(Error::Encode(format!("cannot encode an empty frame as {}", self)));
        }
        let mut buf = Cursor::new(Vec::new());
        frame
            .image()
            .write_to(&mut buf, format)
            .map_err(|e| Error::Encode(e.to_string()))?;
        Ok(buf.into_inner())
    }
}

fn bgr_bytes(frame: &Frame) -> Vec<u8> {
    frame
        .as_bytes()
        .chunks_exact(3)
        .flat_map(|px| [px[2], px[1], px[0]])
        .collect()
}
