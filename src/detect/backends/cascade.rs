#![cfg(feature = "opencv")]

use opencv::core::{Mat, Rect, Vector};
use opencv::imgproc;
use opencv::objdetect::CascadeClassifier;
use opencv::prelude::*;

use crate::detect::backend::FaceDetector;
use crate::error::{Error, Result};
use crate::frame::{Frame, Region};

/// Haar/LBP cascade face detector backed by OpenCV.
///
/// Loads a pretrained cascade (e.g. `haarcascade_frontalface_default.xml`)
/// from disk. Frames are converted to grayscale per call; nothing is cached
/// between calls.
pub struct CascadeDetector {
    classifier: Option<CascadeClassifier>,
    gray: Mat,
}

impl CascadeDetector {
    pub fn load(path: &str) -> Result<Self> {
        let load_err = |reason: String| Error::ClassifierLoad {
            path: path.to_string(),
            reason,
        };
        let classifier = CascadeClassifier::new(path).map_err(|e| load_err(e.to_string()))?;
        if classifier.empty().map_err(|e| load_err(e.to_string()))? {
            return Err(load_err("classifier is empty".into()));
        }
        log::info!("CascadeDetector: loaded {}", path);
        Ok(Self {
            classifier: Some(classifier),
            gray: Mat::default(),
        })
    }
}

impl FaceDetector for CascadeDetector {
    fn name(&self) -> &'static str {
        "cascade"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Region>> {
        let classifier = self
            .classifier
            .as_mut()
            .ok_or_else(|| Error::Detection("classifier already closed".into()))?;
        if frame.is_empty() {
            return Ok(vec![]);
        }

        let cv_err = |e: opencv::Error| Error::Detection(e.to_string());
        let flat = Mat::from_slice(frame.as_bytes()).map_err(cv_err)?;
        let rgb = flat.reshape(3, frame.height() as i32).map_err(cv_err)?;
        imgproc::cvt_color_def(&rgb, &mut self.gray, imgproc::COLOR_RGB2GRAY).map_err(cv_err)?;

        let mut faces: Vector<Rect> = Vector::new();
        classifier
            .detect_multi_scale_def(&self.gray, &mut faces)
            .map_err(cv_err)?;

        Ok(faces
            .iter()
            .map(|r| Region::new(r.x, r.y, r.width.max(0) as u32, r.height.max(0) as u32))
            .collect())
    }

    fn close(&mut self) -> Result<()> {
        self.classifier.take();
        Ok(())
    }
}
