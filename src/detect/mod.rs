mod backend;
mod backends;

pub use backend::FaceDetector;
#[cfg(feature = "opencv")]
pub use backends::CascadeDetector;
pub use backends::{StubDetector, StubFallback};

use crate::error::Result;

/// Load the detector named by a classifier path.
///
/// `stub://center` and `stub://none` select the stub backend; anything else
/// is a cascade file for OpenCV.
pub fn load(classifier_path: &str) -> Result<Box<dyn FaceDetector>> {
    if let Some(spec) = classifier_path.strip_prefix("stub://") {
        return Ok(Box::new(StubDetector::from_spec(spec)?));
    }

    #[cfg(feature = "opencv")]
    {
        Ok(Box::new(CascadeDetector::load(classifier_path)?))
    }
    #[cfg(not(feature = "opencv"))]
    {
        Err(crate::error::Error::ClassifierLoad {
            path: classifier_path.to_string(),
            reason: "cascade classifiers require the opencv feature".into(),
        })
    }
}
