use std::collections::VecDeque;

use crate::detect::backend::FaceDetector;
use crate::error::{Error, Result};
use crate::frame::{Frame, Region};

/// What a stub detector reports once its script runs out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StubFallback {
    /// One region covering the middle quarter of the frame.
    Center,
    /// Never finds a face.
    Nothing,
    /// Always the same regions.
    Fixed(Vec<Region>),
}

/// Deterministic detector for tests and `stub://` classifier paths.
///
/// Scripted results are returned one per call, then the fallback applies.
pub struct StubDetector {
    script: VecDeque<Vec<Region>>,
    fallback: StubFallback,
    calls: usize,
}

impl StubDetector {
    pub fn new(fallback: StubFallback) -> Self {
        Self {
            script: VecDeque::new(),
            fallback,
            calls: 0,
        }
    }

    /// Always report `regions`.
    pub fn fixed(regions: Vec<Region>) -> Self {
        Self::new(StubFallback::Fixed(regions))
    }

    /// Report each scripted entry in turn, then `fallback`.
    pub fn scripted(script: Vec<Vec<Region>>, fallback: StubFallback) -> Self {
        Self {
            script: script.into(),
            fallback,
            calls: 0,
        }
    }

    /// Build from the part after `stub://` in a classifier path.
    pub fn from_spec(spec: &str) -> Result<Self> {
        match spec {
            "" | "center" => Ok(Self::new(StubFallback::Center)),
            "none" => Ok(Self::new(StubFallback::Nothing)),
            other => Err(Error::ClassifierLoad {
                path: format!("stub://{}", other),
                reason: "expected stub://center or stub://none".into(),
            }),
        }
    }

    /// Number of `detect` calls served so far.
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl FaceDetector for StubDetector {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Region>> {
        self.calls += 1;
        if let Some(next) = self.script.pop_front() {
            return Ok(next);
        }
        Ok(match &self.fallback {
            StubFallback::Center => {
                let (w, h) = (frame.width() / 2, frame.height() / 2);
                if w == 0 || h == 0 {
                    vec![]
                } else {
                    vec![Region::new((w / 2) as i32, (h / 2) as i32, w, h)]
                }
            }
            StubFallback::Nothing => vec![],
            StubFallback::Fixed(regions) => regions.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_detector_plays_script_then_fallback() {
        let faces = vec![Region::new(1, 1, 2, 2)];
        let mut detector =
            StubDetector::scripted(vec![vec![], faces.clone()], StubFallback::Nothing);
        let frame = Frame::filled(10, 10, [0, 0, 0]);

        assert!(detector.detect(&frame).unwrap().is_empty());
        assert_eq!(detector.detect(&frame).unwrap(), faces);
        assert!(detector.detect(&frame).unwrap().is_empty());
        assert_eq!(detector.calls(), 3);
    }

    #[test]
    fn center_fallback_covers_middle_quarter() {
        let mut detector = StubDetector::from_spec("center").unwrap();
        let frame = Frame::filled(40, 20, [0, 0, 0]);
        assert_eq!(
            detector.detect(&frame).unwrap(),
            vec![Region::new(10, 5, 20, 10)]
        );
    }

    #[test]
    fn unknown_stub_spec_is_a_load_error() {
        let err = StubDetector::from_spec("eyes").err().unwrap();
        assert!(matches!(err, Error::ClassifierLoad { .. }));
    }
}
