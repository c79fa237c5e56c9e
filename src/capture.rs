//! Capture loop: read → detect → retry until a frame contains a face.
//!
//! Device read failures are fatal and returned immediately. Empty frames and
//! frames without faces are retried after the configured interval, up to an
//! optional attempt ceiling or deadline (both unset means retry forever).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::detect::FaceDetector;
use crate::error::{Error, Result};
use crate::frame::{Frame, Region};
use crate::ingest::FrameSource;

/// Blocking pause between capture attempts.
pub trait Sleeper {
    fn sleep(&mut self, duration: Duration);
}

/// Sleeps the calling thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

impl<T: Sleeper + ?Sized> Sleeper for &mut T {
    fn sleep(&mut self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// Retry/backoff settings for the capture loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Sleep between attempts.
    pub interval: Duration,
    /// Give up after this many reads without a usable frame.
    pub max_attempts: Option<u32>,
    /// Give up once this much time has passed since the first read.
    pub deadline: Option<Duration>,
}

impl RetryPolicy {
    /// Fixed interval, no ceiling.
    pub fn unbounded(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
            deadline: None,
        }
    }

    fn exhausted(&self, attempts: u32, elapsed: Duration) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
            || self.deadline.is_some_and(|deadline| elapsed >= deadline)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::unbounded(Duration::from_secs(1))
    }
}

/// A frame with at least one detected face.
///
/// Borrows the loop's frame buffer, so it cannot outlive the next read.
#[derive(Debug)]
pub struct Capture<'a> {
    pub frame: &'a mut Frame,
    pub regions: Vec<Region>,
    /// Reads performed to obtain this capture (1 = first read succeeded).
    pub attempts: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Miss {
    EmptyFrame,
    NoFaces,
}

/// Owns the frame source, the detector and the single frame buffer.
///
/// Dropping the loop closes the detector, then the source. Release failures
/// are logged and never escalated.
pub struct CaptureLoop<S: FrameSource, D: FaceDetector, Z: Sleeper = ThreadSleeper> {
    source: S,
    detector: D,
    sleeper: Z,
    policy: RetryPolicy,
    frame: Frame,
    shutdown: Option<Arc<AtomicBool>>,
}

impl<S: FrameSource, D: FaceDetector> CaptureLoop<S, D, ThreadSleeper> {
    pub fn new(source: S, detector: D, policy: RetryPolicy) -> Self {
        Self::with_sleeper(source, detector, policy, ThreadSleeper)
    }
}

impl<S: FrameSource, D: FaceDetector, Z: Sleeper> CaptureLoop<S, D, Z> {
    pub fn with_sleeper(source: S, detector: D, policy: RetryPolicy, sleeper: Z) -> Self {
        Self {
            source,
            detector,
            sleeper,
            policy,
            frame: Frame::new(),
            shutdown: None,
        }
    }

    /// Stop retrying with `Error::Cancelled` once `flag` is set.
    pub fn with_shutdown(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = Some(flag);
        self
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn sleeper(&self) -> &Z {
        &self.sleeper
    }

    /// Block until a frame with at least one face is captured.
    pub fn next_capture(&mut self) -> Result<Capture<'_>> {
        let started = Instant::now();
        let mut attempts = 0u32;

        loop {
            attempts = attempts.saturating_add(1);

            if !self.source.read(&mut self.frame) {
                return Err(Error::DeviceRead {
                    device: self.source.device().to_string(),
                });
            }

            let miss = if self.frame.is_empty() {
                Miss::EmptyFrame
            } else {
                let regions = self.detector.detect(&self.frame)?;
                if !regions.is_empty() {
                    log::debug!(
                        "capture: {} face(s) after {} attempt(s)",
                        regions.len(),
                        attempts
                    );
                    return Ok(Capture {
                        frame: &mut self.frame,
                        regions,
                        attempts,
                    });
                }
                Miss::NoFaces
            };

            let elapsed = started.elapsed();
            if self.policy.exhausted(attempts, elapsed) {
                return Err(Error::RetriesExhausted { attempts, elapsed });
            }
            if self.shutdown_requested() {
                return Err(Error::Cancelled { attempts });
            }
            log::debug!(
                "capture: attempt {} yielded {:?}, retrying in {:?}",
                attempts,
                miss,
                self.policy.interval
            );
            self.sleeper.sleep(self.policy.interval);
        }
    }
}

impl<S: FrameSource, D: FaceDetector, Z: Sleeper> Drop for CaptureLoop<S, D, Z> {
    fn drop(&mut self) {
        if let Err(err) = self.detector.close() {
            log::warn!("could not close classifier {}: {}", self.detector.name(), err);
        }
        if let Err(err) = self.source.close() {
            log::warn!("could not close video capture {}: {}", self.source.device(), err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{StubDetector, StubFallback};
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Default)]
    struct CountingSleeper {
        sleeps: Vec<Duration>,
    }

    impl Sleeper for CountingSleeper {
        fn sleep(&mut self, duration: Duration) {
            self.sleeps.push(duration);
        }
    }

    /// Plays back a list of read outcomes: `None` is a failed read,
    /// `Some(false)` an empty frame, `Some(true)` a 16x16 frame.
    struct ScriptedSource {
        reads: Vec<Option<bool>>,
        cursor: usize,
        closed: Rc<Cell<u32>>,
    }

    impl ScriptedSource {
        fn new(reads: Vec<Option<bool>>) -> Self {
            Self {
                reads,
                cursor: 0,
                closed: Rc::default(),
            }
        }
    }

    impl FrameSource for ScriptedSource {
        fn device(&self) -> &str {
            "scripted"
        }

        fn read(&mut self, frame: &mut Frame) -> bool {
            let outcome = self.reads.get(self.cursor).copied().unwrap_or(Some(true));
            self.cursor += 1;
            match outcome {
                None => false,
                Some(false) => {
                    frame.clear();
                    true
                }
                Some(true) => {
                    *frame = Frame::filled(16, 16, [10, 10, 10]);
                    true
                }
            }
        }

        fn close(&mut self) -> Result<()> {
            self.closed.set(self.closed.get() + 1);
            Ok(())
        }
    }

    fn face() -> Region {
        Region::new(2, 2, 4, 4)
    }

    #[test]
    fn first_frame_with_faces_returns_without_sleeping() {
        let mut sleeper = CountingSleeper::default();
        {
            let mut capture_loop = CaptureLoop::with_sleeper(
                ScriptedSource::new(vec![Some(true)]),
                StubDetector::fixed(vec![face()]),
                RetryPolicy::unbounded(Duration::from_millis(5)),
                &mut sleeper,
            );
            let capture = capture_loop.next_capture().unwrap();
            assert_eq!(capture.regions, vec![face()]);
            assert_eq!(capture.attempts, 1);
            assert_eq!(capture.frame.width(), 16);
        }
        assert!(sleeper.sleeps.is_empty());
    }

    #[test]
    fn empty_frames_are_retried_after_interval() {
        let mut sleeper = CountingSleeper::default();
        let interval = Duration::from_millis(250);
        {
            let mut capture_loop = CaptureLoop::with_sleeper(
                ScriptedSource::new(vec![Some(false), Some(false), Some(true)]),
                StubDetector::fixed(vec![face()]),
                RetryPolicy::unbounded(interval),
                &mut sleeper,
            );
            let capture = capture_loop.next_capture().unwrap();
            assert_eq!(capture.attempts, 3);
        }
        assert_eq!(sleeper.sleeps, vec![interval, interval]);
    }

    #[test]
    fn empty_frames_never_reach_the_detector() {
        let mut capture_loop = CaptureLoop::with_sleeper(
            ScriptedSource::new(vec![Some(false), Some(true)]),
            StubDetector::fixed(vec![face()]),
            RetryPolicy::unbounded(Duration::ZERO),
            CountingSleeper::default(),
        );
        capture_loop.next_capture().unwrap();
        assert_eq!(capture_loop.detector().calls(), 1);
    }

    #[test]
    fn read_failure_is_fatal_and_not_retried() {
        let mut capture_loop = CaptureLoop::with_sleeper(
            ScriptedSource::new(vec![Some(false), None, Some(true)]),
            StubDetector::fixed(vec![face()]),
            RetryPolicy::unbounded(Duration::from_millis(1)),
            CountingSleeper::default(),
        );
        let err = capture_loop.next_capture().unwrap_err();
        assert!(err.is_device_read());
        // One sleep for the empty frame, none after the failed read.
        assert_eq!(capture_loop.sleeper().sleeps.len(), 1);
        assert_eq!(capture_loop.source().cursor, 2);
    }

    #[test]
    fn shutdown_flag_interrupts_retries() {
        let flag = Arc::new(AtomicBool::new(false));
        let mut capture_loop = CaptureLoop::with_sleeper(
            ScriptedSource::new(vec![Some(false), Some(false), Some(false)]),
            StubDetector::fixed(vec![face()]),
            RetryPolicy::unbounded(Duration::from_millis(1)),
            CountingSleeper::default(),
        )
        .with_shutdown(Arc::clone(&flag));

        flag.store(true, Ordering::SeqCst);
        let err = capture_loop.next_capture().unwrap_err();
        assert!(matches!(err, Error::Cancelled { attempts: 1 }), "{}", err);
        assert!(capture_loop.sleeper().sleeps.is_empty());
    }

    #[test]
    fn shutdown_flag_does_not_discard_a_found_face() {
        let flag = Arc::new(AtomicBool::new(true));
        let mut capture_loop = CaptureLoop::with_sleeper(
            ScriptedSource::new(vec![Some(true)]),
            StubDetector::fixed(vec![face()]),
            RetryPolicy::default(),
            CountingSleeper::default(),
        )
        .with_shutdown(flag);
        assert_eq!(capture_loop.next_capture().unwrap().regions, vec![face()]);
    }

    #[test]
    fn attempt_ceiling_stops_retrying() {
        let policy = RetryPolicy {
            max_attempts: Some(3),
            ..RetryPolicy::unbounded(Duration::from_millis(1))
        };
        let mut capture_loop = CaptureLoop::with_sleeper(
            ScriptedSource::new(vec![]),
            StubDetector::new(StubFallback::Nothing),
            policy,
            CountingSleeper::default(),
        );
        match capture_loop.next_capture() {
            Err(Error::RetriesExhausted { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected RetriesExhausted, got {:?}", other.map(|c| c.attempts)),
        }
        assert_eq!(capture_loop.sleeper().sleeps.len(), 2);
    }

    #[test]
    fn zero_deadline_gives_up_after_first_miss() {
        let policy = RetryPolicy {
            deadline: Some(Duration::ZERO),
            ..RetryPolicy::unbounded(Duration::from_millis(1))
        };
        let mut capture_loop = CaptureLoop::with_sleeper(
            ScriptedSource::new(vec![Some(false)]),
            StubDetector::fixed(vec![face()]),
            policy,
            CountingSleeper::default(),
        );
        let err = capture_loop.next_capture().unwrap_err();
        assert!(matches!(err, Error::RetriesExhausted { attempts: 1, .. }));
        assert!(capture_loop.sleeper().sleeps.is_empty());
    }

    #[test]
    fn dropping_the_loop_closes_the_source_once() {
        let source = ScriptedSource::new(vec![]);
        let closed = Rc::clone(&source.closed);
        let capture_loop = CaptureLoop::with_sleeper(
            source,
            StubDetector::fixed(vec![]),
            RetryPolicy::default(),
            CountingSleeper::default(),
        );
        assert_eq!(closed.get(), 0);
        drop(capture_loop);
        assert_eq!(closed.get(), 1);
    }
}
