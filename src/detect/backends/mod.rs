pub mod stub;

#[cfg(feature = "opencv")]
pub mod cascade;

pub use stub::{StubDetector, StubFallback};

#[cfg(feature = "opencv")]
pub use cascade::CascadeDetector;
