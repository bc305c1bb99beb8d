#[cfg(feature = "camera-nokhwa")]
pub mod camera;
pub mod classifier;
pub mod landmarks;
pub mod replay;
#[cfg_attr(not(feature = "camera-nokhwa"), allow(dead_code))]
pub mod rgba_converter;
pub mod skeleton;
pub mod timed;

// Re-exports for convenience
#[cfg(feature = "camera-nokhwa")]
pub use camera::{CameraCapture, available_cameras};
pub use classifier::OrtSignClassifier;
pub use landmarks::HandposeDetector;
pub use replay::ImageReplay;
pub use timed::{TimedClassifier, TimedDetector};
