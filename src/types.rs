use std::{fmt, sync::Arc, time::Instant};

/// Number of keypoints the handpose estimator reports per hand.
pub const KEYPOINTS_PER_HAND: usize = 21;

#[derive(Clone, Debug)]
pub struct Frame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    #[allow(dead_code)]
    pub timestamp: Instant,
}

impl Frame {
    pub fn new(rgba: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            rgba,
            width,
            height,
            timestamp: Instant::now(),
        }
    }
}

/// A hand keypoint in normalized image coordinates. `x` and `y` are fractions
/// of the frame width and height, `z` shares the scale of `x`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Keypoint {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct HandLandmarks {
    /// Wrist first, then thumb, index, middle, ring and little finger joints.
    pub keypoints: Vec<Keypoint>,
    pub score: f32,
    pub handedness: f32,
}

impl HandLandmarks {
    pub fn new(keypoints: Vec<Keypoint>) -> Self {
        Self {
            keypoints,
            score: 1.0,
            handedness: 0.0,
        }
    }
}

/// A decoded sign class. Clones share the same text.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(Arc<str>);

impl Label {
    pub fn new(text: &str) -> Self {
        Self(Arc::from(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Annotations for one processed hand.
#[derive(Clone, Debug)]
pub struct HandOverlay {
    pub keypoints: Vec<Keypoint>,
    pub stable: Option<Label>,
}

/// Everything the renderer needs besides the frame pixels.
#[derive(Clone, Debug, Default)]
pub struct Overlay {
    pub hands: Vec<HandOverlay>,
    pub stable: Option<Label>,
    pub message: String,
}

impl Overlay {
    pub fn caption(&self) -> String {
        match &self.stable {
            Some(label) => format!("Prediction: {label} | Message: {}", self.message),
            None => format!("Message: {}", self.message),
        }
    }
}
