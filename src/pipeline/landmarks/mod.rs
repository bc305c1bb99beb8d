//! Hand keypoints from the MediaPipe palm detector and handpose estimator.
//!
//! Each frame runs the palm detector once, then the handpose estimator on a
//! rotated crop around every palm, strongest palms first.

pub mod common;
pub mod palm;

use std::path::Path;

use anyhow::{Context, Result, ensure};
use ort::{session::Session, value::Tensor};

use self::{
    common::{HANDPOSE_INPUT_SIZE, decode_landmarks, load_session, rotated_crop_tensor},
    palm::{PalmDetector, PalmDetectorConfig, PalmRegion, crop_from_palm},
};
use crate::{
    controller::LandmarkDetector,
    error::StartupError,
    types::{Frame, HandLandmarks},
};

#[derive(Clone, Debug)]
pub struct DetectorConfig {
    pub max_hands: usize,
    /// Hands below this handpose confidence are dropped.
    pub min_confidence: f32,
    pub palm: PalmDetectorConfig,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            max_hands: 2,
            min_confidence: 0.5,
            palm: PalmDetectorConfig::default(),
        }
    }
}

pub struct HandposeDetector {
    handpose: Session,
    palm_detector: PalmDetector,
    cfg: DetectorConfig,
}

impl HandposeDetector {
    pub fn new(
        handpose_model_path: &Path,
        palm_model_path: &Path,
        cfg: DetectorConfig,
    ) -> Result<Self, StartupError> {
        Ok(Self {
            handpose: load_session("handpose estimator model", handpose_model_path)?,
            palm_detector: PalmDetector::new(palm_model_path, cfg.palm.clone())?,
            cfg,
        })
    }

    fn estimate(&mut self, frame: &Frame, palm: &PalmRegion) -> Result<Option<HandLandmarks>> {
        let (center, side, angle) = crop_from_palm(palm)?;
        let (input, transform) =
            rotated_crop_tensor(frame, center, side, angle, HANDPOSE_INPUT_SIZE)?;

        let outputs = self
            .handpose
            .run(ort::inputs![Tensor::from_array(input)?])
            .context("failed to run handpose session")?;
        ensure!(outputs.len() >= 1, "handpose model returned no outputs");

        let coords: Vec<f32> = outputs[0].try_extract_array::<f32>()?.iter().copied().collect();
        let landmarks = decode_landmarks(&coords)?;

        let scalar_output = |index: usize| {
            if outputs.len() <= index {
                return 0.0;
            }
            outputs[index]
                .try_extract_array::<f32>()
                .ok()
                .and_then(|arr| arr.iter().next().copied())
                .unwrap_or(0.0)
        };
        let confidence = (scalar_output(1) * palm.score).clamp(0.0, 1.0);
        let handedness = scalar_output(2);

        if confidence < self.cfg.min_confidence {
            log::trace!("dropping hand with confidence {confidence:.2}");
            return Ok(None);
        }

        Ok(Some(HandLandmarks {
            keypoints: landmarks.into_iter().map(|l| transform.to_keypoint(l)).collect(),
            score: confidence,
            handedness,
        }))
    }
}

impl LandmarkDetector for HandposeDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<HandLandmarks>> {
        let palms = self.palm_detector.detect(frame)?;

        let mut hands = Vec::with_capacity(self.cfg.max_hands.min(palms.len()));
        for palm in &palms {
            if hands.len() >= self.cfg.max_hands {
                break;
            }
            match self.estimate(frame, palm) {
                Ok(Some(hand)) => hands.push(hand),
                Ok(None) => {}
                Err(err) => log::debug!("handpose estimation failed: {err:?}"),
            }
        }
        Ok(hands)
    }
}
