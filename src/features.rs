//! Classifier input built from one hand's keypoints.
//!
//! Every keypoint is expressed relative to the wrist (keypoint 0), so moving
//! the whole hand across the frame leaves the features untouched.

use crate::{
    error::FeatureShapeMismatch,
    types::{KEYPOINTS_PER_HAND, Keypoint},
};

pub const FEATURE_LEN: usize = KEYPOINTS_PER_HAND * 3;

/// Wrist-relative coordinates, `[x0, y0, z0, x1, y1, z1, ...]`.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureVector(Vec<f32>);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

impl TryFrom<Vec<f32>> for FeatureVector {
    type Error = FeatureShapeMismatch;

    fn try_from(values: Vec<f32>) -> Result<Self, Self::Error> {
        if values.len() != FEATURE_LEN {
            return Err(FeatureShapeMismatch::VectorLength(values.len()));
        }
        Ok(Self(values))
    }
}

pub fn normalize(keypoints: &[Keypoint]) -> Result<FeatureVector, FeatureShapeMismatch> {
    if keypoints.len() != KEYPOINTS_PER_HAND {
        return Err(FeatureShapeMismatch::KeypointCount(keypoints.len()));
    }

    let wrist = keypoints[0];
    let mut values = Vec::with_capacity(FEATURE_LEN);
    for p in keypoints {
        values.push(p.x - wrist.x);
        values.push(p.y - wrist.y);
        values.push(p.z - wrist.z);
    }

    FeatureVector::try_from(values)
}

#[cfg(test)]
pub(crate) fn synthetic_hand(seed: f32) -> Vec<Keypoint> {
    (0..KEYPOINTS_PER_HAND)
        .map(|i| {
            let t = i as f32;
            Keypoint::new(
                0.4 + 0.01 * t * seed,
                0.6 - 0.015 * t,
                -0.002 * t * seed,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_has_fixed_length() {
        let features = normalize(&synthetic_hand(1.0)).unwrap();
        assert_eq!(features.as_slice().len(), FEATURE_LEN);
        assert_eq!(FEATURE_LEN, 63);
    }

    #[test]
    fn test_wrist_maps_to_origin() {
        let features = normalize(&synthetic_hand(2.0)).unwrap();
        assert_eq!(&features.as_slice()[..3], &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_values_are_wrist_relative_in_keypoint_order() {
        let mut hand = vec![Keypoint::new(0.5, 0.5, 0.1); KEYPOINTS_PER_HAND];
        hand[4] = Keypoint::new(0.75, 0.25, 0.0);
        let features = normalize(&hand).unwrap();
        let thumb_tip = &features.as_slice()[12..15];
        assert!((thumb_tip[0] - 0.25).abs() < 1e-6);
        assert!((thumb_tip[1] + 0.25).abs() < 1e-6);
        assert!((thumb_tip[2] + 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_translation_invariance() {
        let hand = synthetic_hand(1.5);
        let (dx, dy, dz) = (0.125, -0.25, 0.5);
        let moved: Vec<Keypoint> = hand
            .iter()
            .map(|p| Keypoint::new(p.x + dx, p.y + dy, p.z + dz))
            .collect();

        let a = normalize(&hand).unwrap();
        let b = normalize(&moved).unwrap();
        for (x, y) in a.as_slice().iter().zip(b.as_slice()) {
            assert!((x - y).abs() < 1e-5, "{x} vs {y}");
        }
    }

    #[test]
    fn test_wrong_keypoint_count_yields_no_vector() {
        let mut hand = synthetic_hand(1.0);
        hand.pop();
        assert_eq!(
            normalize(&hand),
            Err(FeatureShapeMismatch::KeypointCount(20))
        );
        assert_eq!(normalize(&[]), Err(FeatureShapeMismatch::KeypointCount(0)));

        let mut extra = synthetic_hand(1.0);
        extra.push(Keypoint::default());
        assert_eq!(
            normalize(&extra),
            Err(FeatureShapeMismatch::KeypointCount(22))
        );
    }

    #[test]
    fn test_vector_length_is_checked() {
        assert_eq!(
            FeatureVector::try_from(vec![0.0; 42]),
            Err(FeatureShapeMismatch::VectorLength(42))
        );
        assert!(FeatureVector::try_from(vec![0.0; 63]).is_ok());
    }
}
