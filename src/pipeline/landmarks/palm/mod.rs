mod anchors;

use std::{cmp::Ordering, f32::consts::PI, path::Path};

use anyhow::{Context, Result, anyhow, ensure};
use ort::{session::Session, value::Tensor};

use super::common::{Letterbox, PALM_INPUT_SIZE, letterbox_tensor, load_session};
use crate::{error::StartupError, types::Frame};

const PALM_KEYPOINTS: usize = 7;
const BOX_FEATURES: usize = 4 + PALM_KEYPOINTS * 2;

#[derive(Clone, Debug)]
pub struct PalmDetectorConfig {
    pub score_threshold: f32,
    pub nms_threshold: f32,
    pub top_k: usize,
}

impl Default for PalmDetectorConfig {
    fn default() -> Self {
        Self {
            score_threshold: 0.5,
            nms_threshold: 0.3,
            top_k: 32,
        }
    }
}

/// A detected palm in frame pixel coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct PalmRegion {
    pub bbox: [f32; 4],
    pub keypoints: Vec<(f32, f32)>,
    pub score: f32,
}

pub struct PalmDetector {
    session: Session,
    anchors: Vec<[f32; 2]>,
    cfg: PalmDetectorConfig,
}

impl PalmDetector {
    pub fn new(model_path: &Path, cfg: PalmDetectorConfig) -> Result<Self, StartupError> {
        Ok(Self {
            session: load_session("palm detector model", model_path)?,
            anchors: anchors::generate(PALM_INPUT_SIZE),
            cfg,
        })
    }

    /// Palms sorted by descending score.
    pub fn detect(&mut self, frame: &Frame) -> Result<Vec<PalmRegion>> {
        let (input, letterbox) = letterbox_tensor(frame, PALM_INPUT_SIZE)?;
        let outputs = self
            .session
            .run(ort::inputs![Tensor::from_array(input)?])
            .context("failed to run palm detector session")?;

        ensure!(
            outputs.len() >= 2,
            "palm detector returned {} outputs, expected at least 2",
            outputs.len()
        );

        let boxes = outputs[0].try_extract_array::<f32>()?;
        let scores = outputs[1].try_extract_array::<f32>()?;
        let boxes: Vec<f32> = boxes.iter().copied().collect();
        let scores: Vec<f32> = scores.iter().copied().collect();

        decode_palms(&boxes, &scores, &self.anchors, &letterbox, &self.cfg)
    }
}

fn decode_palms(
    boxes: &[f32],
    scores: &[f32],
    anchors: &[[f32; 2]],
    letterbox: &Letterbox,
    cfg: &PalmDetectorConfig,
) -> Result<Vec<PalmRegion>> {
    ensure!(
        boxes.len() % BOX_FEATURES == 0,
        "palm box output length {} is not a multiple of {BOX_FEATURES}",
        boxes.len()
    );
    let count = (boxes.len() / BOX_FEATURES).min(scores.len()).min(anchors.len());

    let input = PALM_INPUT_SIZE as f32;
    let scale = letterbox.orig_w.max(letterbox.orig_h) as f32;
    let bias_x = letterbox.pad_x / letterbox.scale;
    let bias_y = letterbox.pad_y / letterbox.scale;
    let to_frame = |anchor: [f32; 2], dx: f32, dy: f32| {
        (
            (dx / input + anchor[0]) * scale - bias_x,
            (dy / input + anchor[1]) * scale - bias_y,
        )
    };

    let mut candidates = Vec::new();
    for (i, anchor) in anchors.iter().take(count).enumerate() {
        let score = sigmoid(scores[i]);
        if score < cfg.score_threshold {
            continue;
        }

        let raw = &boxes[i * BOX_FEATURES..(i + 1) * BOX_FEATURES];
        let (cx, cy) = to_frame(*anchor, raw[0], raw[1]);
        let (half_w, half_h) = (raw[2] / input * scale / 2.0, raw[3] / input * scale / 2.0);
        if half_w <= 0.0 || half_h <= 0.0 {
            continue;
        }

        let max_x = letterbox.orig_w.saturating_sub(1) as f32;
        let max_y = letterbox.orig_h.saturating_sub(1) as f32;
        let bbox = [
            (cx - half_w).clamp(0.0, max_x),
            (cy - half_h).clamp(0.0, max_y),
            (cx + half_w).clamp(0.0, max_x),
            (cy + half_h).clamp(0.0, max_y),
        ];

        let keypoints = raw[4..]
            .chunks_exact(2)
            .map(|p| to_frame(*anchor, p[0], p[1]))
            .collect();

        candidates.push(PalmRegion {
            bbox,
            keypoints,
            score,
        });
    }

    Ok(nms(candidates, cfg.nms_threshold, cfg.top_k))
}

/// Square crop (centre, side, rotation) that comfortably contains the hand.
pub fn crop_from_palm(region: &PalmRegion) -> Result<((f32, f32), f32, f32)> {
    let center = if region.keypoints.is_empty() {
        (
            (region.bbox[0] + region.bbox[2]) * 0.5,
            (region.bbox[1] + region.bbox[3]) * 0.5,
        )
    } else {
        mean(&region.keypoints)
    };

    let box_side = (region.bbox[2] - region.bbox[0])
        .abs()
        .max((region.bbox[3] - region.bbox[1]).abs());
    let (min_x, max_x, min_y, max_y) = region.keypoints.iter().fold(
        (f32::MAX, f32::MIN, f32::MAX, f32::MIN),
        |acc, &(x, y)| (acc.0.min(x), acc.1.max(x), acc.2.min(y), acc.3.max(y)),
    );
    let keypoint_span = if region.keypoints.is_empty() {
        0.0
    } else {
        (max_x - min_x).max(max_y - min_y)
    };

    // Expand generously to avoid cropping fingers away.
    let side = box_side.max(keypoint_span).max(80.0) * 2.4;
    if !side.is_finite() || !center.0.is_finite() || !center.1.is_finite() {
        return Err(anyhow!("degenerate palm region {:?}", region.bbox));
    }

    Ok((center, side, orientation(&region.keypoints)))
}

fn mean(points: &[(f32, f32)]) -> (f32, f32) {
    let n = points.len().max(1) as f32;
    let (sx, sy) = points
        .iter()
        .fold((0.0_f32, 0.0_f32), |acc, p| (acc.0 + p.0, acc.1 + p.1));
    (sx / n, sy / n)
}

/// Rotation that turns the palm's principal axis upright.
fn orientation(points: &[(f32, f32)]) -> f32 {
    if points.len() < 2 {
        return 0.0;
    }

    let (mx, my) = mean(points);
    let n = points.len() as f32;
    let (mut xx, mut xy, mut yy) = (0.0, 0.0, 0.0);
    for &(x, y) in points {
        let (dx, dy) = (x - mx, y - my);
        xx += dx * dx;
        xy += dx * dy;
        yy += dy * dy;
    }
    let (xx, xy, yy) = (xx / n, xy / n, yy / n);

    let half_trace = (xx + yy) * 0.5;
    let det = xx * yy - xy * xy;
    let lambda = (half_trace + (half_trace * half_trace - det).max(0.0).sqrt()).max(1e-6);
    let (vx, vy) = if xy.abs() > 1e-6 {
        (lambda - yy, xy)
    } else if xx >= yy {
        (1.0, 0.0)
    } else {
        (0.0, 1.0)
    };

    vy.atan2(vx) - PI * 0.5
}

fn nms(mut candidates: Vec<PalmRegion>, threshold: f32, top_k: usize) -> Vec<PalmRegion> {
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    let mut kept: Vec<PalmRegion> = Vec::new();
    for candidate in candidates {
        if kept.len() >= top_k {
            break;
        }
        if kept.iter().all(|k| iou(&k.bbox, &candidate.bbox) < threshold) {
            kept.push(candidate);
        }
    }
    kept
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let inter_w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let inter_h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = inter_w * inter_h;
    if inter <= 0.0 {
        return 0.0;
    }

    let area = |r: &[f32; 4]| (r[2] - r[0]).max(0.0) * (r[3] - r[1]).max(0.0);
    let union = area(a) + area(b) - inter;
    if union <= 0.0 { 0.0 } else { inter / union }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
