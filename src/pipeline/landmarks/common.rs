use std::path::Path;

use anyhow::{Context, Result, anyhow, ensure};
use fast_image_resize as fir;
use ndarray::Array4;
use ort::session::{Session, builder::GraphOptimizationLevel};
use rayon::prelude::*;

use crate::{
    error::StartupError,
    types::{Frame, KEYPOINTS_PER_HAND, Keypoint},
};

pub const HANDPOSE_INPUT_SIZE: u32 = 224;
pub const PALM_INPUT_SIZE: u32 = 192;

fn build_session(path: &Path) -> Result<Session> {
    Ok(Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(2)?
        .commit_from_file(path)?)
}

pub fn load_session(what: &'static str, path: &Path) -> Result<Session, StartupError> {
    if !path.exists() {
        return Err(StartupError::MissingArtifact {
            what,
            path: path.to_path_buf(),
        });
    }
    let session = build_session(path).map_err(|source| StartupError::ModelLoad {
        what,
        path: path.to_path_buf(),
        source,
    })?;
    log::info!("loaded {what} from {}", path.display());
    Ok(session)
}

fn check_frame(frame: &Frame) -> Result<()> {
    let expected = (frame.width as usize)
        .saturating_mul(frame.height as usize)
        .saturating_mul(4);
    ensure!(
        frame.rgba.len() == expected,
        "frame buffer size mismatch: got {}, expected {expected}",
        frame.rgba.len()
    );
    Ok(())
}

/// How a frame was scaled and padded into a square model input.
#[derive(Clone, Debug)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub orig_w: u32,
    pub orig_h: u32,
}

/// Resizes the frame to fit `size` x `size`, pads the rest black, and returns
/// an NHWC tensor in `[0, 1]`.
pub fn letterbox_tensor(frame: &Frame, size: u32) -> Result<(Array4<f32>, Letterbox)> {
    check_frame(frame)?;

    let scale = size as f32 / frame.width.max(frame.height) as f32;
    let new_w = (frame.width as f32 * scale).round().max(1.0) as u32;
    let new_h = (frame.height as f32 * scale).round().max(1.0) as u32;

    let src = fir::images::Image::from_vec_u8(
        frame.width,
        frame.height,
        frame.rgba.clone(),
        fir::PixelType::U8x4,
    )?;
    let mut dst = fir::images::Image::new(new_w, new_h, fir::PixelType::U8x4);
    let options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Interpolation(fir::FilterType::Bilinear));
    fir::Resizer::new()
        .resize(&src, &mut dst, Some(&options))
        .context("fast resize failed")?;
    let resized = dst.into_vec();

    let side = size as usize;
    let pad_x = (side.saturating_sub(new_w as usize)) / 2;
    let pad_y = (side.saturating_sub(new_h as usize)) / 2;
    let row_len = new_w as usize * 4;

    let mut canvas = vec![0u8; side * side * 4];
    for (row, src_row) in resized.chunks_exact(row_len).enumerate() {
        let start = ((pad_y + row) * side + pad_x) * 4;
        canvas[start..start + row_len].copy_from_slice(src_row);
    }

    let values: Vec<f32> = canvas
        .par_chunks_exact(4)
        .flat_map_iter(|px| {
            [
                px[0] as f32 / 255.0,
                px[1] as f32 / 255.0,
                px[2] as f32 / 255.0,
            ]
        })
        .collect();
    let tensor = Array4::from_shape_vec((1, side, side, 3), values)
        .map_err(|err| anyhow!("failed to build letterbox tensor: {err}"))?;

    Ok((
        tensor,
        Letterbox {
            scale,
            pad_x: pad_x as f32,
            pad_y: pad_y as f32,
            orig_w: frame.width,
            orig_h: frame.height,
        },
    ))
}

/// A rotated square region of the frame, sampled into a `size` x `size` input.
#[derive(Clone, Debug)]
pub struct CropTransform {
    pub center: (f32, f32),
    pub side: f32,
    pub angle: f32,
    pub size: u32,
    pub orig_w: u32,
    pub orig_h: u32,
}

impl CropTransform {
    fn offset(&self, x: f32, y: f32) -> (f32, f32) {
        let half = self.size as f32 / 2.0;
        let scale = self.side / self.size as f32;
        let (dx, dy) = ((x - half) * scale, (y - half) * scale);
        let (sin, cos) = self.angle.sin_cos();
        (
            self.center.0 + dx * cos - dy * sin,
            self.center.1 + dx * sin + dy * cos,
        )
    }

    /// Crop-input pixel coordinates to frame pixel coordinates.
    pub fn to_frame(&self, x: f32, y: f32) -> (f32, f32) {
        let (fx, fy) = self.offset(x, y);
        (
            fx.clamp(0.0, self.orig_w.saturating_sub(1) as f32),
            fy.clamp(0.0, self.orig_h.saturating_sub(1) as f32),
        )
    }

    /// A model-space landmark mapped into normalized frame coordinates.
    pub fn to_keypoint(&self, landmark: [f32; 3]) -> Keypoint {
        let (px, py) = self.to_frame(landmark[0], landmark[1]);
        let width = self.orig_w.max(1) as f32;
        let height = self.orig_h.max(1) as f32;
        let depth_scale = self.side / self.size as f32;
        Keypoint::new(px / width, py / height, landmark[2] * depth_scale / width)
    }
}

pub fn rotated_crop_tensor(
    frame: &Frame,
    center: (f32, f32),
    side: f32,
    angle: f32,
    size: u32,
) -> Result<(Array4<f32>, CropTransform)> {
    check_frame(frame)?;

    let transform = CropTransform {
        center,
        side,
        angle,
        size,
        orig_w: frame.width,
        orig_h: frame.height,
    };

    let n = size as usize;
    let values: Vec<f32> = (0..n * n)
        .into_par_iter()
        .flat_map_iter(|i| {
            let (x, y) = ((i % n) as f32 + 0.5, (i / n) as f32 + 0.5);
            let (sx, sy) = transform.offset(x, y);
            sample_rgb(frame, sx, sy)
        })
        .collect();
    let tensor = Array4::from_shape_vec((1, n, n, 3), values)
        .map_err(|err| anyhow!("failed to build crop tensor: {err}"))?;

    Ok((tensor, transform))
}

/// Bilinear sample; outside the frame reads as black.
fn sample_rgb(frame: &Frame, x: f32, y: f32) -> [f32; 3] {
    if !x.is_finite() || !y.is_finite() {
        return [0.0; 3];
    }

    let fetch = |ix: i64, iy: i64| -> [f32; 3] {
        if ix < 0 || iy < 0 || ix >= frame.width as i64 || iy >= frame.height as i64 {
            return [0.0; 3];
        }
        let idx = (iy as usize * frame.width as usize + ix as usize) * 4;
        match frame.rgba.get(idx..idx + 3) {
            Some(px) => [
                px[0] as f32 / 255.0,
                px[1] as f32 / 255.0,
                px[2] as f32 / 255.0,
            ],
            None => [0.0; 3],
        }
    };

    let (x0, y0) = (x.floor(), y.floor());
    let (tx, ty) = (x - x0, y - y0);
    let (ix, iy) = (x0 as i64, y0 as i64);
    let (c00, c10, c01, c11) = (
        fetch(ix, iy),
        fetch(ix + 1, iy),
        fetch(ix, iy + 1),
        fetch(ix + 1, iy + 1),
    );

    let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
    std::array::from_fn(|c| {
        lerp(
            lerp(c00[c], c10[c], tx),
            lerp(c01[c], c11[c], tx),
            ty,
        )
    })
}

pub fn decode_landmarks(flat: &[f32]) -> Result<Vec<[f32; 3]>> {
    ensure!(
        flat.len() >= KEYPOINTS_PER_HAND * 3,
        "unexpected landmarks length: got {}, need {}",
        flat.len(),
        KEYPOINTS_PER_HAND * 3
    );
    Ok(flat
        .chunks_exact(3)
        .take(KEYPOINTS_PER_HAND)
        .map(|c| [c[0], c[1], c[2]])
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(width: u32, height: u32, rgb: [u8; 3]) -> Frame {
        let rgba = (0..width * height)
            .flat_map(|_| [rgb[0], rgb[1], rgb[2], 255])
            .collect();
        Frame::new(rgba, width, height)
    }

    #[test]
    fn test_letterbox_pads_short_side() {
        let frame = solid_frame(40, 20, [255, 255, 255]);
        let (tensor, letterbox) = letterbox_tensor(&frame, 8).unwrap();
        assert_eq!(tensor.shape(), &[1, 8, 8, 3]);
        assert_eq!(letterbox.pad_x, 0.0);
        assert_eq!(letterbox.pad_y, 2.0);
        assert!((letterbox.scale - 0.2).abs() < 1e-6);
        assert_eq!(tensor[[0, 0, 0, 0]], 0.0);
        assert!((tensor[[0, 4, 4, 0]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_size_mismatch_is_rejected() {
        let frame = Frame::new(vec![0; 7], 2, 1);
        assert!(letterbox_tensor(&frame, 8).is_err());
        assert!(rotated_crop_tensor(&frame, (0.0, 0.0), 1.0, 0.0, 4).is_err());
    }

    #[test]
    fn test_unrotated_crop_maps_center_to_center() {
        let frame = solid_frame(100, 50, [0, 0, 0]);
        let (tensor, transform) = rotated_crop_tensor(&frame, (50.0, 25.0), 40.0, 0.0, 8).unwrap();
        assert_eq!(tensor.shape(), &[1, 8, 8, 3]);

        let (x, y) = transform.to_frame(4.0, 4.0);
        assert!((x - 50.0).abs() < 1e-4 && (y - 25.0).abs() < 1e-4);
        // One crop pixel spans five frame pixels.
        let (x, _) = transform.to_frame(6.0, 4.0);
        assert!((x - 60.0).abs() < 1e-4);
    }

    #[test]
    fn test_quarter_turn_crop_rotates_offsets() {
        let frame = solid_frame(100, 100, [0, 0, 0]);
        let (_, transform) =
            rotated_crop_tensor(&frame, (50.0, 50.0), 10.0, std::f32::consts::FRAC_PI_2, 10)
                .unwrap();
        let (x, y) = transform.to_frame(7.0, 5.0);
        assert!((x - 50.0).abs() < 1e-4, "{x}");
        assert!((y - 52.0).abs() < 1e-4, "{y}");
    }

    #[test]
    fn test_keypoint_is_normalized_by_frame_size() {
        let transform = CropTransform {
            center: (100.0, 50.0),
            side: 20.0,
            angle: 0.0,
            size: 10,
            orig_w: 200,
            orig_h: 100,
        };
        let kp = transform.to_keypoint([5.0, 5.0, 3.0]);
        assert!((kp.x - 0.5).abs() < 1e-6);
        assert!((kp.y - 0.5).abs() < 1e-6);
        assert!((kp.z - 0.03).abs() < 1e-6);
    }

    #[test]
    fn test_decode_landmarks_needs_full_hand() {
        assert!(decode_landmarks(&[0.0; 62]).is_err());
        let decoded = decode_landmarks(&(0..66).map(|v| v as f32).collect::<Vec<_>>()).unwrap();
        assert_eq!(decoded.len(), 21);
        assert_eq!(decoded[20], [60.0, 61.0, 62.0]);
    }

    #[test]
    fn test_missing_model_is_reported() {
        let err = load_session("palm detector model", Path::new("nowhere/palm.onnx")).err();
        assert!(matches!(
            err,
            Some(StartupError::MissingArtifact { what: "palm detector model", .. })
        ));
    }
}
