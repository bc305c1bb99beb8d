use anyhow::{Result, anyhow};
use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    query,
    utils::{ApiBackend, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType},
};

use super::rgba_converter::{self, PixelLayout};
use crate::{
    controller::{Acquired, FrameSource},
    error::StartupError,
};

// Prefer pixel formats that are widely supported on macOS (the built-in cameras
// often reject YUYV even though Nokhwa reports it).
const PREFERRED_PIXEL_FORMATS: &[FrameFormat] = &[
    FrameFormat::RAWRGB,
    FrameFormat::RAWBGR,
    FrameFormat::GRAY,
    FrameFormat::YUYV,
    FrameFormat::NV12,
    FrameFormat::MJPEG,
];

#[derive(Clone, Debug)]
pub struct CameraDevice {
    pub index: String,
    pub label: String,
}

/// Devices the native backend reports, for `--list-cameras`.
pub fn available_cameras() -> Result<Vec<CameraDevice>> {
    let cameras = query(ApiBackend::Auto)?;
    Ok(cameras
        .into_iter()
        .map(|info| CameraDevice {
            index: info.index().to_string(),
            label: info.human_name(),
        })
        .collect())
}

fn requested_formats() -> [RequestedFormat<'static>; 3] {
    [
        RequestedFormat::with_formats(
            RequestedFormatType::AbsoluteHighestFrameRate,
            PREFERRED_PIXEL_FORMATS,
        ),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
    ]
}

fn pixel_layout(format: FrameFormat) -> PixelLayout {
    match format {
        FrameFormat::NV12 => PixelLayout::Nv12,
        FrameFormat::YUYV => PixelLayout::Yuyv,
        FrameFormat::MJPEG => PixelLayout::Mjpeg,
        FrameFormat::RAWRGB => PixelLayout::Rgb,
        FrameFormat::RAWBGR => PixelLayout::Bgr,
        FrameFormat::GRAY => PixelLayout::Gray,
    }
}

fn open_camera(index: u32) -> Result<Camera> {
    let mut last_err = None;

    for requested in requested_formats() {
        match Camera::new(CameraIndex::Index(index), requested) {
            Ok(mut camera) => match camera.open_stream() {
                Ok(()) => return Ok(camera),
                Err(err) => last_err = Some(err.into()),
            },
            Err(err) => last_err = Some(err.into()),
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("failed to open camera with any supported format")))
}

/// Blocking reader over the first camera that opens.
pub struct CameraCapture {
    camera: Option<Camera>,
    index: u32,
}

impl CameraCapture {
    pub fn probe(indices: &[u32]) -> Result<Self, StartupError> {
        for &index in indices {
            match open_camera(index) {
                Ok(camera) => {
                    log::info!(
                        "found camera at index {index}: {}",
                        camera.info().human_name()
                    );
                    return Ok(Self {
                        camera: Some(camera),
                        index,
                    });
                }
                Err(err) => log::debug!("camera index {index} unavailable: {err:?}"),
            }
        }

        Err(StartupError::NoCamera {
            tried: indices.to_vec(),
        })
    }

    pub fn index(&self) -> u32 {
        self.index
    }
}

impl FrameSource for CameraCapture {
    fn read_frame(&mut self) -> Acquired {
        let Some(camera) = self.camera.as_mut() else {
            return Acquired::Closed;
        };
        if !camera.is_stream_open() {
            return Acquired::Closed;
        }

        let buffer = match camera.frame() {
            Ok(buffer) => buffer,
            Err(err) => {
                log::trace!("camera frame read failed: {err:?}");
                return Acquired::Unavailable;
            }
        };

        let resolution = buffer.resolution();
        match rgba_converter::to_frame(
            pixel_layout(buffer.source_frame_format()),
            buffer.buffer(),
            resolution.width_x,
            resolution.height_y,
        ) {
            Ok(frame) => Acquired::Frame(frame),
            Err(err) => {
                log::trace!("failed to decode camera frame: {err:?}");
                Acquired::Unavailable
            }
        }
    }

    fn release(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            if let Err(err) = camera.stop_stream() {
                log::warn!("failed to stop camera {}: {err:?}", self.index);
            }
        }
    }
}
