use anyhow::{Result, anyhow, ensure};
use rayon::prelude::*;
use yuv::{
    YuvBiPlanarImage, YuvConversionMode, YuvPackedImage, YuvRange, YuvStandardMatrix,
    yuv_nv12_to_rgba, yuyv422_to_rgba,
};
use zune_jpeg::{
    JpegDecoder,
    zune_core::{bytestream::ZCursor, colorspace::ColorSpace, options::DecoderOptions},
};

use crate::types::Frame;

/// Pixel layouts a capture device may hand us.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelLayout {
    Nv12,
    Yuyv,
    Mjpeg,
    Rgb,
    Bgr,
    Gray,
}

pub fn to_frame(layout: PixelLayout, data: &[u8], width: u32, height: u32) -> Result<Frame> {
    let pixels = width as usize * height as usize;
    let rgba = match layout {
        PixelLayout::Nv12 => nv12_to_rgba(data, width, height, pixels)?,
        PixelLayout::Yuyv => yuyv_to_rgba(data, width, height, pixels)?,
        // The JPEG header is authoritative for its own size.
        PixelLayout::Mjpeg => return mjpeg_to_frame(data, width, height),
        PixelLayout::Rgb => packed_to_rgba(data, pixels, false)?,
        PixelLayout::Bgr => packed_to_rgba(data, pixels, true)?,
        PixelLayout::Gray => gray_to_rgba(data, pixels)?,
    };
    Ok(Frame::new(rgba, width, height))
}

fn check_len(layout: &str, data: &[u8], expected: usize) -> Result<()> {
    ensure!(
        data.len() >= expected,
        "{layout} buffer too small: got {}, expected {expected}",
        data.len()
    );
    Ok(())
}

fn nv12_to_rgba(data: &[u8], width: u32, height: u32, pixels: usize) -> Result<Vec<u8>> {
    let uv_len = pixels / 2;
    check_len("NV12", data, pixels + uv_len)?;

    let image = YuvBiPlanarImage {
        y_plane: &data[..pixels],
        y_stride: width,
        uv_plane: &data[pixels..pixels + uv_len],
        uv_stride: width,
        width,
        height,
    };
    let mut rgba = vec![0u8; pixels * 4];
    yuv_nv12_to_rgba(
        &image,
        &mut rgba,
        width * 4,
        YuvRange::Full,
        YuvStandardMatrix::Bt709,
        YuvConversionMode::Balanced,
    )
    .map_err(|err| anyhow!("NV12 to RGBA failed: {err:?}"))?;
    Ok(rgba)
}

fn yuyv_to_rgba(data: &[u8], width: u32, height: u32, pixels: usize) -> Result<Vec<u8>> {
    check_len("YUYV", data, pixels * 2)?;

    let packed = YuvPackedImage {
        yuy: data,
        yuy_stride: width * 2,
        width,
        height,
    };
    let mut rgba = vec![0u8; pixels * 4];
    yuyv422_to_rgba(
        &packed,
        &mut rgba,
        width * 4,
        YuvRange::Full,
        YuvStandardMatrix::Bt709,
    )
    .map_err(|err| anyhow!("YUYV422 to RGBA failed: {err:?}"))?;
    Ok(rgba)
}

fn mjpeg_to_frame(data: &[u8], width: u32, height: u32) -> Result<Frame> {
    let options = DecoderOptions::default().jpeg_set_out_colorspace(ColorSpace::RGBA);
    let mut decoder = JpegDecoder::new_with_options(ZCursor::new(data), options);
    let rgba = decoder
        .decode()
        .map_err(|err| anyhow!("MJPEG decode failed: {err:?}"))?;
    let (decoded_w, decoded_h) = decoder
        .dimensions()
        .ok_or_else(|| anyhow!("MJPEG decoder reported no dimensions"))?;
    ensure!(
        rgba.len() == decoded_w * decoded_h * 4,
        "decoded MJPEG is {} bytes, expected {decoded_w}x{decoded_h} RGBA",
        rgba.len()
    );

    if (decoded_w, decoded_h) != (width as usize, height as usize) {
        log::debug!("MJPEG frame is {decoded_w}x{decoded_h}, camera reported {width}x{height}");
    }
    Ok(Frame::new(rgba, decoded_w as u32, decoded_h as u32))
}

fn packed_to_rgba(data: &[u8], pixels: usize, swap_rb: bool) -> Result<Vec<u8>> {
    check_len(if swap_rb { "BGR" } else { "RGB" }, data, pixels * 3)?;

    let mut rgba = vec![0u8; pixels * 4];
    rgba.par_chunks_mut(4)
        .zip(data.par_chunks_exact(3))
        .for_each(|(dst, src)| {
            let (r, b) = if swap_rb { (src[2], src[0]) } else { (src[0], src[2]) };
            dst.copy_from_slice(&[r, src[1], b, 255]);
        });
    Ok(rgba)
}

fn gray_to_rgba(data: &[u8], pixels: usize) -> Result<Vec<u8>> {
    check_len("GRAY", data, pixels)?;

    let mut rgba = vec![0u8; pixels * 4];
    rgba.par_chunks_mut(4)
        .zip(data[..pixels].par_iter().copied())
        .for_each(|(dst, v)| dst.copy_from_slice(&[v, v, v, 255]));
    Ok(rgba)
}
