//! Crop-or-pad derivation of fixed-size thumbnails.

use crate::{CaptureConfig, Error, Result};
use base64::Engine as Base64Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage, RgbaImage};

/// How a raster maps onto the thumbnail frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbnailFit {
    /// Raster is at least as tall as the frame once scaled to its width; keep
    /// the top `source_height` rows and scale them to fill.
    Crop { source_height: u32 },
    /// Raster is shorter; draw it top-anchored at `scaled_height` rows and
    /// fill the remainder with the background.
    Pad { scaled_height: u32 },
}

impl ThumbnailFit {
    /// Decide the fit of a `width` x `height` raster in a `frame_width` x `frame_height` frame.
    pub fn plan(width: u32, height: u32, frame_width: u32, frame_height: u32) -> ThumbnailFit {
        let scale = frame_width as f64 / width.max(1) as f64;
        let scaled_height = height as f64 * scale;
        if scaled_height >= frame_height as f64 {
            let source_height = (frame_height as f64 / scale).round() as u32;
            ThumbnailFit::Crop {
                source_height: source_height.clamp(1, height.max(1)),
            }
        } else {
            ThumbnailFit::Pad {
                scaled_height: (scaled_height.round() as u32).max(1),
            }
        }
    }
}

/// Derive a `thumbnail_width` x `thumbnail_height` image from `raster`.
///
/// Transparent pixels are composited over `background` first, so the result
/// is fully opaque.
pub fn derive_thumbnail(raster: &RgbaImage, config: &CaptureConfig, background: [u8; 3]) -> Result<RgbImage> {
    let (width, height) = raster.dimensions();
    if width == 0 || height == 0 {
        return Err(Error::Capture(format!("empty raster ({}x{})", width, height)));
    }
    let (frame_w, frame_h) = (config.thumbnail_width, config.thumbnail_height);

    // only the rows that survive the crop are composited
    let thumb = match ThumbnailFit::plan(width, height, frame_w, frame_h) {
        ThumbnailFit::Crop { source_height } => {
            let top = imageops::crop_imm(raster, 0, 0, width, source_height).to_image();
            let opaque = flatten(&top, background);
            imageops::resize(&opaque, frame_w, frame_h, FilterType::Triangle)
        }
        ThumbnailFit::Pad { scaled_height } => {
            let opaque = flatten(raster, background);
            let scaled = imageops::resize(&opaque, frame_w, scaled_height.min(frame_h), FilterType::Triangle);
            let mut canvas = RgbImage::from_pixel(frame_w, frame_h, Rgb(background));
            imageops::overlay(&mut canvas, &scaled, 0, 0);
            canvas
        }
    };
    Ok(thumb)
}

fn flatten(raster: &RgbaImage, background: [u8; 3]) -> RgbImage {
    let mut out = RgbImage::new(raster.width(), raster.height());
    for (dst, src) in out.pixels_mut().zip(raster.pixels()) {
        let alpha = src[3] as u32;
        for c in 0..3 {
            let blended = (src[c] as u32 * alpha + background[c] as u32 * (255 - alpha) + 127) / 255;
            dst[c] = blended as u8;
        }
    }
    out
}

/// Encode `image` as JPEG and wrap it in a `data:image/jpeg;base64,` URI.
pub fn encode_jpeg_data_uri(image: &RgbImage, quality: u8) -> Result<String> {
    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
    encoder.encode_image(image)?;
    Ok(format!(
        "data:image/jpeg;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(&buf)
    ))
}
