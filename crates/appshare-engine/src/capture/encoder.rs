//! JPEG encoding of captured frames.

use appshare_display::RawFrame;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ExtendedColorType, RgbImage};

use crate::error::{EngineError, Result};

/// An encoded frame and its pixel size after any downscaling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    pub width: u32,
    pub height: u32,
    pub jpeg: Vec<u8>,
}

/// Downscale to at most `max_width` (keeping the aspect ratio) and encode.
pub fn encode_jpeg(raw: RawFrame, quality: u8, max_width: u32) -> Result<EncodedFrame> {
    let (width, height) = (raw.width, raw.height);
    if width == 0 || height == 0 {
        return Err(EngineError::EncodingFailure(format!(
            "empty frame {width}x{height}"
        )));
    }
    let image = RgbImage::from_raw(width, height, raw.rgb).ok_or_else(|| {
        EngineError::EncodingFailure(format!("buffer does not match {width}x{height}"))
    })?;

    let image = if max_width > 0 && width > max_width {
        let scaled_height = ((height as u64 * max_width as u64) / width as u64).max(1) as u32;
        image::imageops::resize(&image, max_width, scaled_height, FilterType::Triangle)
    } else {
        image
    };

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality.clamp(1, 100))
        .encode(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgb8,
        )
        .map_err(|e| EngineError::EncodingFailure(e.to_string()))?;

    Ok(EncodedFrame {
        width: image.width(),
        height: image.height(),
        jpeg,
    })
}
