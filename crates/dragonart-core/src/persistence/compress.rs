//! Storage compression: fit within a bounding box, re-encode as JPEG.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::ImageData;

/// Bounds for stored images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionSettings {
    /// Longest allowed side in pixels.
    pub max_dimension: u32,
    /// JPEG quality, 1-100.
    pub jpeg_quality: u8,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            max_dimension: 1024,
            jpeg_quality: 80,
        }
    }
}

/// Re-encode `image` for storage.
///
/// Non-image payloads pass through untouched. If decoding or encoding fails
/// the original is returned, trading storage headroom for no data loss.
pub fn compress_for_storage(image: &ImageData, settings: CompressionSettings) -> ImageData {
    if !image.is_image() {
        return image.clone();
    }

    let decoded = match image::load_from_memory(image.bytes()) {
        Ok(decoded) => decoded,
        Err(e) => {
            debug!(mime = %image.mime(), error = %e, "image compression failed, keeping original");
            return image.clone();
        }
    };

    let max = settings.max_dimension.max(1);
    let fitted = if decoded.width() > max || decoded.height() > max {
        decoded.resize(max, max, FilterType::Triangle)
    } else {
        decoded
    };

    let rgb = fitted.to_rgb8();
    let mut out = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut out, settings.jpeg_quality.clamp(1, 100));
    match rgb.write_with_encoder(encoder) {
        Ok(()) => ImageData::new("image/jpeg", out.into_inner()),
        Err(e) => {
            debug!(error = %e, "jpeg encoding failed, keeping original");
            image.clone()
        }
    }
}
