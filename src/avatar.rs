//! Square crop of the profile picture picked at login.

use crate::error::InputError;
use crate::models::EmbeddedImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use tracing::debug;

const JPEG_QUALITY: u8 = 90;

/// Pixel rectangle in the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    /// 1:1 crop centered in a `width` x `height` image: 90% of the width,
    /// shrunk to the height when the image is wider than tall.
    pub fn centered_square(width: u32, height: u32) -> Self {
        let side = (width * 9 / 10).min(height).max(1);
        Self {
            x: width.saturating_sub(side) / 2,
            y: height.saturating_sub(side) / 2,
            width: side,
            height: side,
        }
    }

    fn clamp_to(self, width: u32, height: u32) -> Self {
        let x = self.x.min(width.saturating_sub(1));
        let y = self.y.min(height.saturating_sub(1));
        Self {
            x,
            y,
            width: self.width.min(width - x).max(1),
            height: self.height.min(height - y).max(1),
        }
    }
}

/// Crops `image` to `rect`, or to the centered square when `rect` is
/// `None`, and re-encodes the result as JPEG.
pub fn crop_avatar(
    image: &EmbeddedImage,
    rect: Option<CropRect>,
) -> Result<EmbeddedImage, InputError> {
    let bytes = STANDARD
        .decode(&image.data)
        .map_err(|e| InputError::ImageDecode(e.to_string()))?;
    let decoded =
        image::load_from_memory(&bytes).map_err(|e| InputError::ImageDecode(e.to_string()))?;

    let (width, height) = (decoded.width(), decoded.height());
    if width == 0 || height == 0 {
        return Err(InputError::ImageDecode("image has no pixels".to_string()));
    }
    let rect = rect
        .unwrap_or_else(|| CropRect::centered_square(width, height))
        .clamp_to(width, height);
    debug!("Cropping avatar {}x{} to {:?}", width, height, rect);

    let cropped = decoded
        .crop_imm(rect.x, rect.y, rect.width, rect.height)
        .to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY)
        .encode_image(&cropped)
        .map_err(|e| InputError::ImageDecode(e.to_string()))?;

    Ok(EmbeddedImage {
        mime_type: "image/jpeg".to_string(),
        data: STANDARD.encode(out),
    })
}
