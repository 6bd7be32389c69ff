use image::RgbaImage;

use crate::domain::error::{EngineError, EngineResult};
use super::constants::{IMAGE_MAGIC, RGBA_CHANNELS};

/// Decode any supported still image to an RGBA8 grid at native resolution.
/// Container metadata (EXIF, ICC profiles, text chunks) is dropped by construction.
pub fn decode_pixels(bytes: &[u8]) -> EngineResult<RgbaImage> {
  let format = image::guess_format(bytes)
    .map_err(|_| EngineError::UnsupportedFormat("unrecognized image container".into()))?;
  let decoded = image::load_from_memory_with_format(bytes, format)?;
  let pixels = decoded.to_rgba8();
  if pixels.width() == 0 || pixels.height() == 0 {
    return Err(EngineError::UnsupportedFormat("image has no pixels".into()));
  }
  Ok(pixels)
}

/// Length of the canonical raster for the given dimensions.
pub fn raster_len(width: u32, height: u32) -> usize {
  IMAGE_MAGIC.len() + 8 + width as usize * height as usize * RGBA_CHANNELS
}

/// Append the canonical raster encoding of `pixels` to `out`.
pub fn append_raster(out: &mut Vec<u8>, pixels: &RgbaImage) {
  out.reserve(raster_len(pixels.width(), pixels.height()));
  out.extend_from_slice(IMAGE_MAGIC);
  out.extend_from_slice(&pixels.width().to_be_bytes());
  out.extend_from_slice(&pixels.height().to_be_bytes());
  out.extend_from_slice(pixels.as_raw());
}

pub fn encode_raster(pixels: &RgbaImage) -> Vec<u8> {
  let mut out = Vec::new();
  append_raster(&mut out, pixels);
  out
}
