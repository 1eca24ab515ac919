//! HEIC/HEIF decoding.
//!
//! The `image` crate has no HEVC decoder, so HEIF input goes through the
//! system libheif when the `heif` feature is enabled. Builds without it
//! refuse HEIF input outright rather than handing the bytes to a decoder that
//! would misread them.

use image::DynamicImage;

use crate::error::ConversionError;

/// Whether this build can decode HEIC/HEIF.
pub const fn heif_supported() -> bool {
    cfg!(feature = "heif")
}

/// Decode the primary image of a HEIF container to 8-bit RGB(A).
#[cfg(feature = "heif")]
pub fn decode_heif(bytes: &[u8]) -> Result<DynamicImage, ConversionError> {
    use image::{RgbImage, RgbaImage};
    use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

    let decode_err = |message: String| ConversionError::Decode { message };

    let lib = LibHeif::new();
    let ctx = HeifContext::read_from_bytes(bytes).map_err(|e| decode_err(e.to_string()))?;
    let handle = ctx
        .primary_image_handle()
        .map_err(|e| decode_err(e.to_string()))?;

    let has_alpha = handle.has_alpha_channel();
    let (chroma, channels) = if has_alpha {
        (RgbChroma::Rgba, 4usize)
    } else {
        (RgbChroma::Rgb, 3usize)
    };

    let decoded = lib
        .decode(&handle, ColorSpace::Rgb(chroma), None)
        .map_err(|e| decode_err(e.to_string()))?;
    let planes = decoded.planes();
    let plane = planes
        .interleaved
        .ok_or_else(|| decode_err("HEIF image has no interleaved plane".to_string()))?;

    let (width, height) = (plane.width, plane.height);
    let row_len = width as usize * channels;
    let pixels = unpad_rows(plane.data, plane.stride, row_len, height as usize)?;

    let image = if has_alpha {
        RgbaImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgba8)
    } else {
        RgbImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8)
    };

    image.ok_or_else(|| decode_err("HEIF pixel buffer has unexpected size".to_string()))
}

/// Copy `rows` rows of `row_len` bytes out of a plane padded to `stride`.
#[cfg_attr(not(feature = "heif"), allow(dead_code))]
fn unpad_rows(
    data: &[u8],
    stride: usize,
    row_len: usize,
    rows: usize,
) -> Result<Vec<u8>, ConversionError> {
    let decode_err = |message: String| ConversionError::Decode { message };

    if stride < row_len {
        return Err(decode_err(format!(
            "HEIF plane stride {} shorter than row length {}",
            stride, row_len
        )));
    }
    let needed = stride * rows.saturating_sub(1) + row_len;
    if rows == 0 || data.len() < needed {
        return Err(decode_err(format!(
            "HEIF plane holds {} bytes, {} rows of {} need {}",
            data.len(),
            rows,
            row_len,
            needed
        )));
    }

    let mut pixels = Vec::with_capacity(row_len * rows);
    for row in data.chunks(stride).take(rows) {
        pixels.extend_from_slice(&row[..row_len]);
    }
    Ok(pixels)
}

/// Decode the primary image of a HEIF container.
///
/// Always fails: this build was compiled without the `heif` feature.
#[cfg(not(feature = "heif"))]
pub fn decode_heif(_bytes: &[u8]) -> Result<DynamicImage, ConversionError> {
    Err(ConversionError::HeifUnavailable)
}
