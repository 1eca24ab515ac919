//! JPEG normalizer.
//!
//! This module turns any supported upload into a web-safe JPEG.
//!
//! # Design Decisions
//!
//! - **Always decode/encode**: Even JPEG input is re-encoded, so every output
//!   has the same colour layout and no stray metadata.
//!
//! - **Flatten once**: Colour conversion happens when a [`PreparedImage`] is
//!   built. The adaptive compressor then encodes the same pixels repeatedly
//!   with different parameters.
//!
//! - **Shrink to fit, never enlarge**: Images within bounds keep their size.
//!
//! - **Optimized entropy coding**: Huffman tables are computed per image, so
//!   the same quality costs fewer bytes than the standard tables.

use bytes::Bytes;
use image::imageops::{self, FilterType};
use image::RgbImage;
use jpeg_encoder::{ColorType, Encoder};

use crate::error::ConversionError;

use super::metadata::{Dimensions, ImageMetadata, OriginalInfo};
use super::source::SourceImage;

/// Default maximum output width.
pub const DEFAULT_MAX_WIDTH: u32 = 1920;

/// Default maximum output height.
pub const DEFAULT_MAX_HEIGHT: u32 = 1080;

/// Default JPEG quality (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// Minimum allowed JPEG quality.
pub const MIN_JPEG_QUALITY: u8 = 1;

/// Maximum allowed JPEG quality.
pub const MAX_JPEG_QUALITY: u8 = 100;

// =============================================================================
// Encode Parameters
// =============================================================================

/// One (quality, max-width, max-height) parameter set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionAttempt {
    pub quality: u8,
    pub max_width: u32,
    pub max_height: u32,
}

impl CompressionAttempt {
    pub const fn new(quality: u8, max_width: u32, max_height: u32) -> Self {
        Self {
            quality,
            max_width,
            max_height,
        }
    }

    /// Default bounds at the given quality.
    pub const fn with_quality(quality: u8) -> Self {
        Self::new(quality, DEFAULT_MAX_WIDTH, DEFAULT_MAX_HEIGHT)
    }
}

impl Default for CompressionAttempt {
    fn default() -> Self {
        Self::with_quality(DEFAULT_JPEG_QUALITY)
    }
}

/// Output of a successful normalization.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    /// Encoded JPEG
    pub data: Bytes,
    pub metadata: ImageMetadata,
}

// =============================================================================
// Prepared Image
// =============================================================================

/// A decoded upload flattened to 8-bit RGB, ready to encode.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pixels: RgbImage,
    original: OriginalInfo,
}

impl PreparedImage {
    /// Flatten a decoded image according to its colour mode.
    pub fn from_source(source: SourceImage) -> Self {
        let original = OriginalInfo {
            format: source.format(),
            dimensions: source.dimensions().into(),
            mode: source.mode_name(),
            size: source.byte_len(),
        };
        let (image, mode) = source.into_parts();

        Self {
            pixels: mode.flatten(image),
            original,
        }
    }

    /// Facts about the upload before conversion.
    pub fn original(&self) -> &OriginalInfo {
        &self.original
    }

    /// Resize to fit the attempt's bounds and encode at its quality.
    pub fn encode(&self, attempt: CompressionAttempt) -> Result<NormalizedImage, ConversionError> {
        let quality = clamp_quality(attempt.quality);
        let (width, height) = self.pixels.dimensions();
        let target = fit_within(width, height, attempt.max_width, attempt.max_height);

        let resized;
        let pixels = if target == (width, height) {
            &self.pixels
        } else {
            resized = imageops::resize(&self.pixels, target.0, target.1, FilterType::Lanczos3);
            &resized
        };

        let data = encode_jpeg(pixels, quality)?;
        let metadata = ImageMetadata::converted(
            &self.original,
            data.len(),
            Dimensions::from(pixels.dimensions()),
            quality,
        );

        Ok(NormalizedImage { data, metadata })
    }
}

// =============================================================================
// Normalizer
// =============================================================================

/// Converts uploads to JPEG.
///
/// # Example
///
/// ```ignore
/// use site_cms::media::Normalizer;
///
/// let normalizer = Normalizer::new();
/// let output = normalizer.normalize(&png_bytes, 1920, 1080, 85)?;
/// assert_eq!(output.metadata.final_format, "JPEG");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Normalizer {}

impl Normalizer {
    /// Create a new normalizer.
    pub fn new() -> Self {
        Self {}
    }

    /// Decode `bytes`, flatten, shrink to fit and encode at `quality`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The format is not recognised
    /// - Decoding fails (including HEIF without libheif support)
    /// - Encoding fails
    pub fn normalize(
        &self,
        bytes: &[u8],
        max_width: u32,
        max_height: u32,
        quality: u8,
    ) -> Result<NormalizedImage, ConversionError> {
        let source = SourceImage::decode(bytes)?;
        self.normalize_source(source, CompressionAttempt::new(quality, max_width, max_height))
    }

    /// Normalize at the default bounds and quality.
    pub fn normalize_default(&self, bytes: &[u8]) -> Result<NormalizedImage, ConversionError> {
        self.normalize(
            bytes,
            DEFAULT_MAX_WIDTH,
            DEFAULT_MAX_HEIGHT,
            DEFAULT_JPEG_QUALITY,
        )
    }

    /// Normalize an already decoded image.
    pub fn normalize_source(
        &self,
        source: SourceImage,
        attempt: CompressionAttempt,
    ) -> Result<NormalizedImage, ConversionError> {
        PreparedImage::from_source(source).encode(attempt)
    }
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Encode 8-bit RGB pixels as JPEG with optimized Huffman tables.
pub fn encode_jpeg(pixels: &RgbImage, quality: u8) -> Result<Bytes, ConversionError> {
    encode_jpeg_with(pixels, quality, true)
}

fn encode_jpeg_with(
    pixels: &RgbImage,
    quality: u8,
    optimize: bool,
) -> Result<Bytes, ConversionError> {
    let (width, height) = pixels.dimensions();
    let (width, height) = match (u16::try_from(width), u16::try_from(height)) {
        (Ok(w), Ok(h)) => (w, h),
        _ => {
            return Err(ConversionError::Encode {
                message: format!("{}x{} exceeds the JPEG dimension limit", width, height),
            })
        }
    };

    let mut output = Vec::new();
    let mut encoder = Encoder::new(&mut output, clamp_quality(quality));
    encoder.set_optimized_huffman_tables(optimize);
    encoder
        .encode(pixels.as_raw(), width, height, ColorType::Rgb)
        .map_err(|e| ConversionError::Encode {
            message: e.to_string(),
        })?;

    Ok(Bytes::from(output))
}

/// Largest size with the same aspect ratio that fits inside the bounds.
///
/// Returns the input unchanged when it already fits.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    let max_width = max_width.max(1);
    let max_height = max_height.max(1);
    if width <= max_width && height <= max_height {
        return (width, height);
    }

    let ratio = (max_width as f64 / width as f64).min(max_height as f64 / height as f64);
    let new_width = ((width as f64 * ratio).round() as u32).clamp(1, max_width);
    let new_height = ((height as f64 * ratio).round() as u32).clamp(1, max_height);
    (new_width, new_height)
}

/// Clamp quality to valid range.
///
/// Values below 1 become 1, values above 100 become 100.
#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY)
}

// =============================================================================
// Tests
// =============================================================================
