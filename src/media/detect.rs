//! Format validation for uploaded images.
//!
//! Validation is a two-stage gate:
//!
//! 1. **Filename**: the lowercase extension must be in [`ALLOWED_EXTENSIONS`].
//!    This is a cheap pre-filter and never fails loudly.
//! 2. **Content**: the bytes are sniffed, the header is parsed for dimensions,
//!    and the image is fully decoded. This is the authoritative check.
//!
//! Both must pass before an upload is processed.

use std::io::Cursor;

use image::{ImageFormat, ImageReader};

use super::source::SourceImage;

/// Extensions accepted by [`is_image_by_filename`].
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "webp", "tiff", "tif", "heic", "heif",
];

/// Largest accepted width or height in pixels.
pub const MAX_IMAGE_DIMENSION: u32 = 20_000;

/// ISO-BMFF brands identifying HEIC/HEIF still images and sequences.
const HEIF_BRANDS: &[&[u8; 4]] = &[
    b"heic", b"heix", b"hevc", b"hevx", b"heim", b"heis", b"mif1", b"msf1",
];

/// Brands that share the HEIF container but carry AV1 payloads.
const AVIF_BRANDS: &[&[u8; 4]] = &[b"avif", b"avis"];

// =============================================================================
// SourceFormat
// =============================================================================

/// Encoded format of an uploaded image, detected from its magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Jpeg,
    Png,
    Gif,
    Bmp,
    WebP,
    Tiff,
    /// HEIC/HEIF (HEVC in an ISO-BMFF container)
    Heif,
}

impl SourceFormat {
    /// Upper-case format name used in metadata and validation messages.
    pub const fn name(&self) -> &'static str {
        match self {
            SourceFormat::Jpeg => "JPEG",
            SourceFormat::Png => "PNG",
            SourceFormat::Gif => "GIF",
            SourceFormat::Bmp => "BMP",
            SourceFormat::WebP => "WEBP",
            SourceFormat::Tiff => "TIFF",
            SourceFormat::Heif => "HEIF",
        }
    }

    /// MIME type of the encoded bytes.
    pub const fn mime_type(&self) -> &'static str {
        match self {
            SourceFormat::Jpeg => "image/jpeg",
            SourceFormat::Png => "image/png",
            SourceFormat::Gif => "image/gif",
            SourceFormat::Bmp => "image/bmp",
            SourceFormat::WebP => "image/webp",
            SourceFormat::Tiff => "image/tiff",
            SourceFormat::Heif => "image/heic",
        }
    }

    /// Whether browsers render this format without conversion.
    pub const fn is_web_safe(&self) -> bool {
        matches!(
            self,
            SourceFormat::Jpeg | SourceFormat::Png | SourceFormat::Gif | SourceFormat::WebP
        )
    }

    /// The `image` crate codec for this format, if it has one.
    pub fn image_format(&self) -> Option<ImageFormat> {
        match self {
            SourceFormat::Jpeg => Some(ImageFormat::Jpeg),
            SourceFormat::Png => Some(ImageFormat::Png),
            SourceFormat::Gif => Some(ImageFormat::Gif),
            SourceFormat::Bmp => Some(ImageFormat::Bmp),
            SourceFormat::WebP => Some(ImageFormat::WebP),
            SourceFormat::Tiff => Some(ImageFormat::Tiff),
            SourceFormat::Heif => None,
        }
    }

    fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Jpeg => Some(SourceFormat::Jpeg),
            ImageFormat::Png => Some(SourceFormat::Png),
            ImageFormat::Gif => Some(SourceFormat::Gif),
            ImageFormat::Bmp => Some(SourceFormat::Bmp),
            ImageFormat::WebP => Some(SourceFormat::WebP),
            ImageFormat::Tiff => Some(SourceFormat::Tiff),
            _ => None,
        }
    }
}

// =============================================================================
// Filename Checks
// =============================================================================

/// Lowercase extension of `filename`, or `None` when there is none.
///
/// A name with no dot, a trailing dot, or nothing before the dot other than
/// the dot itself (".png") has no usable extension.
pub fn file_extension(filename: &str) -> Option<String> {
    let (stem, ext) = filename.trim().rsplit_once('.')?;
    if ext.is_empty() || stem.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Returns `true` iff the filename's extension is in [`ALLOWED_EXTENSIONS`].
pub fn is_image_by_filename(filename: &str) -> bool {
    file_extension(filename)
        .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Returns `true` if the filename declares a HEIC/HEIF source.
pub fn is_heic_filename(filename: &str) -> bool {
    matches!(file_extension(filename).as_deref(), Some("heic" | "heif"))
}

// =============================================================================
// Content Sniffing
// =============================================================================

/// Detect the encoded format from magic bytes.
pub fn sniff_format(bytes: &[u8]) -> Option<SourceFormat> {
    if is_heif_container(bytes) {
        return Some(SourceFormat::Heif);
    }
    image::guess_format(bytes)
        .ok()
        .and_then(SourceFormat::from_image_format)
}

/// Returns `true` if the bytes start with an ISO-BMFF `ftyp` box whose brands
/// mark a HEIC/HEIF image.
pub fn is_heif_container(bytes: &[u8]) -> bool {
    if bytes.len() < 16 || &bytes[4..8] != b"ftyp" {
        return false;
    }

    let major = &bytes[8..12];
    if AVIF_BRANDS.iter().any(|b| major == b.as_slice()) {
        return false;
    }
    if HEIF_BRANDS.iter().any(|b| major == b.as_slice()) {
        return true;
    }

    // Compatible brands follow the 4-byte minor version
    let box_len = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    let end = box_len.min(bytes.len());
    if end <= 16 {
        return false;
    }
    bytes[16..end]
        .chunks_exact(4)
        .any(|brand| HEIF_BRANDS.iter().any(|b| brand == b.as_slice()))
}

// =============================================================================
// Content Validation
// =============================================================================

/// Structurally validate image bytes and return the decoded image.
///
/// The header is parsed first so an oversized canvas is rejected before its
/// pixels are allocated; the full decode then proves the payload is intact.
/// The error string is the user-facing reason.
pub fn inspect_image_content(bytes: &[u8]) -> Result<SourceImage, String> {
    if bytes.is_empty() {
        return Err("Empty file content".to_string());
    }

    let format = sniff_format(bytes).ok_or_else(|| "Unrecognized image format".to_string())?;

    if let Some(image_format) = format.image_format() {
        let (width, height) = ImageReader::with_format(Cursor::new(bytes), image_format)
            .into_dimensions()
            .map_err(|e| format!("Cannot read {} header: {}", format.name(), e))?;
        check_dimensions(width, height)?;
    }

    let source = SourceImage::decode_as(bytes, format).map_err(|e| e.to_string())?;
    let (width, height) = source.dimensions();
    check_dimensions(width, height)?;

    Ok(source)
}

/// Validate image bytes, returning `(valid, reason)`.
///
/// On success the reason reads `"<FORMAT> image (WxH)"`.
pub fn validate_image_content(bytes: &[u8]) -> (bool, String) {
    match inspect_image_content(bytes) {
        Ok(source) => (true, source.describe()),
        Err(reason) => (false, reason),
    }
}

fn check_dimensions(width: u32, height: u32) -> Result<(), String> {
    if width == 0 || height == 0 {
        return Err(format!("Invalid image dimensions ({}x{})", width, height));
    }
    if width > MAX_IMAGE_DIMENSION || height > MAX_IMAGE_DIMENSION {
        return Err(format!(
            "Image dimensions too large ({}x{}). Maximum is {}px",
            width, height, MAX_IMAGE_DIMENSION
        ));
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
