//! Decoded upload images.

use std::io::Cursor;

use image::{DynamicImage, ImageReader};

use crate::error::ConversionError;

use super::color::{is_indexed_source, mode_name, ColorMode};
use super::detect::{sniff_format, SourceFormat};
use super::heif;

/// An uploaded image after a successful decode.
///
/// Holds the pixels together with the facts about the original encoding that
/// end up in [`ImageMetadata`](super::ImageMetadata).
#[derive(Debug, Clone)]
pub struct SourceImage {
    image: DynamicImage,
    format: SourceFormat,
    color_mode: ColorMode,
    mode_name: &'static str,
    byte_len: usize,
}

impl SourceImage {
    /// Sniff the format and decode.
    pub fn decode(bytes: &[u8]) -> Result<Self, ConversionError> {
        let format = sniff_format(bytes).ok_or(ConversionError::UnknownFormat)?;
        Self::decode_as(bytes, format)
    }

    /// Decode bytes already known to be `format`.
    pub fn decode_as(bytes: &[u8], format: SourceFormat) -> Result<Self, ConversionError> {
        let image = match format.image_format() {
            Some(image_format) => ImageReader::with_format(Cursor::new(bytes), image_format)
                .decode()
                .map_err(|e| ConversionError::Decode {
                    message: e.to_string(),
                })?,
            None => heif::decode_heif(bytes)?,
        };

        let palette = is_indexed_source(format, bytes);
        let color = image.color();

        Ok(Self {
            color_mode: ColorMode::classify(color, palette),
            mode_name: mode_name(color, palette),
            image,
            format,
            byte_len: bytes.len(),
        })
    }

    /// Pixel dimensions as `(width, height)`.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }

    pub fn format(&self) -> SourceFormat {
        self.format
    }

    pub fn color_mode(&self) -> ColorMode {
        self.color_mode
    }

    /// Short colour layout name, e.g. "RGBA" or "P".
    pub fn mode_name(&self) -> &'static str {
        self.mode_name
    }

    /// Length of the encoded input in bytes.
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    /// Human-readable summary: `"PNG image (100x80)"`.
    pub fn describe(&self) -> String {
        let (w, h) = self.dimensions();
        format!("{} image ({}x{})", self.format.name(), w, h)
    }

    /// Consume the decoded image, returning its pixels and colour mode.
    pub fn into_parts(self) -> (DynamicImage, ColorMode) {
        (self.image, self.color_mode)
    }
}
