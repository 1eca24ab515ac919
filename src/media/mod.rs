//! Image ingestion pipeline.
//!
//! # Architecture
//!
//! ```text
//!   raw bytes ──► detect ──► source ──► color ──► normalize ──► JPEG + metadata
//!                (gate)     (decode)   (flatten)     ▲
//!                                                    │
//!                                               compress
//!                                          (quality / scale ladders)
//! ```
//!
//! # Components
//!
//! - [`is_image_by_filename`] / [`validate_image_content`]: two-stage upload gate
//! - [`SourceImage`]: decoded pixels plus facts about the original encoding
//! - [`ColorMode`]: closed classification of colour layouts and their flattening
//! - [`Normalizer`]: decode, flatten, shrink-to-fit, encode as JPEG
//! - [`AdaptiveCompressor`]: repeated encodes until a byte budget is met
//! - [`ImageMetadata`]: what happened, attached to every response

mod color;
mod compress;
mod detect;
mod heif;
mod metadata;
mod normalize;
mod source;

pub use color::{composite_on_white, ColorMode};
pub use compress::{
    AdaptiveCompressor, DEFAULT_TARGET_BYTES, MAXIMUM_EFFORT, QUALITY_LADDER, RESIZE_QUALITY,
    SCALE_LADDER,
};
pub use detect::{
    file_extension, inspect_image_content, is_heic_filename, is_heif_container,
    is_image_by_filename, sniff_format, validate_image_content, SourceFormat, ALLOWED_EXTENSIONS,
    MAX_IMAGE_DIMENSION,
};
pub use heif::heif_supported;
pub use metadata::{
    CompressionLevel, Dimensions, ImageMetadata, OriginalInfo, ProcessingMethod,
    OUTPUT_FORMAT_NAME,
};
pub use normalize::{
    clamp_quality, encode_jpeg, fit_within, CompressionAttempt, NormalizedImage, Normalizer,
    PreparedImage, DEFAULT_JPEG_QUALITY, DEFAULT_MAX_HEIGHT, DEFAULT_MAX_WIDTH, MAX_JPEG_QUALITY,
    MIN_JPEG_QUALITY,
};
pub use source::SourceImage;
