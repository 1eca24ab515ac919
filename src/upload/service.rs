//! Upload orchestration.
//!
//! The UploadService is the entry point for image uploads. It orchestrates:
//! - Size and filename validation
//! - Structural content validation
//! - Choosing a processing path
//! - Normalization or adaptive compression
//! - Packaging the result for transport
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        UploadService                            │
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │                   handle_upload()                       │    │
//! │  │  1. Reject empty       4. Plan processing path          │    │
//! │  │  2. Reject oversize    5. Normalize / compress          │    │
//! │  │  3. Validate type      6. Base64 + metadata             │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! │           │                    │                    │           │
//! │           ▼                    ▼                    ▼           │
//! │    ┌───────────┐      ┌──────────────┐    ┌──────────────────┐  │
//! │    │  detect   │      │  Normalizer  │    │AdaptiveCompressor│  │
//! │    └───────────┘      └──────────────┘    └──────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::error::{UploadError, ValidationError};
use crate::media::{
    inspect_image_content, is_heic_filename, is_image_by_filename, AdaptiveCompressor,
    CompressionAttempt, ImageMetadata, OriginalInfo, PreparedImage, ProcessingMethod,
    SourceFormat, ALLOWED_EXTENSIONS,
};

use super::{FileInfo, UploadLimits, UploadResult, OUTPUT_CONTENT_TYPE};

// =============================================================================
// Processing Path
// =============================================================================

/// How an accepted upload is transformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingPath {
    /// Large upload: adaptive compression towards the byte budget
    Compress,
    /// Over the soft threshold, or HEIC: one normalization at default quality
    Normalize,
    /// Small web-safe upload: one high-quality normalization for consistency
    Consistency,
}

impl ProcessingPath {
    /// Whether this path counts as compression in the response.
    pub fn compresses(&self) -> bool {
        !matches!(self, ProcessingPath::Consistency)
    }
}

// =============================================================================
// Upload Service
// =============================================================================

/// Validates, converts and packages uploaded images.
///
/// The service is stateless apart from its limits and is safe to share
/// across requests behind an `Arc`. All work is synchronous CPU-bound code;
/// async callers should run [`UploadService::handle_upload`] on a blocking
/// thread.
///
/// # Example
///
/// ```ignore
/// use site_cms::upload::{UploadLimits, UploadService};
///
/// let service = UploadService::new(UploadLimits::default());
/// let result = service.handle_upload("photo.png", &bytes)?;
/// println!("{} -> {} bytes", result.file_info.original_size, result.file_info.final_size);
/// ```
#[derive(Debug, Clone)]
pub struct UploadService {
    limits: UploadLimits,
    compressor: AdaptiveCompressor,
}

impl Default for UploadService {
    fn default() -> Self {
        Self::new(UploadLimits::default())
    }
}

impl UploadService {
    /// Create a new upload service with the given limits.
    pub fn new(limits: UploadLimits) -> Self {
        Self {
            compressor: AdaptiveCompressor::with_bounds(limits.max_width, limits.max_height),
            limits,
        }
    }

    /// Get the configured limits.
    pub fn limits(&self) -> &UploadLimits {
        &self.limits
    }

    /// Choose the processing path for an accepted upload of `len` bytes.
    pub fn plan(&self, len: usize, heic: bool) -> ProcessingPath {
        if len > self.limits.soft_threshold || heic {
            if len > self.limits.compression_threshold {
                ProcessingPath::Compress
            } else {
                ProcessingPath::Normalize
            }
        } else {
            ProcessingPath::Consistency
        }
    }

    /// Run the checks that need no decoding.
    pub fn check_preconditions(&self, filename: &str, data: &[u8]) -> Result<(), ValidationError> {
        if filename.trim().is_empty() {
            return Err(ValidationError::MissingFilename);
        }
        if data.is_empty() {
            return Err(ValidationError::EmptyFile);
        }
        if data.len() > self.limits.max_upload_size {
            return Err(ValidationError::too_large(
                data.len(),
                self.limits.max_upload_size,
            ));
        }
        if !is_image_by_filename(filename) {
            return Err(ValidationError::UnsupportedType {
                allowed: ALLOWED_EXTENSIONS.join(", "),
            });
        }
        Ok(())
    }

    /// Validate, convert and package one upload.
    ///
    /// # Errors
    ///
    /// - [`UploadError::Validation`] for empty, oversized, mistyped or corrupt uploads
    /// - [`UploadError::Processing`] when every conversion attempt failed on a
    ///   path that has no passthrough fallback
    pub fn handle_upload(&self, filename: &str, data: &[u8]) -> Result<UploadResult, UploadError> {
        self.check_preconditions(filename, data)?;

        let source = inspect_image_content(data)
            .map_err(|reason| ValidationError::InvalidImage { reason })?;

        let heic = is_heic_filename(filename) || source.format() == SourceFormat::Heif;
        let path = self.plan(data.len(), heic);
        debug!(
            filename,
            size = data.len(),
            format = source.format().name(),
            ?path,
            "Processing upload"
        );

        let prepared = PreparedImage::from_source(source);
        let (payload, metadata) = match path {
            ProcessingPath::Compress => {
                let output = self
                    .compressor
                    .compress_prepared(&prepared, self.limits.target_size)?;
                (output.data, output.metadata)
            }
            ProcessingPath::Normalize => {
                let output = prepared.encode(self.attempt(self.limits.default_quality))?;
                (output.data, output.metadata)
            }
            ProcessingPath::Consistency => {
                match prepared.encode(self.attempt(self.limits.consistency_quality)) {
                    Ok(output) => (output.data, output.metadata),
                    Err(e) => {
                        warn!(filename, "Normalization failed, returning original: {}", e);
                        (
                            Bytes::copy_from_slice(data),
                            ImageMetadata::unprocessed(prepared.original(), e.to_string()),
                        )
                    }
                }
            }
        };

        info!(
            filename,
            original_size = data.len(),
            final_size = payload.len(),
            ?path,
            "Upload processed"
        );

        Ok(package(filename, data.len(), &payload, metadata, prepared.original(), path))
    }

    fn attempt(&self, quality: u8) -> CompressionAttempt {
        CompressionAttempt::new(quality, self.limits.max_width, self.limits.max_height)
    }
}

/// Wrap the payload for transport.
///
/// A passthrough payload still holds the uploaded bytes, so its content type
/// and web-compatibility come from the source format rather than JPEG.
fn package(
    filename: &str,
    original_size: usize,
    payload: &[u8],
    metadata: ImageMetadata,
    original: &OriginalInfo,
    path: ProcessingPath,
) -> UploadResult {
    let (content_type, web_compatible) = match metadata.method {
        ProcessingMethod::NoProcessing => {
            (original.format.mime_type(), original.format.is_web_safe())
        }
        _ => (OUTPUT_CONTENT_TYPE, true),
    };

    UploadResult {
        image: STANDARD.encode(payload),
        compression_applied: path.compresses(),
        file_info: FileInfo {
            filename: filename.to_string(),
            original_size,
            final_size: payload.len(),
            content_type: content_type.to_string(),
            web_compatible,
        },
        metadata,
    }
}

// =============================================================================
// Tests
// =============================================================================
