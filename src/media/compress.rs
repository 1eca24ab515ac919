//! Adaptive compression towards a byte budget.
//!
//! The compressor walks two fixed ladders, stopping at the first encode that
//! fits the budget:
//!
//! ```text
//!  Phase A: quality   85 → 75 → 65 → 55 → 45 → 35     @ 1920x1080
//!  Phase B: scale    0.8 → 0.6 → 0.4 → 0.3            @ quality 35
//!  Fallback:                                            quality 20 @ 800x600
//! ```
//!
//! Quality drops come before dimension drops. The ladders are fixed rather
//! than searched, so the worst case is eleven encodes. The fallback result is
//! returned whatever its size and is tagged `target_achieved: false`.

use tracing::{debug, info, warn};

use crate::error::ConversionError;

use super::metadata::CompressionLevel;
use super::normalize::{
    CompressionAttempt, NormalizedImage, PreparedImage, DEFAULT_MAX_HEIGHT, DEFAULT_MAX_WIDTH,
};
use super::source::SourceImage;

/// Default byte budget: 5 MiB.
pub const DEFAULT_TARGET_BYTES: usize = 5 * 1024 * 1024;

/// Phase A qualities, tried in order.
pub const QUALITY_LADDER: [u8; 6] = [85, 75, 65, 55, 45, 35];

/// Phase B scale factors applied to the default bounds, tried in order.
pub const SCALE_LADDER: [f64; 4] = [0.8, 0.6, 0.4, 0.3];

/// Quality used for every Phase B attempt.
pub const RESIZE_QUALITY: u8 = 35;

/// Settings for the final attempt.
pub const MAXIMUM_EFFORT: CompressionAttempt = CompressionAttempt::new(20, 800, 600);

/// Drives the normalizer down the quality and scale ladders.
#[derive(Debug, Clone)]
pub struct AdaptiveCompressor {
    max_width: u32,
    max_height: u32,
}

impl Default for AdaptiveCompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl AdaptiveCompressor {
    /// Compressor using the default 1920x1080 bounds.
    pub fn new() -> Self {
        Self::with_bounds(DEFAULT_MAX_WIDTH, DEFAULT_MAX_HEIGHT)
    }

    /// Compressor whose ladders are based on custom bounds.
    pub fn with_bounds(max_width: u32, max_height: u32) -> Self {
        Self {
            max_width,
            max_height,
        }
    }

    /// Phase A attempts.
    pub fn quality_ladder(&self) -> impl Iterator<Item = CompressionAttempt> + '_ {
        QUALITY_LADDER
            .iter()
            .map(move |&q| CompressionAttempt::new(q, self.max_width, self.max_height))
    }

    /// Phase B attempts, paired with their scale factor.
    pub fn scale_ladder(&self) -> impl Iterator<Item = (f64, CompressionAttempt)> + '_ {
        SCALE_LADDER.iter().map(move |&factor| {
            let width = ((self.max_width as f64 * factor).round() as u32).max(1);
            let height = ((self.max_height as f64 * factor).round() as u32).max(1);
            (
                factor,
                CompressionAttempt::new(RESIZE_QUALITY, width, height),
            )
        })
    }

    /// Decode `bytes` and compress towards `target_bytes`.
    pub fn compress_to_target(
        &self,
        bytes: &[u8],
        target_bytes: usize,
    ) -> Result<NormalizedImage, ConversionError> {
        let source = SourceImage::decode(bytes)?;
        self.compress_source(source, target_bytes)
    }

    /// Compress an already decoded image towards `target_bytes`.
    pub fn compress_source(
        &self,
        source: SourceImage,
        target_bytes: usize,
    ) -> Result<NormalizedImage, ConversionError> {
        let prepared = PreparedImage::from_source(source);
        self.compress_prepared(&prepared, target_bytes)
    }

    /// Run the ladders over flattened pixels.
    pub fn compress_prepared(
        &self,
        prepared: &PreparedImage,
        target_bytes: usize,
    ) -> Result<NormalizedImage, ConversionError> {
        let original_size = prepared.original().size;
        info!(
            original_size,
            target_bytes, "Compressing image towards byte budget"
        );

        for attempt in self.quality_ladder() {
            if let Some(output) = try_attempt(prepared, attempt, target_bytes) {
                info!(
                    quality = attempt.quality,
                    final_size = output.data.len(),
                    "Budget met by quality reduction"
                );
                return Ok(NormalizedImage {
                    metadata: output
                        .metadata
                        .with_compression(CompressionLevel::Progressive, true),
                    data: output.data,
                });
            }
        }

        for (factor, attempt) in self.scale_ladder() {
            if let Some(output) = try_attempt(prepared, attempt, target_bytes) {
                info!(
                    scale_factor = factor,
                    final_size = output.data.len(),
                    "Budget met by resizing"
                );
                return Ok(NormalizedImage {
                    metadata: output
                        .metadata
                        .with_compression(CompressionLevel::ProgressiveWithResize, true)
                        .with_scale_factor(factor),
                    data: output.data,
                });
            }
        }

        let output = prepared.encode(MAXIMUM_EFFORT)?;
        warn!(
            final_size = output.data.len(),
            target_bytes, "Budget not met; returning maximum-effort encoding"
        );
        Ok(NormalizedImage {
            metadata: output
                .metadata
                .with_compression(CompressionLevel::MaximumEffort, false),
            data: output.data,
        })
    }
}

/// Encode once. `None` when the result is over budget or the encode failed.
fn try_attempt(
    prepared: &PreparedImage,
    attempt: CompressionAttempt,
    target_bytes: usize,
) -> Option<NormalizedImage> {
    match prepared.encode(attempt) {
        Ok(output) if output.data.len() <= target_bytes => Some(output),
        Ok(output) => {
            debug!(
                quality = attempt.quality,
                max_width = attempt.max_width,
                max_height = attempt.max_height,
                size = output.data.len(),
                "Attempt over budget"
            );
            None
        }
        Err(e) => {
            warn!(
                quality = attempt.quality,
                max_width = attempt.max_width,
                max_height = attempt.max_height,
                "Compression attempt failed: {}",
                e
            );
            None
        }
    }
}
