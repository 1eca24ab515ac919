//! Metadata describing what the pipeline did to an upload.

use serde::Serialize;

use super::detect::SourceFormat;

/// Name of the only format the pipeline emits.
pub const OUTPUT_FORMAT_NAME: &str = "JPEG";

/// Pixel dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl From<(u32, u32)> for Dimensions {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

/// How the final payload was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMethod {
    /// Decoded and re-encoded as JPEG
    Converted,
    /// Original bytes returned untouched after conversion failed
    NoProcessing,
}

/// Which branch of the adaptive compressor produced the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionLevel {
    /// Quality ladder at default bounds
    Progressive,
    /// Scaled-down bounds at low quality
    ProgressiveWithResize,
    /// Last resort settings, returned whatever the size
    MaximumEffort,
}

/// Facts about the original upload, captured before conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OriginalInfo {
    pub format: SourceFormat,
    pub dimensions: Dimensions,
    pub mode: &'static str,
    pub size: usize,
}

/// Metadata attached to every upload response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageMetadata {
    pub original_size: usize,
    pub final_size: usize,
    pub original_dimensions: Dimensions,
    pub final_dimensions: Dimensions,
    pub original_format: String,
    pub final_format: String,
    pub original_mode: String,
    /// `final_size / original_size`, three decimals
    pub compression_ratio: f64,
    /// Percentage of bytes saved, one decimal (negative when the output grew)
    pub size_reduction_percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_used: Option<u8>,
    pub method: ProcessingMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression_level: Option<CompressionLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale_factor: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_achieved: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ImageMetadata {
    /// Metadata for a successful JPEG conversion.
    pub fn converted(
        original: &OriginalInfo,
        final_size: usize,
        final_dimensions: Dimensions,
        quality: u8,
    ) -> Self {
        let (compression_ratio, size_reduction_percent) = ratios(original.size, final_size);
        Self {
            original_size: original.size,
            final_size,
            original_dimensions: original.dimensions,
            final_dimensions,
            original_format: original.format.name().to_string(),
            final_format: OUTPUT_FORMAT_NAME.to_string(),
            original_mode: original.mode.to_string(),
            compression_ratio,
            size_reduction_percent,
            quality_used: Some(quality),
            method: ProcessingMethod::Converted,
            compression_level: None,
            scale_factor: None,
            target_achieved: None,
            reason: None,
        }
    }

    /// Metadata for the passthrough fallback, where the original bytes are
    /// returned because conversion failed.
    pub fn unprocessed(original: &OriginalInfo, reason: impl Into<String>) -> Self {
        Self {
            original_size: original.size,
            final_size: original.size,
            original_dimensions: original.dimensions,
            final_dimensions: original.dimensions,
            original_format: original.format.name().to_string(),
            final_format: original.format.name().to_string(),
            original_mode: original.mode.to_string(),
            compression_ratio: 1.0,
            size_reduction_percent: 0.0,
            quality_used: None,
            method: ProcessingMethod::NoProcessing,
            compression_level: None,
            scale_factor: None,
            target_achieved: None,
            reason: Some(reason.into()),
        }
    }

    /// Tag with the compressor branch and whether the budget was met.
    pub fn with_compression(mut self, level: CompressionLevel, target_achieved: bool) -> Self {
        self.compression_level = Some(level);
        self.target_achieved = Some(target_achieved);
        self
    }

    pub fn with_scale_factor(mut self, factor: f64) -> Self {
        self.scale_factor = Some(factor);
        self
    }
}

fn ratios(original: usize, final_size: usize) -> (f64, f64) {
    if original == 0 {
        return (1.0, 0.0);
    }
    let ratio = final_size as f64 / original as f64;
    let savings = (1.0 - ratio) * 100.0;
    (round_to(ratio, 3), round_to(savings, 1))
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
