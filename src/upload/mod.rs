//! Upload orchestration layer.
//!
//! This module turns one raw upload into a JSON-ready result: a base64 JPEG
//! plus metadata describing what the pipeline did.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              HTTP Handlers              │
//! └────────────────────┬────────────────────┘
//!                      │  (spawn_blocking)
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │             UploadService               │
//! │   size gate → type gate → plan path     │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │       media (normalize / compress)      │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`UploadService`]: validates and processes one upload
//! - [`UploadLimits`]: thresholds, budget and output bounds
//! - [`ProcessingPath`]: which branch an accepted upload takes
//! - [`UploadResult`] / [`FileInfo`]: the packaged response body

mod service;

use serde::Serialize;

use crate::media::{
    ImageMetadata, DEFAULT_JPEG_QUALITY, DEFAULT_MAX_HEIGHT, DEFAULT_MAX_WIDTH,
    DEFAULT_TARGET_BYTES,
};

pub use service::{ProcessingPath, UploadService};

/// Content type of every converted payload.
pub const OUTPUT_CONTENT_TYPE: &str = "image/jpeg";

/// Hard ceiling on upload size: 50 MiB.
pub const DEFAULT_MAX_UPLOAD_SIZE: usize = 50 * 1024 * 1024;

/// Above this size an upload is always re-encoded at the default quality: 15 MiB.
pub const DEFAULT_SOFT_THRESHOLD: usize = 15 * 1024 * 1024;

/// Above this size the adaptive compressor runs: 25 MiB.
pub const DEFAULT_COMPRESSION_THRESHOLD: usize = 25 * 1024 * 1024;

/// Quality for the consistency pass over small uploads.
pub const DEFAULT_CONSISTENCY_QUALITY: u8 = 95;

/// Thresholds and output parameters for the upload orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    /// Uploads larger than this are rejected
    pub max_upload_size: usize,
    /// Uploads larger than this are always processed
    pub soft_threshold: usize,
    /// Uploads larger than this go through the adaptive compressor
    pub compression_threshold: usize,
    /// Byte budget handed to the compressor
    pub target_size: usize,
    pub max_width: u32,
    pub max_height: u32,
    /// Quality of the single normalization above the soft threshold
    pub default_quality: u8,
    /// Quality of the consistency pass for small uploads
    pub consistency_quality: u8,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            soft_threshold: DEFAULT_SOFT_THRESHOLD,
            compression_threshold: DEFAULT_COMPRESSION_THRESHOLD,
            target_size: DEFAULT_TARGET_BYTES,
            max_width: DEFAULT_MAX_WIDTH,
            max_height: DEFAULT_MAX_HEIGHT,
            default_quality: DEFAULT_JPEG_QUALITY,
            consistency_quality: DEFAULT_CONSISTENCY_QUALITY,
        }
    }
}

/// File-level facts returned alongside the image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileInfo {
    pub filename: String,
    pub original_size: usize,
    pub final_size: usize,
    pub content_type: String,
    pub web_compatible: bool,
}

/// Response body for a successful upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadResult {
    /// Base64 (standard alphabet) of the final payload
    pub image: String,
    pub compression_applied: bool,
    pub metadata: ImageMetadata,
    pub file_info: FileInfo,
}
