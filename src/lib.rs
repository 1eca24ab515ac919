//! # Site CMS
//!
//! Content management backend for a small business website.
//!
//! Most of the API is thin CRUD over a document store. The engineering core
//! is the image ingestion pipeline: uploads in any common format (including
//! HEIC from phones) are validated, normalized to web-safe JPEG and, when
//! large, compressed adaptively towards a byte budget.
//!
//! ## Features
//!
//! - **Two-stage upload gate**: extension allow-list plus a structural decode
//! - **Canonical output**: every accepted image becomes an opaque, bounded JPEG
//! - **Adaptive compression**: fixed quality and scale ladders with a guaranteed fallback
//! - **HEIC/HEIF**: decoded through libheif behind the `heif` feature, rejected otherwise
//! - **Authentication**: HMAC-SHA256 signed admin bearer tokens
//! - **Contact form**: bounded, time-windowed per-client rate limiting
//! - **Notifications**: inquiry replies and job offers through a pluggable mail sender
//!
//! ## Architecture
//!
//! - [`media`] - Validation, decoding, colour flattening, normalization, compression
//! - [`upload`] - Upload orchestration and response packaging
//! - [`store`] - Document store trait and in-memory implementation
//! - [`mail`] - Outbound email trait, templates and bundled senders
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use site_cms::{create_router, MemoryStore, RouterConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = RouterConfig::new("change-me").with_admin("admin", "change-me-too");
//!     let router = create_router(MemoryStore::new(), config);
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8000").await.unwrap();
//!     axum::serve(listener, router).await.unwrap();
//! }
//! ```

pub mod config;
pub mod error;
pub mod mail;
pub mod media;
pub mod server;
pub mod store;
pub mod upload;

// Re-export commonly used types
pub use config::{Cli, Command, ConvertConfig, ServeConfig, TokenConfig};
pub use error::{
    AccountError, ConversionError, FormError, MailError, StoreError, UploadError, ValidationError,
};
pub use mail::{Email, LogMailer, MailSender, MemoryMailer};
pub use media::{
    is_image_by_filename, validate_image_content, AdaptiveCompressor, ImageMetadata, Normalizer,
};
pub use server::{
    create_dev_router, create_router, AppState, AuthError, ErrorResponse, RouterConfig, TokenAuth,
};
pub use store::{Document, DocumentStore, MemoryStore};
pub use upload::{FileInfo, ProcessingPath, UploadLimits, UploadResult, UploadService};
