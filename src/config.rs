//! Configuration management for the CMS backend.
//!
//! This module provides a flexible configuration system that supports:
//! - Command-line arguments via clap
//! - Environment variables with `CMS_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Example
//!
//! ```ignore
//! use clap::Parser;
//! use site_cms::config::{Cli, Command};
//!
//! match Cli::parse().into_command() {
//!     Command::Serve(config) => println!("Listening on {}", config.bind_address()),
//!     Command::Convert(config) => println!("Converting {}", config.input.display()),
//!     Command::Token(config) => println!("Issuing token for {}", config.subject),
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `CMS_HOST` - Server bind address (default: 0.0.0.0)
//! - `CMS_PORT` - Server port (default: 8000)
//! - `CMS_AUTH_SECRET` - HMAC secret for bearer tokens
//! - `CMS_AUTH_ENABLED` - Require admin tokens on write routes (default: true)
//! - `CMS_ADMIN_USERNAME` / `CMS_ADMIN_PASSWORD` - Admin account for `/admin/login`
//! - `CMS_TOKEN_TTL` - Token lifetime in seconds (default: 86400)
//! - `CMS_MAX_UPLOAD_SIZE` - Upload ceiling in bytes (default: 50 MiB)
//! - `CMS_SOFT_THRESHOLD` - Always-process threshold in bytes (default: 15 MiB)
//! - `CMS_COMPRESSION_THRESHOLD` - Adaptive compression threshold in bytes (default: 25 MiB)
//! - `CMS_TARGET_SIZE` - Compression budget in bytes (default: 5 MiB)
//! - `CMS_MAX_WIDTH` / `CMS_MAX_HEIGHT` - Output bounds (default: 1920x1080)
//! - `CMS_JPEG_QUALITY` - Default JPEG quality (default: 85)
//! - `CMS_CONSISTENCY_QUALITY` - Quality for small uploads (default: 95)
//! - `CMS_RATE_LIMIT` / `CMS_RATE_WINDOW` - Contact-form quota per window in seconds
//! - `CMS_TRUST_FORWARDED` - Key the contact-form limiter on `X-Forwarded-For` (default: false)
//! - `CMS_PASSWORD_COST` - bcrypt cost for stored admin passwords (default: 12)
//! - `CMS_SITE_NAME` - Business name in outgoing email
//! - `CMS_CORS_ORIGINS` - Comma-separated allowed origins

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::media::{
    DEFAULT_JPEG_QUALITY, DEFAULT_MAX_HEIGHT, DEFAULT_MAX_WIDTH, DEFAULT_TARGET_BYTES,
};
use crate::mail::DEFAULT_SITE_NAME;
use crate::server::accounts::DEFAULT_PASSWORD_COST;
use crate::server::auth::DEFAULT_TOKEN_TTL;
use crate::server::ratelimit::{DEFAULT_RATE_LIMIT, DEFAULT_RATE_WINDOW};
use crate::upload::{
    UploadLimits, DEFAULT_COMPRESSION_THRESHOLD, DEFAULT_CONSISTENCY_QUALITY,
    DEFAULT_MAX_UPLOAD_SIZE, DEFAULT_SOFT_THRESHOLD,
};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 8000;

/// Default subject for tokens minted from the command line.
pub const DEFAULT_TOKEN_SUBJECT: &str = "admin";

// =============================================================================
// CLI Arguments
// =============================================================================

/// Site CMS - content backend with an image ingestion pipeline.
///
/// Runs the HTTP API by default; `convert` and `token` are offline helpers.
#[derive(Parser, Debug, Clone)]
#[command(name = "site-cms")]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Server options when no subcommand is given.
    #[command(flatten)]
    pub serve: ServeConfig,
}

impl Cli {
    /// Resolve the command to run, defaulting to `serve`.
    pub fn into_command(self) -> Command {
        self.command.unwrap_or(Command::Serve(self.serve))
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP API (default).
    Serve(ServeConfig),

    /// Convert a local image file through the upload pipeline.
    Convert(ConvertConfig),

    /// Mint an admin bearer token.
    Token(TokenConfig),
}

// =============================================================================
// Serve
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "CMS_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "CMS_PORT")]
    pub port: u16,

    // =========================================================================
    // Authentication Configuration
    // =========================================================================
    /// Secret key for HMAC-SHA256 bearer tokens.
    ///
    /// If not provided and auth is enabled, the server will fail to start.
    #[arg(long, env = "CMS_AUTH_SECRET")]
    pub auth_secret: Option<String>,

    /// Require admin bearer tokens on write routes.
    ///
    /// WARNING: Only disable authentication in development/testing.
    #[arg(long, default_value_t = true, env = "CMS_AUTH_ENABLED", action = clap::ArgAction::Set)]
    pub auth_enabled: bool,

    /// Admin username accepted by `/admin/login`.
    #[arg(long, env = "CMS_ADMIN_USERNAME")]
    pub admin_username: Option<String>,

    /// Admin password accepted by `/admin/login`.
    #[arg(long, env = "CMS_ADMIN_PASSWORD", hide_env_values = true)]
    pub admin_password: Option<String>,

    /// Lifetime of issued tokens in seconds.
    #[arg(long, default_value_t = DEFAULT_TOKEN_TTL.as_secs(), env = "CMS_TOKEN_TTL")]
    pub token_ttl: u64,

    /// bcrypt cost for admin accounts created through `/admin/add` (4-31).
    #[arg(long, default_value_t = DEFAULT_PASSWORD_COST, env = "CMS_PASSWORD_COST")]
    pub password_cost: u32,

    // =========================================================================
    // Upload Configuration
    // =========================================================================
    /// Largest accepted upload in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_SIZE, env = "CMS_MAX_UPLOAD_SIZE")]
    pub max_upload_size: usize,

    /// Uploads above this many bytes are always re-encoded.
    #[arg(long, default_value_t = DEFAULT_SOFT_THRESHOLD, env = "CMS_SOFT_THRESHOLD")]
    pub soft_threshold: usize,

    /// Uploads above this many bytes go through adaptive compression.
    #[arg(long, default_value_t = DEFAULT_COMPRESSION_THRESHOLD, env = "CMS_COMPRESSION_THRESHOLD")]
    pub compression_threshold: usize,

    /// Byte budget for adaptive compression.
    #[arg(long, default_value_t = DEFAULT_TARGET_BYTES, env = "CMS_TARGET_SIZE")]
    pub target_size: usize,

    /// Maximum output width in pixels.
    #[arg(long, default_value_t = DEFAULT_MAX_WIDTH, env = "CMS_MAX_WIDTH")]
    pub max_width: u32,

    /// Maximum output height in pixels.
    #[arg(long, default_value_t = DEFAULT_MAX_HEIGHT, env = "CMS_MAX_HEIGHT")]
    pub max_height: u32,

    /// JPEG quality above the soft threshold (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, env = "CMS_JPEG_QUALITY")]
    pub jpeg_quality: u8,

    /// JPEG quality for small uploads (1-100).
    #[arg(long, default_value_t = DEFAULT_CONSISTENCY_QUALITY, env = "CMS_CONSISTENCY_QUALITY")]
    pub consistency_quality: u8,

    // =========================================================================
    // Contact Form Configuration
    // =========================================================================
    /// Contact-form submissions allowed per client per window.
    #[arg(long, default_value_t = DEFAULT_RATE_LIMIT, env = "CMS_RATE_LIMIT")]
    pub rate_limit: u32,

    /// Contact-form rate-limit window in seconds.
    #[arg(long, default_value_t = DEFAULT_RATE_WINDOW.as_secs(), env = "CMS_RATE_WINDOW")]
    pub rate_window: u64,

    /// Identify contact-form clients by the first `X-Forwarded-For` hop.
    ///
    /// Only enable behind a reverse proxy that overwrites the header.
    #[arg(long, default_value_t = false, env = "CMS_TRUST_FORWARDED", action = clap::ArgAction::Set)]
    pub trust_forwarded: bool,

    // =========================================================================
    // Email Configuration
    // =========================================================================
    /// Business name used in outgoing email subjects and signatures.
    #[arg(long, default_value = DEFAULT_SITE_NAME, env = "CMS_SITE_NAME")]
    pub site_name: String,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "CMS_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        // Check auth secret is provided when auth is enabled
        if self.auth_enabled && self.auth_secret.as_deref().unwrap_or("").is_empty() {
            return Err(
                "Authentication is enabled but no secret provided. \
                 Set --auth-secret or CMS_AUTH_SECRET, or disable auth with --auth-enabled=false"
                    .to_string(),
            );
        }

        if self.admin_username.is_some() != self.admin_password.is_some() {
            return Err(
                "admin_username and admin_password must be set together".to_string(),
            );
        }

        if self.token_ttl == 0 {
            return Err("token_ttl must be greater than 0".to_string());
        }

        if !(4..=31).contains(&self.password_cost) {
            return Err("password_cost must be between 4 and 31".to_string());
        }

        self.upload_limits_checked().map(|_| ())?;

        if self.rate_limit == 0 {
            return Err("rate_limit must be greater than 0".to_string());
        }
        if self.rate_window == 0 {
            return Err("rate_window must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the auth secret, or an empty string when unset (call validate() first).
    pub fn auth_secret_or_empty(&self) -> &str {
        self.auth_secret.as_deref().unwrap_or("")
    }

    /// Admin account, if both halves are configured.
    pub fn admin_credentials(&self) -> Option<(&str, &str)> {
        match (&self.admin_username, &self.admin_password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }

    /// Upload limits built from the configuration.
    pub fn upload_limits(&self) -> UploadLimits {
        UploadLimits {
            max_upload_size: self.max_upload_size,
            soft_threshold: self.soft_threshold,
            compression_threshold: self.compression_threshold,
            target_size: self.target_size,
            max_width: self.max_width,
            max_height: self.max_height,
            default_quality: self.jpeg_quality,
            consistency_quality: self.consistency_quality,
        }
    }

    fn upload_limits_checked(&self) -> Result<UploadLimits, String> {
        let limits = self.upload_limits();

        if limits.max_upload_size == 0 {
            return Err("max_upload_size must be greater than 0".to_string());
        }
        if limits.soft_threshold > limits.compression_threshold {
            return Err("soft_threshold must not exceed compression_threshold".to_string());
        }
        if limits.compression_threshold > limits.max_upload_size {
            return Err("compression_threshold must not exceed max_upload_size".to_string());
        }
        if limits.target_size == 0 {
            return Err("target_size must be greater than 0".to_string());
        }
        if limits.max_width == 0 || limits.max_height == 0 {
            return Err("max_width and max_height must be greater than 0".to_string());
        }
        validate_quality("jpeg_quality", limits.default_quality)?;
        validate_quality("consistency_quality", limits.consistency_quality)?;

        Ok(limits)
    }
}

fn validate_quality(name: &str, quality: u8) -> Result<(), String> {
    if quality == 0 || quality > 100 {
        return Err(format!("{} must be between 1 and 100", name));
    }
    Ok(())
}

// =============================================================================
// Convert
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct ConvertConfig {
    /// Image file to convert.
    pub input: PathBuf,

    /// Output path (default: input with a .jpg extension).
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Maximum output width in pixels.
    #[arg(long, default_value_t = DEFAULT_MAX_WIDTH)]
    pub max_width: u32,

    /// Maximum output height in pixels.
    #[arg(long, default_value_t = DEFAULT_MAX_HEIGHT)]
    pub max_height: u32,

    /// JPEG quality (1-100).
    #[arg(short, long, default_value_t = DEFAULT_JPEG_QUALITY)]
    pub quality: u8,

    /// Compress adaptively towards this many bytes instead of a single encode.
    #[arg(long)]
    pub target_size: Option<usize>,

    /// Print the metadata as JSON.
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl ConvertConfig {
    pub fn validate(&self) -> Result<(), String> {
        validate_quality("quality", self.quality)?;
        if self.max_width == 0 || self.max_height == 0 {
            return Err("max_width and max_height must be greater than 0".to_string());
        }
        if self.target_size == Some(0) {
            return Err("target_size must be greater than 0".to_string());
        }
        if self.output_path() == self.input {
            return Err(format!(
                "Refusing to overwrite input file {}; pass --output",
                self.input.display()
            ));
        }
        Ok(())
    }

    /// Where the converted JPEG is written.
    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| self.input.with_extension("jpg"))
    }
}

// =============================================================================
// Token
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct TokenConfig {
    /// Secret key for HMAC-SHA256 bearer tokens.
    #[arg(long, env = "CMS_AUTH_SECRET", hide_env_values = true)]
    pub secret: String,

    /// Token subject.
    #[arg(long, default_value = DEFAULT_TOKEN_SUBJECT)]
    pub subject: String,

    /// Token lifetime in seconds.
    #[arg(long, default_value_t = DEFAULT_TOKEN_TTL.as_secs())]
    pub ttl: u64,

    /// Print the login-style JSON response instead of the bare token.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

impl TokenConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.secret.is_empty() {
            return Err("Secret key is required. Set --secret or CMS_AUTH_SECRET".to_string());
        }
        if self.subject.trim().is_empty() {
            return Err("subject must not be empty".to_string());
        }
        if self.ttl == 0 {
            return Err("ttl must be greater than 0".to_string());
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
