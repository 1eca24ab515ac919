//! Admin bearer-token authentication.
//!
//! Tokens are issued by `POST /admin/login` and carried in the
//! `Authorization: Bearer` header on admin requests.
//!
//! # Token Format
//!
//! ```text
//! token     = "{subject}.{expiry}.{signature}"
//! signature = hex(HMAC-SHA256(secret_key, "{subject}.{expiry}"))
//! ```
//!
//! The subject may itself contain dots (e-mail addresses); the expiry and
//! signature are split off from the right.
//!
//! # Security Properties
//!
//! - **Time-limited**: tokens expire after a configurable TTL (24 hours by default)
//! - **Constant-time comparison**: signatures and credentials are compared with `subtle`
//! - **No plaintext at rest**: the configured admin is kept as SHA-256 digests,
//!   stored admins as bcrypt hashes
//!
//! # Example
//!
//! ```rust
//! use site_cms::server::auth::TokenAuth;
//!
//! let auth = TokenAuth::new("my-secret-key");
//! let issued = auth.issue("admin@example.com");
//! let claims = auth.verify(&issued.token).unwrap();
//! assert_eq!(claims.subject, "admin@example.com");
//! ```

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::{
    extract::{Path, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use hmac::{Hmac, Mac};
use http::Method;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use super::handlers::ErrorResponse;
use crate::store::{ADMINS, INQUIRIES, JOB_APPLICATIONS};

// =============================================================================
// Types
// =============================================================================

/// HMAC-SHA256 type alias
type HmacSha256 = Hmac<Sha256>;

/// Default token lifetime: 24 hours.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Collections whose documents are only readable by admins.
pub const PRIVATE_COLLECTIONS: &[&str] = &[INQUIRIES, JOB_APPLICATIONS, ADMINS];

/// Collections that accept anonymous submissions.
pub const PUBLIC_SUBMISSION_COLLECTIONS: &[&str] = &[JOB_APPLICATIONS];

/// Authentication error types.
#[derive(Debug, Clone)]
pub enum AuthError {
    /// No Authorization header on a protected request
    MissingToken,

    /// Authorization header is not `Bearer <token>`
    MalformedHeader,

    /// Token does not have the `subject.expiry.signature` shape
    MalformedToken,

    /// Token has expired
    Expired {
        /// When the token expired
        expired_at: u64,
        /// Current time
        current_time: u64,
    },

    /// Signature does not match
    InvalidToken,

    /// Login with wrong username or password
    InvalidCredentials,

    /// Login attempted but no admin account is configured
    LoginUnavailable,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingToken => write!(f, "Not authenticated"),
            AuthError::MalformedHeader => write!(f, "Authorization header must be a bearer token"),
            AuthError::MalformedToken => write!(f, "Invalid token format"),
            AuthError::Expired {
                expired_at,
                current_time,
            } => write!(
                f,
                "Token expired at {} (current time: {})",
                expired_at, current_time
            ),
            AuthError::InvalidToken => write!(f, "Invalid token"),
            AuthError::InvalidCredentials => write!(f, "Invalid username or password"),
            AuthError::LoginUnavailable => write!(f, "Admin login is not configured"),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            AuthError::MissingToken => (StatusCode::UNAUTHORIZED, "not_authenticated"),
            AuthError::MalformedHeader | AuthError::MalformedToken => {
                (StatusCode::UNAUTHORIZED, "invalid_token_format")
            }
            AuthError::Expired { .. } => (StatusCode::UNAUTHORIZED, "token_expired"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token"),
            AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "invalid_credentials"),
            AuthError::LoginUnavailable => {
                (StatusCode::SERVICE_UNAVAILABLE, "login_unavailable")
            }
        };
        let message = self.to_string();

        // Forged tokens and failed logins are worth a warning; the rest are routine
        match &self {
            AuthError::InvalidToken | AuthError::InvalidCredentials => {
                warn!(
                    error_type = error_type,
                    status = status.as_u16(),
                    "Authentication failed: {}",
                    message
                );
            }
            _ => {
                debug!(
                    error_type = error_type,
                    status = status.as_u16(),
                    "Authentication failed: {}",
                    message
                );
            }
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);
        let mut response = (status, Json(error_response)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

// =============================================================================
// Token Authentication
// =============================================================================

/// Verified contents of a bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub subject: String,
    pub expires_at: u64,
}

/// A freshly issued token, as returned by the login endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    #[serde(rename = "access_token")]
    pub token: String,
    pub token_type: &'static str,
    /// Unix epoch seconds
    pub expires_at: u64,
}

/// Issues and verifies HMAC-SHA256 signed bearer tokens.
#[derive(Clone)]
pub struct TokenAuth {
    /// Secret key for HMAC computation
    secret_key: Vec<u8>,

    /// Lifetime of issued tokens
    ttl: Duration,
}

impl TokenAuth {
    /// Create a new authenticator with the given secret key and the default TTL.
    ///
    /// # Arguments
    ///
    /// * `secret_key` - The secret key used for HMAC computation. Should be
    ///   at least 32 bytes for security.
    pub fn new(secret_key: impl AsRef<[u8]>) -> Self {
        Self {
            secret_key: secret_key.as_ref().to_vec(),
            ttl: DEFAULT_TOKEN_TTL,
        }
    }

    /// Set the lifetime of issued tokens.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Lifetime of issued tokens.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `subject` valid for the configured TTL.
    pub fn issue(&self, subject: &str) -> IssuedToken {
        let expires_at = unix_now() + self.ttl.as_secs();
        IssuedToken {
            token: self.issue_with_expiry(subject, expires_at),
            token_type: "bearer",
            expires_at,
        }
    }

    /// Issue a token with a specific expiry timestamp.
    pub fn issue_with_expiry(&self, subject: &str, expires_at: u64) -> String {
        let signature = self.compute_signature(subject, expires_at);
        format!("{}.{}.{}", subject, expires_at, signature)
    }

    /// Verify a token against the current time.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify_at(token, unix_now())
    }

    /// Verify a token as of `current_time` (Unix epoch seconds).
    pub fn verify_at(&self, token: &str, current_time: u64) -> Result<Claims, AuthError> {
        let mut parts = token.rsplitn(3, '.');
        let signature = parts.next().ok_or(AuthError::MalformedToken)?;
        let expiry = parts.next().ok_or(AuthError::MalformedToken)?;
        let subject = parts.next().ok_or(AuthError::MalformedToken)?;
        if subject.is_empty() {
            return Err(AuthError::MalformedToken);
        }

        let expires_at = expiry
            .parse::<u64>()
            .map_err(|_| AuthError::MalformedToken)?;
        let provided_sig = hex::decode(signature).map_err(|_| AuthError::MalformedToken)?;

        // Signature first, so an expired forgery is reported as a forgery
        let expected_sig = self.compute_mac(subject, expires_at);
        if !bool::from(provided_sig.ct_eq(&expected_sig)) {
            return Err(AuthError::InvalidToken);
        }

        if current_time > expires_at {
            return Err(AuthError::Expired {
                expired_at: expires_at,
                current_time,
            });
        }

        Ok(Claims {
            subject: subject.to_string(),
            expires_at,
        })
    }

    /// Verify the bearer token carried in request headers.
    pub fn authorize(&self, headers: &HeaderMap) -> Result<Claims, AuthError> {
        self.verify(bearer_token(headers)?)
    }

    fn compute_mac(&self, subject: &str, expires_at: u64) -> Vec<u8> {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret_key).expect("HMAC can take key of any size");
        mac.update(subject.as_bytes());
        mac.update(b".");
        mac.update(expires_at.to_string().as_bytes());
        mac.finalize().into_bytes().to_vec()
    }

    fn compute_signature(&self, subject: &str, expires_at: u64) -> String {
        hex::encode(self.compute_mac(subject, expires_at))
    }
}

impl std::fmt::Debug for TokenAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuth")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::MalformedHeader)?;

    let (scheme, token) = value.split_once(' ').ok_or(AuthError::MalformedHeader)?;
    if !scheme.eq_ignore_ascii_case("bearer") || token.trim().is_empty() {
        return Err(AuthError::MalformedHeader);
    }
    Ok(token.trim())
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

// =============================================================================
// Admin Credentials
// =============================================================================

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// The configured admin account.
#[derive(Clone)]
pub struct AdminCredentials {
    username: String,
    username_digest: [u8; 32],
    password_digest: [u8; 32],
}

impl AdminCredentials {
    pub fn new(username: impl Into<String>, password: &str) -> Self {
        let username = username.into();
        Self {
            username_digest: digest(&username),
            password_digest: digest(password),
            username,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Constant-time check of a login attempt.
    pub fn verify(&self, username: &str, password: &str) -> Result<(), AuthError> {
        let user_ok = self.username_digest.ct_eq(&digest(username));
        let pass_ok = self.password_digest.ct_eq(&digest(password));
        if bool::from(user_ok & pass_ok) {
            Ok(())
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }
}

impl std::fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

fn digest(value: &str) -> [u8; 32] {
    Sha256::digest(value.as_bytes()).into()
}

// =============================================================================
// Access Policy
// =============================================================================

/// Whether a request against `collection` with `method` needs an admin token.
///
/// Reads are public except for private collections. Writes are admin-only
/// except anonymous submissions to collections that accept them.
pub fn requires_admin(collection: &str, method: &Method) -> bool {
    let is_read = *method == Method::GET || *method == Method::HEAD;
    if is_read {
        PRIVATE_COLLECTIONS.contains(&collection)
    } else {
        !(*method == Method::POST && PUBLIC_SUBMISSION_COLLECTIONS.contains(&collection))
    }
}

// =============================================================================
// Axum Middleware
// =============================================================================

/// Middleware rejecting requests without a valid admin bearer token.
///
/// # Example
///
/// ```ignore
/// use axum::{Router, middleware, routing::post};
/// use site_cms::server::auth::{TokenAuth, require_admin};
///
/// let auth = TokenAuth::new("secret-key");
/// let app = Router::new()
///     .route("/upload-image", post(upload_handler))
///     .route_layer(middleware::from_fn_with_state(auth, require_admin));
/// ```
pub async fn require_admin(
    State(auth): State<TokenAuth>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let claims = auth.authorize(request.headers())?;
    debug!(subject = %claims.subject, path = %request.uri().path(), "Admin request");
    Ok(next.run(request).await)
}

/// Middleware applying [`requires_admin`] to collection routes.
///
/// Must be layered on routes that capture a `{collection}` path parameter.
pub async fn collection_guard(
    State(auth): State<TokenAuth>,
    Path(params): Path<HashMap<String, String>>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let collection = params.get("collection").map(String::as_str).unwrap_or("");
    if requires_admin(collection, request.method()) {
        let claims = auth.authorize(request.headers())?;
        debug!(
            subject = %claims.subject,
            collection,
            method = %request.method(),
            "Admin collection request"
        );
    }
    Ok(next.run(request).await)
}

// =============================================================================
// Tests
// =============================================================================
