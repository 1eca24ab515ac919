//! Router configuration for the CMS API.
//!
//! This module defines the HTTP routes and applies middleware for
//! authentication, upload size limits, CORS and tracing.
//!
//! # Route Structure
//!
//! ```text
//! /health                        GET              - Health check (public)
//! /admin/login                   POST             - Issue admin token (public)
//! /submit                        POST             - Contact form (public, rate limited)
//! /upload-image                  POST             - Image ingestion (admin)
//! /inquiries/{id}/solve          PATCH            - Mark inquiry solved (admin)
//! /inquiries/{id}/reply          POST             - Email a reply (admin)
//! /job-applications/{id}/status  PATCH            - Set application status (admin)
//! /admin/add                     POST             - Create a stored admin (admin)
//! /admin/update/{id}             PATCH            - Change a stored admin (admin)
//! /{collection}                  GET, POST        - List / create (per-collection policy)
//! /{collection}/{id}             GET, PUT, DELETE - Read / update / delete (per-collection policy)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use site_cms::server::routes::{create_router, RouterConfig};
//! use site_cms::store::MemoryStore;
//!
//! let config = RouterConfig::new(std::env::var("CMS_AUTH_SECRET")?)
//!     .with_admin("admin", "correct horse battery staple")
//!     .with_cors_origins(vec!["https://www.example-builders.co.uk".to_string()]);
//!
//! let router = create_router(MemoryStore::new(), config);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, patch, post},
    Router,
};
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use super::accounts::{
    admin_add_handler, admin_update_handler, PasswordHasher, DEFAULT_PASSWORD_COST,
};
use super::auth::{collection_guard, require_admin, AdminCredentials, TokenAuth};
use super::handlers::{
    application_status_handler, create_handler, delete_handler, get_handler, health_handler,
    list_handler, login_handler, reply_handler, solve_handler, submit_handler, update_handler,
    upload_handler, AppState,
};
use super::ratelimit::{ForwardedPolicy, RateLimiter, DEFAULT_RATE_LIMIT, DEFAULT_RATE_WINDOW};
use crate::mail::{LogMailer, MailSender, DEFAULT_SITE_NAME};
use crate::store::DocumentStore;
use crate::upload::{UploadLimits, UploadService};

/// Base64 images a single collection document may carry at the upload ceiling.
pub const IMAGES_PER_DOCUMENT: usize = 4;

/// Allowance for a document's non-image fields.
const DOCUMENT_FIELDS_ALLOWANCE: usize = 64 * 1024;

// =============================================================================
// Router Configuration
// =============================================================================

/// Settings that shape the CMS router: auth, uploads, contact form and CORS.
#[derive(Clone)]
pub struct RouterConfig {
    /// Secret key for bearer-token signing
    pub auth_secret: String,

    /// Whether admin routes require a bearer token
    pub auth_enabled: bool,

    /// Lifetime of issued tokens
    pub token_ttl: Duration,

    /// Admin account for the login endpoint
    pub admin: Option<AdminCredentials>,

    /// Origins allowed by CORS; `None` means any
    pub cors_origins: Option<Vec<String>>,

    /// Upload thresholds and output bounds
    pub upload_limits: UploadLimits,

    /// Contact-form submissions allowed per window per client
    pub rate_limit: u32,

    /// Contact-form rate-limit window
    pub rate_window: Duration,

    /// Key the contact-form limiter on `X-Forwarded-For`
    pub trust_forwarded: bool,

    /// Request body limit for collection writes; `None` derives it from the
    /// upload ceiling
    pub document_body_limit: Option<usize>,

    /// Outbound email transport
    pub mailer: Arc<dyn MailSender>,

    /// bcrypt cost for stored admin passwords
    pub password_cost: u32,

    /// Business name used in outgoing email
    pub site_name: String,

    /// Wrap the router in a `TraceLayer`
    pub enable_tracing: bool,
}

impl RouterConfig {
    /// Configuration signing admin tokens with `auth_secret`.
    ///
    /// By default:
    /// - Admin routes and collection writes need a token
    /// - No admin account (login returns 503)
    /// - Any origin may call the API
    /// - Upload limits are the pipeline defaults
    /// - `X-Forwarded-For` is ignored
    /// - Email is logged, not delivered
    /// - Tracing is enabled
    pub fn new(auth_secret: impl Into<String>) -> Self {
        Self {
            auth_secret: auth_secret.into(),
            auth_enabled: true,
            token_ttl: super::auth::DEFAULT_TOKEN_TTL,
            admin: None,
            cors_origins: None,
            upload_limits: UploadLimits::default(),
            rate_limit: DEFAULT_RATE_LIMIT,
            rate_window: DEFAULT_RATE_WINDOW,
            trust_forwarded: false,
            document_body_limit: None,
            mailer: Arc::new(LogMailer),
            password_cost: DEFAULT_PASSWORD_COST,
            site_name: DEFAULT_SITE_NAME.to_string(),
            enable_tracing: true,
        }
    }

    /// Configuration with every route open.
    ///
    /// Local development and tests only.
    pub fn without_auth() -> Self {
        Self {
            auth_enabled: false,
            ..Self::new(String::new())
        }
    }

    /// Accept this admin account at the login endpoint.
    pub fn with_admin(mut self, username: impl Into<String>, password: &str) -> Self {
        self.admin = Some(AdminCredentials::new(username, password));
        self
    }

    /// Set the lifetime of issued tokens.
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// Restrict CORS to these origins. An empty list blocks cross-origin calls.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Go back to accepting any origin.
    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
        self
    }

    /// Set the upload thresholds and output bounds.
    pub fn with_upload_limits(mut self, limits: UploadLimits) -> Self {
        self.upload_limits = limits;
        self
    }

    /// Set the contact-form quota.
    pub fn with_rate_limit(mut self, limit: u32, window: Duration) -> Self {
        self.rate_limit = limit;
        self.rate_window = window;
        self
    }

    /// Trust `X-Forwarded-For` for client identity. Only behind a proxy
    /// that overwrites the header.
    pub fn with_trust_forwarded(mut self, trust: bool) -> Self {
        self.trust_forwarded = trust;
        self
    }

    /// Set the body limit for collection writes.
    pub fn with_document_body_limit(mut self, limit: usize) -> Self {
        self.document_body_limit = Some(limit);
        self
    }

    /// Body limit for collection writes.
    ///
    /// Defaults to room for [`IMAGES_PER_DOCUMENT`] base64 images at the
    /// upload ceiling.
    pub fn document_body_limit(&self) -> usize {
        self.document_body_limit.unwrap_or_else(|| {
            base64_len(self.upload_limits.max_upload_size)
                .saturating_mul(IMAGES_PER_DOCUMENT)
                .saturating_add(DOCUMENT_FIELDS_ALLOWANCE)
        })
    }

    /// Send email through `mailer`.
    pub fn with_mailer(mut self, mailer: Arc<dyn MailSender>) -> Self {
        self.mailer = mailer;
        self
    }

    /// Set the bcrypt cost for stored admin passwords.
    pub fn with_password_cost(mut self, cost: u32) -> Self {
        self.password_cost = cost;
        self
    }

    /// Sign outgoing email as `site_name`.
    pub fn with_site_name(mut self, site_name: impl Into<String>) -> Self {
        self.site_name = site_name.into();
        self
    }

    /// Turn the token checks on or off.
    pub fn with_auth_enabled(mut self, enabled: bool) -> Self {
        self.auth_enabled = enabled;
        self
    }

    /// Turn per-request tracing spans on or off.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Build the CMS router over `store`.
///
/// The router contains:
/// - Public routes (health, login, contact form)
/// - Admin routes (upload, inquiries, application status, admin accounts)
///   behind the bearer-token check
/// - Collection CRUD routes behind the per-collection access policy
/// - CORS configuration
/// - A `TraceLayer` when `enable_tracing` is set
pub fn create_router<S>(store: S, config: RouterConfig) -> Router
where
    S: DocumentStore + 'static,
{
    let auth = TokenAuth::new(&config.auth_secret).with_ttl(config.token_ttl);

    let mut app_state = AppState::new(store, auth.clone())
        .with_uploads(UploadService::new(config.upload_limits))
        .with_rate_limiter(RateLimiter::new(config.rate_limit, config.rate_window))
        .with_forwarded_policy(ForwardedPolicy {
            trust_forwarded: config.trust_forwarded,
        })
        .with_mailer(Arc::clone(&config.mailer))
        .with_passwords(PasswordHasher::new(config.password_cost))
        .with_site_name(&config.site_name);
    if let Some(admin) = config.admin.clone() {
        app_state = app_state.with_admin(admin);
    }

    // Leave headroom over the upload ceiling so oversize files get the
    // pipeline's 400 rather than a bare 413
    let body_limit = config.upload_limits.max_upload_size.saturating_mul(2);

    let mut admin_routes = Router::new()
        .route("/upload-image", post(upload_handler::<S>))
        .route("/inquiries/{id}/solve", patch(solve_handler::<S>))
        .route("/inquiries/{id}/reply", post(reply_handler::<S>))
        .route(
            "/job-applications/{id}/status",
            patch(application_status_handler::<S>),
        )
        .route("/admin/add", post(admin_add_handler::<S>))
        .route("/admin/update/{id}", patch(admin_update_handler::<S>))
        .layer(DefaultBodyLimit::max(body_limit));

    let mut collection_routes = Router::new()
        .route(
            "/{collection}",
            get(list_handler::<S>).post(create_handler::<S>),
        )
        .route(
            "/{collection}/{id}",
            get(get_handler::<S>)
                .put(update_handler::<S>)
                .delete(delete_handler::<S>),
        )
        .layer(DefaultBodyLimit::max(config.document_body_limit()));

    if config.auth_enabled {
        admin_routes = admin_routes.route_layer(middleware::from_fn_with_state(
            auth.clone(),
            require_admin,
        ));
        collection_routes = collection_routes.route_layer(middleware::from_fn_with_state(
            auth,
            collection_guard,
        ));
    }

    let public_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/admin/login", post(login_handler::<S>))
        .route("/submit", post(submit_handler::<S>));

    let router = Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .merge(collection_routes)
        .with_state(app_state)
        .layer(build_cors_layer(&config));

    // Add tracing if enabled
    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Encoded length of `n` bytes in padded base64.
fn base64_len(n: usize) -> usize {
    n.div_ceil(3).saturating_mul(4)
}

/// CORS policy for browser clients of the public site and the admin panel.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .max_age(Duration::from_secs(24 * 60 * 60));

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let allowed: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| match origin.parse() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        warn!(origin = %origin, "Ignoring unparsable CORS origin");
                        None
                    }
                })
                .collect();
            cors.allow_origin(allowed)
        }
    }
}

// =============================================================================
// Convenience Functions
// =============================================================================

/// Router with auth off and default limits, for local development.
pub fn create_dev_router<S>(store: S) -> Router
where
    S: DocumentStore + 'static,
{
    create_router(store, RouterConfig::without_auth())
}

// =============================================================================
// Tests
// =============================================================================
