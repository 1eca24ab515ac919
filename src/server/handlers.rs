//! HTTP request handlers for the CMS API.
//!
//! # Endpoints
//!
//! - `GET /health` - Health check
//! - `POST /upload-image` - Validate and convert an uploaded image
//! - `POST /admin/login` - Exchange admin credentials for a bearer token
//! - `GET|POST /{collection}` - List or create documents
//! - `GET|PUT|DELETE /{collection}/{id}` - Read, merge-update or delete a document
//! - `POST /submit` - Public contact form
//! - `PATCH /inquiries/{id}/solve` - Mark an inquiry as solved
//! - `POST /inquiries/{id}/reply` - Email a reply and mark the inquiry solved
//! - `PATCH /job-applications/{id}/status` - Set an application's status
//!
//! Admin account management lives in [`super::accounts`].

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    extract::{FromRef, Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::error::{AccountError, FormError, MailError, StoreError, UploadError, ValidationError};
use crate::mail::{escape_html, Email, LogMailer, MailSender, DEFAULT_SITE_NAME};
use crate::store::{
    into_document, is_public_collection, Document, DocumentStore, ID_FIELD, INQUIRIES,
    JOB_APPLICATIONS,
};
use crate::upload::{UploadResult, UploadService};

use super::accounts::{check_stored_login, PasswordHasher, StoredLogin};
use super::auth::{AdminCredentials, AuthError, IssuedToken, LoginRequest, TokenAuth};
use super::ratelimit::{ClientId, ForwardedPolicy, RateLimited, RateLimiter};

/// Multipart field carrying the uploaded image.
pub const UPLOAD_FIELD: &str = "file";

/// Status of a new contact-form inquiry.
pub const INQUIRY_PENDING: &str = "pending";

/// Status of an inquiry an admin has dealt with.
pub const INQUIRY_SOLVED: &str = "solved";

/// Statuses a job application can be moved to.
pub const APPLICATION_STATUSES: &[&str] = &["pending", "reviewed", "approved", "rejected"];

/// Application status that triggers the acceptance email.
pub const APPLICATION_APPROVED: &str = "approved";

// =============================================================================
// Application State
// =============================================================================

/// Shared application state.
///
/// This is passed to all handlers via Axum's State extractor.
pub struct AppState<S: DocumentStore> {
    /// Document store backing every collection
    pub store: Arc<S>,

    /// Image ingestion pipeline
    pub uploads: Arc<UploadService>,

    /// Token issuer for the login endpoint
    pub auth: TokenAuth,

    /// Admin account accepted by the login endpoint
    pub admin: Option<AdminCredentials>,

    /// Contact-form limiter
    pub rate_limiter: Arc<RateLimiter>,

    /// Whether `X-Forwarded-For` identifies rate-limited clients
    pub forwarded: ForwardedPolicy,

    /// Outbound email for replies and application decisions
    pub mailer: Arc<dyn MailSender>,

    /// Hashing for stored admin passwords
    pub passwords: PasswordHasher,

    /// Business name used in outgoing email
    pub site_name: Arc<str>,
}

impl<S: DocumentStore> AppState<S> {
    /// Create a new application state with default upload limits and rate limiter.
    pub fn new(store: S, auth: TokenAuth) -> Self {
        Self {
            store: Arc::new(store),
            uploads: Arc::new(UploadService::default()),
            auth,
            admin: None,
            rate_limiter: Arc::new(RateLimiter::default()),
            forwarded: ForwardedPolicy::default(),
            mailer: Arc::new(LogMailer),
            passwords: PasswordHasher::default(),
            site_name: Arc::from(DEFAULT_SITE_NAME),
        }
    }

    /// Use a configured upload service.
    pub fn with_uploads(mut self, uploads: UploadService) -> Self {
        self.uploads = Arc::new(uploads);
        self
    }

    /// Accept this admin account at `POST /admin/login`.
    pub fn with_admin(mut self, admin: AdminCredentials) -> Self {
        self.admin = Some(admin);
        self
    }

    /// Use a configured contact-form rate limiter.
    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.rate_limiter = Arc::new(limiter);
        self
    }

    /// Identify clients by `X-Forwarded-For` when `policy` trusts it.
    pub fn with_forwarded_policy(mut self, policy: ForwardedPolicy) -> Self {
        self.forwarded = policy;
        self
    }

    /// Send email through `mailer`.
    pub fn with_mailer(mut self, mailer: Arc<dyn MailSender>) -> Self {
        self.mailer = mailer;
        self
    }

    /// Hash stored admin passwords with `passwords`.
    pub fn with_passwords(mut self, passwords: PasswordHasher) -> Self {
        self.passwords = passwords;
        self
    }

    /// Sign outgoing email as `site_name`.
    pub fn with_site_name(mut self, site_name: &str) -> Self {
        self.site_name = Arc::from(site_name);
        self
    }
}

impl<S: DocumentStore> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            uploads: Arc::clone(&self.uploads),
            auth: self.auth.clone(),
            admin: self.admin.clone(),
            rate_limiter: Arc::clone(&self.rate_limiter),
            forwarded: self.forwarded,
            mailer: Arc::clone(&self.mailer),
            passwords: self.passwords,
            site_name: Arc::clone(&self.site_name),
        }
    }
}

impl<S: DocumentStore> FromRef<AppState<S>> for ForwardedPolicy {
    fn from_ref(state: &AppState<S>) -> Self {
        state.forwarded
    }
}

// =============================================================================
// Request and Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "validation_error")
    pub error: String,

    /// Human-readable error message
    pub detail: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(error: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            detail: detail.into(),
            status: None,
        }
    }

    /// Create a new error response with status code.
    pub fn with_status(
        error: impl Into<String>,
        detail: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            detail: detail.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}

/// Contact-form submission.
///
/// Unknown fields are ignored. The CAPTCHA token is accepted so existing
/// clients keep working but is not verified.
#[derive(Debug, Clone, Deserialize)]
pub struct ContactForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default, rename = "captchaToken", alias = "captcha_token")]
    pub captcha_token: Option<String>,
}

const MAX_NAME_LEN: usize = 200;
const MAX_EMAIL_LEN: usize = 254;
const MAX_SUBJECT_LEN: usize = 300;
const MAX_MESSAGE_LEN: usize = 5000;

impl ContactForm {
    /// Check required fields, lengths and the email shape.
    pub fn validate(&self) -> Result<(), FormError> {
        require("name", &self.name, MAX_NAME_LEN)?;
        require("email", &self.email, MAX_EMAIL_LEN)?;
        require("message", &self.message, MAX_MESSAGE_LEN)?;
        if let Some(subject) = &self.subject {
            if subject.chars().count() > MAX_SUBJECT_LEN {
                return Err(FormError::TooLong {
                    field: "subject",
                    max: MAX_SUBJECT_LEN,
                });
            }
        }
        if !is_plausible_email(self.email.trim()) {
            return Err(FormError::InvalidEmail);
        }
        Ok(())
    }

    /// Build the inquiry document stored for this submission.
    pub fn into_inquiry(self, created_at: u64) -> Document {
        let mut doc = Document::new();
        doc.insert("name".into(), json!(self.name.trim()));
        doc.insert("email".into(), json!(self.email.trim()));
        doc.insert("message".into(), json!(self.message.trim()));
        if let Some(phone) = self.phone.filter(|p| !p.trim().is_empty()) {
            doc.insert("phone".into(), json!(phone.trim()));
        }
        if let Some(subject) = self.subject.filter(|s| !s.trim().is_empty()) {
            doc.insert("subject".into(), json!(subject.trim()));
        }
        doc.insert("status".into(), json!(INQUIRY_PENDING));
        doc.insert("is_solved".into(), json!(false));
        doc.insert("created_at".into(), json!(created_at));
        doc
    }
}

fn require(field: &'static str, value: &str, max: usize) -> Result<(), FormError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(FormError::MissingField(field));
    }
    if value.chars().count() > max {
        return Err(FormError::TooLong { field, max });
    }
    Ok(())
}

/// `local@domain.tld` with no whitespace and a dot inside the domain.
pub fn is_plausible_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..")
}

/// Plain acknowledgement.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Body of `POST /inquiries/{id}/reply`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplyRequest {
    #[serde(default)]
    pub plain_text_body: String,
    #[serde(default)]
    pub html_body: String,
}

/// Query of `PATCH /job-applications/{id}/status`.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusQuery {
    pub status: String,
}

/// Response from the application status endpoint.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub message: String,
    pub email_sent: bool,
    pub application: Document,
}

/// Response from the contact-form endpoint.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub message: String,
    pub id: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

fn log_error(status: StatusCode, error_type: &str, message: &str) {
    if status.is_server_error() {
        error!(
            error_type = error_type,
            status = status.as_u16(),
            "Server error: {}",
            message
        );
    } else if status == StatusCode::NOT_FOUND {
        debug!(
            error_type = error_type,
            status = status.as_u16(),
            "Resource not found: {}",
            message
        );
    } else if status.is_client_error() {
        warn!(
            error_type = error_type,
            status = status.as_u16(),
            "Client error: {}",
            message
        );
    }
}

fn error_response(status: StatusCode, error_type: &str, detail: String) -> Response {
    let error_response = ErrorResponse::with_status(error_type, detail, status);
    (status, Json(error_response)).into_response()
}

/// Convert UploadError to HTTP response.
///
/// Validation failures are the client's fault (400); everything else means
/// the pipeline gave up (500).
impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            UploadError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            UploadError::Processing(_) | UploadError::Task(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "processing_error")
            }
        };
        let message = self.to_string();
        log_error(status, error_type, &message);
        error_response(status, error_type, message)
    }
}

/// Convert StoreError to HTTP response.
///
/// Backend failures are logged in full but reported generically.
impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            StoreError::UnknownCollection(_) | StoreError::NotFound { .. } => {
                (StatusCode::NOT_FOUND, "not_found")
            }
            StoreError::InvalidId(_) => (StatusCode::BAD_REQUEST, "invalid_id"),
            StoreError::NotAnObject => (StatusCode::BAD_REQUEST, "invalid_document"),
            StoreError::Backend(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
        };
        let message = self.to_string();
        log_error(status, error_type, &message);

        let detail = match self {
            StoreError::Backend(_) => "Internal storage error".to_string(),
            _ => message,
        };
        error_response(status, error_type, detail)
    }
}

impl IntoResponse for FormError {
    fn into_response(self) -> Response {
        let status = StatusCode::BAD_REQUEST;
        let message = self.to_string();
        log_error(status, "validation_error", &message);
        error_response(status, "validation_error", message)
    }
}

/// Convert MailError to HTTP response.
///
/// A missing recipient is a data problem (400); a transport failure is an
/// upstream failure (502).
impl IntoResponse for MailError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            MailError::NoRecipient(_) => (StatusCode::BAD_REQUEST, "no_recipient"),
            MailError::Delivery(_) => (StatusCode::BAD_GATEWAY, "mail_error"),
        };
        let message = self.to_string();
        log_error(status, error_type, &message);
        error_response(status, error_type, message)
    }
}

impl IntoResponse for AccountError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            AccountError::EmailTaken(_) => (StatusCode::CONFLICT, "admin_exists"),
            AccountError::NothingToUpdate => (StatusCode::BAD_REQUEST, "validation_error"),
            AccountError::Hash(_) => (StatusCode::INTERNAL_SERVER_ERROR, "password_error"),
        };
        let message = self.to_string();
        log_error(status, error_type, &message);

        let detail = match self {
            AccountError::Hash(_) => "Internal password error".to_string(),
            _ => message,
        };
        error_response(status, error_type, detail)
    }
}

/// Any error a handler can return.
#[derive(Debug)]
pub enum HandlerError {
    Upload(UploadError),
    Store(StoreError),
    Auth(AuthError),
    Form(FormError),
    RateLimited(RateLimited),
    Mail(MailError),
    Account(AccountError),
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        match self {
            HandlerError::Upload(e) => e.into_response(),
            HandlerError::Store(e) => e.into_response(),
            HandlerError::Auth(e) => e.into_response(),
            HandlerError::Form(e) => e.into_response(),
            HandlerError::RateLimited(e) => e.into_response(),
            HandlerError::Mail(e) => e.into_response(),
            HandlerError::Account(e) => e.into_response(),
        }
    }
}

impl From<MailError> for HandlerError {
    fn from(err: MailError) -> Self {
        HandlerError::Mail(err)
    }
}

impl From<AccountError> for HandlerError {
    fn from(err: AccountError) -> Self {
        HandlerError::Account(err)
    }
}

impl From<UploadError> for HandlerError {
    fn from(err: UploadError) -> Self {
        HandlerError::Upload(err)
    }
}

impl From<ValidationError> for HandlerError {
    fn from(err: ValidationError) -> Self {
        HandlerError::Upload(err.into())
    }
}

impl From<StoreError> for HandlerError {
    fn from(err: StoreError) -> Self {
        HandlerError::Store(err)
    }
}

impl From<AuthError> for HandlerError {
    fn from(err: AuthError) -> Self {
        HandlerError::Auth(err)
    }
}

impl From<FormError> for HandlerError {
    fn from(err: FormError) -> Self {
        HandlerError::Form(err)
    }
}

impl From<RateLimited> for HandlerError {
    fn from(err: RateLimited) -> Self {
        HandlerError::RateLimited(err)
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Handle image uploads.
///
/// # Endpoint
///
/// `POST /upload-image` (multipart, field `file`)
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "image": "<base64 JPEG>",
///   "compression_applied": false,
///   "metadata": { "original_size": 2048, "final_size": 1500, "method": "converted", ... },
///   "file_info": {
///     "filename": "logo.png",
///     "original_size": 2048,
///     "final_size": 1500,
///     "content_type": "image/jpeg",
///     "web_compatible": true
///   }
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Missing, empty, oversized, mistyped or corrupt file
/// - `401 Unauthorized`: Missing or invalid admin token (when auth enabled)
/// - `500 Internal Server Error`: Conversion failed
pub async fn upload_handler<S: DocumentStore>(
    State(state): State<AppState<S>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResult>, HandlerError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ValidationError::MalformedUpload(e.body_text()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ValidationError::MalformedUpload(e.body_text()))?;
        upload = Some((filename, data));
        break;
    }

    let (filename, data) = upload.ok_or(ValidationError::MissingFile)?;
    debug!(filename = %filename, size = data.len(), "Received upload");

    // Decoding and encoding are CPU-bound
    let uploads = Arc::clone(&state.uploads);
    let result = tokio::task::spawn_blocking(move || uploads.handle_upload(&filename, &data))
        .await
        .map_err(|e| UploadError::Task(e.to_string()))??;

    Ok(Json(result))
}

/// Handle admin login.
///
/// The configured admin is checked first, then the stored accounts by email.
///
/// # Endpoint
///
/// `POST /admin/login` with JSON body `{"username": "...", "password": "..."}`
///
/// # Response
///
/// `200 OK` with `{"access_token": "...", "token_type": "bearer", "expires_at": 1735689600}`
///
/// # Errors
///
/// - `401 Unauthorized`: Wrong username or password
/// - `503 Service Unavailable`: No configured admin and no stored accounts
pub async fn login_handler<S: DocumentStore>(
    State(state): State<AppState<S>>,
    Json(login): Json<LoginRequest>,
) -> Result<Json<IssuedToken>, HandlerError> {
    if let Some(admin) = &state.admin {
        if admin.verify(&login.username, &login.password).is_ok() {
            return Ok(Json(issue_login(&state, admin.username())));
        }
    }

    let outcome = check_stored_login(
        &*state.store,
        &state.passwords,
        &login.username,
        &login.password,
    )
    .await?;

    match outcome {
        StoredLogin::Verified(email) => Ok(Json(issue_login(&state, &email))),
        StoredLogin::NoAccounts if state.admin.is_none() => {
            Err(AuthError::LoginUnavailable.into())
        }
        StoredLogin::NoAccounts | StoredLogin::Rejected => {
            Err(AuthError::InvalidCredentials.into())
        }
    }
}

fn issue_login<S: DocumentStore>(state: &AppState<S>, subject: &str) -> IssuedToken {
    let issued = state.auth.issue(subject);
    info!(subject = %subject, expires_at = issued.expires_at, "Admin logged in");
    issued
}

/// Reject collections the CRUD routes do not serve.
fn ensure_public(collection: &str) -> Result<(), StoreError> {
    if is_public_collection(collection) {
        Ok(())
    } else {
        Err(StoreError::UnknownCollection(collection.to_string()))
    }
}

/// List all documents in a collection.
///
/// # Endpoint
///
/// `GET /{collection}`
pub async fn list_handler<S: DocumentStore>(
    State(state): State<AppState<S>>,
    Path(collection): Path<String>,
) -> Result<Json<Vec<Document>>, HandlerError> {
    ensure_public(&collection)?;
    let documents = state.store.list(&collection).await?;
    Ok(Json(documents))
}

/// Fetch one document.
///
/// # Endpoint
///
/// `GET /{collection}/{id}`
pub async fn get_handler<S: DocumentStore>(
    State(state): State<AppState<S>>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<Json<Document>, HandlerError> {
    ensure_public(&collection)?;
    let document = state.store.get(&collection, &id).await?;
    Ok(Json(document))
}

/// Create a document.
///
/// # Endpoint
///
/// `POST /{collection}` with a JSON object body
///
/// # Response
///
/// `201 Created` with the stored document, including its `_id`.
pub async fn create_handler<S: DocumentStore>(
    State(state): State<AppState<S>>,
    Path(collection): Path<String>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Document>), HandlerError> {
    ensure_public(&collection)?;
    let document = into_document(body)?;
    let stored = state.store.insert(&collection, document).await?;
    let id = stored
        .get(ID_FIELD)
        .and_then(Value::as_str)
        .unwrap_or_default();
    info!(collection = %collection, id = %id, "Document created");
    Ok((StatusCode::CREATED, Json(stored)))
}

/// Merge fields into a document.
///
/// # Endpoint
///
/// `PUT /{collection}/{id}` with a JSON object body
pub async fn update_handler<S: DocumentStore>(
    State(state): State<AppState<S>>,
    Path((collection, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Document>, HandlerError> {
    ensure_public(&collection)?;
    let changes = into_document(body)?;
    let updated = state.store.update(&collection, &id, changes).await?;
    info!(collection = %collection, id = %id, "Document updated");
    Ok(Json(updated))
}

/// Delete a document.
///
/// # Endpoint
///
/// `DELETE /{collection}/{id}`
///
/// # Response
///
/// `204 No Content`
pub async fn delete_handler<S: DocumentStore>(
    State(state): State<AppState<S>>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<StatusCode, HandlerError> {
    ensure_public(&collection)?;
    state.store.delete(&collection, &id).await?;
    info!(collection = %collection, id = %id, "Document deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Handle contact-form submissions.
///
/// # Endpoint
///
/// `POST /submit` with JSON body `{"name", "email", "message", "phone"?, "subject"?}`
///
/// # Response
///
/// `201 Created` with `{"message": "Form submitted successfully", "id": "..."}`
///
/// # Errors
///
/// - `400 Bad Request`: Missing field, overlong field or implausible email
/// - `429 Too Many Requests`: Client exceeded its submission quota
pub async fn submit_handler<S: DocumentStore>(
    State(state): State<AppState<S>>,
    ClientId(client): ClientId,
    Json(form): Json<ContactForm>,
) -> Result<(StatusCode, Json<SubmitResponse>), HandlerError> {
    state.rate_limiter.check(&client)?;
    form.validate()?;

    let stored = state
        .store
        .insert(INQUIRIES, form.into_inquiry(unix_now()))
        .await?;
    let id = stored
        .get(ID_FIELD)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    info!(client = %client, id = %id, "Contact form submitted");
    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            message: "Form submitted successfully".to_string(),
            id,
        }),
    ))
}

/// Mark an inquiry as solved.
///
/// # Endpoint
///
/// `PATCH /inquiries/{id}/solve`
pub async fn solve_handler<S: DocumentStore>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> Result<Json<Document>, HandlerError> {
    let mut changes = Document::new();
    changes.insert("status".into(), json!(INQUIRY_SOLVED));
    changes.insert("is_solved".into(), json!(true));
    changes.insert("solved_at".into(), json!(unix_now()));

    let updated = state.store.update(INQUIRIES, &id, changes).await?;
    info!(id = %id, "Inquiry solved");
    Ok(Json(updated))
}

/// Email a reply to the inquiry's author and mark it solved.
///
/// # Endpoint
///
/// `POST /inquiries/{id}/reply` with JSON body `{"plain_text_body", "html_body"}`
///
/// # Errors
///
/// - `400 Bad Request`: Empty reply, malformed id or inquiry without an email
/// - `404 Not Found`: No such inquiry
/// - `502 Bad Gateway`: The mail transport failed; the inquiry stays open
pub async fn reply_handler<S: DocumentStore>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
    Json(reply): Json<ReplyRequest>,
) -> Result<Json<MessageResponse>, HandlerError> {
    if reply.plain_text_body.trim().is_empty() {
        return Err(FormError::MissingField("plain_text_body").into());
    }

    let inquiry = state.store.get(INQUIRIES, &id).await?;
    let recipient = email_of(&inquiry).ok_or(MailError::NoRecipient("Inquiry"))?;

    let html_body = if reply.html_body.trim().is_empty() {
        format!("<p>{}</p>", escape_html(&reply.plain_text_body))
    } else {
        reply.html_body
    };
    state
        .mailer
        .send(Email::inquiry_reply(
            &state.site_name,
            recipient,
            reply.plain_text_body,
            html_body,
        ))
        .await?;

    let now = unix_now();
    let mut changes = Document::new();
    changes.insert("status".into(), json!(INQUIRY_SOLVED));
    changes.insert("is_solved".into(), json!(true));
    changes.insert("solved_at".into(), json!(now));
    changes.insert("replied_at".into(), json!(now));
    state.store.update(INQUIRIES, &id, changes).await?;

    info!(id = %id, "Inquiry reply sent");
    Ok(Json(MessageResponse::new("Reply sent successfully")))
}

/// Move a job application to a new status.
///
/// Moving an application to `approved` emails the applicant an offer. The
/// email goes out only on the transition, so repeating the call is safe.
///
/// # Endpoint
///
/// `PATCH /job-applications/{id}/status?status=approved`
///
/// # Errors
///
/// - `400 Bad Request`: Unknown status, malformed id, or approval of an
///   application without an email
/// - `404 Not Found`: No such application
/// - `502 Bad Gateway`: The status was saved but the email failed
pub async fn application_status_handler<S: DocumentStore>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<StatusResponse>, HandlerError> {
    let status = query.status.trim().to_ascii_lowercase();
    if !APPLICATION_STATUSES.contains(&status.as_str()) {
        return Err(FormError::InvalidChoice {
            field: "status",
            value: query.status,
            allowed: APPLICATION_STATUSES.join(", "),
        }
        .into());
    }

    let application = state.store.get(JOB_APPLICATIONS, &id).await?;
    let newly_approved = status == APPLICATION_APPROVED
        && application.get("status").and_then(Value::as_str) != Some(APPLICATION_APPROVED);
    let recipient = if newly_approved {
        Some(email_of(&application).ok_or(MailError::NoRecipient("Application"))?)
    } else {
        None
    };

    let mut changes = Document::new();
    changes.insert("status".into(), json!(status));
    changes.insert("status_updated_at".into(), json!(unix_now()));
    let updated = state.store.update(JOB_APPLICATIONS, &id, changes).await?;
    info!(id = %id, status = %status, "Application status updated");

    if let Some(recipient) = recipient {
        let name = application
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or("applicant");
        state
            .mailer
            .send(Email::acceptance(&state.site_name, recipient, name))
            .await?;
        info!(id = %id, "Acceptance email sent");
    }

    Ok(Json(StatusResponse {
        message: format!("Application {} successfully", status),
        email_sent: newly_approved,
        application: updated,
    }))
}

/// Trimmed, non-empty `email` field of a document.
fn email_of(document: &Document) -> Option<String> {
    document
        .get("email")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(str::to_string)
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

// =============================================================================
// Tests
// =============================================================================
