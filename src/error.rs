use thiserror::Error;

/// Reasons an upload is rejected before any processing happens.
///
/// Every variant maps to HTTP 400 and its `Display` text is the
/// human-readable `detail` returned to the client.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Multipart body did not contain a file field
    #[error("No file provided")]
    MissingFile,

    /// Upload arrived without a filename
    #[error("No filename provided")]
    MissingFilename,

    /// Upload has zero bytes
    #[error("File is empty")]
    EmptyFile,

    /// Upload exceeds the hard ceiling
    #[error("File too large. Maximum size is {max_mb:.1}MB")]
    TooLarge { size: usize, max_mb: f64 },

    /// Filename extension is not in the allow-list
    #[error("Invalid file type. Allowed types: {allowed}")]
    UnsupportedType { allowed: String },

    /// Content failed the structural decode check
    #[error("Invalid image file: {reason}")]
    InvalidImage { reason: String },

    /// Multipart body could not be read
    #[error("Malformed upload: {0}")]
    MalformedUpload(String),
}

impl ValidationError {
    /// Build a `TooLarge` error for an upload of `size` bytes against `limit` bytes.
    pub fn too_large(size: usize, limit: usize) -> Self {
        ValidationError::TooLarge {
            size,
            max_mb: limit as f64 / (1024.0 * 1024.0),
        }
    }
}

/// Errors raised while decoding or re-encoding an image.
#[derive(Debug, Clone, Error)]
pub enum ConversionError {
    /// Input bytes could not be decoded
    #[error("Failed to decode image: {message}")]
    Decode { message: String },

    /// Output encoding failed
    #[error("Failed to encode image: {message}")]
    Encode { message: String },

    /// Input is not one of the recognised encodings
    #[error("Unrecognized image format")]
    UnknownFormat,

    /// HEIC/HEIF input on a build without libheif support
    #[error("HEIC/HEIF decoding is not available in this build")]
    HeifUnavailable,
}

/// Errors surfaced by the upload orchestrator.
#[derive(Debug, Clone, Error)]
pub enum UploadError {
    /// The upload was rejected (HTTP 400)
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Every conversion attempt failed (HTTP 500)
    #[error("Image processing failed: {0}")]
    Processing(#[from] ConversionError),

    /// The blocking worker running the pipeline panicked or was cancelled
    #[error("Image processing task failed: {0}")]
    Task(String),
}

/// Contact-form submissions that fail field checks (HTTP 400).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormError {
    /// Required field missing or blank
    #[error("Field '{0}' is required")]
    MissingField(&'static str),

    /// Field longer than allowed
    #[error("Field '{field}' must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },

    /// Address without a plausible `local@domain.tld` shape
    #[error("Invalid email address")]
    InvalidEmail,

    /// Field shorter than allowed
    #[error("Field '{field}' must be at least {min} characters")]
    TooShort { field: &'static str, min: usize },

    /// Value outside a fixed set of choices
    #[error("Invalid {field} '{value}'. Expected one of: {allowed}")]
    InvalidChoice {
        field: &'static str,
        value: String,
        allowed: String,
    },
}

/// Errors from outbound email.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MailError {
    /// The document has no address to write to
    #[error("{0} has no associated email")]
    NoRecipient(&'static str),

    /// The mail transport refused or lost the message
    #[error("Failed to send email: {0}")]
    Delivery(String),
}

/// Errors from admin account management.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AccountError {
    /// Another admin already uses this address
    #[error("Admin with email {0} already exists")]
    EmailTaken(String),

    /// Update request with no fields set
    #[error("No update data provided")]
    NothingToUpdate,

    /// Password hashing or verification failed
    #[error("Password hashing failed: {0}")]
    Hash(String),
}

/// Errors from the document store collaborator.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Collection name is not served by this backend
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    /// No document with this identifier
    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    /// Identifier is not a well-formed document id
    #[error("Invalid document id: {0}")]
    InvalidId(String),

    /// Request body was valid JSON but not an object
    #[error("Document must be a JSON object")]
    NotAnObject,

    /// Failure inside the storage backend
    #[error("Storage error: {0}")]
    Backend(String),
}
