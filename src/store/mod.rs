//! Document store contract.
//!
//! Collections hold schemaless JSON objects keyed by a 24-hex-character
//! identifier, returned to clients as `_id`. The HTTP layer only talks to the
//! [`DocumentStore`] trait, so a database-backed implementation can replace
//! [`MemoryStore`] without touching handlers.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              HTTP Handlers              │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │          DocumentStore Trait            │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │      MemoryStore (dev and tests)        │
//! └─────────────────────────────────────────┘
//! ```

mod memory;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::StoreError;

pub use memory::MemoryStore;

/// A stored JSON object.
pub type Document = Map<String, Value>;

/// Field carrying the document identifier.
pub const ID_FIELD: &str = "_id";

/// Length of a document identifier in hex characters.
pub const ID_LENGTH: usize = 24;

/// Collections served by the backend.
pub const COLLECTIONS: &[&str] = &[
    "events",
    "gallery-events",
    "faqs",
    "job-listings",
    "job-applications",
    "latest-works",
    "inquiries",
];

/// Collection that receives contact-form submissions.
pub const INQUIRIES: &str = "inquiries";

/// Collection that receives public job applications.
pub const JOB_APPLICATIONS: &str = "job-applications";

/// Admin accounts. Stored alongside the content collections but never
/// reachable through the generic CRUD routes.
pub const ADMINS: &str = "admins";

/// Whether `collection` may be served by the generic CRUD routes.
pub fn is_public_collection(collection: &str) -> bool {
    COLLECTIONS.contains(&collection)
}

/// Check that `id` is a well-formed document identifier.
pub fn validate_id(id: &str) -> Result<(), StoreError> {
    if id.len() == ID_LENGTH && id.bytes().all(|b| b.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err(StoreError::InvalidId(id.to_string()))
    }
}

/// Convert an arbitrary JSON value into a document.
pub fn into_document(value: Value) -> Result<Document, StoreError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(StoreError::NotAnObject),
    }
}

/// CRUD operations over named collections.
///
/// Implementations must reject unknown collections with
/// [`StoreError::UnknownCollection`] and malformed identifiers with
/// [`StoreError::InvalidId`]. Client-supplied `_id` fields are ignored on
/// insert and update.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// All documents in a collection, oldest first.
    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError>;

    /// One document by identifier.
    async fn get(&self, collection: &str, id: &str) -> Result<Document, StoreError>;

    /// Store a new document and return it with its assigned `_id`.
    async fn insert(&self, collection: &str, document: Document) -> Result<Document, StoreError>;

    /// Merge `changes` into an existing document and return the result.
    async fn update(
        &self,
        collection: &str,
        id: &str,
        changes: Document,
    ) -> Result<Document, StoreError>;

    /// Remove a document.
    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;
}
