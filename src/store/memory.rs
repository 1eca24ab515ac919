use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use super::{validate_id, Document, DocumentStore, ADMINS, COLLECTIONS, ID_FIELD, ID_LENGTH};
use crate::error::StoreError;

/// In-process document store.
///
/// Identifiers are zero-padded monotonic hex, so a collection's `BTreeMap`
/// iterates in insertion order. Contents are lost on restart.
pub struct MemoryStore {
    collections: RwLock<HashMap<String, BTreeMap<String, Document>>>,
    next_id: AtomicU64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Store serving the standard collections and admin accounts.
    pub fn new() -> Self {
        Self::with_collections(COLLECTIONS.iter().copied().chain([ADMINS]))
    }

    /// Store serving exactly the given collections.
    pub fn with_collections<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let collections = names
            .into_iter()
            .map(|name| (name.to_string(), BTreeMap::new()))
            .collect();
        Self {
            collections: RwLock::new(collections),
            next_id: AtomicU64::new(1),
        }
    }

    /// Number of documents in a collection.
    pub async fn count(&self, collection: &str) -> Result<usize, StoreError> {
        let collections = self.collections.read().await;
        Ok(lookup(&collections, collection)?.len())
    }

    fn allocate_id(&self) -> String {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        format!("{:0width$x}", n, width = ID_LENGTH)
    }
}

fn lookup<'a>(
    collections: &'a HashMap<String, BTreeMap<String, Document>>,
    name: &str,
) -> Result<&'a BTreeMap<String, Document>, StoreError> {
    collections
        .get(name)
        .ok_or_else(|| StoreError::UnknownCollection(name.to_string()))
}

fn lookup_mut<'a>(
    collections: &'a mut HashMap<String, BTreeMap<String, Document>>,
    name: &str,
) -> Result<&'a mut BTreeMap<String, Document>, StoreError> {
    collections
        .get_mut(name)
        .ok_or_else(|| StoreError::UnknownCollection(name.to_string()))
}

fn not_found(collection: &str, id: &str) -> StoreError {
    StoreError::NotFound {
        collection: collection.to_string(),
        id: id.to_string(),
    }
}

/// Ids are stored lowercase; lookups accept either case.
fn normalize_id(id: &str) -> Result<String, StoreError> {
    validate_id(id)?;
    Ok(id.to_ascii_lowercase())
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read().await;
        Ok(lookup(&collections, collection)?.values().cloned().collect())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Document, StoreError> {
        let collections = self.collections.read().await;
        let docs = lookup(&collections, collection)?;
        let id = normalize_id(id)?;
        docs.get(&id)
            .cloned()
            .ok_or_else(|| not_found(collection, &id))
    }

    async fn insert(
        &self,
        collection: &str,
        mut document: Document,
    ) -> Result<Document, StoreError> {
        let mut collections = self.collections.write().await;
        let docs = lookup_mut(&mut collections, collection)?;

        let id = self.allocate_id();
        document.insert(ID_FIELD.to_string(), Value::String(id.clone()));
        docs.insert(id.clone(), document.clone());

        debug!(collection, id = %id, "Inserted document");
        Ok(document)
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        changes: Document,
    ) -> Result<Document, StoreError> {
        let mut collections = self.collections.write().await;
        let docs = lookup_mut(&mut collections, collection)?;
        let id = normalize_id(id)?;
        let document = docs.get_mut(&id).ok_or_else(|| not_found(collection, &id))?;

        for (key, value) in changes {
            if key != ID_FIELD {
                document.insert(key, value);
            }
        }

        debug!(collection, id = %id, "Updated document");
        Ok(document.clone())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let docs = lookup_mut(&mut collections, collection)?;
        let id = normalize_id(id)?;
        docs.remove(&id).ok_or_else(|| not_found(collection, &id))?;

        debug!(collection, id = %id, "Deleted document");
        Ok(())
    }
}
