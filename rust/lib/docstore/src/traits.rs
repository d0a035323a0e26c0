use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreError;
use crate::predicate::Predicate;

/// DocumentStore persists schemaless JSON documents keyed by their `id` field.
///
/// Every document is a JSON object with a string `id`. Implementations must
/// make `save_batch` all-or-nothing: the membership synchronizer and the
/// invitation workflow depend on it to keep account and group documents
/// consistent with each other.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Return every document matching the predicate, ordered by id.
    async fn query(&self, predicate: &Predicate) -> Result<Vec<Value>, StoreError>;

    /// Get a document by id. Returns None if it does not exist.
    async fn find(&self, id: &str) -> Result<Option<Value>, StoreError>;

    /// Insert or replace a single document.
    async fn save(&self, document: Value) -> Result<(), StoreError>;

    /// Insert or replace several documents atomically.
    async fn save_batch(&self, documents: Vec<Value>) -> Result<(), StoreError>;

    /// Remove a document. Deleting a missing id is not an error.
    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}

/// Extract the `id` of a document, rejecting anything that cannot be keyed.
pub fn document_id(document: &Value) -> Result<&str, StoreError> {
    match document.get("id").and_then(Value::as_str) {
        Some(id) if !id.is_empty() => Ok(id),
        _ => Err(StoreError::InvalidDocument(
            "document must be an object with a non-empty string id".into(),
        )),
    }
}
