//! Record hooks for the document types the access core writes.
//!
//! Every typed record goes through `before_create` / `before_update`
//! before it is encoded, so timestamps and generated ids are stamped in
//! one place.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use tenancy_core::{new_id, now_rfc3339};
use tenancy_docstore::StoreError;

use crate::model::{Account, Document};

/// A typed view of a stored document.
pub trait Record: Serialize + DeserializeOwned {
    fn before_create(&mut self);

    fn before_update(&mut self);
}

impl Record for Document {
    fn before_create(&mut self) {
        if self.id.is_empty() {
            self.id = new_id();
        }
        let now = now_rfc3339();
        if self.created_at.is_empty() {
            self.created_at = now.clone();
        }
        self.updated_at = now;
    }

    fn before_update(&mut self) {
        self.updated_at = now_rfc3339();
    }
}

impl Record for Account {
    // Account ids come from the identity provider, never generated here.
    fn before_create(&mut self) {
        let now = now_rfc3339();
        if self.created_at.is_empty() {
            self.created_at = now.clone();
        }
        if self.owner.is_empty() {
            self.owner = self.id.clone();
        }
        self.updated_at = now;
    }

    fn before_update(&mut self) {
        self.updated_at = now_rfc3339();
    }
}

/// Decode a stored document. A stored value that no longer matches the
/// record shape is a storage problem, not a client one.
pub fn decode<T: Record>(value: Value) -> Result<T, StoreError> {
    serde_json::from_value(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

pub fn encode<T: Record>(record: &T) -> Result<Value, StoreError> {
    serde_json::to_value(record).map_err(|e| StoreError::Serialization(e.to_string()))
}
