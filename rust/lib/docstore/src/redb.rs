use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use redb::{Database, ReadableTable, TableDefinition};
use serde_json::Value;

use crate::error::StoreError;
use crate::predicate::Predicate;
use crate::traits::{DocumentStore, document_id};

const TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("documents");

fn storage<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Storage(e.to_string())
}

/// RedbStore persists documents as JSON blobs in a single redb table keyed
/// by document id. Queries are full scans filtered in process.
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open or create a redb database at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let db = Database::create(path).map_err(storage)?;

        // Ensure the table exists so read transactions can open it.
        let write_txn = db.begin_write().map_err(storage)?;
        {
            let _table = write_txn.open_table(TABLE).map_err(storage)?;
        }
        write_txn.commit().map_err(storage)?;

        tracing::debug!(path = %path.display(), "opened document store");
        Ok(Self { db: Arc::new(db) })
    }

    fn decode(bytes: &[u8]) -> Result<Value, StoreError> {
        serde_json::from_slice(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn encode(doc: &Value) -> Result<Vec<u8>, StoreError> {
        serde_json::to_vec(doc).map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

#[async_trait]
impl DocumentStore for RedbStore {
    async fn query(&self, predicate: &Predicate) -> Result<Vec<Value>, StoreError> {
        let read_txn = self.db.begin_read().map_err(storage)?;
        let table = read_txn.open_table(TABLE).map_err(storage)?;

        let mut results = Vec::new();
        for entry in table.iter().map_err(storage)? {
            let (_, value) = entry.map_err(storage)?;
            let doc = Self::decode(value.value())?;
            if predicate.matches(&doc) {
                results.push(doc);
            }
        }
        Ok(results)
    }

    async fn find(&self, id: &str) -> Result<Option<Value>, StoreError> {
        let read_txn = self.db.begin_read().map_err(storage)?;
        let table = read_txn.open_table(TABLE).map_err(storage)?;
        match table.get(id).map_err(storage)? {
            Some(value) => Ok(Some(Self::decode(value.value())?)),
            None => Ok(None),
        }
    }

    async fn save(&self, document: Value) -> Result<(), StoreError> {
        self.save_batch(vec![document]).await
    }

    async fn save_batch(&self, documents: Vec<Value>) -> Result<(), StoreError> {
        let mut encoded = Vec::with_capacity(documents.len());
        for doc in &documents {
            encoded.push((document_id(doc)?.to_string(), Self::encode(doc)?));
        }

        let write_txn = self.db.begin_write().map_err(storage)?;
        {
            let mut table = write_txn.open_table(TABLE).map_err(storage)?;
            for (id, bytes) in &encoded {
                table.insert(id.as_str(), bytes.as_slice()).map_err(storage)?;
            }
        }
        write_txn.commit().map_err(storage)?;
        tracing::debug!(count = encoded.len(), "saved documents");
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let write_txn = self.db.begin_write().map_err(storage)?;
        {
            let mut table = write_txn.open_table(TABLE).map_err(storage)?;
            table.remove(id).map_err(storage)?;
        }
        write_txn.commit().map_err(storage)?;
        Ok(())
    }
}
