use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::predicate::Predicate;
use crate::traits::{DocumentStore, document_id};

/// MemoryStore keeps documents in a BTreeMap behind a single RwLock.
/// A batch is applied under one write guard, so readers never observe a
/// partially applied batch.
#[derive(Default)]
pub struct MemoryStore {
    docs: RwLock<BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.docs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.docs.read().await.is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn query(&self, predicate: &Predicate) -> Result<Vec<Value>, StoreError> {
        let docs = self.docs.read().await;
        Ok(docs
            .values()
            .filter(|doc| predicate.matches(doc))
            .cloned()
            .collect())
    }

    async fn find(&self, id: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.docs.read().await.get(id).cloned())
    }

    async fn save(&self, document: Value) -> Result<(), StoreError> {
        let id = document_id(&document)?.to_string();
        self.docs.write().await.insert(id, document);
        Ok(())
    }

    async fn save_batch(&self, documents: Vec<Value>) -> Result<(), StoreError> {
        // Validate everything before touching the map.
        let mut keyed = Vec::with_capacity(documents.len());
        for doc in documents {
            let id = document_id(&doc)?.to_string();
            keyed.push((id, doc));
        }
        let mut docs = self.docs.write().await;
        for (id, doc) in keyed {
            docs.insert(id, doc);
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.docs.write().await.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn save_find_delete() {
        let store = MemoryStore::new();
        store
            .save(json!({"id": "b", "type": "task", "owner": "alice"}))
            .await
            .unwrap();
        store
            .save(json!({"id": "a", "type": "contact", "owner": "alice"}))
            .await
            .unwrap();

        assert_eq!(store.len().await, 2);
        let found = store.find("b").await.unwrap().unwrap();
        assert_eq!(found["type"], "task");

        let all = store.query(&Predicate::True).await.unwrap();
        let ids: Vec<_> = all.iter().map(|d| d["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["a", "b"]);

        let tasks = store.query(&Predicate::eq("type", "task")).await.unwrap();
        assert_eq!(tasks.len(), 1);

        store.delete("b").await.unwrap();
        store.delete("b").await.unwrap();
        assert!(store.find("b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn batch_is_all_or_nothing() {
        let store = MemoryStore::new();
        let result = store
            .save_batch(vec![json!({"id": "ok"}), json!({"name": "no id"})])
            .await;
        assert!(matches!(result, Err(StoreError::InvalidDocument(_))));
        assert!(store.is_empty().await);

        store
            .save_batch(vec![json!({"id": "x"}), json!({"id": "y"})])
            .await
            .unwrap();
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn save_replaces() {
        let store = MemoryStore::new();
        store.save(json!({"id": "a", "v": 1})).await.unwrap();
        store.save(json!({"id": "a", "v": 2})).await.unwrap();
        assert_eq!(store.find("a").await.unwrap().unwrap()["v"], 2);
        assert_eq!(store.len().await, 1);
    }
}
