pub mod config;
pub mod directory;
pub mod documents;
pub mod filter;
pub mod invitation;
pub mod membership;
pub mod permission;
pub mod sharing;

use std::sync::Arc;

use thiserror::Error;

use tenancy_core::ServiceError;
use tenancy_docstore::{DocumentStore, Predicate, StoreError};

use crate::store_impls::{self, Record};

pub use config::{AccessConfig, GroupVisibility, Scope, TypePolicy};

/// Access service error type.
///
/// There is no "forbidden" variant: callers without permission get
/// `NotFound`, so the existence of a document never leaks.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("type mismatch: expected '{expected}', found '{found}'")]
    TypeMismatch { expected: String, found: String },

    #[error("validation: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<AccessError> for ServiceError {
    fn from(e: AccessError) -> Self {
        match e {
            AccessError::NotFound(m) => ServiceError::NotFound(m),
            AccessError::InvalidState(m) => ServiceError::InvalidState(m),
            e @ AccessError::TypeMismatch { .. } => ServiceError::TypeMismatch(e.to_string()),
            AccessError::Validation(m) => ServiceError::Validation(m),
            AccessError::Store(e) => ServiceError::Storage(e.to_string()),
        }
    }
}

/// The access service. Holds the document store and the access policy.
pub struct AccessService {
    pub(crate) store: Arc<dyn DocumentStore>,
    pub(crate) config: AccessConfig,
}

impl AccessService {
    pub fn new(store: Arc<dyn DocumentStore>, config: AccessConfig) -> Arc<Self> {
        Arc::new(Self { store, config })
    }

    pub fn config(&self) -> &AccessConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    // ── Typed store helpers ──

    pub(crate) async fn load<T: Record>(&self, id: &str) -> Result<Option<T>, AccessError> {
        match self.store.find(id).await? {
            Some(value) => Ok(Some(store_impls::decode(value)?)),
            None => Ok(None),
        }
    }

    pub(crate) async fn query_as<T: Record>(
        &self,
        predicate: &Predicate,
    ) -> Result<Vec<T>, AccessError> {
        let rows = self.store.query(predicate).await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(store_impls::decode(row)?);
        }
        Ok(out)
    }

    pub(crate) fn encode<T: Record>(record: &T) -> Result<serde_json::Value, AccessError> {
        Ok(store_impls::encode(record)?)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use tenancy_docstore::MemoryStore;

    use super::*;
    use crate::model::{Account, Document, GROUP_TYPE, Role};

    pub fn test_service() -> Arc<AccessService> {
        test_service_with(AccessConfig::default())
    }

    pub fn test_service_with(config: AccessConfig) -> Arc<AccessService> {
        AccessService::new(Arc::new(MemoryStore::new()), config)
    }

    pub async fn put_account(svc: &AccessService, id: &str, role: Role) -> Account {
        let mut account = Account::new(id, &format!("{}@example.com", id));
        account.role = role;
        account.before_create();
        svc.store
            .save(AccessService::encode(&account).unwrap())
            .await
            .unwrap();
        account
    }

    pub async fn put_document(svc: &AccessService, kind: &str, owner: &str) -> Document {
        let mut doc = Document::new(kind, owner);
        doc.before_create();
        svc.store
            .save(AccessService::encode(&doc).unwrap())
            .await
            .unwrap();
        doc
    }

    /// Store a group and run the synchronizer, as a group save would.
    pub async fn put_group(svc: &AccessService, owner: &str, members: &[&str]) -> Document {
        let mut group = Document::new(GROUP_TYPE, owner);
        for m in members {
            group.add_participant(m, None);
        }
        group.before_create();
        svc.sync_group_save(&group).await.unwrap();
        group
    }

    pub async fn reload(svc: &AccessService, id: &str) -> Account {
        svc.find_by_id(id).await.unwrap().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        let e: ServiceError = AccessError::NotFound("task/1".into()).into();
        assert_eq!(e.error_code(), "NOT_FOUND");

        let e: ServiceError = AccessError::InvalidState("invitation already pending".into()).into();
        assert_eq!(e.status_code().as_u16(), 400);

        let e: ServiceError = AccessError::TypeMismatch {
            expected: "task".into(),
            found: "contact".into(),
        }
        .into();
        assert_eq!(e.error_code(), "TYPE_MISMATCH");
        assert!(e.to_string().contains("contact"));

        let e: ServiceError = AccessError::Store(StoreError::Storage("disk".into())).into();
        assert_eq!(e.error_code(), "STORAGE_ERROR");
    }
}
