//! Store and service wiring shared by every command.

use std::sync::Arc;

use anyhow::{Context as _, Result};

use access::model::{Account, Principal};
use access::{AccessConfig, AccessService};
use tenancy_core::ServiceConfig;
use tenancy_docstore::{DocumentStore, RedbStore};

pub struct Context {
    pub service: Arc<AccessService>,
    acting: Option<String>,
    impersonate: Option<String>,
}

impl Context {
    pub fn open(
        config: &ServiceConfig,
        acting: Option<String>,
        impersonate: Option<String>,
    ) -> Result<Self> {
        if let Some(dir) = &config.data_dir {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create data dir {}", dir.display()))?;
        }

        let db_path = config.resolve_db_path();
        let store: Arc<dyn DocumentStore> = Arc::new(
            RedbStore::open(&db_path)
                .map_err(|e| anyhow::anyhow!("failed to open {}: {}", db_path.display(), e))?,
        );

        let policy_path = config.resolve_access_config_path();
        let policy = AccessConfig::load(&policy_path)?;
        tracing::debug!(db = %db_path.display(), policy = %policy_path.display(), "opened");

        Ok(Self {
            service: AccessService::new(store, policy),
            acting: acting.map(|a| a.trim().to_string()).filter(|a| !a.is_empty()),
            impersonate,
        })
    }

    /// The account named by `--as`, honoring `--impersonate`.
    pub async fn account(&self) -> Result<Account> {
        let email = self
            .acting
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("this command needs --as <email>"))?;
        let principal = Principal {
            email: Some(email.to_string()),
            impersonate: self.impersonate.clone(),
            ..Default::default()
        };
        Ok(self.service.get_account(&principal).await?)
    }
}
