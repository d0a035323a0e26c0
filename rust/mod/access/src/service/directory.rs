use chrono::Utc;

use tenancy_core::now_rfc3339;
use tenancy_docstore::Predicate;

use crate::model::{ACCOUNT_TYPE, Account, Principal, Role, field};
use crate::service::{AccessError, AccessService};
use crate::store_impls::Record;

impl AccessService {
    /// Look up an account by id. A miss is `Ok(None)`.
    pub async fn find_by_id(&self, id: &str) -> Result<Option<Account>, AccessError> {
        let predicate = Predicate::And(vec![
            Predicate::eq(field::TYPE, ACCOUNT_TYPE),
            Predicate::eq(field::ID, id),
        ]);
        Ok(self.query_as::<Account>(&predicate).await?.into_iter().next())
    }

    /// Look up an account by email, ignoring case. A miss is `Ok(None)`.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AccessError> {
        let predicate = Predicate::And(vec![
            Predicate::eq(field::TYPE, ACCOUNT_TYPE),
            Predicate::eq_ignore_case(field::EMAIL, email.trim()),
        ]);
        Ok(self.query_as::<Account>(&predicate).await?.into_iter().next())
    }

    /// Resolve the account acting for a principal.
    ///
    /// By email when the principal has one, by id otherwise. An admin
    /// principal carrying an impersonation email acts as that account.
    pub async fn get_account(&self, principal: &Principal) -> Result<Account, AccessError> {
        let account = match principal.email() {
            Some(email) => self.find_by_email(email).await?,
            None => self.find_by_id(&principal.id).await?,
        }
        .ok_or_else(|| AccessError::NotFound(format!("account for principal {}", principal.id)))?;

        if !account.is_valid_at(&Utc::now()) {
            return Err(AccessError::NotFound(format!("account {}", account.id)));
        }

        let Some(target) = principal.impersonate.as_deref() else {
            return Ok(account);
        };
        if !account.is_admin() {
            tracing::warn!(account = %account.id, "impersonation refused for non-admin");
            return Ok(account);
        }
        let impersonated = self
            .find_by_email(target)
            .await?
            .ok_or_else(|| AccessError::NotFound(format!("account {}", target)))?;
        tracing::info!(admin = %account.id, as_account = %impersonated.id, "impersonating");
        Ok(impersonated)
    }

    /// Provisioning hook, called after every successful authentication.
    ///
    /// Creates the account on first login (`id = owner = principal.id`),
    /// refreshes the photo, and stamps `last_login`.
    pub async fn provision(&self, principal: &Principal) -> Result<Account, AccessError> {
        let email = principal
            .email()
            .ok_or_else(|| AccessError::Validation("principal has no email".into()))?;
        if principal.id.is_empty() {
            return Err(AccessError::Validation("principal has no id".into()));
        }

        let mut account = match self.find_by_email(email).await? {
            Some(existing) => {
                if !existing.is_valid_at(&Utc::now()) {
                    return Err(AccessError::InvalidState(format!(
                        "account {} is deactivated",
                        existing.id
                    )));
                }
                let mut existing = existing;
                existing.before_update();
                existing
            }
            None => {
                let mut created = Account::new(&principal.id, &email.to_lowercase());
                let (first, last) = split_name(principal.name.as_deref(), email);
                created.first_name = first;
                created.last_name = last;
                created.before_create();
                tracing::info!(account = %created.id, "provisioned account");
                created
            }
        };

        if let Some(photo) = principal.photo.as_deref().filter(|p| !p.is_empty()) {
            account.photo = Some(photo.to_string());
        }
        account.last_login = Some(now_rfc3339());

        self.store.save(Self::encode(&account)?).await?;
        tracing::debug!(account = %account.id, "login recorded");
        Ok(account)
    }

    /// Change an account's role. Admin only.
    pub async fn assign_role(
        &self,
        admin: &Account,
        account_id: &str,
        role: Role,
    ) -> Result<Account, AccessError> {
        let mut account = self.admin_target(admin, account_id).await?;
        account.role = role;
        account.updated_by = Some(admin.id.clone());
        account.before_update();
        self.store.save(Self::encode(&account)?).await?;
        tracing::info!(admin = %admin.id, account = %account.id, role = %role, "role assigned");
        Ok(account)
    }

    /// Soft-delete an account by setting `valid_until` to now. Admin only.
    pub async fn deactivate_account(
        &self,
        admin: &Account,
        account_id: &str,
    ) -> Result<Account, AccessError> {
        let mut account = self.admin_target(admin, account_id).await?;
        account.valid_until = Some(now_rfc3339());
        account.updated_by = Some(admin.id.clone());
        account.before_update();
        self.store.save(Self::encode(&account)?).await?;
        tracing::info!(admin = %admin.id, account = %account.id, "account deactivated");
        Ok(account)
    }

    async fn admin_target(&self, admin: &Account, account_id: &str) -> Result<Account, AccessError> {
        if !admin.is_admin() {
            tracing::debug!(account = %admin.id, "lifecycle operation denied");
            return Err(AccessError::NotFound(format!("account {}", account_id)));
        }
        self.find_by_id(account_id)
            .await?
            .ok_or_else(|| AccessError::NotFound(format!("account {}", account_id)))
    }
}

/// "First Last" → (first, last). A single token is the first name; no name
/// at all falls back to the email.
fn split_name(name: Option<&str>, email: &str) -> (Option<String>, Option<String>) {
    let name = name.map(str::trim).filter(|n| !n.is_empty());
    match name {
        None => (Some(email.to_string()), None),
        Some(n) => {
            let mut parts = n.split_whitespace();
            let first = parts.next().map(str::to_string);
            let last = parts.last().map(str::to_string);
            (first, last)
        }
    }
}
