use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use tenancy_docstore::Predicate;

use crate::model::{ACCOUNT_TYPE, Account, field};
use crate::service::{AccessError, AccessService, Scope};

impl AccessService {
    /// Store predicate selecting the documents of `kind` that `account`
    /// may see right now.
    ///
    /// The filter narrows bulk reads; it does not authorize. Mutations
    /// still evaluate every matched document.
    pub async fn build_filter(&self, account: &Account, kind: &str) -> Result<Predicate, AccessError> {
        let sharing = self.get_sharing_participants(account).await?;
        Ok(self.filter_for(account, kind, &sharing, Some(Utc::now())))
    }

    /// Like `build_filter` without the validity clause, so invalidated
    /// entities are included. Admin only.
    pub async fn build_lifecycle_filter(
        &self,
        account: &Account,
        kind: &str,
    ) -> Result<Predicate, AccessError> {
        if !account.is_admin() {
            tracing::debug!(account = %account.id, kind, "lifecycle filter denied");
            return Err(AccessError::NotFound(format!("{} lifecycle view", kind)));
        }
        Ok(self.filter_for(account, kind, &BTreeSet::new(), None))
    }

    /// Compose the filter from an already resolved sharing set.
    /// `valid_at = None` drops the validity clause.
    pub fn filter_for(
        &self,
        account: &Account,
        kind: &str,
        sharing: &BTreeSet<String>,
        valid_at: Option<DateTime<Utc>>,
    ) -> Predicate {
        let kind = kind.to_lowercase();
        let mut clauses = vec![Predicate::eq_ignore_case(field::TYPE, &kind)];
        if let Some(at) = valid_at {
            clauses.push(Predicate::valid_at(field::VALID_UNTIL, at));
        }

        if self.config.multi_tenant && !account.is_admin() {
            clauses.push(self.visibility_clause(account, &kind, sharing));
        }
        Predicate::And(clauses)
    }

    fn visibility_clause(&self, account: &Account, kind: &str, sharing: &BTreeSet<String>) -> Predicate {
        if kind == ACCOUNT_TYPE {
            return Predicate::Or(vec![
                Predicate::eq(field::ID, account.id.as_str()),
                Predicate::in_strings(field::ID, sharing.iter().cloned()),
            ]);
        }

        let claims = [account.id.clone(), self.config.system_owner.clone()];
        let owner_claimed = Predicate::in_strings(field::OWNER, claims.iter().cloned());
        let owner_shared = Predicate::in_strings(field::OWNER, sharing.iter().cloned());
        let named = Predicate::any(field::PARTICIPANTS, Predicate::eq(field::ID, account.id.as_str()));
        // ACL entries count only while the owner is shared.
        let granted = Predicate::And(vec![
            Predicate::any(
                field::PERMISSIONS,
                Predicate::eq(field::SUBJECT, account.id.as_str()),
            ),
            owner_shared.clone(),
        ]);

        match self.config.policy(kind).scope {
            Scope::Shared => Predicate::Or(vec![owner_claimed, owner_shared]),
            Scope::Participants => Predicate::Or(vec![owner_claimed, owner_shared, named]),
            Scope::Membership => Predicate::Or(vec![owner_claimed, named, granted]),
            Scope::Acl => Predicate::Or(vec![owner_claimed, granted]),
        }
    }
}
