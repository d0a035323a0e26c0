use std::collections::BTreeSet;

use chrono::Utc;

use crate::model::{Account, Document, PermissionTier};
use crate::service::{AccessError, AccessService, Scope};

impl AccessService {
    /// Permission tier `account` holds on `doc`, given its sharing set.
    ///
    /// Rules, first match wins:
    /// 1. admin → Full
    /// 2. expired document → None
    /// 3. single-tenant mode → Full
    /// 4. the account's own record, or a document it owns → Full
    /// 5. system-owned → Read
    /// 6. otherwise the highest of: the owner-sharing tier (Partial, or Full
    ///    for co-owned types), a matching ACL entry when the owner is shared,
    ///    and Partial for a named participant of a participant-scoped type.
    pub fn evaluate(
        &self,
        account: &Account,
        doc: &Document,
        sharing: &BTreeSet<String>,
    ) -> PermissionTier {
        if account.is_admin() {
            return PermissionTier::Full;
        }
        if !doc.is_valid_at(&Utc::now()) {
            return PermissionTier::None;
        }
        if !self.config.multi_tenant {
            return PermissionTier::Full;
        }
        if doc.id == account.id || doc.owner == account.id {
            return PermissionTier::Full;
        }
        if doc.owner == self.config.system_owner {
            return PermissionTier::Read;
        }

        let policy = self.config.policy(&doc.kind);
        let owner_shared = sharing.contains(&doc.owner);
        let mut tier = PermissionTier::None;

        if owner_shared && matches!(policy.scope, Scope::Shared | Scope::Participants) {
            tier = if policy.co_owned {
                PermissionTier::Full
            } else {
                PermissionTier::Partial
            };
        }
        if owner_shared {
            if let Some(acl) = doc.acl_tier(&account.id) {
                tier = tier.max(acl);
            }
        }
        if doc.has_participant(&account.id)
            && matches!(policy.scope, Scope::Participants | Scope::Membership)
        {
            tier = tier.max(PermissionTier::Partial);
        }
        tier
    }

    pub fn can_read(&self, account: &Account, doc: &Document, sharing: &BTreeSet<String>) -> bool {
        self.evaluate(account, doc, sharing) >= self.config.policy(&doc.kind).read
    }

    pub fn can_update(&self, account: &Account, doc: &Document, sharing: &BTreeSet<String>) -> bool {
        self.evaluate(account, doc, sharing) >= self.config.policy(&doc.kind).update
    }

    pub fn can_delete(&self, account: &Account, doc: &Document, sharing: &BTreeSet<String>) -> bool {
        self.evaluate(account, doc, sharing) >= self.config.policy(&doc.kind).delete
    }

    /// Resolve the sharing set, load the document, and evaluate.
    /// A missing document evaluates to `None`.
    pub async fn check(&self, account: &Account, doc_id: &str) -> Result<PermissionTier, AccessError> {
        let Some(doc) = self.load::<Document>(doc_id).await? else {
            return Ok(PermissionTier::None);
        };
        let sharing = self.get_sharing_participants(account).await?;
        Ok(self.evaluate(account, &doc, &sharing))
    }
}
