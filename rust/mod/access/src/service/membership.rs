use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;

use tenancy_core::now_rfc3339;
use tenancy_docstore::Predicate;

use crate::model::{ACCOUNT_TYPE, Account, Document, field};
use crate::service::{AccessError, AccessService};
use crate::store_impls::Record;

/// Accounts touched by one or more group changes, keyed by id.
pub(crate) type Changeset = BTreeMap<String, Account>;

impl AccessService {
    /// Reconcile account group caches with `group`.
    ///
    /// Old members are the accounts whose cache lists the group; new
    /// members are its participants plus the owner, or nobody when the
    /// group is being deleted or has expired. Accounts already in
    /// `pending` are updated in place so several groups can share one
    /// batch.
    pub(crate) async fn apply_membership(
        &self,
        group: &Document,
        deleted: bool,
        pending: &mut Changeset,
    ) -> Result<(), AccessError> {
        let new_ids: BTreeSet<&str> = if deleted || !group.is_valid_at(&Utc::now()) {
            BTreeSet::new()
        } else {
            group
                .participant_ids()
                .chain(std::iter::once(group.owner.as_str()))
                .filter(|id| !id.is_empty())
                .collect()
        };

        let cached = Predicate::And(vec![
            Predicate::eq(field::TYPE, ACCOUNT_TYPE),
            Predicate::contains(field::GROUPS, group.id.as_str()),
        ]);
        let mut old = self.query_as::<Account>(&cached).await?;
        old.extend(pending.values().filter(|a| a.in_group(&group.id)).cloned());

        for account in old {
            if new_ids.contains(account.id.as_str()) {
                continue;
            }
            let entry = pending.entry(account.id.clone()).or_insert(account);
            if entry.leave_group(&group.id) {
                tracing::debug!(group = %group.id, account = %entry.id, "member removed");
            }
        }

        if new_ids.is_empty() {
            return Ok(());
        }
        let members = Predicate::And(vec![
            Predicate::eq(field::TYPE, ACCOUNT_TYPE),
            Predicate::in_strings(field::ID, new_ids.iter().copied()),
        ]);
        for account in self.query_as::<Account>(&members).await? {
            let entry = match pending.entry(account.id.clone()) {
                Entry::Occupied(e) => e.into_mut(),
                Entry::Vacant(_) if account.in_group(&group.id) => continue,
                Entry::Vacant(e) => e.insert(account),
            };
            if entry.join_group(&group.id) {
                tracing::debug!(group = %group.id, account = %entry.id, "member added");
            }
        }
        Ok(())
    }

    /// Save a group together with every account whose cache changed, in
    /// one atomic batch.
    pub async fn sync_group_save(&self, group: &Document) -> Result<(), AccessError> {
        let mut pending = Changeset::new();
        self.apply_membership(group, false, &mut pending).await?;
        let mut batch = vec![Self::encode(group)?];
        batch.extend(self.encode_changed(&mut pending)?);
        let accounts = batch.len() - 1;
        self.store.save_batch(batch).await?;
        tracing::info!(group = %group.id, accounts, "group saved");
        Ok(())
    }

    /// Delete groups, clearing them from every member cache.
    ///
    /// The groups are first invalidated in the same batch as the account
    /// updates, so a failure before the hard delete leaves groups the
    /// resolver already ignores.
    pub async fn sync_group_delete(&self, groups: &[Document]) -> Result<(), AccessError> {
        let mut pending = Changeset::new();
        let mut batch = Vec::with_capacity(groups.len());
        let now = now_rfc3339();
        for group in groups {
            self.apply_membership(group, true, &mut pending).await?;
            let mut retired = group.clone();
            retired.valid_until = Some(now.clone());
            retired.before_update();
            batch.push(Self::encode(&retired)?);
        }
        batch.extend(self.encode_changed(&mut pending)?);
        self.store.save_batch(batch).await?;

        for group in groups {
            self.store.delete(&group.id).await?;
            tracing::info!(group = %group.id, "group deleted");
        }
        Ok(())
    }

    pub(crate) fn encode_changed(
        &self,
        pending: &mut Changeset,
    ) -> Result<Vec<serde_json::Value>, AccessError> {
        let mut out = Vec::with_capacity(pending.len());
        for account in pending.values_mut() {
            account.before_update();
            out.push(Self::encode(account)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GROUP_TYPE, Role};
    use crate::service::testing::*;

    #[tokio::test]
    async fn test_owner_is_implicit_member() {
        let svc = test_service();
        put_account(&svc, "owner", Role::Coordinator).await;
        put_account(&svc, "m1", Role::Member).await;
        let group = put_group(&svc, "owner", &["m1"]).await;

        assert!(reload(&svc, "owner").await.in_group(&group.id));
        assert!(reload(&svc, "m1").await.in_group(&group.id));
    }

    #[tokio::test]
    async fn test_membership_diff() {
        let svc = test_service();
        put_account(&svc, "owner", Role::Manager).await;
        put_account(&svc, "m1", Role::Member).await;
        put_account(&svc, "m2", Role::Member).await;
        put_account(&svc, "m3", Role::Member).await;
        let mut group = put_group(&svc, "owner", &["m1", "m2"]).await;

        group.participants.retain(|p| p.id != "m1");
        group.add_participant("m3", None);
        svc.sync_group_save(&group).await.unwrap();

        assert!(!reload(&svc, "m1").await.in_group(&group.id));
        assert!(reload(&svc, "m2").await.in_group(&group.id));
        assert!(reload(&svc, "m3").await.in_group(&group.id));
        assert!(reload(&svc, "owner").await.in_group(&group.id));
    }

    #[tokio::test]
    async fn test_unknown_member_ids_are_skipped() {
        let svc = test_service();
        put_account(&svc, "owner", Role::Manager).await;
        let group = put_group(&svc, "owner", &["not-an-account"]).await;
        assert!(svc.find_by_id("not-an-account").await.unwrap().is_none());
        assert!(reload(&svc, "owner").await.in_group(&group.id));
    }

    #[tokio::test]
    async fn test_expired_group_clears_caches() {
        let svc = test_service();
        put_account(&svc, "owner", Role::Manager).await;
        put_account(&svc, "m1", Role::Member).await;
        let mut group = put_group(&svc, "owner", &["m1"]).await;

        group.valid_until = Some("2000-01-01T00:00:00Z".into());
        svc.sync_group_save(&group).await.unwrap();
        assert!(reload(&svc, "m1").await.groups.is_empty());
        assert!(reload(&svc, "owner").await.groups.is_empty());
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let svc = test_service();
        put_account(&svc, "owner", Role::Manager).await;
        put_account(&svc, "m1", Role::Member).await;
        let g1 = put_group(&svc, "owner", &["m1"]).await;
        let g2 = put_group(&svc, "owner", &["m1"]).await;

        svc.sync_group_delete(&[g1.clone()]).await.unwrap();
        let m1 = reload(&svc, "m1").await;
        assert_eq!(m1.groups, vec![g2.id.clone()]);
        assert!(svc.store.find(&g1.id).await.unwrap().is_none());

        svc.sync_group_delete(&[g2.clone()]).await.unwrap();
        assert!(reload(&svc, "m1").await.groups.is_empty());
    }

    #[tokio::test]
    async fn test_pending_changes_accumulate() {
        let svc = test_service();
        put_account(&svc, "owner", Role::Manager).await;
        put_account(&svc, "m1", Role::Member).await;

        let mut g1 = Document::new(GROUP_TYPE, "owner");
        g1.id = "g1".into();
        g1.add_participant("m1", None);
        let mut g2 = g1.clone();
        g2.id = "g2".into();

        let mut pending = Changeset::new();
        svc.apply_membership(&g1, false, &mut pending).await.unwrap();
        svc.apply_membership(&g2, false, &mut pending).await.unwrap();
        assert_eq!(pending["m1"].groups, vec!["g1".to_string(), "g2".to_string()]);
        assert_eq!(pending.len(), 2);
    }
}
