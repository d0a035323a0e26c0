use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;

use tenancy_docstore::Predicate;

use crate::model::{ACCOUNT_TYPE, Account, Document, GROUP_TYPE, field};
use crate::service::{AccessError, AccessService, GroupVisibility};
use crate::store_impls;

impl AccessService {
    /// Ids of every other account whose data `account` may see.
    ///
    /// 1. Direct participants of the account.
    /// 2. For each valid group the account belongs to, the group owner.
    /// 3. The group's members too, unless the group is led by its owner
    ///    and the requester is not that owner.
    ///
    /// A group whose owner account no longer exists or is deactivated
    /// contributes nothing. Deactivated accounts are never shared with, and
    /// the result never contains the account itself.
    pub async fn get_sharing_participants(
        &self,
        account: &Account,
    ) -> Result<BTreeSet<String>, AccessError> {
        let mut sharing = account.participant_ids();

        if !account.groups.is_empty() {
            let groups = self.member_groups(account).await?;
            let owners = self.group_owners(&groups).await?;

            for group in &groups {
                let Some(owner) = owners.get(&group.owner) else {
                    continue;
                };
                sharing.insert(owner.id.clone());

                if self.is_led_by_owner(group, owner) && owner.id != account.id {
                    continue;
                }
                sharing.extend(group.participant_ids().map(str::to_string));
            }
        }

        sharing.remove(&account.id);
        for id in self.deactivated_among(&sharing).await? {
            sharing.remove(&id);
        }
        tracing::debug!(account = %account.id, count = sharing.len(), "resolved sharing set");
        Ok(sharing)
    }

    async fn member_groups(&self, account: &Account) -> Result<Vec<Document>, AccessError> {
        let predicate = Predicate::And(vec![
            Predicate::eq(field::TYPE, GROUP_TYPE),
            Predicate::in_strings(field::ID, account.groups.iter().cloned()),
            Predicate::valid_at(field::VALID_UNTIL, Utc::now()),
        ]);
        let rows = self.store.query(&predicate).await?;
        let mut groups = Vec::with_capacity(rows.len());
        for row in rows {
            groups.push(store_impls::decode::<Document>(row)?);
        }
        Ok(groups)
    }

    async fn group_owners(
        &self,
        groups: &[Document],
    ) -> Result<BTreeMap<String, Account>, AccessError> {
        let owner_ids: BTreeSet<&str> = groups.iter().map(|g| g.owner.as_str()).collect();
        let predicate = Predicate::And(vec![
            Predicate::eq(field::TYPE, ACCOUNT_TYPE),
            Predicate::in_strings(field::ID, owner_ids),
            Predicate::valid_at(field::VALID_UNTIL, Utc::now()),
        ]);
        Ok(self
            .query_as::<Account>(&predicate)
            .await?
            .into_iter()
            .map(|a| (a.id.clone(), a))
            .collect())
    }

    /// Ids in `ids` that belong to deactivated accounts. Ids with no
    /// account at all are left alone.
    async fn deactivated_among(&self, ids: &BTreeSet<String>) -> Result<Vec<String>, AccessError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let predicate = Predicate::And(vec![
            Predicate::eq(field::TYPE, ACCOUNT_TYPE),
            Predicate::in_strings(field::ID, ids.iter().cloned()),
            Predicate::negate(Predicate::valid_at(field::VALID_UNTIL, Utc::now())),
        ]);
        Ok(self
            .store
            .query(&predicate)
            .await?
            .iter()
            .filter_map(|row| row.get(field::ID).and_then(|v| v.as_str()))
            .map(str::to_string)
            .collect())
    }

    /// Whether members of `group` see only its owner.
    pub(crate) fn is_led_by_owner(&self, group: &Document, owner: &Account) -> bool {
        let category = group.field_str(&self.config.group_category_field);
        match self.config.visibility(category) {
            GroupVisibility::Leader => true,
            GroupVisibility::Peer => false,
            GroupVisibility::Auto => self.config.is_leader_role(owner.role),
        }
    }
}
