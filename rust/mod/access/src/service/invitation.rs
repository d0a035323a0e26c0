use tenancy_docstore::Predicate;

use crate::model::{
    Account, Document, INVITATION_TYPE, Invitation, InvitationList, field,
};
use crate::service::{AccessError, AccessService};
use crate::store_impls::Record;

impl AccessService {
    /// Ask to share data with the account behind `email`.
    ///
    /// Creates an invitation owned by the requester naming the lower-cased
    /// email. Fails with `InvalidState` if one is already pending from this
    /// requester to that email, or if the two already share.
    pub async fn request_access(&self, account: &Account, email: &str) -> Result<Invitation, AccessError> {
        let email = email.trim().to_lowercase();
        if email.is_empty() {
            return Err(AccessError::Validation("email is required".into()));
        }
        if email == account.email.to_lowercase() {
            return Err(AccessError::Validation("cannot invite yourself".into()));
        }

        if !self.invitations_between(&account.id, &email).await?.is_empty() {
            return Err(AccessError::InvalidState(format!(
                "invitation to {} already pending",
                email
            )));
        }
        let me = self
            .find_by_id(&account.id)
            .await?
            .ok_or_else(|| AccessError::NotFound(format!("account {}", account.id)))?;
        if let Some(target) = self.find_by_email(&email).await? {
            if me.has_participant(&target.id) {
                return Err(AccessError::InvalidState(format!("already sharing with {}", email)));
            }
        }

        let mut doc = Document::new(INVITATION_TYPE, &account.id);
        doc.add_participant(&email, Some(&account.display_name()));
        doc.updated_by = Some(account.id.clone());
        doc.before_create();
        self.store.save(Self::encode(&doc)?).await?;

        tracing::info!(inviter = %account.id, invitation = %doc.id, "access requested");
        Invitation::from_document(&doc)
            .ok_or_else(|| AccessError::InvalidState("malformed invitation".into()))
    }

    /// Accept the pending invitation from `inviter_id`.
    ///
    /// Both accounts gain each other as participants in one atomic batch,
    /// then the invitation is removed. Returns the updated account.
    pub async fn accept_access(&self, account: &Account, inviter_id: &str) -> Result<Account, AccessError> {
        let invitations = self.invitations_between(inviter_id, &account.email).await?;
        if invitations.is_empty() {
            return Err(AccessError::InvalidState(format!(
                "no pending invitation from {}",
                inviter_id
            )));
        }

        let mut inviter = self
            .find_by_id(inviter_id)
            .await?
            .ok_or_else(|| AccessError::NotFound(format!("account {}", inviter_id)))?;
        let mut me = self
            .find_by_id(&account.id)
            .await?
            .ok_or_else(|| AccessError::NotFound(format!("account {}", account.id)))?;

        me.add_participant(&inviter.id, Some(&inviter.display_name()));
        inviter.add_participant(&me.id, Some(&me.display_name()));
        me.before_update();
        inviter.before_update();
        self.store
            .save_batch(vec![Self::encode(&me)?, Self::encode(&inviter)?])
            .await?;

        for invitation in &invitations {
            self.store.delete(&invitation.id).await?;
        }
        tracing::info!(account = %me.id, inviter = %inviter.id, "access accepted");
        Ok(me)
    }

    /// Reject, cancel, or unshare with another account, named by id or email.
    ///
    /// Removes pending invitations in either direction and any existing
    /// sharing edge on both sides. `InvalidState` if there was nothing to
    /// remove.
    pub async fn reject_access(&self, account: &Account, id_or_email: &str) -> Result<(), AccessError> {
        let key = id_or_email.trim();
        let (other, other_email) = if key.contains('@') {
            let email = key.to_lowercase();
            (self.find_by_email(&email).await?, email)
        } else {
            let other = self.find_by_id(key).await?;
            let email = other.as_ref().map(|o| o.email.to_lowercase()).unwrap_or_default();
            (other, email)
        };

        let mut invitations = Vec::new();
        if !other_email.is_empty() {
            invitations.extend(self.invitations_between(&account.id, &other_email).await?);
        }
        if let Some(other) = &other {
            invitations.extend(self.invitations_between(&other.id, &account.email).await?);
        }

        let mut changed = Vec::new();
        if let Some(mut other) = other {
            let mut me = self
                .find_by_id(&account.id)
                .await?
                .ok_or_else(|| AccessError::NotFound(format!("account {}", account.id)))?;
            let removed_mine = me.remove_participant(&other.id);
            let removed_theirs = other.remove_participant(&me.id);
            if removed_mine || removed_theirs {
                me.before_update();
                other.before_update();
                tracing::info!(account = %me.id, other = %other.id, "sharing removed");
                changed.push(Self::encode(&me)?);
                changed.push(Self::encode(&other)?);
            }
        }

        if invitations.is_empty() && changed.is_empty() {
            return Err(AccessError::InvalidState(format!(
                "nothing to reject for {}",
                key
            )));
        }

        if !changed.is_empty() {
            self.store.save_batch(changed).await?;
        }
        for invitation in &invitations {
            self.store.delete(&invitation.id).await?;
            tracing::info!(invitation = %invitation.id, "invitation removed");
        }
        Ok(())
    }

    /// Pending invitations naming the account and sent by it.
    pub async fn list_invitations(&self, account: &Account) -> Result<InvitationList, AccessError> {
        let incoming = Predicate::And(vec![
            Predicate::eq(field::TYPE, INVITATION_TYPE),
            Self::names_email(&account.email),
        ]);
        let outgoing = Predicate::And(vec![
            Predicate::eq(field::TYPE, INVITATION_TYPE),
            Predicate::eq(field::OWNER, account.id.as_str()),
        ]);

        let to_list = |docs: Vec<Document>| -> Vec<Invitation> {
            docs.iter().filter_map(Invitation::from_document).collect()
        };
        Ok(InvitationList {
            incoming: to_list(self.query_as::<Document>(&incoming).await?),
            outgoing: to_list(self.query_as::<Document>(&outgoing).await?),
        })
    }

    /// Invitations owned by `inviter_id` naming `email`.
    async fn invitations_between(
        &self,
        inviter_id: &str,
        email: &str,
    ) -> Result<Vec<Document>, AccessError> {
        let predicate = Predicate::And(vec![
            Predicate::eq(field::TYPE, INVITATION_TYPE),
            Predicate::eq(field::OWNER, inviter_id),
            Self::names_email(email),
        ]);
        self.query_as::<Document>(&predicate).await
    }

    fn names_email(email: &str) -> Predicate {
        Predicate::any(
            field::PARTICIPANTS,
            Predicate::eq_ignore_case(field::ID, email.trim()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Role;
    use crate::service::testing::*;

    #[tokio::test]
    async fn test_request_and_accept() {
        let svc = test_service();
        let alice = put_account(&svc, "alice", Role::Member).await;
        let bob = put_account(&svc, "bob", Role::Member).await;

        let inv = svc.request_access(&alice, "Bob@Example.com").await.unwrap();
        assert_eq!(inv.inviter, "alice");
        assert_eq!(inv.invitee, "bob@example.com");

        let listed = svc.list_invitations(&bob).await.unwrap();
        assert_eq!(listed.incoming.len(), 1);
        assert!(listed.outgoing.is_empty());
        assert_eq!(svc.list_invitations(&alice).await.unwrap().outgoing.len(), 1);

        let bob = svc.accept_access(&bob, "alice").await.unwrap();
        assert!(bob.has_participant("alice"));
        assert!(reload(&svc, "alice").await.has_participant("bob"));
        assert!(svc.store.find(&inv.id).await.unwrap().is_none());

        // Second accept: nothing pending, no duplicate edge.
        assert!(matches!(
            svc.accept_access(&bob, "alice").await,
            Err(AccessError::InvalidState(_))
        ));
        assert_eq!(reload(&svc, "bob").await.participants.len(), 1);
    }

    #[tokio::test]
    async fn test_request_guards() {
        let svc = test_service();
        let alice = put_account(&svc, "alice", Role::Member).await;

        assert!(matches!(
            svc.request_access(&alice, "ALICE@example.com").await,
            Err(AccessError::Validation(_))
        ));
        assert!(matches!(
            svc.request_access(&alice, "  ").await,
            Err(AccessError::Validation(_))
        ));

        // Invitee need not have an account yet.
        svc.request_access(&alice, "newcomer@example.com").await.unwrap();
        assert!(matches!(
            svc.request_access(&alice, "newcomer@example.com").await,
            Err(AccessError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_request_when_already_sharing() {
        let svc = test_service();
        let alice = put_account(&svc, "alice", Role::Member).await;
        let bob = put_account(&svc, "bob", Role::Member).await;
        svc.request_access(&alice, &bob.email).await.unwrap();
        svc.accept_access(&bob, "alice").await.unwrap();

        // `alice` still holds the snapshot taken before the accept.
        assert!(!alice.has_participant("bob"));
        assert!(matches!(
            svc.request_access(&alice, &bob.email).await,
            Err(AccessError::InvalidState(_))
        ));
        assert!(svc.list_invitations(&alice).await.unwrap().outgoing.is_empty());

        let alice = reload(&svc, "alice").await;
        assert!(matches!(
            svc.request_access(&alice, &bob.email).await,
            Err(AccessError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_accept_needs_inviter_account() {
        let svc = test_service();
        let alice = put_account(&svc, "alice", Role::Member).await;
        let bob = put_account(&svc, "bob", Role::Member).await;
        svc.request_access(&alice, &bob.email).await.unwrap();
        svc.store.delete("alice").await.unwrap();

        assert!(matches!(
            svc.accept_access(&bob, "alice").await,
            Err(AccessError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reject_pending_either_side() {
        let svc = test_service();
        let alice = put_account(&svc, "alice", Role::Member).await;
        let bob = put_account(&svc, "bob", Role::Member).await;

        // Invitee declines, naming the inviter by id.
        svc.request_access(&alice, &bob.email).await.unwrap();
        svc.reject_access(&bob, "alice").await.unwrap();
        assert!(svc.list_invitations(&bob).await.unwrap().incoming.is_empty());

        // Inviter cancels, naming the invitee by email.
        svc.request_access(&alice, &bob.email).await.unwrap();
        svc.reject_access(&alice, "BOB@example.com").await.unwrap();
        assert!(svc.list_invitations(&alice).await.unwrap().outgoing.is_empty());

        assert!(matches!(
            svc.reject_access(&alice, "bob").await,
            Err(AccessError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_reject_unshares() {
        let svc = test_service();
        let alice = put_account(&svc, "alice", Role::Member).await;
        let bob = put_account(&svc, "bob", Role::Member).await;
        svc.request_access(&alice, &bob.email).await.unwrap();
        svc.accept_access(&bob, "alice").await.unwrap();

        svc.reject_access(&alice, "bob").await.unwrap();
        assert!(!reload(&svc, "alice").await.has_participant("bob"));
        assert!(!reload(&svc, "bob").await.has_participant("alice"));
        let alice = reload(&svc, "alice").await;
        assert!(svc.get_sharing_participants(&alice).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_invitation_to_unknown_email() {
        let svc = test_service();
        let alice = put_account(&svc, "alice", Role::Member).await;
        svc.request_access(&alice, "ghost@example.com").await.unwrap();
        svc.reject_access(&alice, "ghost@example.com").await.unwrap();
        assert!(svc.list_invitations(&alice).await.unwrap().outgoing.is_empty());
    }
}
