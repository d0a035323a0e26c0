use serde::Serialize;

use super::{Document, INVITATION_TYPE};

/// A pending access request, read off an invitation document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Invitation {
    pub id: String,
    /// Requesting account id.
    pub inviter: String,
    /// Lower-cased email of the invited account.
    pub invitee: String,
    /// Requester's display name at request time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inviter_name: Option<String>,
    pub created_at: String,
}

impl Invitation {
    /// None if the document is not a well-formed invitation.
    pub fn from_document(doc: &Document) -> Option<Self> {
        if doc.kind != INVITATION_TYPE {
            return None;
        }
        let target = doc.participants.first()?;
        Some(Self {
            id: doc.id.clone(),
            inviter: doc.owner.clone(),
            invitee: target.id.clone(),
            inviter_name: target.name.clone(),
            created_at: doc.created_at.clone(),
        })
    }
}

/// Invitations naming an account (incoming) and sent by it (outgoing).
#[derive(Debug, Clone, Default, Serialize)]
pub struct InvitationList {
    pub incoming: Vec<Invitation>,
    pub outgoing: Vec<Invitation>,
}
