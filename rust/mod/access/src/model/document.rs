use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use tenancy_core::is_valid_at;

use super::{AclEntry, PermissionTier};

/// Document type of user accounts.
pub const ACCOUNT_TYPE: &str = "account";
/// Document type of groups.
pub const GROUP_TYPE: &str = "group";
/// Document type of pending access requests.
pub const INVITATION_TYPE: &str = "invitation";

/// JSON keys the access core reads and filters on.
pub mod field {
    pub const ID: &str = "id";
    pub const TYPE: &str = "type";
    pub const OWNER: &str = "owner";
    pub const EMAIL: &str = "email";
    pub const PARTICIPANTS: &str = "participants";
    pub const PERMISSIONS: &str = "permissions";
    pub const GROUPS: &str = "groups";
    pub const VALID_UNTIL: &str = "valid_until";
    pub const CREATED_AT: &str = "created_at";
    pub const UPDATED_AT: &str = "updated_at";
    pub const UPDATED_BY: &str = "updated_by";
    pub const SUBJECT: &str = "subject";
}

/// A participant entry: an account id (or, on invitations, an email).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Participant {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: None,
        }
    }
}

/// A stored document of any type.
///
/// The access core only interprets the envelope below; every other key is
/// carried through untouched in `fields`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub id: String,

    #[serde(rename = "type", default)]
    pub kind: String,

    /// Owning account id, or the system owner sentinel.
    #[serde(default)]
    pub owner: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub participants: Vec<Participant>,

    /// Optional ACL entries.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<AclEntry>,

    /// Soft-delete marker (RFC 3339). Past value = invisible.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub created_at: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub updated_at: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(kind: &str, owner: &str) -> Self {
        Self {
            kind: kind.to_string(),
            owner: owner.to_string(),
            ..Default::default()
        }
    }

    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    pub fn is_valid_at(&self, at: &DateTime<Utc>) -> bool {
        is_valid_at(self.valid_until.as_deref(), at)
    }

    pub fn has_participant(&self, id: &str) -> bool {
        self.participants.iter().any(|p| p.id == id)
    }

    pub fn participant_ids(&self) -> impl Iterator<Item = &str> {
        self.participants.iter().map(|p| p.id.as_str())
    }

    /// Add a participant unless already present. Returns true if added.
    pub fn add_participant(&mut self, id: &str, name: Option<&str>) -> bool {
        if self.has_participant(id) {
            return false;
        }
        self.participants.push(Participant {
            id: id.to_string(),
            name: name.map(str::to_string),
        });
        true
    }

    /// Highest ACL level granted to `subject`, if any entry names it.
    pub fn acl_tier(&self, subject: &str) -> Option<PermissionTier> {
        self.permissions
            .iter()
            .filter(|e| e.subject == subject)
            .map(|e| e.level)
            .max()
    }

    /// A string-valued extension field.
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_and_extra_fields() {
        let doc = Document::from_value(json!({
            "id": "t1",
            "type": "task",
            "owner": "alice",
            "participants": [{"id": "bob"}],
            "permissions": [
                {"subject": "carol", "level": "partial"},
                {"subject": "carol", "level": "read"},
            ],
            "title": "Plant beans",
        }))
        .unwrap();

        assert_eq!(doc.kind, "task");
        assert!(doc.has_participant("bob"));
        assert_eq!(doc.acl_tier("carol"), Some(PermissionTier::Read));
        assert_eq!(doc.acl_tier("bob"), None);
        assert_eq!(doc.field_str("title"), Some("Plant beans"));

        let back = doc.to_value().unwrap();
        assert_eq!(back["title"], "Plant beans");
        assert_eq!(back["type"], "task");
        assert!(back.get("valid_until").is_none());
    }

    #[test]
    fn test_add_participant_dedupes() {
        let mut doc = Document::new("group", "alice");
        assert!(doc.add_participant("bob", Some("Bob")));
        assert!(!doc.add_participant("bob", None));
        assert_eq!(doc.participant_ids().collect::<Vec<_>>(), vec!["bob"]);
    }
}
