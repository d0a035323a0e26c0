use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use tenancy_core::is_valid_at;

use super::{ACCOUNT_TYPE, Participant, Role};

fn account_kind() -> String {
    ACCOUNT_TYPE.to_string()
}

/// A user account. Stored as a document of type "account".
///
/// `participants` and `groups` are caches maintained by the invitation
/// workflow and the membership synchronizer; clients never write them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,

    #[serde(rename = "type", default = "account_kind")]
    pub kind: String,

    /// Login email. Looked up case-insensitively.
    #[serde(default)]
    pub email: String,

    /// Self, or the delegating owner's id.
    #[serde(default)]
    pub owner: String,

    #[serde(default)]
    pub role: Role,

    /// Accounts this one shares data with directly.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub participants: Vec<Participant>,

    /// Ids of groups this account belongs to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<String>,

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

impl Account {
    /// A fresh self-owned account.
    pub fn new(id: &str, email: &str) -> Self {
        Self {
            id: id.to_string(),
            kind: account_kind(),
            email: email.to_string(),
            owner: id.to_string(),
            role: Role::None,
            participants: Vec::new(),
            groups: Vec::new(),
            first_name: None,
            last_name: None,
            photo: None,
            last_login: None,
            valid_until: None,
            created_at: String::new(),
            updated_at: String::new(),
            updated_by: None,
            fields: Map::new(),
        }
    }

    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    pub fn is_valid_at(&self, at: &DateTime<Utc>) -> bool {
        is_valid_at(self.valid_until.as_deref(), at)
    }

    /// "First Last", falling back to the email.
    pub fn display_name(&self) -> String {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect();
        if parts.is_empty() {
            self.email.clone()
        } else {
            parts.join(" ")
        }
    }

    pub fn participant_ids(&self) -> BTreeSet<String> {
        self.participants.iter().map(|p| p.id.clone()).collect()
    }

    pub fn has_participant(&self, id: &str) -> bool {
        self.participants.iter().any(|p| p.id == id)
    }

    /// Add a direct sharing edge. Never adds self. Returns true if changed.
    pub fn add_participant(&mut self, id: &str, name: Option<&str>) -> bool {
        if id == self.id || self.has_participant(id) {
            return false;
        }
        self.participants.push(Participant {
            id: id.to_string(),
            name: name.map(str::to_string),
        });
        true
    }

    pub fn remove_participant(&mut self, id: &str) -> bool {
        let before = self.participants.len();
        self.participants.retain(|p| p.id != id);
        self.participants.len() != before
    }

    pub fn in_group(&self, group_id: &str) -> bool {
        self.groups.iter().any(|g| g == group_id)
    }

    pub fn join_group(&mut self, group_id: &str) -> bool {
        if self.in_group(group_id) {
            return false;
        }
        self.groups.push(group_id.to_string());
        true
    }

    pub fn leave_group(&mut self, group_id: &str) -> bool {
        let before = self.groups.len();
        self.groups.retain(|g| g != group_id);
        self.groups.len() != before
    }
}
