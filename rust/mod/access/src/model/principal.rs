use serde::{Deserialize, Serialize};

/// Authenticated identity handed over by the identity provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Principal {
    /// Provider subject id. Becomes the account id on first login.
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Display name ("First Last").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,

    /// Email of the account an admin session is impersonating.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impersonate: Option<String>,
}

impl Principal {
    pub fn new(id: &str, email: &str) -> Self {
        Self {
            id: id.to_string(),
            email: Some(email.to_string()),
            ..Default::default()
        }
    }

    /// The email, if present and non-blank.
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref().map(str::trim).filter(|e| !e.is_empty())
    }
}
