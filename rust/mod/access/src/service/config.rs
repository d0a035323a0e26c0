use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::model::{PermissionTier, Role};
use crate::service::AccessError;

/// Which accounts a document type is visible to, beyond its owner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Owner, system-owned, and every account whose owner is in the sharing set.
    #[default]
    Shared,
    /// Shared, plus accounts named in the document's participants.
    Participants,
    /// Only the owner and the named participants (groups).
    Membership,
    /// Owner, system-owned, and ACL subjects whose owner is in the sharing set.
    Acl,
}

/// How members of a group see each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupVisibility {
    /// Leader when the owner holds a leader role, peer otherwise.
    #[default]
    Auto,
    /// Members see the owner and every other member.
    Peer,
    /// Members see only the owner; the owner sees every member.
    Leader,
}

/// Per-type access policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypePolicy {
    pub scope: Scope,
    /// Sharing participants of the owner get `Full` instead of `Partial`.
    pub co_owned: bool,
    /// Minimum tier for `can_read`.
    pub read: PermissionTier,
    /// Minimum tier for `can_update`.
    pub update: PermissionTier,
    /// Minimum tier for `can_delete`.
    pub delete: PermissionTier,
    /// Keys clients may set on create but never change afterwards.
    pub immutable_fields: Vec<String>,
}

impl Default for TypePolicy {
    fn default() -> Self {
        Self {
            scope: Scope::Shared,
            co_owned: false,
            read: PermissionTier::Partial,
            update: PermissionTier::Full,
            delete: PermissionTier::Full,
            immutable_fields: Vec::new(),
        }
    }
}

impl TypePolicy {
    fn scoped(scope: Scope) -> Self {
        Self {
            scope,
            ..Default::default()
        }
    }
}

/// Configuration for the access service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// When false every valid document is visible and fully permitted.
    pub multi_tenant: bool,
    /// Owner id of globally visible records.
    pub system_owner: String,
    /// Roles that make a group owner a leader under `GroupVisibility::Auto`.
    pub leader_roles: Vec<Role>,
    /// Roles allowed to create groups.
    pub group_creator_roles: Vec<Role>,
    /// Group document key holding its category.
    pub group_category_field: String,
    /// Visibility per group category. Unlisted categories use `Auto`.
    pub group_visibility: BTreeMap<String, GroupVisibility>,
    /// Policy for types not listed in `types`.
    pub default_policy: TypePolicy,
    pub types: BTreeMap<String, TypePolicy>,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            multi_tenant: true,
            system_owner: "system".to_string(),
            leader_roles: vec![Role::Coordinator, Role::Manager],
            group_creator_roles: vec![Role::Coordinator, Role::Manager, Role::Admin],
            group_category_field: "category".to_string(),
            group_visibility: BTreeMap::new(),
            default_policy: TypePolicy::default(),
            types: builtin_types(),
        }
    }
}

fn builtin_types() -> BTreeMap<String, TypePolicy> {
    let mut types = BTreeMap::new();
    for name in ["task", "field", "goal", "goalstrategy", "dataset"] {
        types.insert(name.to_string(), TypePolicy::scoped(Scope::Shared));
    }
    types.insert("contact".to_string(), TypePolicy::scoped(Scope::Participants));
    types.insert("group".to_string(), TypePolicy::scoped(Scope::Membership));
    types.insert(
        "account".to_string(),
        TypePolicy {
            immutable_fields: [
                "owner",
                "email",
                "role",
                "participants",
                "groups",
                "valid_until",
                "last_login",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            ..Default::default()
        },
    );
    types.insert(
        "invitation".to_string(),
        TypePolicy {
            immutable_fields: vec!["owner".to_string(), "participants".to_string()],
            ..Default::default()
        },
    );
    types
}

impl AccessConfig {
    /// Load from a TOML file. A missing file yields the defaults; types
    /// listed in the file replace the built-in policy of the same name.
    pub fn load(path: &Path) -> Result<Self, AccessError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no access config, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| AccessError::Validation(format!("read {}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, AccessError> {
        let mut config: AccessConfig = toml::from_str(content)
            .map_err(|e| AccessError::Validation(format!("access config: {}", e)))?;
        for (name, policy) in builtin_types() {
            config.types.entry(name).or_insert(policy);
        }
        Ok(config)
    }

    /// Policy for a document type (case-insensitive).
    pub fn policy(&self, kind: &str) -> &TypePolicy {
        self.types
            .get(kind)
            .or_else(|| self.types.get(&kind.to_lowercase()))
            .unwrap_or(&self.default_policy)
    }

    pub fn visibility(&self, category: Option<&str>) -> GroupVisibility {
        category
            .and_then(|c| self.group_visibility.get(c))
            .copied()
            .unwrap_or_default()
    }

    pub fn is_leader_role(&self, role: Role) -> bool {
        self.leader_roles.contains(&role)
    }

    pub fn can_create_groups(&self, role: Role) -> bool {
        self.group_creator_roles.contains(&role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AccessConfig::default();
        assert!(config.multi_tenant);
        assert_eq!(config.system_owner, "system");
        assert_eq!(config.policy("contact").scope, Scope::Participants);
        assert_eq!(config.policy("group").scope, Scope::Membership);
        assert_eq!(config.policy("Task").scope, Scope::Shared);
        assert_eq!(config.policy("unknown"), &TypePolicy::default());
        assert!(config.policy("account").immutable_fields.contains(&"role".to_string()));
        assert_eq!(config.visibility(Some("team")), GroupVisibility::Auto);
        assert!(config.is_leader_role(Role::Manager));
        assert!(!config.is_leader_role(Role::Member));
    }

    #[test]
    fn test_from_toml_overrides() {
        let config = AccessConfig::from_toml(
            r#"
            system_owner = "global"
            leader_roles = ["manager"]

            [group_visibility]
            crew = "leader"
            club = "peer"

            [types.note]
            scope = "acl"
            read = "read"

            [types.task]
            co_owned = true
            "#,
        )
        .unwrap();

        assert_eq!(config.system_owner, "global");
        assert!(config.multi_tenant);
        assert_eq!(config.leader_roles, vec![Role::Manager]);
        assert_eq!(config.visibility(Some("crew")), GroupVisibility::Leader);
        assert_eq!(config.visibility(Some("club")), GroupVisibility::Peer);

        let note = config.policy("note");
        assert_eq!(note.scope, Scope::Acl);
        assert_eq!(note.read, PermissionTier::Read);
        assert_eq!(note.update, PermissionTier::Full);

        assert!(config.policy("task").co_owned);
        // Built-ins not mentioned in the file survive.
        assert_eq!(config.policy("contact").scope, Scope::Participants);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = AccessConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.system_owner, "system");
    }

    #[test]
    fn test_load_rejects_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("access.toml");
        std::fs::write(&path, "multi_tenant = \"maybe\"").unwrap();
        assert!(matches!(AccessConfig::load(&path), Err(AccessError::Validation(_))));
    }
}
