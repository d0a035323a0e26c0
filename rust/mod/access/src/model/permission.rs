use serde::{Deserialize, Serialize};

/// Access level an account holds on a document. Ordered: `None < Partial < Read < Full`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionTier {
    #[default]
    None,
    Partial,
    Read,
    Full,
}

/// Explicit per-document grant: `subject` (an account id) holds `level`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclEntry {
    pub subject: String,
    pub level: PermissionTier,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_order() {
        assert!(PermissionTier::None < PermissionTier::Partial);
        assert!(PermissionTier::Partial < PermissionTier::Read);
        assert!(PermissionTier::Read < PermissionTier::Full);
        assert_eq!(
            [PermissionTier::Read, PermissionTier::Partial].into_iter().max(),
            Some(PermissionTier::Read)
        );
    }
}
