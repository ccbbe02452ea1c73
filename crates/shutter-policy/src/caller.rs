//! Caller identity and granted permissions.

use serde::{Deserialize, Serialize};
use shutter_core::ShutterConfig;
use std::collections::BTreeSet;

/// Set of permission strings such as `read:photos`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<String>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&mut self, permission: impl Into<String>) {
        self.0.insert(permission.into());
    }

    pub fn contains(&self, permission: &str) -> bool {
        self.0.contains(permission)
    }

    /// Permissions in `required` that this set does not grant.
    pub fn missing<'a>(&self, required: &'a BTreeSet<String>) -> Vec<&'a str> {
        required
            .iter()
            .filter(|p| !self.0.contains(p.as_str()))
            .map(String::as_str)
            .collect()
    }

    pub fn covers(&self, required: &BTreeSet<String>) -> bool {
        required.is_subset(&self.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeSet<String>> for PermissionSet {
    fn from(set: BTreeSet<String>) -> Self {
        Self(set)
    }
}

/// Who issued a command. UI and agent callers are indistinguishable here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub id: String,
    pub permissions: PermissionSet,
}

impl Caller {
    pub fn new(id: impl Into<String>, permissions: PermissionSet) -> Self {
        Self {
            id: id.into(),
            permissions,
        }
    }

    pub fn with_permissions<S: Into<String>>(
        id: impl Into<String>,
        permissions: impl IntoIterator<Item = S>,
    ) -> Self {
        Self::new(id, permissions.into_iter().collect())
    }

    /// Caller holding the permissions of a configured role plus any extra
    /// grants. `None` if the role is not configured.
    pub fn from_role(
        config: &ShutterConfig,
        id: impl Into<String>,
        role: &str,
        extra: &[String],
    ) -> Option<Self> {
        let mut permissions: PermissionSet = config.role_permissions(role)?.into();
        for grant in extra {
            permissions.grant(grant.clone());
        }
        Some(Self::new(id, permissions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_lists_gaps_in_order() {
        let perms: PermissionSet = ["read:photos"].into_iter().collect();
        let required: BTreeSet<String> = ["write:albums", "read:photos", "write:photos"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(perms.missing(&required), vec!["write:albums", "write:photos"]);
        assert!(!perms.covers(&required));
        assert!(perms.covers(&BTreeSet::new()));
    }

    #[test]
    fn test_from_role_adds_grants() {
        let config = ShutterConfig::from_yaml("roles:\n  viewer: [read:photos]\n").unwrap();
        let caller =
            Caller::from_role(&config, "cli", "viewer", &["write:albums".to_string()]).unwrap();
        assert!(caller.permissions.contains("read:photos"));
        assert!(caller.permissions.contains("write:albums"));
        assert!(Caller::from_role(&config, "cli", "admin", &[]).is_none());
    }
}
