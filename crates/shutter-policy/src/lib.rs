//! Shutter permission enforcement.
//!
//! The core never defines who may do what. Callers arrive with a granted
//! [`PermissionSet`]; actions declare the permissions they require; a
//! [`PermissionPolicy`] decides. The default [`SubsetPolicy`] allows a call
//! exactly when the required set is a subset of the granted one.

pub mod caller;

pub use caller::{Caller, PermissionSet};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Result of a permission check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub allow: bool,
    /// Required permissions the caller lacks.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<String>,
    pub reason: Option<String>,
}

impl PolicyDecision {
    pub fn allow() -> Self {
        Self {
            allow: true,
            missing: Vec::new(),
            reason: None,
        }
    }

    pub fn deny(missing: Vec<String>, reason: impl Into<String>) -> Self {
        Self {
            allow: false,
            missing,
            reason: Some(reason.into()),
        }
    }
}

/// Externally supplied permission check.
///
/// Checks run synchronously inside translation, so implementations must not
/// block on IO.
pub trait PermissionPolicy: Send + Sync {
    fn check(&self, caller: &Caller, action_id: &str, required: &BTreeSet<String>)
        -> PolicyDecision;
}

/// Allows a caller whose permissions cover every required permission.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubsetPolicy;

impl PermissionPolicy for SubsetPolicy {
    fn check(
        &self,
        caller: &Caller,
        action_id: &str,
        required: &BTreeSet<String>,
    ) -> PolicyDecision {
        let missing: Vec<String> = caller
            .permissions
            .missing(required)
            .into_iter()
            .map(String::from)
            .collect();
        if missing.is_empty() {
            return PolicyDecision::allow();
        }
        tracing::debug!(
            caller = %caller.id,
            action = %action_id,
            missing = ?missing,
            "Permission check denied"
        );
        let reason = format!(
            "caller '{}' lacks {} required by action '{}'",
            caller.id,
            missing.join(", "),
            action_id
        );
        PolicyDecision::deny(missing, reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn required(perms: &[&str]) -> BTreeSet<String> {
        perms.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_subset_policy_allows_covered_caller() {
        let caller = Caller::with_permissions("ui", ["read:photos", "write:albums"]);
        let decision = SubsetPolicy.check(&caller, "create-album", &required(&["write:albums"]));
        assert!(decision.allow);
        assert!(decision.missing.is_empty());
    }

    #[test]
    fn test_subset_policy_denies_and_names_gap() {
        let caller = Caller::with_permissions("agent", ["read:photos"]);
        let decision = SubsetPolicy.check(&caller, "create-album", &required(&["write:albums"]));
        assert!(!decision.allow);
        assert_eq!(decision.missing, vec!["write:albums".to_string()]);
        assert!(decision.reason.unwrap().contains("write:albums"));
    }

    #[test]
    fn test_no_requirements_always_allowed() {
        let caller = Caller::with_permissions("anon", Vec::<String>::new());
        assert!(SubsetPolicy.check(&caller, "search-photos", &BTreeSet::new()).allow);
    }
}
