//! Action registry.
//!
//! The catalog of executable actions. External code populates it at startup
//! with one [`register`](ActionRegistry::register) call per operation;
//! re-registering an id replaces the earlier descriptor.
//!
//! Reads and writes are serialized through an `RwLock`, and descriptors are
//! swapped in whole as `Arc`s, so a reader never sees a half-updated entry.

use shutter_core::IntentKind;
use shutter_policy::PermissionSet;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::descriptor::ActionDescriptor;
use crate::error::RegistryError;

#[derive(Default)]
pub struct ActionRegistry {
    actions: RwLock<HashMap<String, Arc<ActionDescriptor>>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and store a descriptor. Last write wins.
    pub fn register(&self, descriptor: ActionDescriptor) -> Result<(), RegistryError> {
        validate(&descriptor)?;

        let id = descriptor.id.clone();
        let previous = self
            .actions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), Arc::new(descriptor));

        if previous.is_some() {
            tracing::warn!(action = %id, "Replaced previously registered action");
        } else {
            tracing::info!(action = %id, "Registered action");
        }
        Ok(())
    }

    pub fn lookup(&self, id: &str) -> Result<Arc<ActionDescriptor>, RegistryError> {
        self.actions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound { id: id.to_string() })
    }

    /// Actions serving `intent`, best candidate first.
    ///
    /// Candidates the caller is permitted to run come first, then narrower
    /// schemas (fewer parameters), then id order.
    pub fn resolve_for_intent(
        &self,
        intent: IntentKind,
        permissions: Option<&PermissionSet>,
    ) -> Vec<Arc<ActionDescriptor>> {
        let mut candidates: Vec<Arc<ActionDescriptor>> = self
            .actions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|d| d.intents.contains(&intent))
            .cloned()
            .collect();

        candidates.sort_by(|a, b| {
            let denied = |d: &ActionDescriptor| permissions.is_some_and(|p| !p.covers(&d.required_permissions));
            denied(a)
                .cmp(&denied(b))
                .then(a.schema.len().cmp(&b.schema.len()))
                .then(a.id.cmp(&b.id))
        });
        candidates
    }

    /// Actions whose required permissions are all granted, in id order.
    pub fn discover(&self, permissions: &PermissionSet) -> Vec<Arc<ActionDescriptor>> {
        let mut found: Vec<Arc<ActionDescriptor>> = self
            .actions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|d| permissions.covers(&d.required_permissions))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        found
    }

    pub fn len(&self) -> usize {
        self.actions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn validate(descriptor: &ActionDescriptor) -> Result<(), RegistryError> {
    let invalid = |reason: String| RegistryError::InvalidDescriptor {
        id: descriptor.id.clone(),
        reason,
    };

    if descriptor.id.trim().is_empty() {
        return Err(invalid("empty action id".to_string()));
    }
    descriptor.schema.check_well_formed().map_err(invalid)?;

    if let Some(bulk) = &descriptor.bulk_parameter {
        match descriptor.schema.get(bulk) {
            Some(spec) if spec.param_type == shutter_core::ParamType::Array => {}
            Some(_) => return Err(invalid(format!("bulk parameter '{bulk}' is not an array"))),
            None => return Err(invalid(format!("bulk parameter '{bulk}' is not in the schema"))),
        }
    }
    if descriptor.intents.iter().any(|i| !i.is_actionable()) {
        return Err(invalid("only actionable intents can be served".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::handler::ActionHandler;
    use async_trait::async_trait;
    use serde_json::Value;
    use shutter_core::{ParamType, ParameterSchema, ParameterSpec, Parameters};

    struct Noop;

    #[async_trait]
    impl ActionHandler for Noop {
        async fn invoke(&self, _target: Option<&str>, _parameters: &Parameters) -> Result<Value, HandlerError> {
            Ok(Value::Null)
        }
    }

    fn action(id: &str, intent: IntentKind, params: usize, perms: &[&str]) -> ActionDescriptor {
        let specs = (0..params)
            .map(|i| ParameterSpec::optional(format!("p{i}"), ParamType::String))
            .collect();
        ActionDescriptor::new(id, id, Arc::new(Noop))
            .schema(ParameterSchema::new(specs))
            .requires(perms.iter().copied())
            .serves([intent])
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = ActionRegistry::new();
        registry.register(action("search-photos", IntentKind::Search, 1, &[])).unwrap();
        assert_eq!(registry.lookup("search-photos").unwrap().id, "search-photos");
        assert!(matches!(
            registry.lookup("nope"),
            Err(RegistryError::NotFound { .. })
        ));
    }

    #[test]
    fn test_reregistration_replaces() {
        let registry = ActionRegistry::new();
        registry.register(action("tag-photos", IntentKind::BulkTag, 1, &[])).unwrap();
        registry
            .register(action("tag-photos", IntentKind::BulkTag, 3, &["write:photos"]))
            .unwrap();
        assert_eq!(registry.len(), 1);
        let current = registry.lookup("tag-photos").unwrap();
        assert_eq!(current.schema.len(), 3);
        assert!(current.required_permissions.contains("write:photos"));
    }

    #[test]
    fn test_rejects_malformed_schema() {
        let mut spec = ParameterSpec::required("q", ParamType::String);
        spec.validator = None;
        let descriptor = ActionDescriptor::new("broken", "broken", Arc::new(Noop))
            .schema(ParameterSchema::new(vec![spec]));
        assert!(matches!(
            ActionRegistry::new().register(descriptor),
            Err(RegistryError::InvalidDescriptor { .. })
        ));

        let bad_bulk = action("bulk", IntentKind::BulkTag, 1, &[]).bulk_over("p0");
        assert!(ActionRegistry::new().register(bad_bulk).is_err());
    }

    #[test]
    fn test_resolve_ranks_permitted_then_narrow() {
        let registry = ActionRegistry::new();
        registry.register(action("wide", IntentKind::Search, 4, &[])).unwrap();
        registry.register(action("narrow", IntentKind::Search, 1, &[])).unwrap();
        registry
            .register(action("privileged", IntentKind::Search, 0, &["admin"]))
            .unwrap();
        registry.register(action("other", IntentKind::BulkMove, 0, &[])).unwrap();

        let viewer: PermissionSet = ["read:photos"].into_iter().collect();
        let ids: Vec<String> = registry
            .resolve_for_intent(IntentKind::Search, Some(&viewer))
            .iter()
            .map(|d| d.id.clone())
            .collect();
        assert_eq!(ids, vec!["narrow", "wide", "privileged"]);

        // without caller context only schema width and id matter
        let ids: Vec<String> = registry
            .resolve_for_intent(IntentKind::Search, None)
            .iter()
            .map(|d| d.id.clone())
            .collect();
        assert_eq!(ids, vec!["privileged", "narrow", "wide"]);

        assert!(registry.resolve_for_intent(IntentKind::CreateAlbum, None).is_empty());
    }

    #[test]
    fn test_discover_filters_by_subset() {
        let registry = ActionRegistry::new();
        registry.register(action("search-photos", IntentKind::Search, 0, &["read:photos"])).unwrap();
        registry
            .register(action("create-album", IntentKind::CreateAlbum, 0, &["write:albums"]))
            .unwrap();
        registry.register(action("public", IntentKind::Filter, 0, &[])).unwrap();

        let viewer: PermissionSet = ["read:photos"].into_iter().collect();
        let ids: Vec<String> = registry.discover(&viewer).iter().map(|d| d.id.clone()).collect();
        assert_eq!(ids, vec!["public", "search-photos"]);
    }
}
