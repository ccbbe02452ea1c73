//! Action descriptors: what an action is, what it needs, who may run it.

use serde::Serialize;
use serde_json::Value;
use shutter_core::{IntentKind, ParameterSchema};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::handler::ActionHandler;

/// A registered, schema-described executable operation.
///
/// Descriptors are immutable once registered; the registry hands out
/// `Arc<ActionDescriptor>`.
#[derive(Clone)]
pub struct ActionDescriptor {
    /// Globally unique, stable across versions.
    pub id: String,
    pub name: String,
    pub description: String,
    pub schema: ParameterSchema,
    pub required_permissions: BTreeSet<String>,
    pub handler: Arc<dyn ActionHandler>,
    /// Safe to invoke twice; enables the single retry on transient failures.
    pub idempotent: bool,
    /// Handler implements `revert`; successful runs get a rollback token.
    pub reversible: bool,
    /// Missing parameters produce a clarification instead of a rejection.
    pub supports_clarification: bool,
    /// Intents this action serves.
    pub intents: Vec<IntentKind>,
    /// Array parameter holding the targets of a bulk action.
    pub bulk_parameter: Option<String>,
}

impl ActionDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, handler: Arc<dyn ActionHandler>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            schema: ParameterSchema::default(),
            required_permissions: BTreeSet::new(),
            handler,
            idempotent: false,
            reversible: false,
            supports_clarification: true,
            intents: Vec::new(),
            bulk_parameter: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn schema(mut self, schema: ParameterSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn requires<S: Into<String>>(mut self, permissions: impl IntoIterator<Item = S>) -> Self {
        self.required_permissions = permissions.into_iter().map(Into::into).collect();
        self
    }

    pub fn serves(mut self, intents: impl IntoIterator<Item = IntentKind>) -> Self {
        self.intents = intents.into_iter().collect();
        self
    }

    pub fn idempotent(mut self, idempotent: bool) -> Self {
        self.idempotent = idempotent;
        self
    }

    pub fn reversible(mut self, reversible: bool) -> Self {
        self.reversible = reversible;
        self
    }

    pub fn clarifiable(mut self, supports_clarification: bool) -> Self {
        self.supports_clarification = supports_clarification;
        self
    }

    pub fn bulk_over(mut self, parameter: impl Into<String>) -> Self {
        self.bulk_parameter = Some(parameter.into());
        self
    }

    /// JSON Schema of the action's input.
    pub fn input_schema(&self) -> Value {
        self.schema.json_schema()
    }

    pub fn summary(&self) -> ActionSummary {
        ActionSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema(),
            required_permissions: self.required_permissions.iter().cloned().collect(),
            intents: self.intents.clone(),
            idempotent: self.idempotent,
            reversible: self.reversible,
            bulk: self.bulk_parameter.is_some(),
        }
    }
}

impl std::fmt::Debug for ActionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("schema", &self.schema)
            .field("required_permissions", &self.required_permissions)
            .field("idempotent", &self.idempotent)
            .field("reversible", &self.reversible)
            .field("intents", &self.intents)
            .field("bulk_parameter", &self.bulk_parameter)
            .finish_non_exhaustive()
    }
}

/// Read-only, serializable view of a descriptor for external callers and
/// markup generators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub required_permissions: Vec<String>,
    pub intents: Vec<IntentKind>,
    pub idempotent: bool,
    pub reversible: bool,
    pub bulk: bool,
}
