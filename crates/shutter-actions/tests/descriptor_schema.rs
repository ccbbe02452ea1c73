//! The JSON Schema exported for external callers must accept what the
//! registry accepts and reject what it rejects.
//!
//! Run with: cargo test --package shutter-actions --test descriptor_schema

use async_trait::async_trait;
use serde_json::{Value, json};
use shutter_actions::{ActionDescriptor, ActionHandler, ActionRegistry, HandlerError};
use shutter_core::{
    EntityKind, IntentKind, ParamType, ParameterSchema, ParameterSpec, Parameters, Validator,
};
use shutter_policy::PermissionSet;
use std::sync::Arc;

struct Noop;

#[async_trait]
impl ActionHandler for Noop {
    async fn invoke(&self, _target: Option<&str>, _parameters: &Parameters) -> Result<Value, HandlerError> {
        Ok(Value::Null)
    }
}

fn tag_photos() -> ActionDescriptor {
    ActionDescriptor::new("tag-photos", "Tag photos", Arc::new(Noop))
        .description("Add tags to a set of photos")
        .schema(ParameterSchema::new(vec![
            ParameterSpec::required("targets", ParamType::Array)
                .from_entities([EntityKind::Quantity])
                .validator(Validator::targets())
                .describe("Photo ids or a selection"),
            ParameterSpec::required("tags", ParamType::Array)
                .from_entities([EntityKind::Keyword])
                .collecting()
                .validator(Validator::string_items()),
            ParameterSpec::optional("date_range", ParamType::Date).from_entities([EntityKind::Date]),
        ]))
        .requires(["write:photos"])
        .serves([IntentKind::BulkTag])
        .bulk_over("targets")
        .idempotent(true)
        .reversible(true)
}

fn assert_validates(schema: &Value, instance: &Value, expected: bool) {
    let validator = jsonschema::validator_for(schema).expect("schema must compile");
    if validator.is_valid(instance) != expected {
        let errors: Vec<String> = validator.iter_errors(instance).map(|e| e.to_string()).collect();
        panic!("expected valid={expected} for {instance}: {}", errors.join("; "));
    }
}

#[test]
fn test_input_schema_accepts_well_formed_parameters() {
    let schema = tag_photos().input_schema();
    assert_validates(
        &schema,
        &json!({
            "targets": ["p1", {"selector": "last", "count": 5}],
            "tags": ["vacation"],
        }),
        true,
    );
    assert_validates(
        &schema,
        &json!({
            "targets": ["p1"],
            "tags": ["beach"],
            "date_range": {"start": "2024-06-01", "end": "2024-08-31"},
        }),
        true,
    );
}

#[test]
fn test_input_schema_rejects_what_the_schema_rejects() {
    let descriptor = tag_photos();
    let schema = descriptor.input_schema();

    let missing_tags = json!({"targets": ["p1"]});
    assert_validates(&schema, &missing_tags, false);
    assert!(descriptor.schema.validate(&as_params(&missing_tags)).is_err());

    let wrong_type = json!({"targets": ["p1"], "tags": "vacation"});
    assert_validates(&schema, &wrong_type, false);
    assert!(descriptor.schema.validate(&as_params(&wrong_type)).is_err());

    let unknown = json!({"targets": ["p1"], "tags": ["x"], "album": "Trips"});
    assert_validates(&schema, &unknown, false);
    assert!(descriptor.schema.validate(&as_params(&unknown)).is_err());
}

#[test]
fn test_summary_is_the_discovery_view() {
    let registry = ActionRegistry::new();
    registry.register(tag_photos()).unwrap();

    let editor: PermissionSet = ["read:photos", "write:photos"].into_iter().collect();
    let found = registry.discover(&editor);
    assert_eq!(found.len(), 1);

    let summary = serde_json::to_value(found[0].summary()).unwrap();
    assert_eq!(summary["id"], "tag-photos");
    assert_eq!(summary["required_permissions"], json!(["write:photos"]));
    assert_eq!(summary["intents"], json!(["BULK_TAG"]));
    assert_eq!(summary["bulk"], true);
    assert_eq!(summary["reversible"], true);
    assert_eq!(summary["input_schema"]["required"], json!(["targets", "tags"]));
    assert_eq!(
        summary["input_schema"]["properties"]["targets"]["description"],
        "Photo ids or a selection"
    );

    let viewer: PermissionSet = ["read:photos"].into_iter().collect();
    assert!(registry.discover(&viewer).is_empty());
}

fn as_params(value: &Value) -> Parameters {
    value
        .as_object()
        .map(|m| m.clone().into_iter().collect())
        .unwrap_or_default()
}
