//! Parameter schemas owned by action descriptors.
//!
//! A schema is an ordered list of [`ParameterSpec`]s. Each spec declares a
//! type, whether it is required, which entity kinds may bind to it, and a
//! validator predicate run over the decoded JSON value.

use crate::entity::EntityKind;
use crate::reason::ReasonCode;
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Declared type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Boolean,
    Date,
    Array,
    Object,
}

impl ParamType {
    /// Check if a decoded value has this type.
    ///
    /// Dates are either a single `YYYY-MM-DD` string or a closed
    /// `{start, end}` range with `start <= end`.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
            Self::Date => match value {
                Value::String(s) => parse_day(s).is_some(),
                Value::Object(obj) => {
                    let start = obj.get("start").and_then(Value::as_str).and_then(parse_day);
                    let end = obj.get("end").and_then(Value::as_str).and_then(parse_day);
                    matches!((start, end), (Some(s), Some(e)) if s <= e)
                }
                _ => false,
            },
        }
    }

    /// JSON Schema fragment for this type.
    fn json_schema(&self) -> Value {
        match self {
            Self::String => json!({"type": "string"}),
            Self::Number => json!({"type": "number"}),
            Self::Boolean => json!({"type": "boolean"}),
            Self::Array => json!({"type": "array"}),
            Self::Object => json!({"type": "object"}),
            Self::Date => json!({
                "oneOf": [
                    {"type": "string", "format": "date"},
                    {
                        "type": "object",
                        "properties": {
                            "start": {"type": "string", "format": "date"},
                            "end": {"type": "string", "format": "date"}
                        },
                        "required": ["start", "end"]
                    }
                ]
            }),
        }
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Array => "array",
            Self::Object => "object",
        };
        f.write_str(s)
    }
}

fn parse_day(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Predicate over a decoded parameter value.
pub type ValidatorFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Named validator predicate.
#[derive(Clone)]
pub struct Validator {
    name: String,
    check: ValidatorFn,
}

impl Validator {
    pub fn new(name: impl Into<String>, check: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    /// Accepts any value of the declared type.
    pub fn any() -> Self {
        Self::new("any", |_| true)
    }

    /// Rejects empty strings and empty arrays.
    pub fn non_empty() -> Self {
        Self::new("non_empty", |value| match value {
            Value::String(s) => !s.trim().is_empty(),
            Value::Array(items) => !items.is_empty(),
            Value::Object(obj) => !obj.is_empty(),
            Value::Null => false,
            _ => true,
        })
    }

    /// Every element of an array must be a non-empty string.
    pub fn string_items() -> Self {
        Self::new("string_items", |value| {
            value.as_array().is_some_and(|items| {
                !items.is_empty()
                    && items
                        .iter()
                        .all(|v| v.as_str().is_some_and(|s| !s.trim().is_empty()))
            })
        })
    }

    /// Array of target ids or selection objects (`{"selector": ...}`).
    pub fn targets() -> Self {
        Self::new("targets", |value| {
            value.as_array().is_some_and(|items| {
                !items.is_empty()
                    && items.iter().all(|item| match item {
                        Value::String(s) => !s.trim().is_empty(),
                        Value::Object(obj) => obj.get("selector").is_some_and(Value::is_string),
                        _ => false,
                    })
            })
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn check(&self, value: &Value) -> bool {
        (self.check)(value)
    }
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator").field("name", &self.name).finish()
    }
}

/// One parameter of an action.
#[derive(Debug, Clone, Serialize)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub required: bool,
    /// Must be present for the schema to be well formed.
    #[serde(skip)]
    pub validator: Option<Validator>,
    /// Entity kinds that may bind to this parameter.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entity_kinds: Vec<EntityKind>,
    /// Bind every matching entity as an array instead of choosing one.
    #[serde(default)]
    pub collect: bool,
    /// Default for optional parameters. Required parameters are never defaulted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ParameterSpec {
    fn new(name: impl Into<String>, param_type: ParamType, required: bool) -> Self {
        Self {
            name: name.into(),
            param_type,
            required,
            validator: Some(Validator::any()),
            entity_kinds: Vec::new(),
            collect: false,
            default: None,
            description: None,
        }
    }

    pub fn required(name: impl Into<String>, param_type: ParamType) -> Self {
        Self::new(name, param_type, true)
    }

    pub fn optional(name: impl Into<String>, param_type: ParamType) -> Self {
        Self::new(name, param_type, false)
    }

    pub fn from_entities(mut self, kinds: impl IntoIterator<Item = EntityKind>) -> Self {
        self.entity_kinds = kinds.into_iter().collect();
        self
    }

    pub fn collecting(mut self) -> Self {
        self.collect = true;
        self
    }

    pub fn validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn accepts(&self, kind: EntityKind) -> bool {
        self.entity_kinds.contains(&kind)
    }

    /// Type check plus validator.
    pub fn check(&self, value: &Value) -> Result<(), SchemaViolation> {
        if !self.param_type.matches(value) {
            return Err(SchemaViolation::new(
                ReasonCode::ValidationFailed,
                &self.name,
                format!("parameter '{}' expects {}, got {}", self.name, self.param_type, value),
            ));
        }
        match &self.validator {
            Some(v) if !v.check(value) => Err(SchemaViolation::new(
                ReasonCode::ValidationFailed,
                &self.name,
                format!(
                    "parameter '{}' failed validator '{}' with value {}",
                    self.name,
                    v.name(),
                    value
                ),
            )),
            Some(_) => Ok(()),
            None => Err(SchemaViolation::new(
                ReasonCode::ValidationFailed,
                &self.name,
                format!("parameter '{}' has no validator", self.name),
            )),
        }
    }
}

/// A parameter-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    pub reason: ReasonCode,
    pub parameter: String,
    pub message: String,
}

impl SchemaViolation {
    pub fn new(reason: ReasonCode, parameter: &str, message: impl Into<String>) -> Self {
        Self {
            reason,
            parameter: parameter.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.reason, self.message)
    }
}

/// Ordered parameter list of an action.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ParameterSchema {
    params: Vec<ParameterSpec>,
}

impl ParameterSchema {
    pub fn new(params: Vec<ParameterSpec>) -> Self {
        Self { params }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParameterSpec> {
        self.params.iter()
    }

    pub fn get(&self, name: &str) -> Option<&ParameterSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn required(&self) -> impl Iterator<Item = &ParameterSpec> {
        self.params.iter().filter(|p| p.required)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Check that every parameter is named, unique and carries a validator.
    pub fn check_well_formed(&self) -> Result<(), String> {
        let mut seen = HashSet::new();
        for param in &self.params {
            if param.name.trim().is_empty() {
                return Err("parameter with empty name".to_string());
            }
            if !seen.insert(param.name.as_str()) {
                return Err(format!("duplicate parameter '{}'", param.name));
            }
            if param.validator.is_none() {
                return Err(format!("parameter '{}' has no validator", param.name));
            }
            if param.collect && param.param_type != ParamType::Array {
                return Err(format!(
                    "parameter '{}' collects entities but is not an array",
                    param.name
                ));
            }
            if param.required && param.default.is_some() {
                return Err(format!(
                    "required parameter '{}' must not declare a default",
                    param.name
                ));
            }
        }
        Ok(())
    }

    /// Validate a full parameter map: required presence, then type and
    /// validator for every supplied value. Unknown names are rejected.
    pub fn validate(&self, parameters: &BTreeMap<String, Value>) -> Result<(), SchemaViolation> {
        for param in self.required() {
            if !parameters.contains_key(&param.name) {
                return Err(SchemaViolation::new(
                    ReasonCode::MissingRequiredParameter,
                    &param.name,
                    format!("required parameter '{}' is missing", param.name),
                ));
            }
        }
        for (name, value) in parameters {
            let spec = self.get(name).ok_or_else(|| {
                SchemaViolation::new(
                    ReasonCode::ValidationFailed,
                    name,
                    format!("unknown parameter '{}'", name),
                )
            })?;
            spec.check(value)?;
        }
        Ok(())
    }

    /// Render as a JSON Schema object for external callers.
    pub fn json_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.params {
            let mut prop = param.param_type.json_schema();
            if let (Some(desc), Value::Object(obj)) = (&param.description, &mut prop) {
                obj.insert("description".into(), Value::String(desc.clone()));
            }
            if let (Some(default), Value::Object(obj)) = (&param.default, &mut prop) {
                obj.insert("default".into(), default.clone());
            }
            properties.insert(param.name.clone(), prop);
        }
        let required: Vec<Value> = self
            .required()
            .map(|p| Value::String(p.name.clone()))
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false
        })
    }
}
