//! Parameter Extractor
//!
//! Binds extracted entities to the named parameters of an action schema.
//! A parameter accepts the entity kinds its spec lists. Collecting
//! parameters take every distinct candidate; all others take the single best
//! one, unless a runner-up is within the ambiguity margin, in which case the
//! parameter is reported ambiguous instead of bound. Required parameters
//! with no candidate are reported missing and never defaulted.

use serde_json::Value;
use shutter_core::{
    ExtractedEntity, Intent, NluConfig, ParamType, ParameterSchema, ParameterSpec, Parameters,
};
use std::collections::BTreeMap;

/// Outcome of binding entities to a schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fill {
    pub parameters: Parameters,
    /// Confidence of the entity (or weakest entity) bound to each parameter.
    /// Defaults are not listed.
    pub bindings: BTreeMap<String, f32>,
    /// Required parameters with no candidate, in schema order.
    pub missing: Vec<String>,
    /// Parameters with competing candidates, best first.
    pub ambiguous: BTreeMap<String, Vec<Value>>,
}

impl Fill {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.ambiguous.is_empty()
    }

    /// Weakest binding confidence, if anything was bound from entities.
    pub fn weakest_binding(&self) -> Option<f32> {
        self.bindings.values().copied().reduce(f32::min)
    }
}

struct Candidate {
    value: Value,
    confidence: f32,
    position: usize,
}

pub struct ParameterExtractor {
    ambiguity_margin: f32,
}

impl ParameterExtractor {
    pub fn new(config: &NluConfig) -> Self {
        Self {
            ambiguity_margin: config.ambiguity_margin,
        }
    }

    pub fn fill(&self, intent: &Intent, entities: &[ExtractedEntity], schema: &ParameterSchema) -> Fill {
        let mut fill = Fill::default();

        for spec in schema.iter() {
            let candidates = candidates_for(spec, entities);

            if candidates.is_empty() {
                if spec.required {
                    fill.missing.push(spec.name.clone());
                } else if let Some(default) = &spec.default {
                    fill.parameters.insert(spec.name.clone(), default.clone());
                }
                continue;
            }

            if spec.collect {
                let mut ordered: Vec<&Candidate> = candidates.iter().collect();
                ordered.sort_by_key(|c| c.position);
                let weakest = ordered
                    .iter()
                    .map(|c| c.confidence)
                    .fold(1.0_f32, f32::min);
                let values = ordered.into_iter().map(|c| c.value.clone()).collect();
                fill.parameters.insert(spec.name.clone(), Value::Array(values));
                fill.bindings.insert(spec.name.clone(), weakest);
                continue;
            }

            let top = &candidates[0];
            let contenders: Vec<Value> = candidates
                .iter()
                .filter(|c| top.confidence - c.confidence < self.ambiguity_margin)
                .map(|c| coerce(spec, c.value.clone()))
                .collect();
            if contenders.len() > 1 {
                fill.ambiguous.insert(spec.name.clone(), contenders);
                continue;
            }
            fill.parameters
                .insert(spec.name.clone(), coerce(spec, top.value.clone()));
            fill.bindings.insert(spec.name.clone(), top.confidence);
        }

        tracing::debug!(
            intent = %intent.kind,
            bound = ?fill.parameters.keys().collect::<Vec<_>>(),
            missing = ?fill.missing,
            ambiguous = ?fill.ambiguous.keys().collect::<Vec<_>>(),
            "Filled parameters"
        );
        fill
    }
}

/// Distinct values an entity list offers a parameter, best first. Equal
/// values keep their highest confidence and earliest position.
fn candidates_for(spec: &ParameterSpec, entities: &[ExtractedEntity]) -> Vec<Candidate> {
    let mut out: Vec<Candidate> = Vec::new();
    for e in entities.iter().filter(|e| spec.accepts(e.kind)) {
        let value = e.value.to_json();
        match out.iter_mut().find(|c| c.value == value) {
            Some(existing) => {
                existing.confidence = existing.confidence.max(e.confidence);
                existing.position = existing.position.min(e.span.start);
            }
            None => out.push(Candidate {
                value,
                confidence: e.confidence,
                position: e.span.start,
            }),
        }
    }
    out.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then(a.position.cmp(&b.position))
    });
    out
}

/// Shape a single bound value to the declared type.
fn coerce(spec: &ParameterSpec, value: Value) -> Value {
    match (spec.param_type, value) {
        (ParamType::Array, Value::Array(items)) => Value::Array(items),
        (ParamType::Array, other) => Value::Array(vec![other]),
        // a bare count bound to a number parameter
        (ParamType::Number, Value::Object(obj)) => match obj.get("count") {
            Some(count) if count.is_number() => count.clone(),
            _ => Value::Object(obj),
        },
        (_, other) => other,
    }
}

/// Whether any entity could bind to one of `parameters` of `schema`.
pub fn has_bearing(schema: &ParameterSchema, parameters: &[String], entities: &[ExtractedEntity]) -> bool {
    parameters
        .iter()
        .filter_map(|name| schema.get(name))
        .any(|spec| entities.iter().any(|e| spec.accepts(e.kind)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shutter_core::{
        DateRange, EntityKind, EntityValue, IntentKind, Quantity, Selector, Span, Validator,
    };

    fn e(kind: EntityKind, value: EntityValue, start: usize, confidence: f32) -> ExtractedEntity {
        ExtractedEntity::new(kind, value, "x", Span::new(start, start + 1), confidence)
    }

    fn search_schema() -> ParameterSchema {
        ParameterSchema::new(vec![
            ParameterSpec::optional("keywords", ParamType::Array)
                .from_entities([EntityKind::Keyword, EntityKind::Object])
                .collecting(),
            ParameterSpec::optional("location", ParamType::String).from_entities([EntityKind::Location]),
            ParameterSpec::optional("date_range", ParamType::Date).from_entities([EntityKind::Date]),
            ParameterSpec::optional("limit", ParamType::Number).default_value(json!(50)),
        ])
    }

    fn tag_schema() -> ParameterSchema {
        ParameterSchema::new(vec![
            ParameterSpec::required("targets", ParamType::Array)
                .from_entities([EntityKind::Quantity])
                .validator(Validator::targets()),
            ParameterSpec::required("tags", ParamType::Array)
                .from_entities([EntityKind::Keyword])
                .collecting(),
        ])
    }

    fn extractor() -> ParameterExtractor {
        ParameterExtractor::new(&NluConfig::default())
    }

    fn intent(kind: IntentKind) -> Intent {
        Intent::new(kind, 0.8)
    }

    #[test]
    fn test_binds_best_candidates_and_defaults() {
        let day = chrono::NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let entities = vec![
            e(EntityKind::Keyword, EntityValue::text("sunset"), 5, 0.6),
            e(EntityKind::Location, EntityValue::text("Europe"), 24, 0.9),
            e(EntityKind::Date, EntityValue::Date(DateRange::new(day, day)), 31, 0.75),
        ];
        let fill = extractor().fill(&intent(IntentKind::Search), &entities, &search_schema());
        assert!(fill.is_complete());
        assert_eq!(fill.parameters["keywords"], json!(["sunset"]));
        assert_eq!(fill.parameters["location"], json!("Europe"));
        assert_eq!(fill.parameters["date_range"], json!({"start": "2024-06-01", "end": "2024-06-01"}));
        assert_eq!(fill.parameters["limit"], json!(50));
        assert!(!fill.bindings.contains_key("limit"));
        assert_eq!(fill.weakest_binding(), Some(0.6));
    }

    #[test]
    fn test_close_candidates_are_ambiguous() {
        let entities = vec![
            e(EntityKind::Location, EntityValue::text("Paris"), 0, 0.7),
            e(EntityKind::Location, EntityValue::text("Rome"), 10, 0.6),
        ];
        let fill = extractor().fill(&intent(IntentKind::Search), &entities, &search_schema());
        assert!(!fill.parameters.contains_key("location"));
        assert_eq!(fill.ambiguous["location"], vec![json!("Paris"), json!("Rome")]);
    }

    #[test]
    fn test_distant_candidates_pick_the_best() {
        let entities = vec![
            e(EntityKind::Location, EntityValue::text("Paris"), 0, 0.9),
            e(EntityKind::Location, EntityValue::text("Rome"), 10, 0.7),
        ];
        let fill = extractor().fill(&intent(IntentKind::Search), &entities, &search_schema());
        assert_eq!(fill.parameters["location"], json!("Paris"));
        assert!(fill.ambiguous.is_empty());
    }

    #[test]
    fn test_same_value_from_two_patterns_is_not_ambiguous() {
        let entities = vec![
            e(EntityKind::Location, EntityValue::text("Paris"), 0, 0.9),
            e(EntityKind::Location, EntityValue::text("Paris"), 0, 0.7),
        ];
        let fill = extractor().fill(&intent(IntentKind::Search), &entities, &search_schema());
        assert_eq!(fill.parameters["location"], json!("Paris"));
        assert_eq!(fill.bindings["location"], 0.9);
    }

    #[test]
    fn test_required_missing_is_not_defaulted() {
        let entities = vec![e(EntityKind::Keyword, EntityValue::text("vacation"), 20, 0.8)];
        let fill = extractor().fill(&intent(IntentKind::BulkTag), &entities, &tag_schema());
        assert_eq!(fill.missing, vec!["targets".to_string()]);
        assert_eq!(fill.parameters["tags"], json!(["vacation"]));
        assert!(!fill.parameters.contains_key("targets"));
    }

    #[test]
    fn test_quantity_becomes_selection_array() {
        let entities = vec![
            e(EntityKind::Quantity, EntityValue::Quantity(Quantity::new(Selector::Last, Some(5))), 4, 0.9),
            e(EntityKind::Keyword, EntityValue::text("vacation"), 20, 0.8),
        ];
        let fill = extractor().fill(&intent(IntentKind::BulkTag), &entities, &tag_schema());
        assert!(fill.is_complete());
        assert_eq!(fill.parameters["targets"], json!([{"selector": "last", "count": 5}]));
        assert_eq!(fill.bindings["targets"], 0.9);
    }

    #[test]
    fn test_collecting_keeps_utterance_order_and_weakest_confidence() {
        let entities = vec![
            e(EntityKind::Keyword, EntityValue::text("sunset"), 30, 0.7),
            e(EntityKind::Keyword, EntityValue::text("beach"), 10, 0.8),
        ];
        let fill = extractor().fill(&intent(IntentKind::BulkTag), &entities, &tag_schema());
        assert_eq!(fill.parameters["tags"], json!(["beach", "sunset"]));
        assert_eq!(fill.bindings["tags"], 0.7);
    }

    #[test]
    fn test_has_bearing() {
        let schema = tag_schema();
        let quantity = vec![e(
            EntityKind::Quantity,
            EntityValue::Quantity(Quantity::new(Selector::Last, Some(5))),
            0,
            0.9,
        )];
        let location = vec![e(EntityKind::Location, EntityValue::text("Paris"), 0, 0.9)];
        let asked = vec!["targets".to_string()];
        assert!(has_bearing(&schema, &asked, &quantity));
        assert!(!has_bearing(&schema, &asked, &location));
    }
}
