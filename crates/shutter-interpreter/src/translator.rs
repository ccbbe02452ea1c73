//! Command Translator
//!
//! Joins a classified intent and its extracted entities against a registered
//! action. One run ends in exactly one of:
//!
//! - `Ready`: every required parameter bound and valid, caller permitted
//! - `Clarification`: something is missing or ambiguous and the action can ask
//! - `Rejected`: terminal, with a reason code
//!
//! Follow-up turns are handled by [`Translator::follow_up`], which decides
//! whether an utterance answers, supersedes or ignores a pending request.

use serde_json::Value;
use shutter_actions::{ActionDescriptor, ActionRegistry};
use shutter_core::{
    ClarificationRequest, Command, CommandState, ExtractedEntity, Intent, IntentKind,
    Interpretation, NluConfig, Parameters, Provenance, ReasonCode, Rejection, Utterance,
};
use shutter_nlu::{Fill, ParameterExtractor, has_bearing};
use shutter_policy::{Caller, PermissionPolicy};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Pseudo-parameter asked for when the intent itself is in doubt.
pub const ACTION_PARAMETER: &str = "action";

/// Input of one translation run.
#[derive(Debug, Clone)]
pub struct Turn {
    pub intent: Intent,
    /// Entities parameters are bound from.
    pub entities: Vec<ExtractedEntity>,
    /// Entities of earlier turns, kept for provenance.
    pub earlier_entities: Vec<ExtractedEntity>,
    /// Oldest first.
    pub utterances: Vec<Utterance>,
    /// Action settled by an earlier turn.
    pub action_id: Option<String>,
    /// Parameters bound by an earlier turn. They keep their values.
    pub carried: Parameters,
    pub carried_bindings: BTreeMap<String, f32>,
}

impl Turn {
    pub fn fresh(utterance: Utterance, intent: Intent, entities: Vec<ExtractedEntity>) -> Self {
        Self {
            intent,
            entities,
            earlier_entities: Vec::new(),
            utterances: vec![utterance],
            action_id: None,
            carried: Parameters::new(),
            carried_bindings: BTreeMap::new(),
        }
    }
}

/// How a follow-up utterance relates to a pending request.
#[derive(Debug, Clone)]
pub enum FollowUp {
    /// The utterance addresses the request; translate the merged turn.
    Answers(Turn),
    /// The utterance starts something new; drop the request.
    Supersedes,
    /// Neither; the request stays pending.
    Unanswered,
}

pub struct Translator {
    registry: Arc<ActionRegistry>,
    params: ParameterExtractor,
    policy: Arc<dyn PermissionPolicy>,
}

impl Translator {
    pub fn new(registry: Arc<ActionRegistry>, nlu: &NluConfig, policy: Arc<dyn PermissionPolicy>) -> Self {
        Self {
            registry,
            params: ParameterExtractor::new(nlu),
            policy,
        }
    }

    /// Relate a follow-up utterance to the pending `request`.
    pub fn follow_up(
        &self,
        request: &ClarificationRequest,
        utterance: &Utterance,
        intent: &Intent,
        entities: &[ExtractedEntity],
    ) -> FollowUp {
        let original = &request.original_command;
        let Some(original_intent) = original.provenance.intent.clone() else {
            return FollowUp::Supersedes;
        };
        let mut utterances = original.provenance.source_utterances.clone();
        utterances.push(utterance.clone());

        if request.asks_for(ACTION_PARAMETER) {
            return self.choose_action(request, &original_intent, utterance, intent, entities, utterances);
        }

        // a different request altogether
        if intent.kind.is_actionable() && intent.kind != original_intent.kind {
            return FollowUp::Supersedes;
        }
        let Ok(action) = self.registry.lookup(&original.action_id) else {
            return FollowUp::Supersedes;
        };

        if has_bearing(&action.schema, &request.missing_or_ambiguous, entities) {
            let mut carried = original.parameters.clone();
            let mut carried_bindings = original.provenance.bindings.clone();
            for name in &request.missing_or_ambiguous {
                carried.remove(name);
                carried_bindings.remove(name);
            }
            return FollowUp::Answers(Turn {
                intent: original_intent,
                entities: entities.to_vec(),
                earlier_entities: original.provenance.entities.clone(),
                utterances,
                action_id: Some(action.id.clone()),
                carried,
                carried_bindings,
            });
        }

        if intent.kind.is_actionable() {
            FollowUp::Supersedes
        } else {
            FollowUp::Unanswered
        }
    }

    /// Resolve an action-choice request: the follow-up either names a
    /// candidate action or carries an intent one of them serves.
    fn choose_action(
        &self,
        request: &ClarificationRequest,
        original_intent: &Intent,
        utterance: &Utterance,
        intent: &Intent,
        entities: &[ExtractedEntity],
        utterances: Vec<Utterance>,
    ) -> FollowUp {
        let candidates: Vec<Arc<ActionDescriptor>> = request
            .suggested_values
            .get(ACTION_PARAMETER)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .filter_map(|id| self.registry.lookup(id).ok())
            .collect();

        let text = utterance.text.to_lowercase();
        let chosen = candidates
            .iter()
            .find(|a| text.contains(&a.id))
            .or_else(|| candidates.iter().find(|a| a.intents.contains(&intent.kind)));

        let Some(action) = chosen else {
            return if intent.kind.is_actionable() {
                FollowUp::Supersedes
            } else {
                FollowUp::Unanswered
            };
        };

        let kind = if action.intents.contains(&intent.kind) {
            intent.kind
        } else {
            action.intents.first().copied().unwrap_or(IntentKind::Unknown)
        };
        let mut all_entities = request.original_command.provenance.entities.clone();
        all_entities.extend(entities.iter().cloned());

        FollowUp::Answers(Turn {
            intent: Intent::new(kind, original_intent.confidence),
            entities: all_entities,
            earlier_entities: Vec::new(),
            utterances,
            action_id: Some(action.id.clone()),
            carried: Parameters::new(),
            carried_bindings: BTreeMap::new(),
        })
    }

    pub fn translate(&self, turn: Turn, caller: &Caller) -> Interpretation {
        if turn.action_id.is_none() && turn.intent.kind == IntentKind::ClarifyNeeded {
            return self.clarify_action(turn, caller);
        }

        let action = match &turn.action_id {
            Some(id) => match self.registry.lookup(id) {
                Ok(action) => action,
                Err(err) => {
                    return rejected(Rejection::new(ReasonCode::UnsupportedIntent, err.to_string()).for_action(id));
                }
            },
            None => match self
                .registry
                .resolve_for_intent(turn.intent.kind, Some(&caller.permissions))
                .into_iter()
                .next()
            {
                Some(action) => action,
                None => return rejected(unsupported(&turn.intent)),
            },
        };

        let mut fill = self.params.fill(&turn.intent, &turn.entities, &action.schema);
        carry_over(&mut fill, &turn);

        let mut entities = turn.earlier_entities;
        entities.extend(turn.entities);
        let provenance = Provenance {
            source_utterances: turn.utterances,
            entities,
            intent: Some(turn.intent.clone()),
            bindings: fill.bindings.clone(),
        };
        let mut command = Command::draft(action.id.clone(), provenance);
        command.parameters = fill.parameters.clone();

        if !fill.is_complete() {
            if action.supports_clarification {
                let request = clarification(&action, command, &fill);
                tracing::info!(
                    action = %action.id,
                    asked = ?request.missing_or_ambiguous,
                    "Clarification requested"
                );
                return Interpretation::Clarification(request);
            }
            if !fill.missing.is_empty() {
                return rejected(
                    Rejection::new(
                        ReasonCode::MissingRequiredParameter,
                        format!("{} requires {}", action.name, fill.missing.join(", ")),
                    )
                    .with_parameters(fill.missing)
                    .for_action(&action.id),
                );
            }
            let names: Vec<String> = fill.ambiguous.keys().cloned().collect();
            return rejected(
                Rejection::new(
                    ReasonCode::AmbiguousParameter,
                    format!("more than one value fits {}", names.join(", ")),
                )
                .with_parameters(names)
                .for_action(&action.id),
            );
        }

        if let Err(violation) = action.schema.validate(&command.parameters) {
            return rejected(
                Rejection::new(violation.reason, violation.message)
                    .with_parameters(vec![violation.parameter])
                    .for_action(&action.id),
            );
        }

        // bottleneck, never an average
        command.confidence = fill
            .bindings
            .values()
            .fold(turn.intent.confidence, |acc, c| acc.min(*c));
        command.state = CommandState::Ready;

        let decision = self.policy.check(caller, &action.id, &action.required_permissions);
        if !decision.allow {
            let message = decision
                .reason
                .unwrap_or_else(|| format!("caller '{}' may not run {}", caller.id, action.id));
            return rejected(
                Rejection::new(ReasonCode::Forbidden, message)
                    .with_parameters(decision.missing)
                    .for_action(&action.id),
            );
        }

        tracing::info!(
            command_id = %command.id,
            action = %action.id,
            confidence = command.confidence,
            "Command ready"
        );
        Interpretation::Ready(command)
    }

    /// Ask which action was meant when competing intents scored too close.
    fn clarify_action(&self, mut turn: Turn, caller: &Caller) -> Interpretation {
        let mut choices: Vec<(IntentKind, String)> = Vec::new();
        for alternative in &turn.intent.alternatives {
            let best = self
                .registry
                .resolve_for_intent(alternative.kind, Some(&caller.permissions))
                .into_iter()
                .next();
            if let Some(action) = best {
                if !choices.iter().any(|(_, id)| *id == action.id) {
                    choices.push((alternative.kind, action.id.clone()));
                }
            }
        }

        match choices.as_slice() {
            [] => rejected(unsupported(&turn.intent)),
            [(kind, id)] => {
                turn.intent = Intent::new(*kind, turn.intent.confidence);
                turn.action_id = Some(id.clone());
                self.translate(turn, caller)
            }
            _ => {
                let ids: Vec<String> = choices.into_iter().map(|(_, id)| id).collect();
                let message = format!("Did you mean {}?", ids.join(" or "));
                let suggested = BTreeMap::from([(
                    ACTION_PARAMETER.to_string(),
                    ids.into_iter().map(Value::String).collect(),
                )]);
                let provenance = Provenance {
                    source_utterances: turn.utterances,
                    entities: turn.entities,
                    intent: Some(turn.intent),
                    bindings: BTreeMap::new(),
                };
                let command = Command::draft(String::new(), provenance);
                Interpretation::Clarification(ClarificationRequest::new(
                    vec![ACTION_PARAMETER.to_string()],
                    suggested,
                    command,
                    message,
                ))
            }
        }
    }
}

/// Overlay parameters settled in an earlier turn.
fn carry_over(fill: &mut Fill, turn: &Turn) {
    for (name, value) in &turn.carried {
        fill.parameters.insert(name.clone(), value.clone());
        fill.missing.retain(|m| m != name);
        fill.ambiguous.remove(name);
        match turn.carried_bindings.get(name) {
            Some(confidence) => {
                fill.bindings.insert(name.clone(), *confidence);
            }
            None => {
                fill.bindings.remove(name);
            }
        }
    }
}

fn clarification(action: &ActionDescriptor, command: Command, fill: &Fill) -> ClarificationRequest {
    let mut asked = fill.missing.clone();
    asked.extend(fill.ambiguous.keys().cloned());

    let mut parts = Vec::new();
    if !fill.missing.is_empty() {
        let wanted: Vec<String> = fill
            .missing
            .iter()
            .map(|name| {
                action
                    .schema
                    .get(name)
                    .and_then(|spec| spec.description.clone())
                    .map_or_else(|| name.clone(), |desc| format!("{name} ({desc})"))
            })
            .collect();
        parts.push(format!("{} needs {}", action.name, wanted.join(", ")));
    }
    for (name, candidates) in &fill.ambiguous {
        let options: Vec<String> = candidates.iter().map(Value::to_string).collect();
        parts.push(format!("{name} could be {}", options.join(" or ")));
    }

    ClarificationRequest::new(asked, fill.ambiguous.clone(), command, parts.join("; "))
}

fn unsupported(intent: &Intent) -> Rejection {
    let message = match intent.kind {
        IntentKind::Unknown => format!(
            "could not recognize a supported command (best score {:.2})",
            intent.confidence
        ),
        kind => format!("no registered action handles intent {kind}"),
    };
    Rejection::new(ReasonCode::UnsupportedIntent, message)
}

fn rejected(rejection: Rejection) -> Interpretation {
    tracing::warn!(
        reason = %rejection.reason,
        action = ?rejection.action_id,
        message = %rejection.message,
        "Command rejected"
    );
    Interpretation::Rejected(rejection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use shutter_actions::{ActionHandler, HandlerError};
    use shutter_core::{EntityKind, EntityValue, ParamType, ParameterSchema, ParameterSpec, Span};
    use shutter_policy::SubsetPolicy;

    struct Noop;

    #[async_trait]
    impl ActionHandler for Noop {
        async fn invoke(&self, _target: Option<&str>, _parameters: &Parameters) -> Result<Value, HandlerError> {
            Ok(Value::Null)
        }
    }

    fn translator() -> Translator {
        let registry = ActionRegistry::new();
        let descriptors = [
            ActionDescriptor::new("find-photos", "Find photos", Arc::new(Noop))
                .schema(ParameterSchema::new(vec![
                    ParameterSpec::optional("location", ParamType::String).from_entities([EntityKind::Location]),
                ]))
                .requires(["read:photos"])
                .serves([IntentKind::Search]),
            ActionDescriptor::new("tag-photos", "Tag photos", Arc::new(Noop))
                .schema(ParameterSchema::new(vec![
                    ParameterSpec::required("targets", ParamType::Array).from_entities([EntityKind::Quantity]),
                    ParameterSpec::required("tags", ParamType::Array)
                        .from_entities([EntityKind::Keyword])
                        .collecting(),
                ]))
                .requires(["write:photos"])
                .serves([IntentKind::BulkTag])
                .clarifiable(false),
            ActionDescriptor::new("move-photos", "Move photos", Arc::new(Noop))
                .schema(ParameterSchema::new(vec![
                    ParameterSpec::required("album", ParamType::String).from_entities([EntityKind::AlbumName]),
                ]))
                .requires(["write:photos"])
                .serves([IntentKind::BulkMove])
                .clarifiable(false),
        ];
        for descriptor in descriptors {
            registry.register(descriptor).unwrap();
        }
        Translator::new(Arc::new(registry), &NluConfig::default(), Arc::new(SubsetPolicy))
    }

    fn caller() -> Caller {
        Caller::with_permissions("tester", ["read:photos", "write:photos"])
    }

    fn text(kind: EntityKind, value: &str, start: usize, confidence: f32) -> ExtractedEntity {
        let span = Span::new(start, start + value.len());
        ExtractedEntity::new(kind, EntityValue::text(value), value, span, confidence)
    }

    fn turn(kind: IntentKind, entities: Vec<ExtractedEntity>) -> Turn {
        Turn::fresh(Utterance::new("test utterance"), Intent::new(kind, 0.9), entities)
    }

    fn two_cities() -> Vec<ExtractedEntity> {
        vec![
            text(EntityKind::Location, "Paris", 17, 0.9),
            text(EntityKind::Location, "Rome", 27, 0.9),
        ]
    }

    #[test]
    fn test_ready_confidence_is_weakest_binding() {
        let entities = vec![text(EntityKind::Location, "Paris", 17, 0.7)];
        let outcome = translator().translate(turn(IntentKind::Search, entities), &caller());
        let command = outcome.as_command().unwrap();
        assert_eq!(command.action_id, "find-photos");
        assert_eq!(command.parameters["location"], json!("Paris"));
        assert_eq!(command.confidence, 0.7);
        assert_eq!(command.provenance.bindings["location"], 0.7);
    }

    #[test]
    fn test_ambiguous_parameter_asks_with_suggestions() {
        let outcome = translator().translate(turn(IntentKind::Search, two_cities()), &caller());
        let request = outcome.as_clarification().unwrap();
        assert_eq!(request.missing_or_ambiguous, vec!["location".to_string()]);
        assert_eq!(request.suggested_values["location"], vec![json!("Paris"), json!("Rome")]);
        assert_eq!(request.original_command.state, CommandState::PendingClarification);
        assert!(request.message.contains("Paris"));
    }

    #[test]
    fn test_missing_parameter_rejected_when_action_cannot_ask() {
        let entities = vec![text(EntityKind::Keyword, "vacation", 20, 0.8)];
        let outcome = translator().translate(turn(IntentKind::BulkTag, entities), &caller());
        let rejection = outcome.as_rejection().unwrap();
        assert_eq!(rejection.reason, ReasonCode::MissingRequiredParameter);
        assert_eq!(rejection.parameters, vec!["targets".to_string()]);
        assert_eq!(rejection.action_id.as_deref(), Some("tag-photos"));
    }

    #[test]
    fn test_ambiguous_parameter_rejected_when_action_cannot_ask() {
        let entities = vec![
            text(EntityKind::AlbumName, "Holidays", 10, 0.8),
            text(EntityKind::AlbumName, "Beach", 30, 0.8),
        ];
        let outcome = translator().translate(turn(IntentKind::BulkMove, entities), &caller());
        let rejection = outcome.as_rejection().unwrap();
        assert_eq!(rejection.reason, ReasonCode::AmbiguousParameter);
        assert_eq!(rejection.parameters, vec!["album".to_string()]);
    }

    #[test]
    fn test_permission_gate_applies_to_resolved_action() {
        let viewer = Caller::with_permissions("viewer", Vec::<String>::new());
        let outcome = translator().translate(turn(IntentKind::Search, Vec::new()), &viewer);
        let rejection = outcome.as_rejection().unwrap();
        assert_eq!(rejection.reason, ReasonCode::Forbidden);
        assert_eq!(rejection.parameters, vec!["read:photos".to_string()]);
    }

    #[test]
    fn test_follow_up_relations() {
        let translator = translator();
        let outcome = translator.translate(turn(IntentKind::Search, two_cities()), &caller());
        let request = outcome.as_clarification().unwrap();
        let unknown = Intent::new(IntentKind::Unknown, 0.1);

        let rome = vec![text(EntityKind::Location, "Rome", 0, 0.9)];
        match translator.follow_up(request, &Utterance::new("Rome"), &unknown, &rome) {
            FollowUp::Answers(merged) => {
                assert_eq!(merged.action_id.as_deref(), Some("find-photos"));
                assert_eq!(merged.intent.kind, IntentKind::Search);
                assert_eq!(merged.utterances.len(), 2);
                let command = translator.translate(merged, &caller());
                assert_eq!(command.as_command().unwrap().parameters["location"], json!("Rome"));
            }
            other => panic!("expected an answer, got {other:?}"),
        }

        assert!(matches!(
            translator.follow_up(request, &Utterance::new("hmm"), &unknown, &[]),
            FollowUp::Unanswered
        ));
        assert!(matches!(
            translator.follow_up(
                request,
                &Utterance::new("tag them"),
                &Intent::new(IntentKind::BulkTag, 0.8),
                &[]
            ),
            FollowUp::Supersedes
        ));
    }
}
