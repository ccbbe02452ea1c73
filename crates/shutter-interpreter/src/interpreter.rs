//! The natural-language and direct execution entry points.

use shutter_actions::{ActionSummary, DispatchError, Dispatcher, RegistryError, RollbackReport};
use shutter_core::{
    ClarificationRequest, Command, CommandState, ExecutionResult, Interpretation, Parameters,
    Provenance, ReasonCode, Rejection, RollbackToken, ShutterConfig, Utterance,
};
use shutter_nlu::{FeatureExtractor, IntentRecognizer};
use shutter_policy::{Caller, PermissionPolicy, PermissionSet};
use std::sync::Arc;
use uuid::Uuid;

use crate::conversation::ConversationStore;
use crate::error::InterpreterError;
use crate::translator::{FollowUp, Translator, Turn};

/// One interpreter serves every caller. UI and agent callers go through
/// the same methods.
pub struct Interpreter {
    extractor: FeatureExtractor,
    recognizer: IntentRecognizer,
    translator: Translator,
    conversations: ConversationStore,
    dispatcher: Arc<Dispatcher>,
    policy: Arc<dyn PermissionPolicy>,
}

impl Interpreter {
    pub fn new(
        config: &ShutterConfig,
        dispatcher: Arc<Dispatcher>,
        policy: Arc<dyn PermissionPolicy>,
    ) -> Result<Self, InterpreterError> {
        config.validate()?;
        let registry = dispatcher.registry().clone();
        Ok(Self {
            extractor: FeatureExtractor::new()?,
            recognizer: IntentRecognizer::new(&config.nlu)?,
            translator: Translator::new(registry, &config.nlu, policy.clone()),
            conversations: ConversationStore::new(&config.conversation),
            dispatcher,
            policy,
        })
    }

    /// Interpret one utterance, continuing `session`'s pending clarification
    /// if there is one.
    pub fn interpret(&self, text: &str, session: Option<&str>, caller: &Caller) -> Interpretation {
        let mut utterance = Utterance::new(text);
        if let Some(session) = session {
            utterance = utterance.with_context(session);
        }
        self.interpret_utterance(utterance, caller)
    }

    pub fn interpret_utterance(&self, utterance: Utterance, caller: &Caller) -> Interpretation {
        let entities = self.extractor.extract(&utterance);
        let intent = self.recognizer.classify(&utterance, &entities);
        let session = utterance.context_id.clone();
        let now = utterance.received_at;

        let purged = self.conversations.purge_expired(now);
        if purged > 0 {
            tracing::debug!(purged, "Dropped expired clarifications");
        }

        let mut turn = None;
        if let Some(session) = session.as_deref() {
            if let Some(pending) = self.conversations.take(session, now) {
                match self
                    .translator
                    .follow_up(&pending.request, &utterance, &intent, &entities)
                {
                    FollowUp::Answers(merged) => {
                        tracing::info!(
                            session = %session,
                            request_id = %pending.request.id,
                            "Follow-up merged into pending command"
                        );
                        turn = Some(merged);
                    }
                    FollowUp::Supersedes => {
                        tracing::info!(
                            session = %session,
                            request_id = %pending.request.id,
                            intent = %intent.kind,
                            "Pending clarification superseded"
                        );
                    }
                    FollowUp::Unanswered => {
                        let request = pending.request.clone();
                        self.conversations.defer(session, pending);
                        return Interpretation::Clarification(request);
                    }
                }
            }
        }

        let turn = turn.unwrap_or_else(|| Turn::fresh(utterance, intent, entities));
        let outcome = self.translator.translate(turn, caller);

        if let (Some(session), Interpretation::Clarification(request)) = (session.as_deref(), &outcome) {
            self.conversations.hold(session, request.clone(), now);
        }
        outcome
    }

    /// Pending clarification of `session`, if any.
    pub fn pending(&self, session: &str) -> Option<ClarificationRequest> {
        self.conversations.peek(session, chrono::Utc::now())
    }

    /// Number of sessions with a clarification still on file.
    pub fn pending_sessions(&self) -> usize {
        self.conversations.len()
    }

    /// Forget `session`'s pending clarification.
    pub fn clear_session(&self, session: &str) -> bool {
        self.conversations.clear(session)
    }

    /// Actions the given permissions cover, in id order.
    pub fn discover(&self, permissions: &PermissionSet) -> Vec<ActionSummary> {
        self.dispatcher
            .registry()
            .discover(permissions)
            .iter()
            .map(|d| d.summary())
            .collect()
    }

    pub fn describe(&self, action_id: &str) -> Result<ActionSummary, RegistryError> {
        Ok(self.dispatcher.registry().lookup(action_id)?.summary())
    }

    /// Run an action with explicit parameters. Parameters are checked
    /// against the schema and the permission gate before dispatch.
    pub async fn execute(
        &self,
        action_id: &str,
        mut parameters: Parameters,
        caller: &Caller,
    ) -> Result<ExecutionResult, Rejection> {
        let action = self
            .dispatcher
            .registry()
            .lookup(action_id)
            .map_err(|err| dispatch_rejection(&err.into(), action_id))?;

        for spec in action.schema.iter().filter(|s| !s.required) {
            if let Some(default) = &spec.default {
                parameters
                    .entry(spec.name.clone())
                    .or_insert_with(|| default.clone());
            }
        }
        action.schema.validate(&parameters).map_err(|violation| {
            Rejection::new(violation.reason, violation.message)
                .with_parameters(vec![violation.parameter])
                .for_action(action_id)
        })?;

        let mut command = Command::draft(action_id, Provenance::direct());
        command.parameters = parameters;
        command.confidence = 1.0;
        command.state = CommandState::Ready;
        self.dispatch(&command, caller).await
    }

    /// Dispatch a `Ready` command. The permission gate runs again here.
    /// Progress subscribers of a refused command see their channel close.
    pub async fn dispatch(&self, command: &Command, caller: &Caller) -> Result<ExecutionResult, Rejection> {
        if let Err(rejection) = self.authorize(&command.action_id, caller) {
            self.dispatcher.close_progress(command.id);
            return Err(rejection);
        }

        self.dispatcher
            .execute(command)
            .await
            .map_err(|err| dispatch_rejection(&err, &command.action_id))
    }

    pub fn cancel(&self, command_id: Uuid) -> bool {
        self.dispatcher.cancel(command_id)
    }

    /// Undo a reversible command. The caller needs the permissions of the
    /// action being reverted; a refused rollback leaves the token usable.
    pub async fn rollback(&self, token: RollbackToken, caller: &Caller) -> Result<RollbackReport, Rejection> {
        let unknown = || {
            let err = DispatchError::UnknownRollbackToken { token };
            Rejection::new(err.reason(), err.to_string())
        };
        let action_id = self.dispatcher.rollback_action(token).ok_or_else(unknown)?;
        self.authorize(&action_id, caller)?;

        self.dispatcher
            .rollback(token)
            .await
            .map_err(|err| dispatch_rejection(&err, &action_id))
    }

    /// The policy gate shared by every path that runs a handler.
    fn authorize(&self, action_id: &str, caller: &Caller) -> Result<(), Rejection> {
        let action = self
            .dispatcher
            .registry()
            .lookup(action_id)
            .map_err(|err| dispatch_rejection(&err.into(), action_id))?;

        let decision = self.policy.check(caller, &action.id, &action.required_permissions);
        if decision.allow {
            return Ok(());
        }
        tracing::warn!(
            caller = %caller.id,
            action = %action.id,
            missing = ?decision.missing,
            "Caller not permitted"
        );
        let message = decision
            .reason
            .unwrap_or_else(|| format!("caller '{}' may not run {}", caller.id, action.id));
        Err(Rejection::new(ReasonCode::Forbidden, message)
            .with_parameters(decision.missing)
            .for_action(&action.id))
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }
}

fn dispatch_rejection(err: &DispatchError, action_id: &str) -> Rejection {
    tracing::warn!(action = %action_id, error = %err, "Dispatch refused");
    Rejection::new(err.reason(), err.to_string()).for_action(action_id)
}
