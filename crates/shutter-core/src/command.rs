//! Translation outcomes: commands, clarification requests and rejections.

use crate::entity::ExtractedEntity;
use crate::intent::Intent;
use crate::reason::ReasonCode;
use crate::utterance::Utterance;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Bound parameter values by name.
pub type Parameters = BTreeMap<String, Value>;

/// Lifecycle state of a [`Command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandState {
    Draft,
    Ready,
    PendingClarification,
    Rejected,
}

/// Where a command came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    /// Utterances that contributed, oldest first. A clarified command has
    /// more than one.
    pub source_utterances: Vec<Utterance>,
    pub entities: Vec<ExtractedEntity>,
    pub intent: Option<Intent>,
    /// Confidence of the entity bound to each parameter.
    #[serde(default)]
    pub bindings: BTreeMap<String, f32>,
}

impl Provenance {
    pub fn from_utterance(utterance: &Utterance) -> Self {
        Self {
            source_utterances: vec![utterance.clone()],
            entities: Vec::new(),
            intent: None,
            bindings: BTreeMap::new(),
        }
    }

    /// Direct execution has no utterance behind it.
    pub fn direct() -> Self {
        Self {
            source_utterances: Vec::new(),
            entities: Vec::new(),
            intent: None,
            bindings: BTreeMap::new(),
        }
    }
}

/// A fully or partially bound instance of an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub id: Uuid,
    pub action_id: String,
    pub parameters: Parameters,
    pub confidence: f32,
    pub state: CommandState,
    pub provenance: Provenance,
}

impl Command {
    /// Start a draft for an action.
    pub fn draft(action_id: impl Into<String>, provenance: Provenance) -> Self {
        Self {
            id: Uuid::new_v4(),
            action_id: action_id.into(),
            parameters: Parameters::new(),
            confidence: 0.0,
            state: CommandState::Draft,
            provenance,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state == CommandState::Ready
    }
}

/// Request for a follow-up turn naming what is missing or ambiguous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClarificationRequest {
    pub id: Uuid,
    pub missing_or_ambiguous: Vec<String>,
    #[serde(default)]
    pub suggested_values: BTreeMap<String, Vec<Value>>,
    /// Partial command in `PendingClarification` state.
    pub original_command: Command,
    pub message: String,
}

impl ClarificationRequest {
    pub fn new(
        missing_or_ambiguous: Vec<String>,
        suggested_values: BTreeMap<String, Vec<Value>>,
        mut original_command: Command,
        message: impl Into<String>,
    ) -> Self {
        original_command.state = CommandState::PendingClarification;
        Self {
            id: Uuid::new_v4(),
            missing_or_ambiguous,
            suggested_values,
            original_command,
            message: message.into(),
        }
    }

    pub fn asks_for(&self, parameter: &str) -> bool {
        self.missing_or_ambiguous.iter().any(|p| p == parameter)
    }
}

/// Terminal translation failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    pub reason: ReasonCode,
    pub message: String,
    /// Parameters involved, if any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,
}

impl Rejection {
    pub fn new(reason: ReasonCode, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
            parameters: Vec::new(),
            action_id: None,
        }
    }

    pub fn with_parameters(mut self, parameters: Vec<String>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn for_action(mut self, action_id: impl Into<String>) -> Self {
        self.action_id = Some(action_id.into());
        self
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.reason, self.message)
    }
}

/// Result of interpreting one utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Interpretation {
    Ready(Command),
    Clarification(ClarificationRequest),
    Rejected(Rejection),
}

impl Interpretation {
    pub fn as_command(&self) -> Option<&Command> {
        match self {
            Self::Ready(cmd) => Some(cmd),
            _ => None,
        }
    }

    pub fn as_clarification(&self) -> Option<&ClarificationRequest> {
        match self {
            Self::Clarification(req) => Some(req),
            _ => None,
        }
    }

    pub fn as_rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Rejected(rej) => Some(rej),
            _ => None,
        }
    }

    /// Copy with generated ids and timestamps zeroed, for comparing two
    /// interpretations of the same input structurally.
    pub fn normalized(&self) -> Self {
        fn scrub(cmd: &Command) -> Command {
            let mut cmd = cmd.clone();
            cmd.id = Uuid::nil();
            for utterance in &mut cmd.provenance.source_utterances {
                utterance.id = Uuid::nil();
                utterance.received_at = DateTime::<Utc>::default();
            }
            cmd
        }
        match self {
            Self::Ready(cmd) => Self::Ready(scrub(cmd)),
            Self::Clarification(req) => {
                let mut req = req.clone();
                req.id = Uuid::nil();
                req.original_command = scrub(&req.original_command);
                Self::Clarification(req)
            }
            Self::Rejected(rej) => Self::Rejected(rej.clone()),
        }
    }
}
