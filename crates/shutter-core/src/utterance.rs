//! Raw input as received from a caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One unit of raw natural-language input. Immutable once received.
///
/// `received_at` doubles as the reference instant for relative date phrases,
/// so extraction stays a pure function of the utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    pub id: Uuid,
    pub text: String,
    pub received_at: DateTime<Utc>,
    /// Conversation context (session) this utterance continues, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
}

impl Utterance {
    /// Receive an utterance now.
    pub fn new(text: impl Into<String>) -> Self {
        Self::at(text, Utc::now())
    }

    /// Receive an utterance at a fixed instant.
    pub fn at(text: impl Into<String>, received_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            received_at,
            context_id: None,
        }
    }

    /// Attach the conversation context id this utterance belongs to.
    pub fn with_context(mut self, context_id: impl Into<String>) -> Self {
        self.context_id = Some(context_id.into());
        self
    }
}
