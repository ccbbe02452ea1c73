//! Intent enumeration.

use serde::{Deserialize, Serialize};

/// Version of the closed intent enumeration below. Bump when variants change.
pub const INTENT_SCHEMA_VERSION: &str = "1.0.0";

/// Classified purpose of an utterance.
///
/// Declaration order is significant: the recognizer breaks score ties in
/// favour of the earlier variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentKind {
    Search,
    Filter,
    BulkTag,
    BulkMove,
    CreateAlbum,
    ClarifyNeeded,
    Unknown,
}

impl IntentKind {
    /// Intents that can be served by a registered action.
    pub const ACTIONABLE: [IntentKind; 5] = [
        IntentKind::Search,
        IntentKind::Filter,
        IntentKind::BulkTag,
        IntentKind::BulkMove,
        IntentKind::CreateAlbum,
    ];

    pub fn is_actionable(&self) -> bool {
        Self::ACTIONABLE.contains(self)
    }
}

impl std::fmt::Display for IntentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Search => "SEARCH",
            Self::Filter => "FILTER",
            Self::BulkTag => "BULK_TAG",
            Self::BulkMove => "BULK_MOVE",
            Self::CreateAlbum => "CREATE_ALBUM",
            Self::ClarifyNeeded => "CLARIFY_NEEDED",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// One intent with its normalized score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredIntent {
    pub kind: IntentKind,
    pub score: f32,
}

/// Result of classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub kind: IntentKind,
    pub confidence: f32,
    /// Runner-up intents above zero, best first. For `ClarifyNeeded` these are
    /// the competing readings.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<ScoredIntent>,
}

impl Intent {
    pub fn new(kind: IntentKind, confidence: f32) -> Self {
        Self {
            kind,
            confidence: confidence.clamp(0.0, 1.0),
            alternatives: Vec::new(),
        }
    }

    pub fn unknown(confidence: f32) -> Self {
        Self::new(IntentKind::Unknown, confidence)
    }

    pub fn with_alternatives(mut self, alternatives: Vec<ScoredIntent>) -> Self {
        self.alternatives = alternatives;
        self
    }

    pub fn is_unknown(&self) -> bool {
        self.kind == IntentKind::Unknown
    }
}
