//! Language-understanding thresholds.

use serde::{Deserialize, Serialize};

/// Tunable scores used by the recognizer and the parameter extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NluConfig {
    /// Top intent scores below this classify as UNKNOWN.
    #[serde(default = "default_classification_threshold")]
    pub classification_threshold: f32,

    /// Candidates of one kind closer than this are ambiguous.
    #[serde(default = "default_ambiguity_margin")]
    pub ambiguity_margin: f32,

    /// When set, a runner-up intent within this margin yields CLARIFY_NEEDED.
    #[serde(default)]
    pub intent_margin: Option<f32>,
}

impl Default for NluConfig {
    fn default() -> Self {
        Self {
            classification_threshold: default_classification_threshold(),
            ambiguity_margin: default_ambiguity_margin(),
            intent_margin: None,
        }
    }
}

fn default_classification_threshold() -> f32 {
    0.4
}

fn default_ambiguity_margin() -> f32 {
    0.15
}
