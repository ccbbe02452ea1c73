//! Intent Recognizer
//!
//! Deterministic, feature-weighted scoring. Each intent has a set of
//! trigger phrases (each with a strength in `[0, 1]`) and an affinity for
//! certain entity kinds. Per intent:
//!
//! ```text
//! score = 0.65 * strongest matching trigger + 0.35 * share of affinity kinds present
//! ```
//!
//! An intent without any matching trigger is never a candidate, so an
//! utterance with no trigger phrase always classifies as UNKNOWN with a score
//! of at most 0.35. Ties go to the intent declared first.

use regex::Regex;
use shutter_core::{
    EntityKind, ExtractedEntity, Intent, IntentKind, NluConfig, ScoredIntent, Utterance,
};
use std::collections::HashSet;

use crate::error::NluError;

const TRIGGER_WEIGHT: f32 = 0.65;
const AFFINITY_WEIGHT: f32 = 0.35;

/// Trigger phrases and entity affinity for one intent.
pub struct IntentRule {
    intent: IntentKind,
    triggers: Vec<(Regex, f32)>,
    affinity: Vec<EntityKind>,
}

impl IntentRule {
    /// `triggers` are regex fragments matched case-insensitively on word
    /// boundaries.
    pub fn new(
        intent: IntentKind,
        triggers: &[(&str, f32)],
        affinity: &[EntityKind],
    ) -> Result<Self, NluError> {
        let triggers = triggers
            .iter()
            .map(|(phrase, strength)| {
                Regex::new(&format!(r"(?i)\b(?:{phrase})\b"))
                    .map(|re| (re, strength.clamp(0.0, 1.0)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            intent,
            triggers,
            affinity: affinity.to_vec(),
        })
    }

    pub fn intent(&self) -> IntentKind {
        self.intent
    }

    /// Strongest matching trigger, if any matched.
    fn trigger_strength(&self, text: &str) -> Option<f32> {
        self.triggers
            .iter()
            .filter(|(re, _)| re.is_match(text))
            .map(|(_, strength)| *strength)
            .reduce(f32::max)
    }

    fn affinity_share(&self, present: &HashSet<EntityKind>) -> f32 {
        if self.affinity.is_empty() {
            return 0.0;
        }
        let hits = self.affinity.iter().filter(|k| present.contains(k)).count();
        hits as f32 / self.affinity.len() as f32
    }
}

/// Per-intent score breakdown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntentScore {
    pub intent: IntentKind,
    pub score: f32,
    pub triggered: bool,
}

pub struct IntentRecognizer {
    rules: Vec<IntentRule>,
    threshold: f32,
    intent_margin: Option<f32>,
}

impl IntentRecognizer {
    /// Recognizer for the photo intents.
    pub fn new(config: &NluConfig) -> Result<Self, NluError> {
        Ok(Self::with_rules(default_rules()?, config))
    }

    /// Rules are evaluated in the given order, which is also the tie-break order.
    pub fn with_rules(rules: Vec<IntentRule>, config: &NluConfig) -> Self {
        Self {
            rules,
            threshold: config.classification_threshold,
            intent_margin: config.intent_margin,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Score every intent in declaration order.
    pub fn score(&self, text: &str, entities: &[ExtractedEntity]) -> Vec<IntentScore> {
        let present: HashSet<EntityKind> = entities.iter().map(|e| e.kind).collect();
        self.rules
            .iter()
            .map(|rule| {
                let trigger = rule.trigger_strength(text);
                let score = TRIGGER_WEIGHT * trigger.unwrap_or(0.0)
                    + AFFINITY_WEIGHT * rule.affinity_share(&present);
                IntentScore {
                    intent: rule.intent,
                    score: score.clamp(0.0, 1.0),
                    triggered: trigger.is_some(),
                }
            })
            .collect()
    }

    pub fn classify(&self, utterance: &Utterance, entities: &[ExtractedEntity]) -> Intent {
        let scores = self.score(&utterance.text, entities);

        let mut best: Option<IntentScore> = None;
        for s in scores.iter().filter(|s| s.triggered) {
            // strictly greater: earlier declaration wins ties
            if best.is_none_or(|b| s.score > b.score) {
                best = Some(*s);
            }
        }

        let Some(best) = best.filter(|b| b.score >= self.threshold) else {
            let top = best
                .map(|b| b.score)
                .unwrap_or_else(|| scores.iter().map(|s| s.score).fold(0.0, f32::max));
            tracing::debug!(
                utterance_id = %utterance.id,
                score = top,
                threshold = self.threshold,
                "No intent above threshold"
            );
            return Intent::unknown(top);
        };

        let mut alternatives: Vec<ScoredIntent> = scores
            .iter()
            .filter(|s| s.triggered && s.intent != best.intent)
            .map(|s| ScoredIntent {
                kind: s.intent,
                score: s.score,
            })
            .collect();
        // stable: equal scores stay in declaration order
        alternatives.sort_by(|a, b| b.score.total_cmp(&a.score));

        if let Some(margin) = self.intent_margin {
            let contenders: Vec<ScoredIntent> = alternatives
                .iter()
                .copied()
                .filter(|a| a.score >= self.threshold && best.score - a.score <= margin)
                .collect();
            if !contenders.is_empty() {
                let mut competing = vec![ScoredIntent {
                    kind: best.intent,
                    score: best.score,
                }];
                competing.extend(contenders);
                tracing::debug!(
                    utterance_id = %utterance.id,
                    competing = ?competing,
                    "Competing intents within margin"
                );
                return Intent::new(IntentKind::ClarifyNeeded, best.score)
                    .with_alternatives(competing);
            }
        }

        tracing::debug!(
            utterance_id = %utterance.id,
            intent = %best.intent,
            score = best.score,
            "Classified utterance"
        );
        Intent::new(best.intent, best.score).with_alternatives(alternatives)
    }
}

/// Trigger phrases and affinities of the photo intents, in tie-break order.
fn default_rules() -> Result<Vec<IntentRule>, NluError> {
    use EntityKind::*;
    Ok(vec![
        IntentRule::new(
            IntentKind::Search,
            &[
                ("find", 1.0),
                (r"search(?:\s+for)?", 1.0),
                (r"show\s+me", 1.0),
                (r"look\s+for", 1.0),
                ("show", 0.8),
                ("display", 0.8),
                (r"where\s+are", 0.7),
                (r"get\s+me", 0.7),
                ("list", 0.6),
            ],
            &[Keyword, Location, Date, Person, Object],
        )?,
        IntentRule::new(
            IntentKind::Filter,
            &[
                ("filter", 1.0),
                (r"narrow(?:\s+down)?", 1.0),
                (r"keep\s+only", 1.0),
                ("refine", 0.9),
                ("exclude", 0.9),
                ("only", 0.7),
                (r"just\s+the", 0.7),
                ("without", 0.6),
            ],
            &[Keyword, Location, Date, Person, Object],
        )?,
        IntentRule::new(
            IntentKind::BulkTag,
            &[
                ("tag", 1.0),
                (r"add\s+(?:the\s+)?tags?", 1.0),
                ("label", 0.9),
                ("mark", 0.8),
            ],
            &[Keyword, Quantity],
        )?,
        IntentRule::new(
            IntentKind::BulkMove,
            &[
                ("move", 1.0),
                ("relocate", 0.9),
                ("transfer", 0.9),
                ("put", 0.7),
            ],
            &[AlbumName, Quantity],
        )?,
        IntentRule::new(
            IntentKind::CreateAlbum,
            &[
                (r"(?:create|make|start)\s+(?:a\s+|an\s+)?(?:new\s+)?album", 1.0),
                (r"new\s+album", 0.9),
                (r"album\s+(?:called|named)", 0.7),
            ],
            &[AlbumName, Quantity],
        )?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FeatureExtractor;

    fn classify_with(config: &NluConfig, text: &str) -> Intent {
        let extractor = FeatureExtractor::new().unwrap();
        let recognizer = IntentRecognizer::new(config).unwrap();
        let utterance = Utterance::new(text);
        let entities = extractor.extract(&utterance);
        recognizer.classify(&utterance, &entities)
    }

    fn classify(text: &str) -> Intent {
        classify_with(&NluConfig::default(), text)
    }

    #[test]
    fn test_search_scenario_confidence() {
        let intent = classify("find sunset photos from Europe last summer");
        assert_eq!(intent.kind, IntentKind::Search);
        assert!(intent.confidence >= 0.6, "confidence {}", intent.confidence);
    }

    #[test]
    fn test_no_trigger_is_unknown_below_threshold() {
        for text in [
            "the last 5",
            "sunset photos from Europe last summer",
            "hello there",
            "",
            "\"Road Trip\" with Anna Smith in Paris, 2024-06-15",
        ] {
            let intent = classify(text);
            assert_eq!(intent.kind, IntentKind::Unknown, "text {text:?}");
            assert!(intent.confidence < 0.4, "text {text:?} scored {}", intent.confidence);
        }
    }

    #[test]
    fn test_bulk_intents() {
        assert_eq!(classify("tag these photos as vacation").kind, IntentKind::BulkTag);
        assert_eq!(classify("move the last 3 photos to Holidays").kind, IntentKind::BulkMove);
        assert_eq!(classify("create an album called Road Trip").kind, IntentKind::CreateAlbum);
        assert_eq!(classify("filter to sunsets").kind, IntentKind::Filter);
    }

    #[test]
    fn test_tie_goes_to_earlier_declaration() {
        let intent = classify("search and filter sunset photos");
        assert_eq!(intent.kind, IntentKind::Search);
        assert_eq!(intent.alternatives[0].kind, IntentKind::Filter);
        assert_eq!(intent.alternatives[0].score, intent.confidence);
    }

    #[test]
    fn test_custom_rules_tie_break() {
        let rules = vec![
            IntentRule::new(IntentKind::BulkMove, &[("go", 1.0)], &[]).unwrap(),
            IntentRule::new(IntentKind::BulkTag, &[("go", 1.0)], &[]).unwrap(),
        ];
        let recognizer = IntentRecognizer::with_rules(rules, &NluConfig::default());
        let intent = recognizer.classify(&Utterance::new("go"), &[]);
        assert_eq!(intent.kind, IntentKind::BulkMove);
        assert_eq!(intent.confidence, TRIGGER_WEIGHT);
    }

    #[test]
    fn test_intent_margin_yields_clarify_needed() {
        let config = NluConfig {
            intent_margin: Some(0.05),
            ..NluConfig::default()
        };
        let intent = classify_with(&config, "search and filter sunset photos");
        assert_eq!(intent.kind, IntentKind::ClarifyNeeded);
        let kinds: Vec<IntentKind> = intent.alternatives.iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![IntentKind::Search, IntentKind::Filter]);

        // a clear winner is unaffected
        let intent = classify_with(&config, "tag these photos as vacation");
        assert_eq!(intent.kind, IntentKind::BulkTag);
    }

    #[test]
    fn test_threshold_is_configurable() {
        let strict = NluConfig {
            classification_threshold: 0.9,
            ..NluConfig::default()
        };
        let intent = classify_with(&strict, "tag these photos as vacation");
        assert_eq!(intent.kind, IntentKind::Unknown);
        assert!(intent.confidence < 0.9);
    }
}
