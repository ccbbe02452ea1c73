//! # shutter-nlu
//!
//! Deterministic language understanding for photo commands. No model is
//! trained; everything is regex patterns, word lists and fixed weights.
//!
//! ```text
//! Utterance ──► FeatureExtractor ──► [ExtractedEntity]
//!                                        │
//!                 IntentRecognizer ◄─────┤
//!                        │               │
//!                      Intent ──► ParameterExtractor (against an action schema)
//! ```
//!
//! Thresholds come from [`shutter_core::NluConfig`].

mod dates;
pub mod error;
pub mod extractor;
pub mod lexicon;
pub mod params;
pub mod recognizer;

pub use error::NluError;
pub use extractor::FeatureExtractor;
pub use params::{has_bearing, Fill, ParameterExtractor};
pub use recognizer::{IntentRecognizer, IntentRule, IntentScore};
