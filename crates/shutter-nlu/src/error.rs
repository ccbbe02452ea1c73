//! Error types for the language-understanding pipeline.

/// Construction errors. Extraction and classification themselves never fail.
#[derive(Debug, thiserror::Error)]
pub enum NluError {
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}
