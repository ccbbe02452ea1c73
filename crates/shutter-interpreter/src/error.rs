//! Error types for the interpreter crate.

use shutter_core::ConfigError;
use shutter_nlu::NluError;
use thiserror::Error;

/// Errors raised while building an [`Interpreter`](crate::Interpreter).
#[derive(Debug, Error)]
pub enum InterpreterError {
    #[error("failed to build language pipeline: {0}")]
    Nlu(#[from] NluError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
