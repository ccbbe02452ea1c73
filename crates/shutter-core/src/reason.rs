//! Machine-readable reason codes.
//!
//! Every rejected translation and every failed dispatch carries one of these
//! alongside a human-readable message.

use serde::{Deserialize, Serialize};

/// Failure taxonomy shared by translation and dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    // ===== Translation phase (terminal, returned as Rejected) =====
    /// No registered action serves the classified intent.
    UnsupportedIntent,
    /// A direct call named an action id that is not registered.
    UnknownAction,
    /// A required parameter could not be resolved from the utterance.
    MissingRequiredParameter,
    /// More than one candidate value fits a parameter.
    AmbiguousParameter,
    /// The caller lacks a permission the action requires.
    Forbidden,
    /// A parameter value failed its type check or validator.
    ValidationFailed,

    // ===== Dispatch phase (per target, aggregated) =====
    /// The action handler reported a failure.
    HandlerError,
    /// The handler failure is classified as retryable.
    TransientFailure,
    /// The command was cancelled before this work was scheduled.
    Cancelled,
}

impl ReasonCode {
    /// Whether this code is produced while translating (never after dispatch).
    pub fn is_translation_phase(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedIntent
                | Self::UnknownAction
                | Self::MissingRequiredParameter
                | Self::AmbiguousParameter
                | Self::Forbidden
                | Self::ValidationFailed
        )
    }

    /// Only transient failures are eligible for the automatic retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientFailure)
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedIntent => write!(f, "UNSUPPORTED_INTENT"),
            Self::UnknownAction => write!(f, "UNKNOWN_ACTION"),
            Self::MissingRequiredParameter => write!(f, "MISSING_REQUIRED_PARAMETER"),
            Self::AmbiguousParameter => write!(f, "AMBIGUOUS_PARAMETER"),
            Self::Forbidden => write!(f, "FORBIDDEN"),
            Self::ValidationFailed => write!(f, "VALIDATION_FAILED"),
            Self::HandlerError => write!(f, "HANDLER_ERROR"),
            Self::TransientFailure => write!(f, "TRANSIENT_FAILURE"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}
