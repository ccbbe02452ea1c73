//! Error types for the actions crate.

use shutter_core::{ReasonCode, RollbackToken};
use thiserror::Error;
use uuid::Uuid;

/// Errors raised by the action registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Descriptor rejected at registration.
    #[error("invalid descriptor for action {id}: {reason}")]
    InvalidDescriptor { id: String, reason: String },

    /// No action registered under this id.
    #[error("action not found: {id}")]
    NotFound { id: String },
}

/// Whether a handler failure is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerErrorKind {
    /// Rate limiting, timeouts and other conditions that may clear.
    Transient,
    Permanent,
}

/// Failure reported by an action handler or target resolver.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct HandlerError {
    pub kind: HandlerErrorKind,
    pub message: String,
}

impl HandlerError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: HandlerErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: HandlerErrorKind::Permanent,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == HandlerErrorKind::Transient
    }

    pub fn reason(&self) -> ReasonCode {
        match self.kind {
            HandlerErrorKind::Transient => ReasonCode::TransientFailure,
            HandlerErrorKind::Permanent => ReasonCode::HandlerError,
        }
    }
}

/// Errors that stop a command before any handler runs, or a rollback.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Only `Ready` commands are dispatched.
    #[error("command {command_id} is not ready for dispatch")]
    NotReady { command_id: Uuid },

    /// The same command is already executing.
    #[error("command {command_id} is already executing")]
    AlreadyRunning { command_id: Uuid },

    /// A target selection could not be expanded into target ids.
    #[error("cannot resolve targets for parameter {parameter}: {reason}")]
    UnresolvedTargets { parameter: String, reason: String },

    #[error("unknown or already used rollback token {token}")]
    UnknownRollbackToken { token: RollbackToken },
}

impl DispatchError {
    /// Reason code reported to callers.
    pub fn reason(&self) -> ReasonCode {
        match self {
            Self::Registry(_) => ReasonCode::UnknownAction,
            Self::NotReady { .. } | Self::UnresolvedTargets { .. } => ReasonCode::ValidationFailed,
            Self::AlreadyRunning { .. } | Self::UnknownRollbackToken { .. } => ReasonCode::HandlerError,
        }
    }
}
