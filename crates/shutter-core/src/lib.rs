//! # shutter-core
//!
//! Shared data model for the Shutter command interpreter.
//!
//! Every other crate in the workspace speaks in these types:
//!
//! - [`Utterance`]: one unit of raw natural-language input
//! - [`ExtractedEntity`]: a typed value span pulled out of an utterance
//! - [`Intent`]: the classified purpose of an utterance, with confidence
//! - [`ParameterSchema`]: the typed, validated parameter list of an action
//! - [`Command`], [`ClarificationRequest`], [`Rejection`]: translation outcomes
//! - [`ExecutionResult`]: what the dispatcher reports back
//! - [`ReasonCode`]: the machine-readable failure taxonomy
//!
//! Configuration shared across crates lives in [`config`].

pub mod command;
pub mod config;
pub mod entity;
pub mod execution;
pub mod intent;
pub mod reason;
pub mod schema;
pub mod utterance;

pub use command::{
    ClarificationRequest, Command, CommandState, Interpretation, Parameters, Provenance, Rejection,
};
pub use config::{
    ConfigError, ConversationConfig, DispatchConfig, LoggingConfig, NluConfig, ShutterConfig,
};
pub use entity::{DateRange, EntityKind, EntityValue, ExtractedEntity, Quantity, Selector, Span};
pub use execution::{
    ExecutionResult, ExecutionStatus, RollbackToken, TargetError, TargetOutcome, TargetResult,
};
pub use intent::{Intent, IntentKind, ScoredIntent, INTENT_SCHEMA_VERSION};
pub use reason::ReasonCode;
pub use schema::{ParamType, ParameterSchema, ParameterSpec, SchemaViolation, Validator};
pub use utterance::Utterance;
