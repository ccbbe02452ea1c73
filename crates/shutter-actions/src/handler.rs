//! Boundary traits implemented by the persistence layer.

use async_trait::async_trait;
use serde_json::Value;
use shutter_core::{Parameters, Quantity};

use crate::error::HandlerError;

/// Executes one action against the photo store.
///
/// Bulk actions are invoked once per target with `target` set; single-target
/// actions are invoked once with `target = None`. Invocations for different
/// targets may run concurrently and must not share mutable state.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn invoke(&self, target: Option<&str>, parameters: &Parameters) -> Result<Value, HandlerError>;

    /// Undo one successful invocation. `output` is what `invoke` returned.
    async fn revert(
        &self,
        target: Option<&str>,
        parameters: &Parameters,
        output: &Value,
    ) -> Result<(), HandlerError> {
        let _ = (target, parameters, output);
        Err(HandlerError::permanent("action does not support revert"))
    }
}

/// Expands a selection such as "the last 5" into concrete target ids.
#[async_trait]
pub trait TargetResolver: Send + Sync {
    async fn resolve(&self, action_id: &str, selection: &Quantity) -> Result<Vec<String>, HandlerError>;
}
