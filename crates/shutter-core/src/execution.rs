//! What the dispatcher reports back.

use crate::reason::ReasonCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Aggregate status of one dispatched command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Succeeded,
    PartiallyFailed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    /// Status of a settled, non-cancelled run.
    pub fn from_counts(total: usize, failed: usize) -> Self {
        if failed == 0 {
            Self::Succeeded
        } else if failed >= total {
            Self::Failed
        } else {
            Self::PartiallyFailed
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::PartiallyFailed => write!(f, "partially_failed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetOutcome {
    Succeeded,
    Failed,
    /// Never scheduled because the command was cancelled first.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetError {
    pub reason: ReasonCode,
    pub message: String,
}

/// Outcome of one handler invocation. Single-target commands have a single
/// entry with no `target_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    pub outcome: TargetOutcome,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub output: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TargetError>,
    /// Handler invocations spent, including the retry.
    pub attempts: u32,
}

impl TargetResult {
    pub fn succeeded(target_id: Option<String>, output: Value, attempts: u32) -> Self {
        Self {
            target_id,
            outcome: TargetOutcome::Succeeded,
            output,
            error: None,
            attempts,
        }
    }

    pub fn failed(
        target_id: Option<String>,
        reason: ReasonCode,
        message: impl Into<String>,
        attempts: u32,
    ) -> Self {
        Self {
            target_id,
            outcome: TargetOutcome::Failed,
            output: Value::Null,
            error: Some(TargetError {
                reason,
                message: message.into(),
            }),
            attempts,
        }
    }

    pub fn cancelled(target_id: Option<String>) -> Self {
        Self {
            target_id,
            outcome: TargetOutcome::Cancelled,
            output: Value::Null,
            error: Some(TargetError {
                reason: ReasonCode::Cancelled,
                message: "command cancelled before this target was scheduled".to_string(),
            }),
            attempts: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == TargetOutcome::Succeeded
    }
}

/// Single-use handle for undoing the succeeded targets of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RollbackToken(pub Uuid);

impl RollbackToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RollbackToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RollbackToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RollbackToken {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub command_id: Uuid,
    pub action_id: String,
    pub status: ExecutionStatus,
    pub per_target_results: Vec<TargetResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback_token: Option<RollbackToken>,
    /// Set whenever status is not `Succeeded`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<ReasonCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ExecutionResult {
    pub fn succeeded_count(&self) -> usize {
        self.per_target_results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.per_target_results
            .iter()
            .filter(|r| r.outcome == TargetOutcome::Failed)
            .count()
    }

    /// Ids of the targets that succeeded.
    pub fn succeeded_targets(&self) -> Vec<String> {
        self.per_target_results
            .iter()
            .filter(|r| r.is_success())
            .filter_map(|r| r.target_id.clone())
            .collect()
    }
}
