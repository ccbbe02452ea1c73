//! Progress events emitted while a command executes.

use serde::{Deserialize, Serialize};
use shutter_core::ExecutionStatus;
use uuid::Uuid;

/// One state change of a dispatched command.
///
/// Per command, `Progress` events arrive with strictly increasing
/// `completed`, followed by exactly one `Finished`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    Progress {
        command_id: Uuid,
        completed: usize,
        total: usize,
    },
    Finished {
        command_id: Uuid,
        status: ExecutionStatus,
    },
}

impl ProgressEvent {
    pub fn command_id(&self) -> Uuid {
        match self {
            Self::Progress { command_id, .. } | Self::Finished { command_id, .. } => *command_id,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_form_is_tagged() {
        let id = Uuid::nil();
        let event = ProgressEvent::Progress {
            command_id: id,
            completed: 2,
            total: 5,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "progress");
        assert_eq!(json["completed"], 2);

        let done = ProgressEvent::Finished {
            command_id: id,
            status: ExecutionStatus::PartiallyFailed,
        };
        assert_eq!(serde_json::to_value(&done).unwrap()["status"], "partially_failed");
        assert!(done.is_finished());
        assert_eq!(done.command_id(), id);
    }
}
