//! Clarification context lifetime.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Follow-up turns that may pass without answering before the pending
    /// request is dropped.
    #[serde(default = "default_max_unanswered_turns")]
    pub max_unanswered_turns: u32,

    /// Wall-clock expiry of a pending request.
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
}

impl ConversationConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_unanswered_turns: default_max_unanswered_turns(),
            ttl_seconds: default_ttl_seconds(),
        }
    }
}

fn default_max_unanswered_turns() -> u32 {
    1
}

fn default_ttl_seconds() -> u64 {
    300
}
