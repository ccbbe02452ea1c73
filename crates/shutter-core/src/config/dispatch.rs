//! Dispatcher settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Maximum number of bulk targets running at once.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Delay before the single retry of a transient failure.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Capacity of each command's progress channel.
    #[serde(default = "default_progress_buffer")]
    pub progress_buffer: usize,

    /// How long a progress subscription may wait for its command to be
    /// dispatched before the channel is closed.
    #[serde(default = "default_subscription_ttl_secs")]
    pub subscription_ttl_secs: u64,
}

impl DispatchConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn subscription_ttl(&self) -> Duration {
        Duration::from_secs(self.subscription_ttl_secs)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            retry_backoff_ms: default_retry_backoff_ms(),
            progress_buffer: default_progress_buffer(),
            subscription_ttl_secs: default_subscription_ttl_secs(),
        }
    }
}

fn default_max_concurrency() -> usize {
    8
}

fn default_retry_backoff_ms() -> u64 {
    50
}

fn default_progress_buffer() -> usize {
    64
}

fn default_subscription_ttl_secs() -> u64 {
    60
}
