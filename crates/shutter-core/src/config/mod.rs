//! Configuration types for Shutter.
//!
//! A single YAML document (`shutter.yaml`) configures every crate. All
//! sections are optional; an empty document yields the default policy.
//!
//! ```yaml
//! nlu:
//!   classification_threshold: 0.4
//!   ambiguity_margin: 0.15
//! conversation:
//!   max_unanswered_turns: 1
//! dispatch:
//!   max_concurrency: 8
//! roles:
//!   viewer: [read:photos]
//! ```

pub mod conversation;
pub mod dispatch;
pub mod logging;
pub mod nlu;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

pub use conversation::ConversationConfig;
pub use dispatch::DispatchConfig;
pub use logging::LoggingConfig;
pub use nlu::NluConfig;

/// Complete Shutter configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShutterConfig {
    #[serde(default)]
    pub nlu: NluConfig,

    #[serde(default)]
    pub conversation: ConversationConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Named permission sets callers can be granted.
    #[serde(default)]
    pub roles: BTreeMap<String, Vec<String>>,
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ShutterConfig {
    /// Load and validate configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        // serde_yaml rejects an empty document for a struct
        let config: Self = if content.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(content)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Check semantic constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let unit = 0.0..=1.0;
        if !unit.contains(&self.nlu.classification_threshold) {
            return Err(ConfigError::Config(format!(
                "nlu.classification_threshold must be within [0, 1], got {}",
                self.nlu.classification_threshold
            )));
        }
        if !unit.contains(&self.nlu.ambiguity_margin) {
            return Err(ConfigError::Config(format!(
                "nlu.ambiguity_margin must be within [0, 1], got {}",
                self.nlu.ambiguity_margin
            )));
        }
        if let Some(margin) = self.nlu.intent_margin
            && !unit.contains(&margin)
        {
            return Err(ConfigError::Config(format!(
                "nlu.intent_margin must be within [0, 1], got {}",
                margin
            )));
        }
        if self.dispatch.max_concurrency == 0 {
            return Err(ConfigError::Config(
                "dispatch.max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.dispatch.progress_buffer == 0 {
            return Err(ConfigError::Config(
                "dispatch.progress_buffer must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Permissions granted by a named role.
    pub fn role_permissions(&self, role: &str) -> Option<BTreeSet<String>> {
        self.roles
            .get(role)
            .map(|perms| perms.iter().cloned().collect())
    }
}
