// Log Configuration
//
// Tunables for opening an indexed log, loadable from JSON.

use serde::{Deserialize, Serialize};

/// When a committed transaction reaches disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Durability {
    /// Every commit is fsynced before it returns.
    #[default]
    Immediate,

    /// Commits are persisted by a later immediate commit.
    /// A crash may lose a suffix of the log, never a middle part.
    Eventual,
}

/// Configuration loaded from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    pub durability: Durability,

    /// Page cache size for disk-backed stores. `None` keeps the engine default.
    pub cache_size_bytes: Option<usize>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid log config: {0}")]
    Parse(#[from] serde_json::Error),
}

impl LogConfig {
    /// Default built-in config (used if no config is provided).
    pub fn default_config() -> Self {
        Self::default()
    }

    pub fn from_json(data: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(data)?)
    }
}
