//! Engine configuration.
//!
//! # Responsibility
//! - Hold tunables for replay checkpoints, previews and logging.
//! - Load them from a JSON file, with every field optional.
//!
//! # Invariants
//! - `preview_chars` is never zero after `validate()`.
//! - `checkpoint_interval == 0` disables automatic checkpoints only;
//!   explicit checkpoints still work.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

use crate::logging::{default_log_level, normalize_level};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Lineage events between automatic checkpoints.
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: u32,
    /// Characters kept in event and replay previews.
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
    #[serde(default = "default_level")]
    pub log_level: String,
    /// Absolute directory for rolling log files; `None` keeps logging off.
    #[serde(default)]
    pub log_dir: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            checkpoint_interval: default_checkpoint_interval(),
            preview_chars: default_preview_chars(),
            log_level: default_level(),
            log_dir: None,
        }
    }
}

impl EngineConfig {
    /// Reads and validates a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.preview_chars == 0 {
            return Err(ConfigError::Invalid(
                "preview_chars must be greater than zero".to_string(),
            ));
        }
        normalize_level(&self.log_level).map_err(ConfigError::Invalid)?;
        Ok(())
    }

    /// Whether a lineage holding `event_count` events gets an automatic
    /// checkpoint.
    pub fn checkpoint_due(&self, event_count: usize) -> bool {
        self.checkpoint_interval > 0
            && event_count > 0
            && event_count % self.checkpoint_interval as usize == 0
    }
}

fn default_checkpoint_interval() -> u32 {
    5
}

fn default_preview_chars() -> usize {
    160
}

fn default_level() -> String {
    default_log_level().to_string()
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Json(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read config: {err}"),
            Self::Json(err) => write!(f, "config is not valid JSON: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

#[cfg(test)]
mod tests {
    use super::EngineConfig;

    #[test]
    fn empty_object_uses_defaults() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.checkpoint_interval, 5);
        assert_eq!(config.preview_chars, 160);
    }

    #[test]
    fn zero_preview_is_rejected() {
        assert!(EngineConfig::from_json(r#"{"preview_chars": 0}"#).is_err());
    }

    #[test]
    fn unknown_log_level_is_rejected() {
        assert!(EngineConfig::from_json(r#"{"log_level": "chatty"}"#).is_err());
    }

    #[test]
    fn checkpoint_due_follows_interval() {
        let config = EngineConfig {
            checkpoint_interval: 3,
            ..EngineConfig::default()
        };
        assert!(!config.checkpoint_due(0));
        assert!(!config.checkpoint_due(2));
        assert!(config.checkpoint_due(3));
        assert!(config.checkpoint_due(6));

        let disabled = EngineConfig {
            checkpoint_interval: 0,
            ..EngineConfig::default()
        };
        assert!(!disabled.checkpoint_due(5));
    }
}
