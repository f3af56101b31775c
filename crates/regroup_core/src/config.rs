//! Engine configuration.
//!
//! # Responsibility
//! - Hold tunables for the relocation engine and its logging.
//! - Load them from JSON with defaults for every omitted field.
//!
//! # Invariants
//! - Unknown keys are rejected rather than ignored.
//! - `max_closure_nodes` is always at least 1.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

pub const DEFAULT_MAX_CLOSURE_NODES: usize = 100_000;

/// Tunables consumed by `RelocationService` and the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Upper bound on nodes one request may touch: the composition closure,
    /// then the full plan including bundle anchors and annotations.
    pub max_closure_nodes: usize,
    /// Log level; `None` uses the build-mode default.
    pub log_level: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_closure_nodes: DEFAULT_MAX_CLOSURE_NODES,
            log_level: None,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_json_str(&raw)
    }

    pub fn with_max_closure_nodes(mut self, limit: usize) -> Self {
        self.max_closure_nodes = limit;
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_closure_nodes == 0 {
            return Err(ConfigError::Invalid(
                "max_closure_nodes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration loading error.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read config: {err}"),
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}
