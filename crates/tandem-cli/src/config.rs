//! TOML configuration loading and command-line overrides

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tandem_core::SchedulerConfig;
use tracing::debug;

/// Configuration file of the `tandem` binary
///
/// ```toml
/// [scheduler]
/// quantum = 2
/// event_space = 8
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CliConfig {
    /// Session configuration; missing keys fall back to the scheduler defaults
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl CliConfig {
    /// Parse a TOML document
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("invalid tandem configuration")
    }

    /// Load from `path`, or the defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        debug!(path = %path.display(), "loading config");
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse config: {}", path.display()))
    }

    /// Scheduler configuration with command-line flags taking precedence
    pub fn resolve(&self, quantum: Option<u32>, events: Option<u32>) -> Result<SchedulerConfig> {
        let config = SchedulerConfig::new(
            quantum.unwrap_or(self.scheduler.quantum),
            events.unwrap_or(self.scheduler.event_space),
        );
        config.validate().context("invalid scheduler configuration")?;
        Ok(config)
    }
}
