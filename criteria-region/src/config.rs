//! Region backend configuration
//!
//! ```toml
//! bind_variables = true
//! watch_buffer = 1024
//!
//! [logging]
//! level = "DEBUG"
//! slow_query_threshold_ms = 50
//! ```

use anyhow::{Context, Result};
use criteria_core::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings of a [`RegionBackend`](crate::RegionBackend)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    /// Pass query constants as `$n` bind variables instead of literals.
    /// Watches always use literals.
    pub bind_variables: bool,
    /// Events a watch buffers for a slow consumer before failing
    pub watch_buffer: usize,
    /// Logging and slow query settings
    pub logging: LoggingConfig,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            bind_variables: true,
            watch_buffer: 1024,
            logging: LoggingConfig::default(),
        }
    }
}

impl RegionConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to load config file: {}", path.display()))
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: RegionConfig =
            toml::from_str(content).context("Failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.watch_buffer == 0 {
            return Err(anyhow::anyhow!("Watch buffer cannot be 0"));
        }
        Ok(())
    }
}
