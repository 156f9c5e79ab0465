//! Application configuration loader.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_consent_timeout_secs() -> u64 {
    120
}

fn default_sweep_interval_secs() -> u64 {
    30
}

fn default_persist_grants() -> bool {
    true
}

/// Warden runtime configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WardenConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_consent_timeout_secs")]
    pub consent_timeout_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_persist_grants")]
    pub persist_grants: bool,
}

impl Default for WardenConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            consent_timeout_secs: default_consent_timeout_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            persist_grants: default_persist_grants(),
        }
    }
}

impl WardenConfig {
    /// Load configuration from a YAML file, falling back to defaults when the
    /// file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        if content.trim().is_empty() {
            bail!("Config file is empty: {}", path.display());
        }

        let config: WardenConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid YAML in {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.consent_timeout_secs == 0 {
            bail!("consent_timeout_secs must be greater than zero");
        }
        if self.sweep_interval_secs == 0 {
            bail!("sweep_interval_secs must be greater than zero");
        }
        Ok(())
    }

    pub fn consent_timeout(&self) -> Duration {
        Duration::from_secs(self.consent_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}
