use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::collector::{CollectOptions, MEGABYTE};
use crate::error::{StatsError, StatsResult};

/// Collector settings, loadable from a YAML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    #[serde(default = "default_connection_url")]
    pub connection_url: String,
    /// Emit one JSON document at the end instead of console text.
    #[serde(default)]
    pub json: bool,
    /// Correlation label copied into every entry.
    #[serde(default, rename = "ref")]
    pub reference: Option<String>,
    #[serde(default = "default_scale")]
    pub scale: i64,
    #[serde(default)]
    pub include_security: bool,
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,
}

fn default_connection_url() -> String {
    "mongodb://localhost:27017".to_string()
}

fn default_scale() -> i64 {
    MEGABYTE
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            connection_url: default_connection_url(),
            json: false,
            reference: None,
            scale: default_scale(),
            include_security: false,
            connect_timeout: default_connect_timeout(),
        }
    }
}

impl CollectorConfig {
    pub fn from_file(path: &Path) -> StatsResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| StatsError::Config(format!("Cannot read {}: {e}", path.display())))?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> StatsResult<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| StatsError::Config(format!("Invalid YAML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> StatsResult<()> {
        if self.scale <= 0 {
            return Err(StatsError::Config(format!(
                "scale must be positive, got {}",
                self.scale
            )));
        }
        if !self.connection_url.starts_with("mongodb://")
            && !self.connection_url.starts_with("mongodb+srv://")
        {
            return Err(StatsError::Config(format!(
                "connection_url must start with mongodb:// or mongodb+srv://, got '{}'",
                self.connection_url
            )));
        }
        Ok(())
    }

    pub fn collect_options(&self) -> CollectOptions {
        CollectOptions {
            scale: self.scale,
            include_security: self.include_security,
        }
    }
}
