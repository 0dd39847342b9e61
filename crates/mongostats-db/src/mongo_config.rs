use std::time::Duration;

use mongostats_core::config::CollectorConfig;

#[derive(Debug, Clone)]
pub struct MongoTargetConfig {
    pub connection_url: String,
    /// Applies to both connecting and server selection.
    pub connect_timeout: Duration,
}

impl From<&CollectorConfig> for MongoTargetConfig {
    fn from(config: &CollectorConfig) -> Self {
        Self {
            connection_url: config.connection_url.clone(),
            connect_timeout: config.connect_timeout,
        }
    }
}
