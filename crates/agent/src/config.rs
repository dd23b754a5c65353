//! Agent configuration
//!
//! Layers an optional TOML file under `AZMON_` environment variables.
//! Nested keys use `__`, e.g. `AZMON_RECEIVER__SUBSCRIPTION_ID`.

use anyhow::{Context, Result};
use azmon_receiver::ReceiverConfig;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Port for the health and metrics server
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Seconds between gather cycles
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Maximum random delay added to each interval, in seconds
    #[serde(default = "default_jitter")]
    pub jitter_secs: u64,

    #[serde(default)]
    pub receiver: ReceiverConfig,
}

fn default_api_port() -> u16 {
    8080
}

fn default_interval() -> u64 {
    60
}

fn default_jitter() -> u64 {
    5
}

impl AgentConfig {
    /// Load configuration from an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix("AZMON")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .context("Failed to read configuration")?;

        config
            .try_deserialize()
            .context("Failed to parse configuration")
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn jitter(&self) -> Duration {
        Duration::from_secs(self.jitter_secs)
    }
}
