//! Discovery engine configuration using Figment.
//!
//! Configuration is loaded from:
//! 1. A `dongle.toml` file (base configuration)
//! 2. Environment variables (prefixed with `DONGLE_HUB_`)
//!
//! # Environment Variable Overrides
//!
//! ```text
//! DONGLE_HUB_POLL_INTERVAL=500ms
//! DONGLE_HUB_EVENT_CAPACITY=128
//! ```
//!
//! Every field has a default, so a missing file is fine; the engine starts
//! with the standard 2 second poll interval.

use std::path::Path;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::advisory::{AdvisoryRule, AdvisoryTable};
use crate::error::{DongleError, Result};

/// Default configuration file, resolved against the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "dongle.toml";

/// Runtime settings for the discovery engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Interval between background discovery cycles.
    #[serde(with = "humantime_serde", default = "default_poll_interval")]
    pub poll_interval: Duration,
    /// Capacity of the lifecycle event broadcast channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
    /// Capacity of the engine command mailbox.
    #[serde(default = "default_command_capacity")]
    pub command_capacity: usize,
    /// Advisory rules replacing the built-in table when non-empty.
    #[serde(default)]
    pub advisories: Vec<AdvisoryRule>,
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(2000)
}

fn default_event_capacity() -> usize {
    64
}

fn default_command_capacity() -> usize {
    100
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            event_capacity: default_event_capacity(),
            command_capacity: default_command_capacity(),
            advisories: Vec::new(),
        }
    }
}

impl DiscoveryConfig {
    /// Load from `dongle.toml` and `DONGLE_HUB_` environment variables.
    ///
    /// Environment variables take precedence over the file; defaults fill
    /// anything neither provides.
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load from a specific file path plus environment overrides.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: Self = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("DONGLE_HUB_"))
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(DongleError::Configuration(
                "poll_interval must be greater than zero".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(DongleError::Configuration(
                "event_capacity must be greater than zero".to_string(),
            ));
        }
        if self.command_capacity == 0 {
            return Err(DongleError::Configuration(
                "command_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// The advisory table to use: configured rules when present, otherwise
    /// the built-ins.
    pub fn advisory_table(&self) -> AdvisoryTable {
        if self.advisories.is_empty() {
            AdvisoryTable::builtin()
        } else {
            AdvisoryTable::from_rules(self.advisories.clone())
        }
    }
}
