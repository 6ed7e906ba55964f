// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Monitor configuration loading and validation
//!
//! The TOML file is parsed and validated once; on reload the whole channel
//! list is replaced, there is no in-place mutation of definitions.

use crate::backoff::{MAX_INTERVAL, MIN_INTERVAL};
use crate::channel::ChannelDefinition;
use crate::lease::CoordinationConfig;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// A guard definition from the `[guards.<name>]` table
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GuardSpec {
    /// Passes when the command exits 0
    Script { command: String },
    /// Passes when the hostname resolves to at least one address
    DnsResolves { hostname: String },
}

/// Top-level monitor settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MonitorSettings {
    /// Lease name; instances sharing a name elect one leader among them
    #[serde(default = "default_monitor_name")]
    pub name: String,
    #[serde(with = "humantime_serde", default = "default_lease_timeout")]
    pub lease_timeout: Duration,
    /// Samples kept per channel before the oldest are dropped
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,
}

fn default_monitor_name() -> String {
    "vigil".to_string()
}

fn default_lease_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_history_cap() -> usize {
    500
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            name: default_monitor_name(),
            lease_timeout: default_lease_timeout(),
            history_cap: default_history_cap(),
        }
    }
}

/// The parsed and validated configuration file
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub monitor: MonitorSettings,
    #[serde(default)]
    pub channels: Vec<ChannelDefinition>,
    #[serde(default)]
    pub guards: HashMap<String, GuardSpec>,
}

impl MonitorConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn coordination(&self) -> CoordinationConfig {
        CoordinationConfig::new(self.monitor.name.clone())
            .with_lease_timeout(self.monitor.lease_timeout)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for channel in &self.channels {
            if channel.id.0.trim().is_empty() {
                return Err(ConfigError::Invalid("channel id must not be empty".into()));
            }
            if !seen.insert(&channel.id) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate channel id '{}'",
                    channel.id
                )));
            }
            if channel.failure_threshold == 0 {
                return Err(ConfigError::Invalid(format!(
                    "channel '{}': failure_threshold must be at least 1",
                    channel.id
                )));
            }
            if channel.base_interval < MIN_INTERVAL || channel.base_interval > MAX_INTERVAL {
                return Err(ConfigError::Invalid(format!(
                    "channel '{}': base_interval must be within {}s..{}s",
                    channel.id,
                    MIN_INTERVAL.as_secs(),
                    MAX_INTERVAL.as_secs()
                )));
            }
            if channel.timeout.is_zero() {
                return Err(ConfigError::Invalid(format!(
                    "channel '{}': timeout must be non-zero",
                    channel.id
                )));
            }
            for guard in &channel.guards {
                if !self.guards.contains_key(guard) {
                    return Err(ConfigError::Invalid(format!(
                        "channel '{}': unknown guard '{}'",
                        channel.id, guard
                    )));
                }
            }
        }
        if self.monitor.lease_timeout < Duration::from_secs(1) {
            return Err(ConfigError::Invalid(
                "lease_timeout must be at least 1s".into(),
            ));
        }
        if self.monitor.history_cap == 0 {
            return Err(ConfigError::Invalid(
                "history_cap must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
