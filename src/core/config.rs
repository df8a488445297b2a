//! Broker configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced when loading configuration or system description files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("unknown scheduling strategy '{0}'")]
    UnknownStrategy(String),
}

/// Raw configuration as read from a YAML file; absent keys fall back to defaults.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct RawBrokerConfig {
    pub sched_strategy: Option<String>,
    pub allow_retry: Option<bool>,
    pub block_size_gb: Option<f64>,
    pub min_block_size_gb: Option<f64>,
    pub split_ttl_ticks: Option<u32>,
    pub tick_period_secs: Option<u64>,
    pub seed: Option<u64>,
}

/// Runtime configuration of the broker core.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerConfig {
    /// Scheduling strategy name, resolved by `strategy_resolver`.
    pub sched_strategy: String,
    /// Retry placement with a delayed start time instead of refusing immediately.
    pub allow_retry: bool,
    /// Requests above this capacity are divided into siblings.
    pub block_size_gb: f64,
    /// Lower bound on the per-part capacity when re-dividing an already split request.
    pub min_block_size_gb: f64,
    /// Number of maintenance ticks a split tracker entry survives with missing siblings.
    pub split_ttl_ticks: u32,
    /// Period of the worker maintenance tick, in seconds.
    pub tick_period_secs: u64,
    /// Seed for the deterministic random generators used by strategies.
    pub seed: u64,
}

impl BrokerConfig {
    /// Creates a config with default parameter values.
    pub fn new() -> Self {
        Self {
            sched_strategy: "worst_case".to_string(),
            allow_retry: true,
            block_size_gb: 256.,
            min_block_size_gb: 64.,
            split_ttl_ticks: 103,
            tick_period_secs: 1,
            seed: 123,
        }
    }

    /// Creates a config by reading parameter values from a YAML file
    /// (uses default values for absent parameters).
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        let raw: RawBrokerConfig = serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })?;
        Ok(Self::from_raw(raw))
    }

    /// Fills default values for parameters absent from the raw config.
    pub fn from_raw(raw: RawBrokerConfig) -> Self {
        let default = BrokerConfig::new();
        Self {
            sched_strategy: raw.sched_strategy.unwrap_or(default.sched_strategy),
            allow_retry: raw.allow_retry.unwrap_or(default.allow_retry),
            block_size_gb: raw.block_size_gb.unwrap_or(default.block_size_gb),
            min_block_size_gb: raw.min_block_size_gb.unwrap_or(default.min_block_size_gb),
            split_ttl_ticks: raw.split_ttl_ticks.unwrap_or(default.split_ttl_ticks),
            tick_period_secs: raw.tick_period_secs.unwrap_or(default.tick_period_secs),
            seed: raw.seed.unwrap_or(default.seed),
        }
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self::new()
    }
}
