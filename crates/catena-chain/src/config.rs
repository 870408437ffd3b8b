use std::path::Path;

use catena_dispatch::DispatchConfig;
use catena_types::{Address, Txid};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Errors loading configuration or installing logging.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown log level '{0}'")]
    InvalidLogLevel(String),

    #[error("failed to install log subscriber: {0}")]
    Logging(String),
}

/// Logging configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// One of `trace`, `debug`, `info`, `warn`, `error`.
    pub level: String,
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            ansi: true,
        }
    }
}

impl LogConfig {
    /// Install a global `tracing` fmt subscriber.
    pub fn install(&self) -> Result<(), ConfigError> {
        let level: tracing::Level = self
            .level
            .parse()
            .map_err(|_| ConfigError::InvalidLogLevel(self.level.clone()))?;
        tracing_subscriber::fmt()
            .with_max_level(level)
            .with_ansi(self.ansi)
            .try_init()
            .map_err(|e| ConfigError::Logging(e.to_string()))
    }
}

/// Configuration for a [`ChainObserver`](crate::ChainObserver).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverConfig {
    /// Root-of-trust transaction of the chain to follow. Ignored when the
    /// state store already holds one.
    pub root_txid: Option<Txid>,
    /// Address every chain transaction must pay.
    pub chain_address: Option<Address>,
    /// Emit appended/withdrawn events while replaying a stored chain.
    pub notify_during_replay: bool,
    pub log: LogConfig,
    pub dispatch: DispatchConfig,
}

impl ObserverConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        parse(s)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        parse(&std::fs::read_to_string(path)?)
    }
}

/// Fee policy for an [`Issuer`](crate::Issuer).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssuerConfig {
    /// Value left for the ledger on each statement.
    pub fee: u64,
    /// Value attached to the data output.
    pub data_value: u64,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            fee: 1_000,
            data_value: 0,
        }
    }
}

impl IssuerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        parse(s)
    }

    /// Value consumed per statement.
    pub fn cost(&self) -> u64 {
        self.fee.saturating_add(self.data_value)
    }
}

fn parse<T: DeserializeOwned>(s: &str) -> Result<T, ConfigError> {
    Ok(toml::from_str(s)?)
}
