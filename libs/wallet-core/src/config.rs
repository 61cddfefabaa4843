//! Wallet configuration
//!
//! Defaults target a gateway on localhost with 9-decimal assets. `from_env` applies
//! `LEDGER_ENDPOINT` and `ASSET_DECIMALS` overrides on top of the defaults.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use token_types::numeric::{validate_decimals, DEFAULT_DECIMALS};

use crate::ledger::{EndpointParseError, LedgerEndpoint};

pub const ENDPOINT_ENV: &str = "LEDGER_ENDPOINT";
pub const DECIMALS_ENV: &str = "ASSET_DECIMALS";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error(transparent)]
    Endpoint(#[from] EndpointParseError),

    #[error("ASSET_DECIMALS must be an integer, got {0:?}")]
    DecimalsNotInteger(String),

    #[error("decimals {0} out of range (0..=18)")]
    DecimalsOutOfRange(u8),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    pub endpoint: LedgerEndpoint,
    pub decimals: u8,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            endpoint: LedgerEndpoint::default(),
            decimals: DEFAULT_DECIMALS,
        }
    }
}

impl WalletConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(raw) = lookup(ENDPOINT_ENV) {
            config.endpoint = raw.trim().parse()?;
        }
        if let Some(raw) = lookup(DECIMALS_ENV) {
            config.decimals = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::DecimalsNotInteger(raw.clone()))?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_decimals(self.decimals)
            .map(|_| ())
            .map_err(|_| ConfigError::DecimalsOutOfRange(self.decimals))
    }
}
