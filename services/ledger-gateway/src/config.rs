use serde::Deserialize;
use std::net::SocketAddr;
use thiserror::Error;
use wallet_core::ledger::DEFAULT_GATEWAY_PORT;

pub const ADDR_ENV: &str = "GATEWAY_ADDR";
pub const BURST_ENV: &str = "GATEWAY_TX_BURST";
pub const REFILL_ENV: &str = "GATEWAY_TX_REFILL_PER_SEC";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("refill rate must be finite and non-negative, got {0}")]
    NegativeRefill(f64),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub bind: SocketAddr,
    /// Transactions a signer may submit back to back
    pub tx_burst: u32,
    /// Tokens per second added back to each signer's bucket
    pub tx_refill_per_sec: f64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], DEFAULT_GATEWAY_PORT)),
            tx_burst: 20,
            tx_refill_per_sec: 10.0,
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(raw) = lookup(ADDR_ENV) {
            config.bind = parse(ADDR_ENV, &raw)?;
        }
        if let Some(raw) = lookup(BURST_ENV) {
            config.tx_burst = parse(BURST_ENV, &raw)?;
        }
        if let Some(raw) = lookup(REFILL_ENV) {
            config.tx_refill_per_sec = parse(REFILL_ENV, &raw)?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.tx_refill_per_sec.is_finite() || self.tx_refill_per_sec < 0.0 {
            return Err(ConfigError::NegativeRefill(self.tx_refill_per_sec));
        }
        Ok(())
    }
}

fn parse<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: raw.to_owned(),
    })
}
