//! HTTP process configuration.

use std::env;
use std::net::SocketAddr;

use forgeledger_infra::{ConfigError, LedgerConfig};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub ledger: LedgerConfig,
}

impl ApiConfig {
    /// `FORGELEDGER_BIND_ADDR` (default `0.0.0.0:8080`) plus every
    /// `LedgerConfig` variable.
    pub fn from_env() -> Result<Self, ApiConfigError> {
        let raw = env::var("FORGELEDGER_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
        Ok(Self {
            bind_addr: parse_bind_addr(&raw)?,
            ledger: LedgerConfig::from_env()?,
        })
    }
}

fn parse_bind_addr(raw: &str) -> Result<SocketAddr, ApiConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ApiConfigError::InvalidBindAddr(raw.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum ApiConfigError {
    #[error("Invalid value for FORGELEDGER_BIND_ADDR: {0}")]
    InvalidBindAddr(String),

    #[error(transparent)]
    Ledger(#[from] ConfigError),
}
