//! Ledger configuration.
//!
//! Loaded from environment variables with fallback to defaults.

use std::env;
use std::time::Duration;

use chrono::NaiveDate;

use forgeledger_accounting::AccountingPeriods;

pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 2_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Longest wait for contended account locks before a retryable failure.
    pub lock_timeout: Duration,

    /// Closed-period boundary fed to the validator.
    pub periods: AccountingPeriods,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS),
            periods: AccountingPeriods::all_open(),
        }
    }
}

impl LedgerConfig {
    /// Load configuration from environment variables.
    ///
    /// - `FORGELEDGER_LOCK_TIMEOUT_MS` (default 2000)
    /// - `FORGELEDGER_CLOSED_THROUGH` (optional, `YYYY-MM-DD`)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as `from_env`, reading values through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let lock_timeout_ms: u64 = match lookup("FORGELEDGER_LOCK_TIMEOUT_MS") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue("FORGELEDGER_LOCK_TIMEOUT_MS".to_string()))?,
            None => DEFAULT_LOCK_TIMEOUT_MS,
        };

        let periods = match lookup("FORGELEDGER_CLOSED_THROUGH") {
            Some(raw) if !raw.trim().is_empty() => {
                let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
                    ConfigError::InvalidValue("FORGELEDGER_CLOSED_THROUGH".to_string())
                })?;
                AccountingPeriods::closed_through(date)
            }
            _ => AccountingPeriods::all_open(),
        };

        Ok(Self {
            lock_timeout: Duration::from_millis(lock_timeout_ms),
            periods,
        })
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn with_periods(mut self, periods: AccountingPeriods) -> Self {
        self.periods = periods;
        self
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}
