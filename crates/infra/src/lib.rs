//! Infrastructure layer: journal log, ledger service wiring, config.

pub mod config;
pub mod journal_store;
pub mod ledger;

#[cfg(test)]
mod integration_tests;

pub use config::{ConfigError, LedgerConfig};
pub use ledger::{GeneralLedger, ServiceError};
