//! Domain error model (shared, ledger-agnostic part).
//!
//! Ledger-specific failures (unbalanced entries, state machine violations,
//! lock timeouts) live in `forgeledger-accounting::LedgerError`. This type only
//! covers parsing of primitive values at the domain boundary.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. an unknown enum spelling).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}
