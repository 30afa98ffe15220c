//! Ledger error taxonomy.
//!
//! Every error is per-operation and recoverable: a rejected command leaves
//! accounts and entries exactly as they were. Only `Concurrency` errors are
//! worth retrying unchanged.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use forgeledger_core::{AccountId, EntryId};

use crate::account::Side;
use crate::entry::EntryStatus;

/// Coarse classification used by callers to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Shape of a single entry is wrong (fix the input).
    Structural,
    /// Something referenced does not exist or is unusable.
    Referential,
    /// A ledger invariant would be broken.
    Invariant,
    /// The requested transition is not legal from the current status.
    StateMachine,
    /// Lost a race; resubmit the same request.
    Concurrency,
}

impl ErrorCategory {
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorCategory::Concurrency)
    }
}

/// Why a line's account reference was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountRefProblem {
    Unknown,
    Inactive,
}

impl core::fmt::Display for AccountRefProblem {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            AccountRefProblem::Unknown => f.write_str("unknown"),
            AccountRefProblem::Inactive => f.write_str("inactive"),
        }
    }
}

/// A failed check on a candidate journal entry.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ValidationError {
    #[error("journal entry needs at least two lines (found {found})")]
    InsufficientLines { found: usize },

    #[error("line {line_number}: account {account_id} is {reason}")]
    InvalidAccountReference {
        line_number: u32,
        account_id: AccountId,
        reason: AccountRefProblem,
    },

    #[error(
        "line {line_number}: exactly one of debit ({debit}) or credit ({credit}) must be positive"
    )]
    MalformedLine {
        line_number: u32,
        debit: Decimal,
        credit: Decimal,
    },

    #[error("debits ({total_debit}) do not equal credits ({total_credit}), difference {difference}")]
    Unbalanced {
        total_debit: Decimal,
        total_credit: Decimal,
        /// `total_debit - total_credit`.
        difference: Decimal,
    },

    #[error("entry date {date} falls in a closed period (closed through {closed_through})")]
    PeriodClosed {
        date: NaiveDate,
        closed_through: NaiveDate,
    },

    /// The line amounts on one side add up past the representable range.
    #[error("{side} amounts exceed the supported range")]
    AmountOutOfRange { side: Side },
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::InsufficientLines { .. } => "insufficient_lines",
            ValidationError::InvalidAccountReference { .. } => "invalid_account_reference",
            ValidationError::MalformedLine { .. } => "malformed_line",
            ValidationError::Unbalanced { .. } => "unbalanced",
            ValidationError::PeriodClosed { .. } => "period_closed",
            ValidationError::AmountOutOfRange { .. } => "amount_out_of_range",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ValidationError::InsufficientLines { .. }
            | ValidationError::MalformedLine { .. }
            | ValidationError::AmountOutOfRange { .. } => ErrorCategory::Structural,
            ValidationError::InvalidAccountReference { .. } => ErrorCategory::Referential,
            ValidationError::Unbalanced { .. } | ValidationError::PeriodClosed { .. } => {
                ErrorCategory::Invariant
            }
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("account number {account_number} already exists")]
    DuplicateAccount { account_number: String },

    #[error("parent account {parent_id} does not exist")]
    UnknownParent { parent_id: AccountId },

    #[error("account {account_id} does not exist")]
    UnknownAccount { account_id: AccountId },

    #[error("account {account_id} carries a non-zero balance of {balance}")]
    NonZeroBalance {
        account_id: AccountId,
        balance: Decimal,
    },

    #[error("journal entry {entry_id} does not exist")]
    UnknownEntry { entry_id: EntryId },

    /// Submission or revision refused; lists every problem found.
    #[error("journal entry rejected with {} problem(s)", .0.len())]
    Rejected(Vec<ValidationError>),

    /// Posting refused by the validator (first failure).
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("journal entry {entry_id} is already {status}")]
    AlreadyFinalized {
        entry_id: EntryId,
        status: EntryStatus,
    },

    #[error("journal entry {entry_id} cannot move from {from} to {to}")]
    InvalidTransition {
        entry_id: EntryId,
        from: EntryStatus,
        to: EntryStatus,
    },

    #[error("gave up after {waited_ms}ms waiting for account lock(s) {accounts:?}")]
    LockTimeout {
        accounts: Vec<AccountId>,
        waited_ms: u64,
    },

    #[error("concurrent modification: {0}")]
    Conflict(String),

    #[error("invalid date range: {start} is after {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("reversing journal entry {entry_id} requires a reason")]
    MissingReversalReason { entry_id: EntryId },

    /// Applying the entry would push an account balance past the
    /// representable range.
    #[error("balance of account {account_id} would exceed the supported range")]
    BalanceOutOfRange { account_id: AccountId },

    /// A report total over many accounts or entries does not fit.
    #[error("{total} exceeds the supported range")]
    TotalOutOfRange { total: &'static str },
}

impl LedgerError {
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::DuplicateAccount { .. } => "duplicate_account",
            LedgerError::UnknownParent { .. } => "unknown_parent",
            LedgerError::UnknownAccount { .. } => "unknown_account",
            LedgerError::NonZeroBalance { .. } => "non_zero_balance",
            LedgerError::UnknownEntry { .. } => "unknown_entry",
            LedgerError::Rejected(_) => "rejected",
            LedgerError::Validation(v) => v.code(),
            LedgerError::AlreadyFinalized { .. } => "already_finalized",
            LedgerError::InvalidTransition { .. } => "invalid_transition",
            LedgerError::LockTimeout { .. } => "lock_timeout",
            LedgerError::Conflict(_) => "conflict",
            LedgerError::InvalidDateRange { .. } => "invalid_date_range",
            LedgerError::MissingReversalReason { .. } => "missing_reversal_reason",
            LedgerError::BalanceOutOfRange { .. } => "balance_out_of_range",
            LedgerError::TotalOutOfRange { .. } => "total_out_of_range",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            LedgerError::Rejected(problems) => problems
                .first()
                .map(ValidationError::category)
                .unwrap_or(ErrorCategory::Structural),
            LedgerError::Validation(v) => v.category(),
            LedgerError::InvalidDateRange { .. } | LedgerError::MissingReversalReason { .. } => {
                ErrorCategory::Structural
            }
            LedgerError::UnknownParent { .. }
            | LedgerError::UnknownAccount { .. }
            | LedgerError::UnknownEntry { .. } => ErrorCategory::Referential,
            LedgerError::DuplicateAccount { .. }
            | LedgerError::NonZeroBalance { .. }
            | LedgerError::BalanceOutOfRange { .. }
            | LedgerError::TotalOutOfRange { .. } => ErrorCategory::Invariant,
            LedgerError::AlreadyFinalized { .. } | LedgerError::InvalidTransition { .. } => {
                ErrorCategory::StateMachine
            }
            LedgerError::LockTimeout { .. } | LedgerError::Conflict(_) => {
                ErrorCategory::Concurrency
            }
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}
