//! General ledger domain (double-entry, event-sourced journal).
//!
//! Pure domain logic only: no IO, no HTTP, no persistence concerns. The
//! journal log lives in `forgeledger-infra`; this crate decides what goes into
//! it and how balances follow from it.

pub mod account;
pub mod entry;
pub mod error;
pub mod locks;
pub mod period;
pub mod posting;
pub mod projector;
pub mod registry;
pub mod statistics;
pub mod validator;

pub use account::{Account, AccountFilter, AccountSpec, AccountType, NormalBalance, Side};
pub use entry::{
    BalanceDelta, DraftEntry, DraftLine, DraftRevision, EntryFilter, EntryNumber, EntryStatus,
    EntryType, JournalCommand, JournalEntry, JournalEvent, LineItem,
};
pub use error::{AccountRefProblem, ErrorCategory, LedgerError, ValidationError};
pub use locks::{AccountLockGuard, AccountLocks};
pub use period::AccountingPeriods;
pub use posting::{signed_delta, PostingEngine};
pub use projector::{
    AccountLedger, BalanceDrift, DateRange, LedgerProjector, LedgerRow, TrialBalance,
    TrialBalanceOptions, TrialBalanceRow,
};
pub use registry::{AccountRegistry, ChartSnapshot};
pub use statistics::JournalStatistics;
