//! Append-only journal log.
//!
//! The journal log is the system of record for every journal entry: one stream
//! per entry, plus a global gap-free `position` across all streams. Account
//! balances and every ledger view are derived from it.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryJournalStore;
pub use r#trait::{JournalStore, JournalStoreError, StoredEvent, UncommittedEvent};
