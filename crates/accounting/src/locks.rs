//! Per-account lock table.
//!
//! Postings that share no account proceed in parallel; postings that share an
//! account are mutually excluded. A caller asks for its whole account set at
//! once and either gets all of it or none of it, so two postings can never
//! hold halves of each other's sets (no deadlock, no lock ordering rules).

use std::collections::BTreeSet;
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use forgeledger_core::AccountId;

use crate::error::LedgerError;

#[derive(Debug, Default)]
pub struct AccountLocks {
    held: Mutex<BTreeSet<AccountId>>,
    released: Condvar,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire every account in `accounts`, waiting at most `timeout`.
    ///
    /// Fails with the retryable `LockTimeout` listing the accounts that were
    /// still contended at the deadline.
    pub fn acquire(
        &self,
        accounts: impl IntoIterator<Item = AccountId>,
        timeout: Duration,
    ) -> Result<AccountLockGuard<'_>, LedgerError> {
        let wanted: BTreeSet<AccountId> = accounts.into_iter().collect();
        let started = Instant::now();
        let deadline = started + timeout;

        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if wanted.is_disjoint(&held) {
                held.extend(wanted.iter().copied());
                return Ok(AccountLockGuard {
                    locks: self,
                    accounts: wanted.into_iter().collect(),
                });
            }

            let now = Instant::now();
            if now >= deadline {
                let contended = wanted.intersection(&held).copied().collect::<Vec<_>>();
                tracing::warn!(
                    accounts = ?contended,
                    waited_ms = started.elapsed().as_millis() as u64,
                    "account lock wait timed out"
                );
                return Err(LedgerError::LockTimeout {
                    accounts: contended,
                    waited_ms: started.elapsed().as_millis() as u64,
                });
            }

            let (guard, _) = self
                .released
                .wait_timeout(held, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            held = guard;
        }
    }

    /// Accounts currently locked (diagnostics only; stale as soon as it returns).
    pub fn held(&self) -> Vec<AccountId> {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .copied()
            .collect()
    }
}

/// RAII guard; releases its accounts and wakes waiters on drop.
#[derive(Debug)]
pub struct AccountLockGuard<'a> {
    locks: &'a AccountLocks,
    accounts: Vec<AccountId>,
}

impl AccountLockGuard<'_> {
    /// Locked accounts, sorted.
    pub fn accounts(&self) -> &[AccountId] {
        &self.accounts
    }

    pub fn covers(&self, accounts: &[AccountId]) -> bool {
        accounts
            .iter()
            .all(|id| self.accounts.binary_search(id).is_ok())
    }
}

impl Drop for AccountLockGuard<'_> {
    fn drop(&mut self) {
        let mut held = self
            .locks
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for id in &self.accounts {
            held.remove(id);
        }
        drop(held);
        self.locks.released.notify_all();
    }
}
