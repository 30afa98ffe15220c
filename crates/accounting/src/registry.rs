//! Account Registry: the chart of accounts and its balance cache.
//!
//! The registry owns account metadata, the hierarchy and the per-account lock
//! table. Balances are a materialized cache of the journal log; the only code
//! path that changes them is `PostingEngine::commit`, via `apply_deltas`.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use forgeledger_core::AccountId;

use crate::account::{Account, AccountFilter, AccountSpec};
use crate::entry::BalanceDelta;
use crate::error::LedgerError;
use crate::locks::{AccountLockGuard, AccountLocks};

#[derive(Debug, Default)]
struct Chart {
    accounts: BTreeMap<AccountId, Account>,
    by_number: HashMap<String, AccountId>,
}

impl Chart {
    /// Depth of a would-be child of `parent_id`, found by walking ancestors.
    ///
    /// Parents always predate children, so the walk ends at a root within
    /// `accounts.len()` steps; anything longer means the tree is corrupt and the
    /// parent is treated as unusable.
    fn child_level(&self, parent_id: AccountId) -> Result<u32, LedgerError> {
        let mut depth = 0u32;
        let mut cursor = Some(parent_id);
        while let Some(id) = cursor {
            let account = self
                .accounts
                .get(&id)
                .ok_or(LedgerError::UnknownParent { parent_id })?;
            depth += 1;
            if depth as usize > self.accounts.len() {
                return Err(LedgerError::UnknownParent { parent_id });
            }
            cursor = account.parent_id();
        }
        Ok(depth)
    }

    fn descendants(&self, root: AccountId) -> Vec<AccountId> {
        let mut children: HashMap<AccountId, Vec<AccountId>> = HashMap::new();
        for account in self.accounts.values() {
            if let Some(parent) = account.parent_id() {
                children.entry(parent).or_default().push(account.id_typed());
            }
        }

        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if let Some(kids) = children.get(&id) {
                out.extend(kids.iter().copied());
                stack.extend(kids.iter().copied());
            }
        }
        out
    }

    fn set_balance(&mut self, account_id: AccountId, balance: Decimal) {
        if let Some(account) = self.accounts.get_mut(&account_id) {
            account.set_balance(balance);
        }
    }
}

/// Balances that result from applying `deltas` in order, per touched account.
///
/// Fails without side effects on an unknown account or on any intermediate
/// balance outside the representable range.
pub(crate) fn project_balances(
    deltas: &[BalanceDelta],
    current: impl Fn(AccountId) -> Option<Decimal>,
) -> Result<BTreeMap<AccountId, Decimal>, LedgerError> {
    let mut projected = BTreeMap::new();
    for delta in deltas {
        let account_id = delta.account_id;
        let balance = match projected.get(&account_id) {
            Some(balance) => *balance,
            None => current(account_id).ok_or(LedgerError::UnknownAccount { account_id })?,
        };
        let next = balance
            .checked_add(delta.amount)
            .ok_or(LedgerError::BalanceOutOfRange { account_id })?;
        projected.insert(account_id, next);
    }
    Ok(projected)
}

#[derive(Debug, Default)]
pub struct AccountRegistry {
    chart: RwLock<Chart>,
    locks: AccountLocks,
}

impl AccountRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // Critical sections never panic half-way, so a poisoned lock still guards
    // consistent data.
    fn read(&self) -> RwLockReadGuard<'_, Chart> {
        self.chart.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Chart> {
        self.chart.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn create_account(
        &self,
        spec: AccountSpec,
        created_at: DateTime<Utc>,
    ) -> Result<Account, LedgerError> {
        let mut chart = self.write();

        if chart.by_number.contains_key(&spec.account_number) {
            return Err(LedgerError::DuplicateAccount {
                account_number: spec.account_number,
            });
        }

        let level = match spec.parent_id {
            Some(parent_id) => chart.child_level(parent_id)?,
            None => 0,
        };

        let id = AccountId::new();
        let account = Account::open(id, spec, level, created_at);
        chart.by_number.insert(account.account_number().to_string(), id);
        chart.accounts.insert(id, account.clone());

        tracing::info!(
            account_id = %id,
            account_number = account.account_number(),
            account_type = %account.account_type(),
            level,
            "account created"
        );
        Ok(account)
    }

    /// Deactivate an account once neither it nor any descendant carries a
    /// balance. Idempotent for an already inactive account.
    pub fn deactivate_account(
        &self,
        account_id: AccountId,
        lock_timeout: Duration,
    ) -> Result<Account, LedgerError> {
        let subtree = {
            let chart = self.read();
            if !chart.accounts.contains_key(&account_id) {
                return Err(LedgerError::UnknownAccount { account_id });
            }
            let mut ids = chart.descendants(account_id);
            ids.push(account_id);
            ids
        };

        // Hold the subtree so no posting lands between the check and the flip.
        let _guard = self.locks.acquire(subtree, lock_timeout)?;

        let mut chart = self.write();
        let mut subtree = chart.descendants(account_id);
        subtree.insert(0, account_id);
        for id in &subtree {
            if let Some(account) = chart.accounts.get(id) {
                if !account.current_balance().is_zero() {
                    return Err(LedgerError::NonZeroBalance {
                        account_id: *id,
                        balance: account.current_balance(),
                    });
                }
            }
        }

        let account = chart
            .accounts
            .get_mut(&account_id)
            .ok_or(LedgerError::UnknownAccount { account_id })?;
        if account.is_active() {
            account.deactivate();
            tracing::info!(account_id = %account_id, "account deactivated");
        }
        Ok(account.clone())
    }

    pub fn get_account(&self, account_id: AccountId) -> Option<Account> {
        self.read().accounts.get(&account_id).cloned()
    }

    pub fn find_by_number(&self, account_number: &str) -> Option<Account> {
        let chart = self.read();
        chart
            .by_number
            .get(account_number)
            .and_then(|id| chart.accounts.get(id))
            .cloned()
    }

    /// Accounts matching `filter`, ordered by account number.
    pub fn list_accounts(&self, filter: &AccountFilter) -> Vec<Account> {
        let mut out = self
            .read()
            .accounts
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect::<Vec<_>>();
        out.sort_by(|a, b| a.account_number().cmp(b.account_number()));
        out
    }

    pub fn children(&self, account_id: AccountId) -> Vec<Account> {
        self.list_accounts(&AccountFilter {
            parent_id: Some(account_id),
            ..AccountFilter::default()
        })
    }

    pub fn descendants(&self, account_id: AccountId) -> Vec<AccountId> {
        self.read().descendants(account_id)
    }

    pub fn len(&self) -> usize {
        self.read().accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consistent point-in-time copy of the chart (never a half-applied posting).
    pub fn snapshot(&self) -> ChartSnapshot {
        ChartSnapshot {
            accounts: self.read().accounts.clone(),
        }
    }

    /// Lock a set of accounts for a posting or reversal.
    pub fn lock_accounts(
        &self,
        accounts: impl IntoIterator<Item = AccountId>,
        timeout: Duration,
    ) -> Result<AccountLockGuard<'_>, LedgerError> {
        self.locks.acquire(accounts, timeout)
    }

    /// Apply every delta of one posting or reversal as a unit.
    ///
    /// Every new balance is computed before any is written, so an unknown
    /// account or an out-of-range balance leaves the chart untouched.
    pub(crate) fn apply_deltas(&self, deltas: &[BalanceDelta]) -> Result<(), LedgerError> {
        let mut chart = self.write();
        let balances = project_balances(deltas, |id| {
            chart.accounts.get(&id).map(Account::current_balance)
        })?;
        for (account_id, balance) in balances {
            chart.set_balance(account_id, balance);
        }
        Ok(())
    }
}

/// Immutable copy of the chart used by the validator and the projector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChartSnapshot {
    accounts: BTreeMap<AccountId, Account>,
}

impl ChartSnapshot {
    pub fn from_accounts(accounts: impl IntoIterator<Item = Account>) -> Self {
        Self {
            accounts: accounts
                .into_iter()
                .map(|a| (a.id_typed(), a))
                .collect(),
        }
    }

    pub fn get(&self, account_id: &AccountId) -> Option<&Account> {
        self.accounts.get(account_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn sorted_by_number(&self) -> Vec<&Account> {
        let mut out = self.accounts.values().collect::<Vec<_>>();
        out.sort_by(|a, b| a.account_number().cmp(b.account_number()));
        out
    }
}
