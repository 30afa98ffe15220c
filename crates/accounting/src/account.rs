use core::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use forgeledger_core::{AccountId, DomainError};

/// High-level account type (determines the normal balance side).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

impl AccountType {
    pub const ALL: [AccountType; 5] = [
        AccountType::Asset,
        AccountType::Liability,
        AccountType::Equity,
        AccountType::Revenue,
        AccountType::Expense,
    ];

    /// asset/expense are debit-normal; liability/equity/revenue are credit-normal.
    pub fn normal_balance(self) -> Side {
        match self {
            AccountType::Asset | AccountType::Expense => Side::Debit,
            AccountType::Liability | AccountType::Equity | AccountType::Revenue => Side::Credit,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AccountType::Asset => "asset",
            AccountType::Liability => "liability",
            AccountType::Equity => "equity",
            AccountType::Revenue => "revenue",
            AccountType::Expense => "expense",
        }
    }
}

impl core::fmt::Display for AccountType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AccountType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                DomainError::validation(
                    "account type must be one of: asset, liability, equity, revenue, expense",
                )
            })
    }
}

/// Debit or credit. Used both for the side a line sits on and for an
/// account's normal balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Debit,
    Credit,
}

/// The side on which an account's balance is expected to sit.
pub type NormalBalance = Side;

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Debit => Side::Credit,
            Side::Credit => Side::Debit,
        }
    }
}

impl core::fmt::Display for Side {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Side::Debit => f.write_str("debit"),
            Side::Credit => f.write_str("credit"),
        }
    }
}

/// Chart-of-accounts entry.
///
/// Fields are private: `normal_balance` is derived from `account_type` at
/// construction and `current_balance` is only ever changed by the posting
/// engine through the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    id: AccountId,
    account_number: String,
    name: String,
    account_type: AccountType,
    normal_balance: Side,
    parent_id: Option<AccountId>,
    level: u32,
    is_active: bool,
    current_balance: Decimal,
    description: Option<String>,
    created_at: DateTime<Utc>,
}

impl Account {
    pub(crate) fn open(
        id: AccountId,
        spec: AccountSpec,
        level: u32,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            account_number: spec.account_number,
            name: spec.name,
            normal_balance: spec.account_type.normal_balance(),
            account_type: spec.account_type,
            parent_id: spec.parent_id,
            level,
            is_active: true,
            current_balance: Decimal::ZERO,
            description: spec.description,
            created_at,
        }
    }

    pub fn id_typed(&self) -> AccountId {
        self.id
    }

    pub fn account_number(&self) -> &str {
        &self.account_number
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn account_type(&self) -> AccountType {
        self.account_type
    }

    pub fn normal_balance(&self) -> Side {
        self.normal_balance
    }

    pub fn parent_id(&self) -> Option<AccountId> {
        self.parent_id
    }

    /// Depth in the hierarchy (root = 0).
    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Cached balance, signed in the account's normal-balance convention.
    pub fn current_balance(&self) -> Decimal {
        self.current_balance
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub(crate) fn set_balance(&mut self, balance: Decimal) {
        self.current_balance = balance;
    }

    pub(crate) fn deactivate(&mut self) {
        self.is_active = false;
    }
}

/// Registry command payload: a new account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSpec {
    pub account_number: String,
    pub name: String,
    pub account_type: AccountType,
    #[serde(default)]
    pub parent_id: Option<AccountId>,
    #[serde(default)]
    pub description: Option<String>,
}

impl AccountSpec {
    pub fn new(
        account_number: impl Into<String>,
        name: impl Into<String>,
        account_type: AccountType,
    ) -> Self {
        Self {
            account_number: account_number.into(),
            name: name.into(),
            account_type,
            parent_id: None,
            description: None,
        }
    }

    pub fn with_parent(mut self, parent_id: AccountId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Read-side filter for `list_accounts`. Empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AccountFilter {
    #[serde(default)]
    pub account_type: Option<AccountType>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub parent_id: Option<AccountId>,
    /// Case-insensitive substring of the account number or name.
    #[serde(default)]
    pub search: Option<String>,
}

impl AccountFilter {
    pub fn matches(&self, account: &Account) -> bool {
        if self.account_type.is_some_and(|t| t != account.account_type) {
            return false;
        }
        if self.active.is_some_and(|a| a != account.is_active) {
            return false;
        }
        if self.parent_id.is_some() && self.parent_id != account.parent_id {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => {
                let needle = needle.to_lowercase();
                account.account_number.to_lowercase().contains(&needle)
                    || account.name.to_lowercase().contains(&needle)
            }
            _ => true,
        }
    }
}
