//! Ledger Projector: read-only views derived from the journal.
//!
//! Replaying posted entries is the authoritative definition of every balance;
//! the registry's `current_balance` is a cache that `reconcile` checks against
//! the replay. Only entries whose status is `posted` contribute. A reversed
//! entry's posting and reversal cancel, so it contributes nothing.
//!
//! Every view is a pure function of (entries, chart). Calling it twice with the
//! same input returns identical output.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use forgeledger_core::{AccountId, EntryId};

use crate::account::{Account, AccountType, Side};
use crate::entry::{EntryNumber, EntryStatus, JournalEntry};
use crate::error::LedgerError;
use crate::posting::signed_delta;
use crate::registry::ChartSnapshot;

/// Inclusive date range; open on either end when unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<Self, LedgerError> {
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(LedgerError::InvalidDateRange { start, end });
            }
        }
        Ok(Self { start, end })
    }

    pub fn all() -> Self {
        Self::default()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.is_none_or(|s| date >= s) && self.end.is_none_or(|e| date <= e)
    }

    fn is_before(&self, date: NaiveDate) -> bool {
        self.start.is_some_and(|s| date < s)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct TrialBalanceOptions {
    /// Also list active accounts whose balance is zero.
    #[serde(default)]
    pub include_zero: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrialBalanceRow {
    pub account_id: AccountId,
    pub account_number: String,
    pub name: String,
    pub account_type: AccountType,
    pub normal_balance: Side,
    /// Signed balance in the account's normal-balance convention.
    pub net_balance: Decimal,
    pub debit_balance: Decimal,
    pub credit_balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrialBalance {
    pub as_of: NaiveDate,
    pub rows: Vec<TrialBalanceRow>,
    pub total_debit: Decimal,
    pub total_credit: Decimal,
}

impl TrialBalance {
    pub fn is_balanced(&self) -> bool {
        self.total_debit == self.total_credit
    }
}

/// Split a signed normal-convention balance into (debit, credit) columns.
///
/// A balance on the wrong side of its normal balance is reported in the
/// opposite column with the same magnitude, never as a negative number.
pub fn classify(normal_balance: Side, net_balance: Decimal) -> (Decimal, Decimal) {
    let side = if net_balance.is_sign_negative() {
        normal_balance.opposite()
    } else {
        normal_balance
    };
    match side {
        Side::Debit => (net_balance.abs(), Decimal::ZERO),
        Side::Credit => (Decimal::ZERO, net_balance.abs()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerRow {
    pub entry_id: EntryId,
    pub entry_number: EntryNumber,
    pub date: NaiveDate,
    pub reference: String,
    pub description: String,
    pub line_number: u32,
    pub debit: Decimal,
    pub credit: Decimal,
    pub cost_center: Option<String>,
    pub project: Option<String>,
    pub department: Option<String>,
    pub running_balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountLedger {
    pub account: Account,
    pub range: DateRange,
    pub opening_balance: Decimal,
    pub closing_balance: Decimal,
    pub rows: Vec<LedgerRow>,
}

/// Cached balance that disagrees with the journal replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceDrift {
    pub account_id: AccountId,
    pub account_number: String,
    pub cached: Decimal,
    pub replayed: Decimal,
}

#[derive(Debug, Clone, Copy)]
pub struct LedgerProjector<'a> {
    entries: &'a [JournalEntry],
    chart: &'a ChartSnapshot,
}

impl<'a> LedgerProjector<'a> {
    pub fn new(entries: &'a [JournalEntry], chart: &'a ChartSnapshot) -> Self {
        Self { entries, chart }
    }

    fn posted(&self) -> impl Iterator<Item = &'a JournalEntry> {
        self.entries
            .iter()
            .filter(|e| e.is_live() && e.status() == EntryStatus::Posted)
    }

    /// Balances per account from posted entries dated on or before `as_of`.
    ///
    /// A date cut can select a subset of postings whose sum leaves the
    /// representable range even though every cached balance fits.
    pub fn replay_balances(
        &self,
        as_of: Option<NaiveDate>,
    ) -> Result<BTreeMap<AccountId, Decimal>, LedgerError> {
        let mut balances = BTreeMap::new();
        for entry in self.posted() {
            if as_of.is_some_and(|d| entry.date() > d) {
                continue;
            }
            for delta in entry.posting_deltas() {
                let balance = balances.entry(delta.account_id).or_insert(Decimal::ZERO);
                *balance = add_to_balance(*balance, delta.amount, delta.account_id)?;
            }
        }
        Ok(balances)
    }

    pub fn trial_balance(
        &self,
        as_of: NaiveDate,
        options: TrialBalanceOptions,
    ) -> Result<TrialBalance, LedgerError> {
        let balances = self.replay_balances(Some(as_of))?;

        let mut rows = Vec::new();
        for account in self.chart.sorted_by_number() {
            let net = balances
                .get(&account.id_typed())
                .copied()
                .unwrap_or(Decimal::ZERO);
            // A balance never disappears from the report, even on an inactive account.
            if net.is_zero() && !(options.include_zero && account.is_active()) {
                continue;
            }
            let (debit_balance, credit_balance) = classify(account.normal_balance(), net);
            rows.push(TrialBalanceRow {
                account_id: account.id_typed(),
                account_number: account.account_number().to_string(),
                name: account.name().to_string(),
                account_type: account.account_type(),
                normal_balance: account.normal_balance(),
                net_balance: net,
                debit_balance,
                credit_balance,
            });
        }

        let total_debit =
            column_total(rows.iter().map(|r| r.debit_balance), "trial balance debit total")?;
        let total_credit =
            column_total(rows.iter().map(|r| r.credit_balance), "trial balance credit total")?;
        Ok(TrialBalance {
            as_of,
            rows,
            total_debit,
            total_credit,
        })
    }

    /// Chronological lines of one account, ordered by (date, entry number, line
    /// number), with a running balance seeded from everything before `range.start`.
    pub fn account_ledger(
        &self,
        account_id: AccountId,
        range: DateRange,
    ) -> Result<AccountLedger, LedgerError> {
        let account = self
            .chart
            .get(&account_id)
            .ok_or(LedgerError::UnknownAccount { account_id })?;
        let normal = account.normal_balance();

        let mut lines = self
            .posted()
            .flat_map(|entry| {
                entry
                    .lines()
                    .iter()
                    .filter(move |l| l.account_id == account_id)
                    .map(move |l| (entry, l))
            })
            .collect::<Vec<_>>();
        lines.sort_by_key(|(entry, line)| (entry.date(), entry.entry_number(), line.line_number));

        let mut opening_balance = Decimal::ZERO;
        let mut running = Decimal::ZERO;
        let mut rows = Vec::new();
        for (entry, line) in lines {
            let delta = line
                .side()
                .map(|(side, amount)| signed_delta(normal, side, amount))
                .unwrap_or(Decimal::ZERO);

            if range.is_before(entry.date()) {
                opening_balance = add_to_balance(opening_balance, delta, account_id)?;
                running = opening_balance;
                continue;
            }
            if !range.contains(entry.date()) {
                continue;
            }

            running = add_to_balance(running, delta, account_id)?;
            rows.push(LedgerRow {
                entry_id: entry.id_typed(),
                entry_number: entry.entry_number(),
                date: entry.date(),
                reference: entry.reference().to_string(),
                description: if line.description.is_empty() {
                    entry.description().to_string()
                } else {
                    line.description.clone()
                },
                line_number: line.line_number,
                debit: line.debit_amount,
                credit: line.credit_amount,
                cost_center: line.cost_center.clone(),
                project: line.project.clone(),
                department: line.department.clone(),
                running_balance: running,
            });
        }

        Ok(AccountLedger {
            account: account.clone(),
            range,
            opening_balance,
            closing_balance: rows
                .last()
                .map(|r| r.running_balance)
                .unwrap_or(opening_balance),
            rows,
        })
    }

    /// Accounts whose cached balance differs from the full replay.
    pub fn reconcile(&self) -> Result<Vec<BalanceDrift>, LedgerError> {
        let replayed = self.replay_balances(None)?;
        Ok(self
            .chart
            .sorted_by_number()
            .into_iter()
            .filter_map(|account| {
                let expected = replayed
                    .get(&account.id_typed())
                    .copied()
                    .unwrap_or(Decimal::ZERO);
                (expected != account.current_balance()).then(|| BalanceDrift {
                    account_id: account.id_typed(),
                    account_number: account.account_number().to_string(),
                    cached: account.current_balance(),
                    replayed: expected,
                })
            })
            .collect())
    }
}

fn add_to_balance(
    balance: Decimal,
    delta: Decimal,
    account_id: AccountId,
) -> Result<Decimal, LedgerError> {
    balance
        .checked_add(delta)
        .ok_or(LedgerError::BalanceOutOfRange { account_id })
}

fn column_total(
    mut amounts: impl Iterator<Item = Decimal>,
    total: &'static str,
) -> Result<Decimal, LedgerError> {
    amounts.try_fold(Decimal::ZERO, |sum, amount| {
        sum.checked_add(amount)
            .ok_or(LedgerError::TotalOutOfRange { total })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountSpec;
    use crate::entry::{DraftEntry, DraftLine, JournalCommand};
    use crate::period::AccountingPeriods;
    use crate::posting::PostingEngine;
    use crate::registry::AccountRegistry;
    use chrono::{DateTime, Utc};
    use forgeledger_core::Aggregate;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, d).unwrap()
    }

    struct Books {
        registry: AccountRegistry,
        entries: Vec<JournalEntry>,
    }

    impl Books {
        fn new() -> Self {
            Self {
                registry: AccountRegistry::new(),
                entries: Vec::new(),
            }
        }

        fn account(&self, number: &str, name: &str, kind: AccountType) -> AccountId {
            self.registry
                .create_account(AccountSpec::new(number, name, kind), test_time())
                .unwrap()
                .id_typed()
        }

        fn run(&self, entry: &mut JournalEntry, cmd: JournalCommand) {
            for event in entry.handle(&cmd).unwrap() {
                PostingEngine::commit(&self.registry, &event).unwrap();
                entry.apply(&event);
            }
        }

        /// Submit and post; returns the index in `entries`.
        fn post(&mut self, draft: DraftEntry) -> usize {
            let number = EntryNumber::new(self.entries.len() as u64 + 1);
            let submit =
                PostingEngine::plan_submission(draft, &self.registry.snapshot(), || number, test_time())
                    .unwrap();
            let mut entry = JournalEntry::empty(submit.entry_id);
            self.run(&mut entry, JournalCommand::SubmitDraft(submit));

            let post = PostingEngine::plan_posting(
                &entry,
                &self.registry.snapshot(),
                &AccountingPeriods::all_open(),
                "tester",
                test_time(),
            )
            .unwrap();
            self.run(&mut entry, JournalCommand::PostEntry(post));
            self.entries.push(entry);
            self.entries.len() - 1
        }

        fn reverse(&mut self, index: usize) {
            let mut entry = self.entries[index].clone();
            let cmd = PostingEngine::plan_reversal(
                &entry,
                &self.registry.snapshot(),
                "tester",
                "posted in error",
                test_time(),
            )
            .unwrap();
            self.run(&mut entry, JournalCommand::ReverseEntry(cmd));
            self.entries[index] = entry;
        }

        fn with_projector<T>(&self, f: impl FnOnce(LedgerProjector<'_>) -> T) -> T {
            let chart = self.registry.snapshot();
            f(LedgerProjector::new(&self.entries, &chart))
        }
    }

    fn transfer(date: NaiveDate, debit: AccountId, credit: AccountId, amount: Decimal) -> DraftEntry {
        DraftEntry::new(date, "transfer")
            .line(DraftLine::debit(debit, amount))
            .line(DraftLine::credit(credit, amount))
    }

    #[test]
    fn classify_flips_polarity_for_wrong_side_balances() {
        assert_eq!(classify(Side::Debit, dec!(10)), (dec!(10), Decimal::ZERO));
        assert_eq!(classify(Side::Debit, dec!(-10)), (Decimal::ZERO, dec!(10)));
        assert_eq!(classify(Side::Credit, dec!(10)), (Decimal::ZERO, dec!(10)));
        assert_eq!(classify(Side::Credit, dec!(-10)), (dec!(10), Decimal::ZERO));
    }

    #[test]
    fn cash_sale_trial_balance() {
        let mut books = Books::new();
        let cash = books.account("1000", "Cash", AccountType::Asset);
        let revenue = books.account("4000", "Revenue", AccountType::Revenue);
        books.post(transfer(day(1), cash, revenue, dec!(1000)));

        let tb = books.with_projector(|p| p.trial_balance(day(1), TrialBalanceOptions::default()).unwrap());

        assert_eq!(tb.rows.len(), 2);
        assert_eq!(tb.rows[0].account_number, "1000");
        assert_eq!(tb.rows[0].debit_balance, dec!(1000));
        assert_eq!(tb.rows[0].credit_balance, Decimal::ZERO);
        assert_eq!(tb.rows[1].account_number, "4000");
        assert_eq!(tb.rows[1].credit_balance, dec!(1000));
        assert_eq!(tb.total_debit, dec!(1000));
        assert!(tb.is_balanced());
    }

    #[test]
    fn reversed_entries_drop_out_of_the_trial_balance() {
        let mut books = Books::new();
        let cash = books.account("1000", "Cash", AccountType::Asset);
        let revenue = books.account("4000", "Revenue", AccountType::Revenue);
        let idx = books.post(transfer(day(1), cash, revenue, dec!(1000)));
        books.reverse(idx);

        let tb = books.with_projector(|p| p.trial_balance(day(28), TrialBalanceOptions::default()).unwrap());
        assert!(tb.rows.is_empty());

        let with_zero = books.with_projector(|p| {
            p.trial_balance(day(28), TrialBalanceOptions { include_zero: true }).unwrap()
        });
        assert_eq!(with_zero.rows.len(), 2);
        assert!(with_zero.is_balanced());
    }

    #[test]
    fn as_of_excludes_later_entries() {
        let mut books = Books::new();
        let cash = books.account("1000", "Cash", AccountType::Asset);
        let equity = books.account("3000", "Capital", AccountType::Equity);
        books.post(transfer(day(1), cash, equity, dec!(500)));
        books.post(transfer(day(10), cash, equity, dec!(250)));

        let tb = books.with_projector(|p| p.trial_balance(day(5), TrialBalanceOptions::default()).unwrap());
        assert_eq!(tb.total_debit, dec!(500));
    }

    #[test]
    fn contra_balance_reports_on_opposite_column() {
        let mut books = Books::new();
        let cash = books.account("1000", "Cash", AccountType::Asset);
        let payable = books.account("2000", "Payables", AccountType::Liability);
        // Overdrawn cash: a debit-normal account going net credit.
        books.post(transfer(day(3), payable, cash, dec!(75)));

        let tb = books.with_projector(|p| p.trial_balance(day(3), TrialBalanceOptions::default()).unwrap());
        let cash_row = tb.rows.iter().find(|r| r.account_id == cash).unwrap();
        assert_eq!(cash_row.net_balance, dec!(-75));
        assert_eq!(cash_row.debit_balance, Decimal::ZERO);
        assert_eq!(cash_row.credit_balance, dec!(75));
        let payable_row = tb.rows.iter().find(|r| r.account_id == payable).unwrap();
        assert_eq!(payable_row.debit_balance, dec!(75));
        assert!(tb.is_balanced());
    }

    #[test]
    fn account_ledger_runs_from_opening_balance() {
        let mut books = Books::new();
        let cash = books.account("1000", "Cash", AccountType::Asset);
        let revenue = books.account("4000", "Revenue", AccountType::Revenue);
        let rent = books.account("6000", "Rent", AccountType::Expense);
        books.post(transfer(day(1), cash, revenue, dec!(1000)));
        books.post(transfer(day(5), rent, cash, dec!(300)));
        books.post(transfer(day(5), cash, revenue, dec!(50)));
        books.post(transfer(day(20), cash, revenue, dec!(10)));

        let range = DateRange::new(Some(day(2)), Some(day(10))).unwrap();
        let ledger = books.with_projector(|p| p.account_ledger(cash, range)).unwrap();

        assert_eq!(ledger.opening_balance, dec!(1000));
        let running = ledger
            .rows
            .iter()
            .map(|r| r.running_balance)
            .collect::<Vec<_>>();
        assert_eq!(running, vec![dec!(700), dec!(750)]);
        assert_eq!(ledger.rows[0].entry_number, EntryNumber::new(2));
        assert_eq!(ledger.rows[0].credit, dec!(300));
        assert_eq!(ledger.closing_balance, dec!(750));
    }

    #[test]
    fn ledger_rows_carry_line_tags() {
        let mut books = Books::new();
        let cash = books.account("1000", "Cash", AccountType::Asset);
        let travel = books.account("6100", "Travel", AccountType::Expense);
        books.post(
            DraftEntry::new(day(4), "Conference trip")
                .line(
                    DraftLine::debit(travel, dec!(420))
                        .with_cost_center("CC-200")
                        .with_project("PRJ-ATLAS")
                        .with_department("Sales"),
                )
                .line(DraftLine::credit(cash, dec!(420))),
        );

        let ledger = books
            .with_projector(|p| p.account_ledger(travel, DateRange::all()))
            .unwrap();
        let row = &ledger.rows[0];
        assert_eq!(row.cost_center.as_deref(), Some("CC-200"));
        assert_eq!(row.project.as_deref(), Some("PRJ-ATLAS"));
        assert_eq!(row.department.as_deref(), Some("Sales"));

        let cash_ledger = books
            .with_projector(|p| p.account_ledger(cash, DateRange::all()))
            .unwrap();
        assert_eq!(cash_ledger.rows[0].project, None);
    }

    #[test]
    fn account_ledger_errors() {
        let books = Books::new();
        let ghost = AccountId::new();
        assert_eq!(
            books
                .with_projector(|p| p.account_ledger(ghost, DateRange::all()))
                .unwrap_err(),
            LedgerError::UnknownAccount { account_id: ghost }
        );
        assert!(matches!(
            DateRange::new(Some(day(9)), Some(day(1))),
            Err(LedgerError::InvalidDateRange { .. })
        ));
    }

    #[test]
    fn projections_are_repeatable_and_match_the_cache() {
        let mut books = Books::new();
        let cash = books.account("1000", "Cash", AccountType::Asset);
        let revenue = books.account("4000", "Revenue", AccountType::Revenue);
        books.post(transfer(day(1), cash, revenue, dec!(12.34)));
        let idx = books.post(transfer(day(2), cash, revenue, dec!(5)));
        books.reverse(idx);

        let first = books.with_projector(|p| {
            (
                p.trial_balance(day(28), TrialBalanceOptions::default()).unwrap(),
                p.account_ledger(cash, DateRange::all()).unwrap(),
            )
        });
        let second = books.with_projector(|p| {
            (
                p.trial_balance(day(28), TrialBalanceOptions::default()).unwrap(),
                p.account_ledger(cash, DateRange::all()).unwrap(),
            )
        });

        assert_eq!(first, second);
        assert!(books.with_projector(|p| p.reconcile().unwrap()).is_empty());
    }

    #[test]
    fn reconcile_reports_cache_drift() {
        let mut books = Books::new();
        let cash = books.account("1000", "Cash", AccountType::Asset);
        let revenue = books.account("4000", "Revenue", AccountType::Revenue);
        books.post(transfer(day(1), cash, revenue, dec!(20)));

        // Forget the log: the cache now disagrees with an empty replay.
        books.entries.clear();
        let drift = books.with_projector(|p| p.reconcile().unwrap());

        assert_eq!(drift.len(), 2);
        assert_eq!(drift[0].account_number, "1000");
        assert_eq!(drift[0].cached, dec!(20));
        assert_eq!(drift[0].replayed, Decimal::ZERO);
    }

    #[test]
    fn date_cut_replay_past_the_decimal_range_is_an_error() {
        let mut books = Books::new();
        let cash = books.account("1000", "Cash", AccountType::Asset);
        let equity = books.account("3000", "Capital", AccountType::Equity);
        // Every posting keeps the running balance in range...
        books.post(transfer(day(1), cash, equity, Decimal::MAX));
        books.post(transfer(day(20), equity, cash, Decimal::MAX));
        books.post(transfer(day(1), cash, equity, Decimal::MAX));

        // ...but the day-5 cut keeps only the two day-1 postings.
        let err = books
            .with_projector(|p| p.trial_balance(day(5), TrialBalanceOptions::default()))
            .unwrap_err();
        assert_eq!(err, LedgerError::BalanceOutOfRange { account_id: cash });

        let range = DateRange::new(None, Some(day(5))).unwrap();
        assert_eq!(
            books.with_projector(|p| p.account_ledger(cash, range)).unwrap_err(),
            LedgerError::BalanceOutOfRange { account_id: cash }
        );
        assert!(books.with_projector(|p| p.reconcile()).unwrap().is_empty());
    }

    #[test]
    fn trial_balance_column_past_the_decimal_range_is_an_error() {
        let mut books = Books::new();
        let cash = books.account("1000", "Cash", AccountType::Asset);
        let bank = books.account("1100", "Bank", AccountType::Asset);
        let capital = books.account("3000", "Capital", AccountType::Equity);
        let reserves = books.account("3100", "Reserves", AccountType::Equity);
        books.post(transfer(day(1), cash, capital, Decimal::MAX));
        books.post(transfer(day(1), bank, reserves, Decimal::MAX));

        assert_eq!(
            books
                .with_projector(|p| p.trial_balance(day(28), TrialBalanceOptions::default()))
                .unwrap_err(),
            LedgerError::TotalOutOfRange {
                total: "trial balance debit total"
            }
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            ..ProptestConfig::default()
        })]

        /// Property: for any sequence of balanced postings across every account
        /// type, trial-balance debits equal credits and the cache matches the replay.
        #[test]
        fn trial_balance_always_reconciles(
            postings in prop::collection::vec(
                (0usize..5, 0usize..5, 1i64..10_000_000i64, 1u32..28),
                1..25,
            )
        ) {
            let mut books = Books::new();
            let accounts = [
                books.account("1000", "Cash", AccountType::Asset),
                books.account("2000", "Payables", AccountType::Liability),
                books.account("3000", "Capital", AccountType::Equity),
                books.account("4000", "Sales", AccountType::Revenue),
                books.account("5000", "Supplies", AccountType::Expense),
            ];

            for (debit, credit, cents, d) in postings {
                let amount = Decimal::new(cents, 2);
                books.post(transfer(day(d), accounts[debit], accounts[credit], amount));
            }

            let tb = books.with_projector(|p| p.trial_balance(day(28), TrialBalanceOptions::default()).unwrap());
            prop_assert_eq!(tb.total_debit, tb.total_credit);
            prop_assert!(tb.rows.iter().all(|r| !r.debit_balance.is_sign_negative() && !r.credit_balance.is_sign_negative()));
            prop_assert!(books.with_projector(|p| p.reconcile().unwrap()).is_empty());
        }
    }
}
