//! Journal Entry Validator.
//!
//! Pure checks over a candidate entry. Nothing here mutates state, so every
//! function can run while an entry is still a draft (live feedback) as well as
//! right before posting.
//!
//! Checks run in a fixed order and `validate` reports the first failure:
//! 1. at least two lines
//! 2. every line targets an existing, active account
//! 3. every line has exactly one strictly positive side
//! 4. debits equal credits (exact decimal equality)
//! 5. the entry date is in an open period

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::account::Side;
use crate::entry::{JournalEntry, LineItem};
use crate::error::{AccountRefProblem, ValidationError};
use crate::period::AccountingPeriods;
use crate::registry::ChartSnapshot;

pub const MIN_LINES: usize = 2;

/// Sum of debit and credit amounts, refusing sums past `Decimal::MAX`.
pub fn totals(lines: &[LineItem]) -> Result<(Decimal, Decimal), ValidationError> {
    lines
        .iter()
        .try_fold((Decimal::ZERO, Decimal::ZERO), |(d, c), l| {
            let d = d
                .checked_add(l.debit_amount)
                .ok_or(ValidationError::AmountOutOfRange { side: Side::Debit })?;
            let c = c
                .checked_add(l.credit_amount)
                .ok_or(ValidationError::AmountOutOfRange { side: Side::Credit })?;
            Ok((d, c))
        })
}

fn check_line_count(lines: &[LineItem]) -> Result<(), ValidationError> {
    if lines.len() < MIN_LINES {
        return Err(ValidationError::InsufficientLines { found: lines.len() });
    }
    Ok(())
}

fn check_account(line: &LineItem, accounts: &ChartSnapshot) -> Result<(), ValidationError> {
    let reason = match accounts.get(&line.account_id) {
        None => AccountRefProblem::Unknown,
        Some(account) if !account.is_active() => AccountRefProblem::Inactive,
        Some(_) => return Ok(()),
    };
    Err(ValidationError::InvalidAccountReference {
        line_number: line.line_number,
        account_id: line.account_id,
        reason,
    })
}

fn check_sides(line: &LineItem) -> Result<(), ValidationError> {
    match line.side() {
        Some(_) => Ok(()),
        None => Err(ValidationError::MalformedLine {
            line_number: line.line_number,
            debit: line.debit_amount,
            credit: line.credit_amount,
        }),
    }
}

fn check_balance(lines: &[LineItem]) -> Result<(), ValidationError> {
    let (total_debit, total_credit) = totals(lines)?;
    // Both totals are non-negative, so the difference always fits.
    if total_debit != total_credit {
        return Err(ValidationError::Unbalanced {
            total_debit,
            total_credit,
            difference: total_debit - total_credit,
        });
    }
    Ok(())
}

/// Full validation, first failure wins.
pub fn validate(
    date: NaiveDate,
    lines: &[LineItem],
    accounts: &ChartSnapshot,
    periods: &AccountingPeriods,
) -> Result<(), ValidationError> {
    check_line_count(lines)?;
    for line in lines {
        check_account(line, accounts)?;
    }
    for line in lines {
        check_sides(line)?;
    }
    check_balance(lines)?;
    periods.check(date)
}

/// Every problem with the candidate, in check order.
pub fn validate_all(
    date: NaiveDate,
    lines: &[LineItem],
    accounts: &ChartSnapshot,
    periods: &AccountingPeriods,
) -> Vec<ValidationError> {
    let mut problems = Vec::new();
    problems.extend(check_line_count(lines).err());
    problems.extend(lines.iter().filter_map(|l| check_account(l, accounts).err()));
    problems.extend(lines.iter().filter_map(|l| check_sides(l).err()));
    problems.extend(check_balance(lines).err());
    problems.extend(periods.check(date).err());
    problems
}

/// Per-line problems only (account reference and side shape).
///
/// Used on submission and revision: a draft may still be short of lines or out
/// of balance, but it may not point at a bad account or carry a nonsense line.
pub fn check_draft_lines(lines: &[LineItem], accounts: &ChartSnapshot) -> Vec<ValidationError> {
    let mut problems = Vec::new();
    for line in lines {
        problems.extend(check_account(line, accounts).err());
        problems.extend(check_sides(line).err());
    }
    problems
}

/// Account-independent invariants: line count, side shape, balance.
pub fn check_shape(lines: &[LineItem]) -> Result<(), ValidationError> {
    check_line_count(lines)?;
    for line in lines {
        check_sides(line)?;
    }
    check_balance(lines)
}

/// Live feedback for a stored entry.
pub fn validate_entry(
    entry: &JournalEntry,
    accounts: &ChartSnapshot,
    periods: &AccountingPeriods,
) -> Vec<ValidationError> {
    validate_all(entry.date(), entry.lines(), accounts, periods)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{Account, AccountSpec, AccountType};
    use crate::entry::DraftLine;
    use chrono::Utc;
    use forgeledger_core::AccountId;
    use rust_decimal_macros::dec;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
    }

    fn chart() -> (ChartSnapshot, AccountId, AccountId, AccountId) {
        let cash = Account::open(
            AccountId::new(),
            AccountSpec::new("1000", "Cash", AccountType::Asset),
            0,
            Utc::now(),
        );
        let revenue = Account::open(
            AccountId::new(),
            AccountSpec::new("4000", "Revenue", AccountType::Revenue),
            0,
            Utc::now(),
        );
        let mut retired = Account::open(
            AccountId::new(),
            AccountSpec::new("1900", "Old clearing", AccountType::Asset),
            0,
            Utc::now(),
        );
        retired.deactivate();

        let ids = (cash.id_typed(), revenue.id_typed(), retired.id_typed());
        (
            ChartSnapshot::from_accounts([cash, revenue, retired]),
            ids.0,
            ids.1,
            ids.2,
        )
    }

    fn line(n: u32, draft: DraftLine) -> LineItem {
        draft.into_line(n)
    }

    #[test]
    fn balanced_entry_passes() {
        let (chart, cash, revenue, _) = chart();
        let lines = vec![
            line(1, DraftLine::debit(cash, dec!(1000))),
            line(2, DraftLine::credit(revenue, dec!(1000.00))),
        ];
        assert_eq!(
            validate(date(), &lines, &chart, &AccountingPeriods::all_open()),
            Ok(())
        );
    }

    #[test]
    fn single_line_is_insufficient() {
        let (chart, cash, _, _) = chart();
        let lines = vec![line(1, DraftLine::debit(cash, dec!(10)))];
        assert_eq!(
            validate(date(), &lines, &chart, &AccountingPeriods::all_open()),
            Err(ValidationError::InsufficientLines { found: 1 })
        );
    }

    #[test]
    fn unbalanced_reports_signed_difference() {
        let (chart, cash, revenue, _) = chart();
        let lines = vec![
            line(1, DraftLine::debit(cash, dec!(100))),
            line(2, DraftLine::credit(revenue, dec!(99))),
        ];
        assert_eq!(
            validate(date(), &lines, &chart, &AccountingPeriods::all_open()),
            Err(ValidationError::Unbalanced {
                total_debit: dec!(100),
                total_credit: dec!(99),
                difference: dec!(1),
            })
        );
    }

    #[test]
    fn account_check_precedes_shape_check() {
        let (chart, cash, _, retired) = chart();
        let mut both_sides = DraftLine::debit(cash, dec!(5));
        both_sides.credit_amount = dec!(5);
        let lines = vec![
            line(1, both_sides),
            line(2, DraftLine::credit(retired, dec!(5))),
        ];

        assert_eq!(
            validate(date(), &lines, &chart, &AccountingPeriods::all_open()),
            Err(ValidationError::InvalidAccountReference {
                line_number: 2,
                account_id: retired,
                reason: AccountRefProblem::Inactive,
            })
        );
    }

    #[test]
    fn zero_and_negative_lines_are_malformed() {
        let (chart, cash, revenue, _) = chart();
        for bad in [
            DraftLine::debit(cash, Decimal::ZERO),
            DraftLine::debit(cash, dec!(-3)),
        ] {
            let lines = vec![line(1, bad), line(2, DraftLine::credit(revenue, dec!(3)))];
            let err = validate(date(), &lines, &chart, &AccountingPeriods::all_open()).unwrap_err();
            assert_eq!(err.code(), "malformed_line");
        }
    }

    #[test]
    fn closed_period_is_last_check() {
        let (chart, cash, revenue, _) = chart();
        let lines = vec![
            line(1, DraftLine::debit(cash, dec!(1))),
            line(2, DraftLine::credit(revenue, dec!(1))),
        ];
        let periods = AccountingPeriods::closed_through(date());
        assert_eq!(
            validate(date(), &lines, &chart, &periods),
            Err(ValidationError::PeriodClosed {
                date: date(),
                closed_through: date(),
            })
        );
    }

    #[test]
    fn validate_all_collects_every_problem() {
        let (chart, _, revenue, _) = chart();
        let ghost = AccountId::new();
        let lines = vec![
            line(1, DraftLine::debit(ghost, dec!(100))),
            line(2, DraftLine::credit(revenue, dec!(99))),
        ];

        let codes = validate_all(date(), &lines, &chart, &AccountingPeriods::closed_through(date()))
            .iter()
            .map(ValidationError::code)
            .collect::<Vec<_>>();
        assert_eq!(
            codes,
            vec!["invalid_account_reference", "unbalanced", "period_closed"]
        );
    }

    #[test]
    fn draft_line_check_ignores_balance_and_count() {
        let (chart, cash, _, _) = chart();
        let lines = vec![line(1, DraftLine::debit(cash, dec!(100)))];
        assert!(check_draft_lines(&lines, &chart).is_empty());
        assert!(check_shape(&lines).is_err());
    }

    #[test]
    fn oversized_line_totals_are_rejected_not_summed() {
        let (chart, cash, revenue, _) = chart();
        let lines = vec![
            line(1, DraftLine::debit(cash, Decimal::MAX)),
            line(2, DraftLine::debit(cash, Decimal::MAX)),
            line(3, DraftLine::credit(revenue, dec!(1))),
        ];

        assert_eq!(
            validate(date(), &lines, &chart, &AccountingPeriods::all_open()),
            Err(ValidationError::AmountOutOfRange { side: Side::Debit })
        );
        assert_eq!(
            totals(&lines),
            Err(ValidationError::AmountOutOfRange { side: Side::Debit })
        );

        let codes = validate_all(date(), &lines, &chart, &AccountingPeriods::all_open())
            .iter()
            .map(ValidationError::code)
            .collect::<Vec<_>>();
        assert_eq!(codes, vec!["amount_out_of_range"]);
    }
}
