//! Posting Engine.
//!
//! Turns caller requests into journal commands (checking state and running the
//! validator first) and commits the balance effects of accepted events. The
//! engine is the only writer of account balances.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use forgeledger_core::EntryId;

use crate::account::{Account, Side};
use crate::entry::{
    number_lines, BalanceDelta, DraftEntry, DraftRevision, EntryNumber, EntryStatus, JournalEntry,
    JournalEvent, PostEntry, ReverseEntry, ReviseDraft, SubmitDraft,
};
use crate::error::LedgerError;
use crate::period::AccountingPeriods;
use crate::registry::{project_balances, AccountRegistry, ChartSnapshot};
use crate::validator;

/// Balance effect of one line on an account with the given normal balance:
/// `+amount` on the normal side, `-amount` on the other.
pub fn signed_delta(normal_balance: Side, side: Side, amount: Decimal) -> Decimal {
    if side == normal_balance {
        amount
    } else {
        -amount
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PostingEngine;

impl PostingEngine {
    /// Check a new draft's lines and build its `SubmitDraft` command.
    ///
    /// `next_number` is only called once the lines are accepted, so rejected
    /// submissions never consume an entry number.
    pub fn plan_submission(
        draft: DraftEntry,
        accounts: &ChartSnapshot,
        next_number: impl FnOnce() -> EntryNumber,
        at: DateTime<Utc>,
    ) -> Result<SubmitDraft, LedgerError> {
        let problems = validator::check_draft_lines(&number_lines(draft.lines.clone()), accounts);
        if !problems.is_empty() {
            return Err(LedgerError::Rejected(problems));
        }

        Ok(SubmitDraft {
            entry_id: EntryId::new(),
            entry_number: next_number(),
            draft,
            occurred_at: at,
        })
    }

    pub fn plan_revision(
        entry: &JournalEntry,
        revision: DraftRevision,
        accounts: &ChartSnapshot,
        at: DateTime<Utc>,
    ) -> Result<ReviseDraft, LedgerError> {
        Self::ensure_draft(entry)?;

        if let Some(lines) = &revision.lines {
            let problems = validator::check_draft_lines(&number_lines(lines.clone()), accounts);
            if !problems.is_empty() {
                return Err(LedgerError::Rejected(problems));
            }
        }

        Ok(ReviseDraft {
            entry_id: entry.id_typed(),
            revision,
            occurred_at: at,
        })
    }

    /// State check, then full validation, then delta computation.
    ///
    /// `accounts` must be taken while the entry's account locks are held: the
    /// resulting balances are range-checked against it before anything is
    /// appended to the journal.
    pub fn plan_posting(
        entry: &JournalEntry,
        accounts: &ChartSnapshot,
        periods: &AccountingPeriods,
        posted_by: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Result<PostEntry, LedgerError> {
        Self::ensure_draft(entry)?;
        validator::validate(entry.date(), entry.lines(), accounts, periods)?;

        let mut deltas = Vec::with_capacity(entry.lines().len());
        for line in entry.lines() {
            let account = accounts
                .get(&line.account_id)
                .ok_or(LedgerError::UnknownAccount {
                    account_id: line.account_id,
                })?;
            let (side, amount) = line.side().ok_or_else(|| {
                LedgerError::conflict(format!("line {} changed shape", line.line_number))
            })?;
            deltas.push(BalanceDelta {
                account_id: line.account_id,
                line_number: line.line_number,
                amount: signed_delta(account.normal_balance(), side, amount),
            });
        }
        Self::ensure_balances_fit(accounts, &deltas)?;

        Ok(PostEntry {
            entry_id: entry.id_typed(),
            posted_by: posted_by.into(),
            deltas,
            occurred_at: at,
        })
    }

    /// Reversal skips line validation: it undoes exactly what posting applied,
    /// even on accounts deactivated since. It still needs a reason, and the
    /// restored balances must fit.
    pub fn plan_reversal(
        entry: &JournalEntry,
        accounts: &ChartSnapshot,
        reversed_by: impl Into<String>,
        reason: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Result<ReverseEntry, LedgerError> {
        if !entry.is_live() {
            return Err(LedgerError::UnknownEntry {
                entry_id: entry.id_typed(),
            });
        }
        if entry.status() != EntryStatus::Posted {
            return Err(LedgerError::InvalidTransition {
                entry_id: entry.id_typed(),
                from: entry.status(),
                to: EntryStatus::Reversed,
            });
        }

        let reason = reason.into().trim().to_string();
        if reason.is_empty() {
            return Err(LedgerError::MissingReversalReason {
                entry_id: entry.id_typed(),
            });
        }

        let undo = entry
            .posting_deltas()
            .iter()
            .map(|d| d.negated())
            .collect::<Vec<_>>();
        Self::ensure_balances_fit(accounts, &undo)?;

        Ok(ReverseEntry {
            entry_id: entry.id_typed(),
            reversed_by: reversed_by.into(),
            reason,
            occurred_at: at,
        })
    }

    /// Apply the balance effect of an accepted event, all lines as one unit.
    pub fn commit(registry: &AccountRegistry, event: &JournalEvent) -> Result<(), LedgerError> {
        let deltas = event.deltas();
        if deltas.is_empty() {
            return Ok(());
        }
        registry.apply_deltas(deltas)
    }

    fn ensure_balances_fit(
        accounts: &ChartSnapshot,
        deltas: &[BalanceDelta],
    ) -> Result<(), LedgerError> {
        project_balances(deltas, |id| accounts.get(&id).map(Account::current_balance)).map(|_| ())
    }

    fn ensure_draft(entry: &JournalEntry) -> Result<(), LedgerError> {
        if !entry.is_live() {
            return Err(LedgerError::UnknownEntry {
                entry_id: entry.id_typed(),
            });
        }
        if entry.status() != EntryStatus::Draft {
            return Err(LedgerError::AlreadyFinalized {
                entry_id: entry.id_typed(),
                status: entry.status(),
            });
        }
        Ok(())
    }
}
