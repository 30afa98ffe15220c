//! Journal entry aggregate (draft -> posted -> reversed).
//!
//! Each entry is its own event stream. The aggregate decides which events a
//! command produces and evolves from them; it never touches account balances.
//! Balance effects travel inside `EntryPosted` / `EntryReversed` as explicit
//! deltas, which the posting engine commits to the registry.

use core::str::FromStr;
use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use forgeledger_core::{AccountId, Aggregate, AggregateRoot, DomainError, EntryId};
use forgeledger_events::Event;

use crate::account::Side;
use crate::error::{LedgerError, ValidationError};
use crate::validator;

/// Sequential human-facing entry number, shown as `JE-000042`.
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EntryNumber(u64);

impl EntryNumber {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl core::fmt::Display for EntryNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "JE-{:06}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Draft,
    Posted,
    Reversed,
}

impl core::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            EntryStatus::Draft => f.write_str("draft"),
            EntryStatus::Posted => f.write_str("posted"),
            EntryStatus::Reversed => f.write_str("reversed"),
        }
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    #[default]
    Manual,
    Automatic,
    Adjustment,
    Closing,
}

impl EntryType {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryType::Manual => "manual",
            EntryType::Automatic => "automatic",
            EntryType::Adjustment => "adjustment",
            EntryType::Closing => "closing",
        }
    }
}

impl core::fmt::Display for EntryType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            EntryType::Manual,
            EntryType::Automatic,
            EntryType::Adjustment,
            EntryType::Closing,
        ]
        .into_iter()
        .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
        .ok_or_else(|| {
            DomainError::validation("entry type must be one of: manual, automatic, adjustment, closing")
        })
    }
}

/// One debit-or-credit row of a journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// 1-based, unique within the entry.
    pub line_number: u32,
    pub account_id: AccountId,
    pub description: String,
    pub debit_amount: Decimal,
    pub credit_amount: Decimal,
    pub reference: Option<String>,
    pub cost_center: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
}

impl LineItem {
    /// The single strictly positive side of a well-formed line.
    pub fn side(&self) -> Option<(Side, Decimal)> {
        let debit = self.debit_amount;
        let credit = self.credit_amount;
        if debit > Decimal::ZERO && credit.is_zero() {
            Some((Side::Debit, debit))
        } else if credit > Decimal::ZERO && debit.is_zero() {
            Some((Side::Credit, credit))
        } else {
            None
        }
    }
}

/// Caller-supplied line; numbered on submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftLine {
    pub account_id: AccountId,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub debit_amount: Decimal,
    #[serde(default)]
    pub credit_amount: Decimal,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub cost_center: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
}

impl DraftLine {
    pub fn debit(account_id: AccountId, amount: Decimal) -> Self {
        Self {
            account_id,
            description: String::new(),
            debit_amount: amount,
            credit_amount: Decimal::ZERO,
            reference: None,
            cost_center: None,
            project: None,
            department: None,
        }
    }

    pub fn credit(account_id: AccountId, amount: Decimal) -> Self {
        Self {
            credit_amount: amount,
            debit_amount: Decimal::ZERO,
            ..Self::debit(account_id, Decimal::ZERO)
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_cost_center(mut self, cost_center: impl Into<String>) -> Self {
        self.cost_center = Some(cost_center.into());
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }

    pub fn into_line(self, line_number: u32) -> LineItem {
        LineItem {
            line_number,
            account_id: self.account_id,
            description: self.description,
            debit_amount: self.debit_amount,
            credit_amount: self.credit_amount,
            reference: self.reference,
            cost_center: self.cost_center,
            project: self.project,
            department: self.department,
        }
    }
}

/// Number draft lines 1..n in the order given.
pub fn number_lines(lines: Vec<DraftLine>) -> Vec<LineItem> {
    lines
        .into_iter()
        .zip(1u32..)
        .map(|(line, n)| line.into_line(n))
        .collect()
}

/// A new journal entry as submitted by a caller. Becomes a `draft`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftEntry {
    pub date: NaiveDate,
    #[serde(default)]
    pub reference: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub entry_type: EntryType,
    /// Originating subsystem ("sales", "payroll", "manual", ...).
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub lines: Vec<DraftLine>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_by: String,
}

impl DraftEntry {
    pub fn new(date: NaiveDate, description: impl Into<String>) -> Self {
        Self {
            date,
            reference: String::new(),
            description: description.into(),
            entry_type: EntryType::Manual,
            source: String::new(),
            lines: Vec::new(),
            notes: None,
            created_by: String::new(),
        }
    }

    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = reference.into();
        self
    }

    pub fn entry_type(mut self, entry_type: EntryType) -> Self {
        self.entry_type = entry_type;
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn line(mut self, line: DraftLine) -> Self {
        self.lines.push(line);
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn created_by(mut self, actor: impl Into<String>) -> Self {
        self.created_by = actor.into();
        self
    }
}

/// Partial edit of a draft. `None` keeps the current value; `clear_notes`
/// drops the notes when no replacement is given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftRevision {
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub lines: Option<Vec<DraftLine>>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub clear_notes: bool,
    #[serde(default)]
    pub revised_by: String,
}

/// Signed change applied to one account's balance for one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceDelta {
    pub account_id: AccountId,
    pub line_number: u32,
    /// In the account's normal-balance convention.
    pub amount: Decimal,
}

impl BalanceDelta {
    pub fn negated(self) -> Self {
        Self {
            amount: -self.amount,
            ..self
        }
    }
}

/// Aggregate root: JournalEntry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JournalEntry {
    id: EntryId,
    entry_number: EntryNumber,
    date: NaiveDate,
    reference: String,
    description: String,
    entry_type: EntryType,
    source: String,
    status: EntryStatus,
    lines: Vec<LineItem>,
    notes: Option<String>,
    created_by: String,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    posted_by: Option<String>,
    posted_at: Option<DateTime<Utc>>,
    reversed_by: Option<String>,
    reversed_at: Option<DateTime<Utc>>,
    reversal_reason: Option<String>,
    #[serde(skip)]
    posting_deltas: Vec<BalanceDelta>,
    #[serde(skip)]
    discarded: bool,
    #[serde(skip)]
    created: bool,
    version: u64,
}

impl JournalEntry {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: EntryId) -> Self {
        Self {
            id,
            entry_number: EntryNumber::default(),
            date: NaiveDate::default(),
            reference: String::new(),
            description: String::new(),
            entry_type: EntryType::Manual,
            source: String::new(),
            status: EntryStatus::Draft,
            lines: Vec::new(),
            notes: None,
            created_by: String::new(),
            created_at: None,
            updated_at: None,
            posted_by: None,
            posted_at: None,
            reversed_by: None,
            reversed_at: None,
            reversal_reason: None,
            posting_deltas: Vec::new(),
            discarded: false,
            created: false,
            version: 0,
        }
    }

    /// Rebuild an entry from its full event stream.
    pub fn replay<'a>(id: EntryId, events: impl IntoIterator<Item = &'a JournalEvent>) -> Self {
        let mut entry = Self::empty(id);
        for event in events {
            entry.apply(event);
        }
        entry
    }

    pub fn id_typed(&self) -> EntryId {
        self.id
    }

    pub fn entry_number(&self) -> EntryNumber {
        self.entry_number
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn entry_type(&self) -> EntryType {
        self.entry_type
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn status(&self) -> EntryStatus {
        self.status
    }

    pub fn lines(&self) -> &[LineItem] {
        &self.lines
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn created_by(&self) -> &str {
        &self.created_by
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn posted_by(&self) -> Option<&str> {
        self.posted_by.as_deref()
    }

    pub fn posted_at(&self) -> Option<DateTime<Utc>> {
        self.posted_at
    }

    pub fn reversed_by(&self) -> Option<&str> {
        self.reversed_by.as_deref()
    }

    pub fn reversed_at(&self) -> Option<DateTime<Utc>> {
        self.reversed_at
    }

    pub fn reversal_reason(&self) -> Option<&str> {
        self.reversal_reason.as_deref()
    }

    /// Deltas applied when the entry was posted (empty before posting).
    pub fn posting_deltas(&self) -> &[BalanceDelta] {
        &self.posting_deltas
    }

    /// Submitted and not discarded.
    pub fn is_live(&self) -> bool {
        self.created && !self.discarded
    }

    /// (debit, credit) totals. A draft's lines may add up past the
    /// representable range; posted entries never do.
    pub fn totals(&self) -> Result<(Decimal, Decimal), ValidationError> {
        validator::totals(&self.lines)
    }

    /// Distinct accounts touched by the entry, sorted.
    pub fn account_ids(&self) -> Vec<AccountId> {
        self.lines
            .iter()
            .map(|l| l.account_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn ensure_live(&self) -> Result<(), LedgerError> {
        if self.is_live() {
            Ok(())
        } else {
            Err(LedgerError::UnknownEntry { entry_id: self.id })
        }
    }

    fn ensure_draft(&self) -> Result<(), LedgerError> {
        self.ensure_live()?;
        if self.status != EntryStatus::Draft {
            return Err(LedgerError::AlreadyFinalized {
                entry_id: self.id,
                status: self.status,
            });
        }
        Ok(())
    }
}

impl AggregateRoot for JournalEntry {
    type Id = EntryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: SubmitDraft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitDraft {
    pub entry_id: EntryId,
    pub entry_number: EntryNumber,
    pub draft: DraftEntry,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReviseDraft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviseDraft {
    pub entry_id: EntryId,
    pub revision: DraftRevision,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DiscardDraft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscardDraft {
    pub entry_id: EntryId,
    pub discarded_by: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: PostEntry. Deltas are computed by the posting engine against
/// the chart the entry was validated with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostEntry {
    pub entry_id: EntryId,
    pub posted_by: String,
    pub deltas: Vec<BalanceDelta>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReverseEntry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReverseEntry {
    pub entry_id: EntryId,
    pub reversed_by: String,
    /// Audit justification; never blank.
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalCommand {
    SubmitDraft(SubmitDraft),
    ReviseDraft(ReviseDraft),
    DiscardDraft(DiscardDraft),
    PostEntry(PostEntry),
    ReverseEntry(ReverseEntry),
}

/// Event: DraftSubmitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftSubmitted {
    pub entry_id: EntryId,
    pub entry_number: EntryNumber,
    pub date: NaiveDate,
    pub reference: String,
    pub description: String,
    pub entry_type: EntryType,
    pub source: String,
    pub lines: Vec<LineItem>,
    pub notes: Option<String>,
    pub created_by: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DraftRevised. Carries the complete revised content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftRevised {
    pub entry_id: EntryId,
    pub date: NaiveDate,
    pub reference: String,
    pub description: String,
    pub lines: Vec<LineItem>,
    pub notes: Option<String>,
    pub revised_by: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DraftDiscarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftDiscarded {
    pub entry_id: EntryId,
    pub discarded_by: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: EntryPosted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPosted {
    pub entry_id: EntryId,
    pub posted_by: String,
    pub deltas: Vec<BalanceDelta>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: EntryReversed. `deltas` are the posting deltas negated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryReversed {
    pub entry_id: EntryId,
    pub reversed_by: String,
    pub reason: String,
    pub deltas: Vec<BalanceDelta>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalEvent {
    DraftSubmitted(DraftSubmitted),
    DraftRevised(DraftRevised),
    DraftDiscarded(DraftDiscarded),
    EntryPosted(EntryPosted),
    EntryReversed(EntryReversed),
}

impl JournalEvent {
    pub fn entry_id(&self) -> EntryId {
        match self {
            JournalEvent::DraftSubmitted(e) => e.entry_id,
            JournalEvent::DraftRevised(e) => e.entry_id,
            JournalEvent::DraftDiscarded(e) => e.entry_id,
            JournalEvent::EntryPosted(e) => e.entry_id,
            JournalEvent::EntryReversed(e) => e.entry_id,
        }
    }

    /// Balance changes carried by the event (empty for draft events).
    pub fn deltas(&self) -> &[BalanceDelta] {
        match self {
            JournalEvent::EntryPosted(e) => &e.deltas,
            JournalEvent::EntryReversed(e) => &e.deltas,
            _ => &[],
        }
    }
}

impl Event for JournalEvent {
    fn event_type(&self) -> &'static str {
        match self {
            JournalEvent::DraftSubmitted(_) => "ledger.journal_entry.draft_submitted",
            JournalEvent::DraftRevised(_) => "ledger.journal_entry.draft_revised",
            JournalEvent::DraftDiscarded(_) => "ledger.journal_entry.draft_discarded",
            JournalEvent::EntryPosted(_) => "ledger.journal_entry.posted",
            JournalEvent::EntryReversed(_) => "ledger.journal_entry.reversed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            JournalEvent::DraftSubmitted(e) => e.occurred_at,
            JournalEvent::DraftRevised(e) => e.occurred_at,
            JournalEvent::DraftDiscarded(e) => e.occurred_at,
            JournalEvent::EntryPosted(e) => e.occurred_at,
            JournalEvent::EntryReversed(e) => e.occurred_at,
        }
    }
}

impl Aggregate for JournalEntry {
    type Command = JournalCommand;
    type Event = JournalEvent;
    type Error = LedgerError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            JournalEvent::DraftSubmitted(e) => {
                self.id = e.entry_id;
                self.entry_number = e.entry_number;
                self.date = e.date;
                self.reference = e.reference.clone();
                self.description = e.description.clone();
                self.entry_type = e.entry_type;
                self.source = e.source.clone();
                self.lines = e.lines.clone();
                self.notes = e.notes.clone();
                self.created_by = e.created_by.clone();
                self.created_at = Some(e.occurred_at);
                self.updated_at = Some(e.occurred_at);
                self.status = EntryStatus::Draft;
                self.created = true;
            }
            JournalEvent::DraftRevised(e) => {
                self.date = e.date;
                self.reference = e.reference.clone();
                self.description = e.description.clone();
                self.lines = e.lines.clone();
                self.notes = e.notes.clone();
                self.updated_at = Some(e.occurred_at);
            }
            JournalEvent::DraftDiscarded(e) => {
                self.discarded = true;
                self.updated_at = Some(e.occurred_at);
            }
            JournalEvent::EntryPosted(e) => {
                self.status = EntryStatus::Posted;
                self.posted_by = Some(e.posted_by.clone());
                self.posted_at = Some(e.occurred_at);
                self.posting_deltas = e.deltas.clone();
                self.updated_at = Some(e.occurred_at);
            }
            JournalEvent::EntryReversed(e) => {
                // Lines, totals and posting metadata stay as they were.
                self.status = EntryStatus::Reversed;
                self.reversed_by = Some(e.reversed_by.clone());
                self.reversed_at = Some(e.occurred_at);
                self.reversal_reason = Some(e.reason.clone());
                self.updated_at = Some(e.occurred_at);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            JournalCommand::SubmitDraft(cmd) => self.handle_submit(cmd),
            JournalCommand::ReviseDraft(cmd) => self.handle_revise(cmd),
            JournalCommand::DiscardDraft(cmd) => self.handle_discard(cmd),
            JournalCommand::PostEntry(cmd) => self.handle_post(cmd),
            JournalCommand::ReverseEntry(cmd) => self.handle_reverse(cmd),
        }
    }
}

impl JournalEntry {
    fn ensure_entry_id(&self, entry_id: EntryId) -> Result<(), LedgerError> {
        if self.id != entry_id {
            return Err(LedgerError::conflict(format!(
                "command for entry {entry_id} routed to entry {}",
                self.id
            )));
        }
        Ok(())
    }

    fn handle_submit(&self, cmd: &SubmitDraft) -> Result<Vec<JournalEvent>, LedgerError> {
        if self.created {
            return Err(LedgerError::conflict(format!(
                "journal entry {} already exists",
                cmd.entry_id
            )));
        }

        let draft = cmd.draft.clone();
        Ok(vec![JournalEvent::DraftSubmitted(DraftSubmitted {
            entry_id: cmd.entry_id,
            entry_number: cmd.entry_number,
            date: draft.date,
            reference: draft.reference,
            description: draft.description,
            entry_type: draft.entry_type,
            source: draft.source,
            lines: number_lines(draft.lines),
            notes: draft.notes,
            created_by: draft.created_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_revise(&self, cmd: &ReviseDraft) -> Result<Vec<JournalEvent>, LedgerError> {
        self.ensure_draft()?;
        self.ensure_entry_id(cmd.entry_id)?;

        let revision = &cmd.revision;
        Ok(vec![JournalEvent::DraftRevised(DraftRevised {
            entry_id: self.id,
            date: revision.date.unwrap_or(self.date),
            reference: revision
                .reference
                .clone()
                .unwrap_or_else(|| self.reference.clone()),
            description: revision
                .description
                .clone()
                .unwrap_or_else(|| self.description.clone()),
            lines: match &revision.lines {
                Some(lines) => number_lines(lines.clone()),
                None => self.lines.clone(),
            },
            notes: match (&revision.notes, revision.clear_notes) {
                (Some(notes), _) => Some(notes.clone()),
                (None, true) => None,
                (None, false) => self.notes.clone(),
            },
            revised_by: revision.revised_by.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_discard(&self, cmd: &DiscardDraft) -> Result<Vec<JournalEvent>, LedgerError> {
        self.ensure_draft()?;
        self.ensure_entry_id(cmd.entry_id)?;

        Ok(vec![JournalEvent::DraftDiscarded(DraftDiscarded {
            entry_id: self.id,
            discarded_by: cmd.discarded_by.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_post(&self, cmd: &PostEntry) -> Result<Vec<JournalEvent>, LedgerError> {
        self.ensure_draft()?;
        self.ensure_entry_id(cmd.entry_id)?;

        // The aggregate guards its own balance invariant regardless of caller.
        validator::check_shape(&self.lines)?;

        let mut covered = cmd.deltas.iter().map(|d| d.line_number).collect::<Vec<_>>();
        covered.sort_unstable();
        let expected = self.lines.iter().map(|l| l.line_number).collect::<Vec<_>>();
        if covered != expected {
            return Err(LedgerError::conflict(format!(
                "posting deltas do not match the lines of entry {}",
                self.id
            )));
        }

        Ok(vec![JournalEvent::EntryPosted(EntryPosted {
            entry_id: self.id,
            posted_by: cmd.posted_by.clone(),
            deltas: cmd.deltas.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reverse(&self, cmd: &ReverseEntry) -> Result<Vec<JournalEvent>, LedgerError> {
        self.ensure_live()?;
        self.ensure_entry_id(cmd.entry_id)?;

        if self.status != EntryStatus::Posted {
            return Err(LedgerError::InvalidTransition {
                entry_id: self.id,
                from: self.status,
                to: EntryStatus::Reversed,
            });
        }
        if cmd.reason.trim().is_empty() {
            return Err(LedgerError::MissingReversalReason { entry_id: self.id });
        }

        Ok(vec![JournalEvent::EntryReversed(EntryReversed {
            entry_id: self.id,
            reversed_by: cmd.reversed_by.clone(),
            reason: cmd.reason.clone(),
            deltas: self
                .posting_deltas
                .iter()
                .map(|d| d.negated())
                .collect(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

/// Read-side filter for entry listings. Empty filter matches every live entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EntryFilter {
    #[serde(default)]
    pub status: Option<EntryStatus>,
    #[serde(default)]
    pub entry_type: Option<EntryType>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub account_id: Option<AccountId>,
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
    /// Case-insensitive match on entry number, reference or description.
    #[serde(default)]
    pub search: Option<String>,
}

impl EntryFilter {
    pub fn matches(&self, entry: &JournalEntry) -> bool {
        if !entry.is_live() {
            return false;
        }
        if self.status.is_some_and(|s| s != entry.status) {
            return false;
        }
        if self.entry_type.is_some_and(|t| t != entry.entry_type) {
            return false;
        }
        if self
            .source
            .as_deref()
            .is_some_and(|s| !s.eq_ignore_ascii_case(&entry.source))
        {
            return false;
        }
        if self
            .account_id
            .is_some_and(|id| !entry.lines.iter().any(|l| l.account_id == id))
        {
            return false;
        }
        if self.from.is_some_and(|from| entry.date < from) {
            return false;
        }
        if self.to.is_some_and(|to| entry.date > to) {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => {
                let needle = needle.to_lowercase();
                entry.entry_number.to_string().to_lowercase().contains(&needle)
                    || entry.reference.to_lowercase().contains(&needle)
                    || entry.description.to_lowercase().contains(&needle)
            }
            _ => true,
        }
    }
}
