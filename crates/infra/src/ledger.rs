//! General ledger service: the call surface external subsystems use.
//!
//! Composes the account registry, the journal log and the event bus:
//!
//! ```text
//! request
//!   -> load entry stream, rehydrate
//!   -> (posting/reversal) lock the entry's accounts, reload under the lock
//!   -> PostingEngine plans the command (state check, validation, deltas)
//!   -> aggregate decides events
//!   -> append to the journal log (optimistic, per entry stream)
//!   -> commit balance deltas to the registry
//!   -> publish on the bus (best effort)
//! ```
//!
//! Append happens before the registry is touched, and both happen while the
//! account locks are held, so the cached balances never run ahead of the log
//! and no reader ever sees half of a posting.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{NaiveDate, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use forgeledger_accounting::{
    Account, AccountFilter, AccountLedger, AccountRegistry, AccountSpec, BalanceDrift, DateRange,
    DraftEntry, DraftRevision, EntryFilter, EntryNumber, ErrorCategory, JournalCommand,
    JournalEntry, JournalEvent, JournalStatistics, LedgerError, LedgerProjector, PostingEngine,
    TrialBalance, TrialBalanceOptions, ValidationError,
};
use forgeledger_accounting::entry::DiscardDraft;
use forgeledger_accounting::validator;
use forgeledger_core::{AccountId, Aggregate, AggregateRoot, EntryId, ExpectedVersion};
use forgeledger_events::{EventBus, EventEnvelope, Subscription};

use crate::config::LedgerConfig;
use crate::journal_store::{JournalStore, JournalStoreError, StoredEvent, UncommittedEvent};

pub const JOURNAL_STREAM_TYPE: &str = "ledger.journal_entry";

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The journal log failed for a reason other than a lost race.
    #[error(transparent)]
    Store(JournalStoreError),

    /// A stored event could not be decoded into a journal event.
    #[error("failed to decode journal event: {0}")]
    Deserialize(String),
}

impl From<JournalStoreError> for ServiceError {
    fn from(value: JournalStoreError) -> Self {
        match value {
            // Someone else advanced the entry first; resubmitting is safe.
            JournalStoreError::Concurrency(msg) => ServiceError::Ledger(LedgerError::Conflict(msg)),
            other => ServiceError::Store(other),
        }
    }
}

impl ServiceError {
    /// `None` for infrastructure failures.
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            ServiceError::Ledger(err) => Some(err.category()),
            ServiceError::Store(_) | ServiceError::Deserialize(_) => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category().is_some_and(ErrorCategory::is_retryable)
    }

    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Ledger(err) => err.code(),
            ServiceError::Store(_) => "journal_unavailable",
            ServiceError::Deserialize(_) => "journal_corrupt",
        }
    }
}

/// In-process general ledger.
pub struct GeneralLedger<S, B> {
    registry: AccountRegistry,
    store: S,
    bus: B,
    config: LedgerConfig,
    next_entry_number: AtomicU64,
}

impl<S, B> GeneralLedger<S, B> {
    pub fn new(store: S, bus: B, config: LedgerConfig) -> Self {
        Self {
            registry: AccountRegistry::new(),
            store,
            bus,
            config,
            next_entry_number: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn registry(&self) -> &AccountRegistry {
        &self.registry
    }

    fn allocate_entry_number(&self) -> EntryNumber {
        EntryNumber::new(self.next_entry_number.fetch_add(1, Ordering::SeqCst))
    }
}

impl<S, B> GeneralLedger<S, B>
where
    S: JournalStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    // ---- accounts -------------------------------------------------------

    pub fn create_account(&self, spec: AccountSpec) -> Result<Account, ServiceError> {
        Ok(self.registry.create_account(spec, Utc::now())?)
    }

    pub fn deactivate_account(&self, account_id: AccountId) -> Result<Account, ServiceError> {
        Ok(self
            .registry
            .deactivate_account(account_id, self.config.lock_timeout)?)
    }

    pub fn get_account(&self, account_id: AccountId) -> Result<Account, ServiceError> {
        self.registry
            .get_account(account_id)
            .ok_or_else(|| LedgerError::UnknownAccount { account_id }.into())
    }

    pub fn list_accounts(&self, filter: &AccountFilter) -> Vec<Account> {
        self.registry.list_accounts(filter)
    }

    // ---- journal entries ------------------------------------------------

    /// Record a new draft. Nothing is posted.
    pub fn submit_entry(&self, draft: DraftEntry) -> Result<JournalEntry, ServiceError> {
        let cmd = PostingEngine::plan_submission(
            draft,
            &self.registry.snapshot(),
            || self.allocate_entry_number(),
            Utc::now(),
        )
        .inspect_err(|err| tracing::warn!(error = %err, "draft submission rejected"))?;

        let mut entry = JournalEntry::empty(cmd.entry_id);
        self.execute(&mut entry, JournalCommand::SubmitDraft(cmd))?;

        tracing::info!(
            entry_id = %entry.id_typed(),
            entry_number = %entry.entry_number(),
            lines = entry.lines().len(),
            source = entry.source(),
            "draft submitted"
        );
        Ok(entry)
    }

    pub fn revise_draft(
        &self,
        entry_id: EntryId,
        revision: DraftRevision,
    ) -> Result<JournalEntry, ServiceError> {
        let mut entry = self.load_entry(entry_id)?;
        let cmd =
            PostingEngine::plan_revision(&entry, revision, &self.registry.snapshot(), Utc::now())?;
        self.execute(&mut entry, JournalCommand::ReviseDraft(cmd))?;

        tracing::info!(
            entry_id = %entry_id,
            entry_number = %entry.entry_number(),
            "draft revised"
        );
        Ok(entry)
    }

    pub fn discard_draft(
        &self,
        entry_id: EntryId,
        discarded_by: impl Into<String>,
    ) -> Result<(), ServiceError> {
        let mut entry = self.load_entry(entry_id)?;
        let cmd = JournalCommand::DiscardDraft(DiscardDraft {
            entry_id,
            discarded_by: discarded_by.into(),
            occurred_at: Utc::now(),
        });
        self.execute(&mut entry, cmd)?;

        tracing::info!(entry_id = %entry_id, "draft discarded");
        Ok(())
    }

    /// Validate and post a draft, applying its balance deltas atomically.
    pub fn post_entry(
        &self,
        entry_id: EntryId,
        posted_by: impl Into<String>,
    ) -> Result<JournalEntry, ServiceError> {
        let entry = self.load_entry(entry_id)?;
        let guard = self
            .registry
            .lock_accounts(entry.account_ids(), self.config.lock_timeout)?;

        // The draft may have been revised while we waited.
        let mut entry = self.load_entry(entry_id)?;
        if !guard.covers(&entry.account_ids()) {
            return Err(LedgerError::conflict(format!(
                "entry {entry_id} changed accounts while waiting for locks"
            ))
            .into());
        }

        let cmd = PostingEngine::plan_posting(
            &entry,
            &self.registry.snapshot(),
            &self.config.periods,
            posted_by,
            Utc::now(),
        )
        .inspect_err(|err| {
            tracing::warn!(entry_id = %entry_id, code = err.code(), error = %err, "posting rejected")
        })?;
        self.execute(&mut entry, JournalCommand::PostEntry(cmd))?;
        drop(guard);

        // Posted lines passed validation, so their totals fit.
        let total = entry.totals().map(|(debit, _)| debit).unwrap_or_default();
        tracing::info!(
            entry_id = %entry_id,
            entry_number = %entry.entry_number(),
            total = %total,
            lines = entry.lines().len(),
            "journal entry posted"
        );
        Ok(entry)
    }

    /// Undo a posted entry with the exact negation of its posting deltas.
    pub fn reverse_entry(
        &self,
        entry_id: EntryId,
        reversed_by: impl Into<String>,
        reason: impl Into<String>,
    ) -> Result<JournalEntry, ServiceError> {
        let entry = self.load_entry(entry_id)?;
        let guard = self
            .registry
            .lock_accounts(entry.account_ids(), self.config.lock_timeout)?;

        let mut entry = self.load_entry(entry_id)?;
        if !guard.covers(&entry.account_ids()) {
            return Err(LedgerError::conflict(format!(
                "entry {entry_id} changed accounts while waiting for locks"
            ))
            .into());
        }

        let cmd = PostingEngine::plan_reversal(
            &entry,
            &self.registry.snapshot(),
            reversed_by,
            reason,
            Utc::now(),
        )
        .inspect_err(|err| {
            tracing::warn!(entry_id = %entry_id, code = err.code(), error = %err, "reversal rejected")
        })?;
        self.execute(&mut entry, JournalCommand::ReverseEntry(cmd))?;
        drop(guard);

        tracing::info!(
            entry_id = %entry_id,
            entry_number = %entry.entry_number(),
            reason = entry.reversal_reason().unwrap_or_default(),
            "journal entry reversed"
        );
        Ok(entry)
    }

    pub fn get_entry(&self, entry_id: EntryId) -> Result<JournalEntry, ServiceError> {
        self.load_entry(entry_id)
    }

    /// Matching entries ordered by entry number.
    pub fn list_entries(&self, filter: &EntryFilter) -> Result<Vec<JournalEntry>, ServiceError> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(|e| filter.matches(e))
            .collect())
    }

    /// Every current problem with an entry (empty when it would post cleanly).
    pub fn validate_entry(&self, entry_id: EntryId) -> Result<Vec<ValidationError>, ServiceError> {
        let entry = self.load_entry(entry_id)?;
        Ok(validator::validate_entry(
            &entry,
            &self.registry.snapshot(),
            &self.config.periods,
        ))
    }

    pub fn statistics(&self) -> Result<JournalStatistics, ServiceError> {
        Ok(JournalStatistics::from_entries(&self.entries()?)?)
    }

    // ---- projections ----------------------------------------------------

    pub fn trial_balance(
        &self,
        as_of: NaiveDate,
        options: TrialBalanceOptions,
    ) -> Result<TrialBalance, ServiceError> {
        let chart = self.registry.snapshot();
        let entries = self.entries()?;
        Ok(LedgerProjector::new(&entries, &chart).trial_balance(as_of, options)?)
    }

    pub fn account_ledger(
        &self,
        account_id: AccountId,
        range: DateRange,
    ) -> Result<AccountLedger, ServiceError> {
        let chart = self.registry.snapshot();
        let entries = self.entries()?;
        Ok(LedgerProjector::new(&entries, &chart).account_ledger(account_id, range)?)
    }

    /// Compare cached balances with a full journal replay.
    ///
    /// Holds every account lock so no posting sits between append and commit.
    pub fn reconcile(&self) -> Result<Vec<BalanceDrift>, ServiceError> {
        let all = self
            .registry
            .list_accounts(&AccountFilter::default())
            .into_iter()
            .map(|a| a.id_typed());
        let _guard = self.registry.lock_accounts(all, self.config.lock_timeout)?;

        let chart = self.registry.snapshot();
        let entries = self.entries()?;
        let drift = LedgerProjector::new(&entries, &chart).reconcile()?;
        if !drift.is_empty() {
            tracing::error!(accounts = drift.len(), "cached balances drifted from the journal");
        }
        Ok(drift)
    }

    /// Committed journal events, published after each successful append.
    pub fn subscribe(&self) -> Subscription<EventEnvelope<JsonValue>> {
        self.bus.subscribe()
    }

    // ---- pipeline -------------------------------------------------------

    fn load_entry(&self, entry_id: EntryId) -> Result<JournalEntry, ServiceError> {
        let history = self.store.load_stream(entry_id)?;
        let events = decode(&history)?;
        let entry = JournalEntry::replay(entry_id, &events);
        if !entry.is_live() {
            return Err(LedgerError::UnknownEntry { entry_id }.into());
        }
        Ok(entry)
    }

    /// Rebuild every entry from the log, ordered by entry number.
    fn entries(&self) -> Result<Vec<JournalEntry>, ServiceError> {
        let mut streams: BTreeMap<EntryId, Vec<JournalEvent>> = BTreeMap::new();
        for stored in self.store.load_all()? {
            let event = decode_one(&stored)?;
            streams.entry(stored.entry_id).or_default().push(event);
        }

        let mut entries = streams
            .into_iter()
            .map(|(id, events)| JournalEntry::replay(id, &events))
            .collect::<Vec<_>>();
        entries.sort_by_key(|e| e.entry_number());
        Ok(entries)
    }

    fn execute(
        &self,
        entry: &mut JournalEntry,
        command: JournalCommand,
    ) -> Result<Vec<StoredEvent>, ServiceError> {
        let expected = match entry.version() {
            0 => ExpectedVersion::NoStream,
            v => ExpectedVersion::Exact(v),
        };

        let decided = entry.handle(&command)?;
        if decided.is_empty() {
            return Ok(vec![]);
        }

        let uncommitted = decided
            .iter()
            .map(|ev| {
                UncommittedEvent::from_typed(
                    entry.id_typed(),
                    JOURNAL_STREAM_TYPE,
                    Uuid::now_v7(),
                    ev,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        let committed = self.store.append(uncommitted, expected)?;

        for event in &decided {
            PostingEngine::commit(&self.registry, event)?;
            entry.apply(event);
        }

        for stored in &committed {
            // The log already holds the event; a lost notification is recoverable.
            if let Err(err) = self.bus.publish(stored.to_envelope()) {
                tracing::warn!(
                    position = stored.position,
                    event_type = %stored.event_type,
                    error = ?err,
                    "failed to publish journal event"
                );
            }
        }

        Ok(committed)
    }
}

fn decode_one(stored: &StoredEvent) -> Result<JournalEvent, ServiceError> {
    serde_json::from_value(stored.payload.clone())
        .map_err(|e| ServiceError::Deserialize(format!("position {}: {e}", stored.position)))
}

fn decode(history: &[StoredEvent]) -> Result<Vec<JournalEvent>, ServiceError> {
    let mut sorted = history.iter().collect::<Vec<_>>();
    sorted.sort_by_key(|e| e.sequence_number);
    sorted.into_iter().map(decode_one).collect()
}
