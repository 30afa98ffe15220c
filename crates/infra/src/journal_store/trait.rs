use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use forgeledger_core::{EntryId, ExpectedVersion};
use forgeledger_events::EventEnvelope;

/// An event ready to be appended to an entry stream (not yet sequenced).
///
/// Built from a typed journal event with `UncommittedEvent::from_typed`, which
/// serializes the payload and captures the event metadata needed to decode it
/// again on replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedEvent {
    pub event_id: Uuid,
    pub entry_id: EntryId,
    pub stream_type: String,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

/// An event accepted by the journal log.
///
/// - `sequence_number` is the revision within the entry stream (1, 2, 3, ...)
///   and is what optimistic concurrency checks against.
/// - `position` is the global order of the whole log (1, 2, 3, ...). Replaying
///   by `position` reproduces the ledger exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub entry_id: EntryId,
    pub stream_type: String,

    pub sequence_number: u64,
    pub position: u64,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl StoredEvent {
    /// Envelope for publication on the event bus.
    pub fn to_envelope(&self) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            self.event_id,
            *self.entry_id.as_uuid(),
            self.stream_type.clone(),
            self.sequence_number,
            self.position,
            self.payload.clone(),
        )
    }
}

/// Journal log failure.
///
/// These are infrastructure errors, as opposed to ledger errors (validation,
/// state machine). `Concurrency` means another writer advanced the stream
/// first; the service layer surfaces it as a retryable conflict.
#[derive(Debug, Error)]
pub enum JournalStoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),

    #[error("journal log unavailable: {0}")]
    Unavailable(String),
}

/// Append-only store of journal entry streams.
///
/// Implementations must:
/// - append a batch atomically (all events or none), to a single entry stream
/// - enforce optimistic concurrency against the current stream version
/// - assign `sequence_number`s starting at `current_version + 1`
/// - assign global `position`s without gaps or duplicates
pub trait JournalStore: Send + Sync {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, JournalStoreError>;

    /// Every event of one entry, in sequence order. Empty if the entry is unknown.
    fn load_stream(&self, entry_id: EntryId) -> Result<Vec<StoredEvent>, JournalStoreError>;

    /// The whole log in `position` order.
    fn load_all(&self) -> Result<Vec<StoredEvent>, JournalStoreError>;
}

impl<S> JournalStore for Arc<S>
where
    S: JournalStore + ?Sized,
{
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, JournalStoreError> {
        (**self).append(events, expected_version)
    }

    fn load_stream(&self, entry_id: EntryId) -> Result<Vec<StoredEvent>, JournalStoreError> {
        (**self).load_stream(entry_id)
    }

    fn load_all(&self) -> Result<Vec<StoredEvent>, JournalStoreError> {
        (**self).load_all()
    }
}

impl UncommittedEvent {
    pub fn from_typed<E>(
        entry_id: EntryId,
        stream_type: impl Into<String>,
        event_id: Uuid,
        event: &E,
    ) -> Result<Self, JournalStoreError>
    where
        E: forgeledger_events::Event + Serialize,
    {
        let payload = serde_json::to_value(event).map_err(|e| {
            JournalStoreError::InvalidAppend(format!("payload serialization failed: {e}"))
        })?;

        Ok(Self {
            event_id,
            entry_id,
            stream_type: stream_type.into(),
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            occurred_at: event.occurred_at(),
            payload,
        })
    }
}
