use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope for an event, containing stream metadata.
///
/// This is the unit published to subscribers after the journal log accepted
/// the event.
///
/// Notes:
/// - `sequence_number` is the revision inside one stream (one journal entry).
/// - `position` is the global, gap-free order of the whole journal log; replaying
///   envelopes by `position` reproduces the ledger exactly.
/// - `payload` is the domain-agnostic event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,

    stream_id: Uuid,
    stream_type: String,

    /// Monotonically increasing position in the stream.
    sequence_number: u64,

    /// Monotonically increasing position in the whole log.
    position: u64,

    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        stream_id: Uuid,
        stream_type: impl Into<String>,
        sequence_number: u64,
        position: u64,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            stream_id,
            stream_type: stream_type.into(),
            sequence_number,
            position,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn stream_id(&self) -> Uuid {
        self.stream_id
    }

    pub fn stream_type(&self) -> &str {
        &self.stream_type
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }
}
