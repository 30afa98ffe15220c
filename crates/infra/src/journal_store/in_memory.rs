use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use forgeledger_core::{EntryId, ExpectedVersion};

use super::r#trait::{JournalStore, JournalStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Default)]
struct Log {
    /// Index `i` holds position `i + 1`.
    events: Vec<StoredEvent>,
    streams: HashMap<EntryId, Vec<usize>>,
}

/// In-memory journal log.
///
/// Intended for tests/dev and the single-process service.
#[derive(Debug, Default)]
pub struct InMemoryJournalStore {
    log: RwLock<Log>,
}

impl InMemoryJournalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored events. A poisoned lock still holds every event
    /// appended before the panic, so they are counted.
    pub fn len(&self) -> usize {
        self.log
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .events
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl JournalStore for InMemoryJournalStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, JournalStoreError> {
        if events.is_empty() {
            return Ok(vec![]);
        }

        // All events must target the same entry stream.
        let entry_id = events[0].entry_id;
        let stream_type = events[0].stream_type.clone();
        for (idx, e) in events.iter().enumerate() {
            if e.entry_id != entry_id {
                return Err(JournalStoreError::InvalidAppend(format!(
                    "batch contains multiple entry_ids (index {idx})"
                )));
            }
            if e.stream_type != stream_type {
                return Err(JournalStoreError::InvalidAppend(format!(
                    "batch contains multiple stream types (index {idx})"
                )));
            }
        }

        let mut log = self
            .log
            .write()
            .map_err(|_| JournalStoreError::Unavailable("lock poisoned".to_string()))?;
        let log = &mut *log;

        let stream = log.streams.entry(entry_id).or_default();
        let current = stream.len() as u64;
        if !expected_version.matches(current) {
            return Err(JournalStoreError::Concurrency(format!(
                "entry {entry_id}: expected {expected_version:?}, found {current}"
            )));
        }
        if let Some(first) = stream.first().map(|&i| &log.events[i]) {
            if first.stream_type != stream_type {
                return Err(JournalStoreError::InvalidAppend(format!(
                    "stream type is '{}', attempted append with '{}'",
                    first.stream_type, stream_type
                )));
            }
        }

        let mut committed = Vec::with_capacity(events.len());
        for (offset, e) in events.into_iter().enumerate() {
            let index = log.events.len();
            let stored = StoredEvent {
                event_id: e.event_id,
                entry_id: e.entry_id,
                stream_type: e.stream_type,
                sequence_number: current + offset as u64 + 1,
                position: index as u64 + 1,
                event_type: e.event_type,
                event_version: e.event_version,
                occurred_at: e.occurred_at,
                payload: e.payload,
            };
            log.events.push(stored.clone());
            stream.push(index);
            committed.push(stored);
        }

        Ok(committed)
    }

    fn load_stream(&self, entry_id: EntryId) -> Result<Vec<StoredEvent>, JournalStoreError> {
        let log = self
            .log
            .read()
            .map_err(|_| JournalStoreError::Unavailable("lock poisoned".to_string()))?;

        Ok(log
            .streams
            .get(&entry_id)
            .map(|indexes| indexes.iter().map(|&i| log.events[i].clone()).collect())
            .unwrap_or_default())
    }

    fn load_all(&self) -> Result<Vec<StoredEvent>, JournalStoreError> {
        let log = self
            .log
            .read()
            .map_err(|_| JournalStoreError::Unavailable("lock poisoned".to_string()))?;
        Ok(log.events.clone())
    }
}
