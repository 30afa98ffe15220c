//! Infrastructure wiring for the HTTP process: journal log, bus, ledger.

use std::sync::Arc;

use serde_json::Value as JsonValue;

use forgeledger_events::{EventBus, EventEnvelope, InMemoryEventBus};
use forgeledger_infra::journal_store::InMemoryJournalStore;
use forgeledger_infra::{GeneralLedger, LedgerConfig};

pub type AppLedger =
    GeneralLedger<Arc<InMemoryJournalStore>, Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>>;

/// In-memory ledger plus a background subscriber that traces every committed
/// journal event.
pub fn build_ledger(config: LedgerConfig) -> Arc<AppLedger> {
    let store = Arc::new(InMemoryJournalStore::new());
    let bus: Arc<InMemoryEventBus<EventEnvelope<JsonValue>>> = Arc::new(InMemoryEventBus::new());

    let sub = bus.subscribe();
    std::thread::spawn(move || {
        // Ends when the bus (and with it every sender) is dropped.
        while let Ok(env) = sub.recv() {
            tracing::debug!(
                position = env.position(),
                entry_id = %env.stream_id(),
                sequence_number = env.sequence_number(),
                "journal event committed"
            );
        }
    });

    Arc::new(GeneralLedger::new(store, bus, config))
}
