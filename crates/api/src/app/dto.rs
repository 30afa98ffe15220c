use chrono::NaiveDate;
use serde::Deserialize;

use forgeledger_core::{AccountId, EntryId};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------
//
// Account creation, draft submission and revision bodies deserialize straight
// into the domain's `AccountSpec`, `DraftEntry` and `DraftRevision`.

/// Body of `POST /journal-entries/:id/post`.
#[derive(Debug, Deserialize)]
pub struct ActorRequest {
    pub actor: String,
}

/// Body of `POST /journal-entries/:id/reverse`. A missing reason reaches the
/// ledger as blank and is refused there with its own error code.
#[derive(Debug, Deserialize)]
pub struct ReverseRequest {
    pub actor: String,
    #[serde(default)]
    pub reason: String,
}

/// Query of `DELETE /journal-entries/:id`.
#[derive(Debug, Default, Deserialize)]
pub struct DiscardQuery {
    #[serde(default)]
    pub actor: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LedgerQuery {
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TrialBalanceQuery {
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
    #[serde(default)]
    pub include_zero: bool,
}

// -------------------------
// Path helpers
// -------------------------

pub fn parse_account_id(raw: &str) -> Result<AccountId, axum::response::Response> {
    raw.parse()
        .map_err(|_| errors::bad_request("invalid_id", format!("not an account id: {raw}")))
}

pub fn parse_entry_id(raw: &str) -> Result<EntryId, axum::response::Response> {
    raw.parse()
        .map_err(|_| errors::bad_request("invalid_id", format!("not an entry id: {raw}")))
}
