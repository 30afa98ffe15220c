use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use forgeledger_accounting::{DraftEntry, DraftRevision, EntryFilter};

use crate::app::dto;
use crate::app::routes::common::{blocking, respond};
use crate::app::services::AppLedger;

pub fn router() -> Router {
    Router::new()
        .route("/", post(submit_entry).get(list_entries))
        .route("/statistics", get(statistics))
        .route(
            "/:id",
            get(get_entry).put(revise_draft).delete(discard_draft),
        )
        .route("/:id/validation", get(validate_entry))
        .route("/:id/post", post(post_entry))
        .route("/:id/reverse", post(reverse_entry))
}

pub async fn submit_entry(
    Extension(ledger): Extension<Arc<AppLedger>>,
    Json(draft): Json<DraftEntry>,
) -> axum::response::Response {
    let result = blocking(ledger, move |l| l.submit_entry(draft)).await;
    respond(StatusCode::CREATED, result)
}

pub async fn list_entries(
    Extension(ledger): Extension<Arc<AppLedger>>,
    Query(filter): Query<EntryFilter>,
) -> axum::response::Response {
    let result = blocking(ledger, move |l| {
        Ok(serde_json::json!({ "items": l.list_entries(&filter)? }))
    })
    .await;
    respond(StatusCode::OK, result)
}

pub async fn statistics(Extension(ledger): Extension<Arc<AppLedger>>) -> axum::response::Response {
    let result = blocking(ledger, |l| l.statistics()).await;
    respond(StatusCode::OK, result)
}

pub async fn get_entry(
    Extension(ledger): Extension<Arc<AppLedger>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let entry_id = match dto::parse_entry_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let result = blocking(ledger, move |l| l.get_entry(entry_id)).await;
    respond(StatusCode::OK, result)
}

pub async fn revise_draft(
    Extension(ledger): Extension<Arc<AppLedger>>,
    Path(id): Path<String>,
    Json(revision): Json<DraftRevision>,
) -> axum::response::Response {
    let entry_id = match dto::parse_entry_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let result = blocking(ledger, move |l| l.revise_draft(entry_id, revision)).await;
    respond(StatusCode::OK, result)
}

pub async fn discard_draft(
    Extension(ledger): Extension<Arc<AppLedger>>,
    Path(id): Path<String>,
    Query(query): Query<dto::DiscardQuery>,
) -> axum::response::Response {
    let entry_id = match dto::parse_entry_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let actor = query.actor.unwrap_or_default();
    let result = blocking(ledger, move |l| {
        l.discard_draft(entry_id, actor)?;
        Ok(serde_json::json!({ "entry_id": entry_id, "discarded": true }))
    })
    .await;
    respond(StatusCode::OK, result)
}

pub async fn validate_entry(
    Extension(ledger): Extension<Arc<AppLedger>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let entry_id = match dto::parse_entry_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let result = blocking(ledger, move |l| {
        let problems = l.validate_entry(entry_id)?;
        Ok(serde_json::json!({ "valid": problems.is_empty(), "problems": problems }))
    })
    .await;
    respond(StatusCode::OK, result)
}

pub async fn post_entry(
    Extension(ledger): Extension<Arc<AppLedger>>,
    Path(id): Path<String>,
    Json(body): Json<dto::ActorRequest>,
) -> axum::response::Response {
    let entry_id = match dto::parse_entry_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let result = blocking(ledger, move |l| l.post_entry(entry_id, body.actor)).await;
    respond(StatusCode::OK, result)
}

pub async fn reverse_entry(
    Extension(ledger): Extension<Arc<AppLedger>>,
    Path(id): Path<String>,
    Json(body): Json<dto::ReverseRequest>,
) -> axum::response::Response {
    let entry_id = match dto::parse_entry_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let result = blocking(ledger, move |l| {
        l.reverse_entry(entry_id, body.actor, body.reason)
    })
    .await;
    respond(StatusCode::OK, result)
}
