use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use forgeledger_accounting::{AccountFilter, AccountSpec, DateRange};
use forgeledger_infra::ServiceError;

use crate::app::dto;
use crate::app::routes::common::{blocking, respond};
use crate::app::services::AppLedger;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_account).get(list_accounts))
        .route("/:id", get(get_account))
        .route("/:id/deactivate", post(deactivate_account))
        .route("/:id/ledger", get(account_ledger))
}

pub async fn create_account(
    Extension(ledger): Extension<Arc<AppLedger>>,
    Json(spec): Json<AccountSpec>,
) -> axum::response::Response {
    let result = blocking(ledger, move |l| l.create_account(spec)).await;
    respond(StatusCode::CREATED, result)
}

pub async fn list_accounts(
    Extension(ledger): Extension<Arc<AppLedger>>,
    Query(filter): Query<AccountFilter>,
) -> axum::response::Response {
    let result = blocking(ledger, move |l| {
        Ok(serde_json::json!({ "items": l.list_accounts(&filter) }))
    })
    .await;
    respond(StatusCode::OK, result)
}

pub async fn get_account(
    Extension(ledger): Extension<Arc<AppLedger>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let account_id = match dto::parse_account_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let result = blocking(ledger, move |l| l.get_account(account_id)).await;
    respond(StatusCode::OK, result)
}

pub async fn deactivate_account(
    Extension(ledger): Extension<Arc<AppLedger>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let account_id = match dto::parse_account_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let result = blocking(ledger, move |l| l.deactivate_account(account_id)).await;
    respond(StatusCode::OK, result)
}

pub async fn account_ledger(
    Extension(ledger): Extension<Arc<AppLedger>>,
    Path(id): Path<String>,
    Query(query): Query<dto::LedgerQuery>,
) -> axum::response::Response {
    let account_id = match dto::parse_account_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let result = blocking(ledger, move |l| {
        let range = DateRange::new(query.from, query.to).map_err(ServiceError::from)?;
        l.account_ledger(account_id, range)
    })
    .await;
    respond(StatusCode::OK, result)
}
