use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use forgeledger_infra::ServiceError;

use crate::app::errors;
use crate::app::services::AppLedger;

/// Run a ledger call off the async runtime.
///
/// Postings may wait on account locks, so every ledger call goes through the
/// blocking pool.
pub async fn blocking<T, F>(ledger: Arc<AppLedger>, f: F) -> Result<T, Response>
where
    F: FnOnce(&AppLedger) -> Result<T, ServiceError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(move || f(&ledger)).await {
        Ok(result) => result.map_err(errors::service_error_to_response),
        Err(join) => Err(errors::json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal",
            join.to_string(),
            false,
        )),
    }
}

pub fn ok<T: Serialize>(status: StatusCode, body: T) -> Response {
    (status, Json(body)).into_response()
}

pub fn respond<T: Serialize>(status: StatusCode, result: Result<T, Response>) -> Response {
    match result {
        Ok(body) => ok(status, body),
        Err(resp) => resp,
    }
}
