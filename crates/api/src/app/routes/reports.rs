use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
};
use chrono::Utc;

use forgeledger_accounting::TrialBalanceOptions;

use crate::app::dto;
use crate::app::routes::common::{blocking, respond};
use crate::app::services::AppLedger;

/// `as_of` defaults to today (UTC).
pub async fn trial_balance(
    Extension(ledger): Extension<Arc<AppLedger>>,
    Query(query): Query<dto::TrialBalanceQuery>,
) -> axum::response::Response {
    let as_of = query.as_of.unwrap_or_else(|| Utc::now().date_naive());
    let options = TrialBalanceOptions {
        include_zero: query.include_zero,
    };
    let result = blocking(ledger, move |l| {
        let tb = l.trial_balance(as_of, options)?;
        let balanced = tb.is_balanced();
        Ok(serde_json::json!({
            "as_of": tb.as_of,
            "rows": tb.rows,
            "total_debit": tb.total_debit,
            "total_credit": tb.total_credit,
            "balanced": balanced,
        }))
    })
    .await;
    respond(StatusCode::OK, result)
}

pub async fn reconciliation(
    Extension(ledger): Extension<Arc<AppLedger>>,
) -> axum::response::Response {
    let result = blocking(ledger, |l| {
        let drift = l.reconcile()?;
        Ok(serde_json::json!({ "consistent": drift.is_empty(), "drift": drift }))
    })
    .await;
    respond(StatusCode::OK, result)
}
