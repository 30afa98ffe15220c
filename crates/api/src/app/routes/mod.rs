use axum::{routing::get, Router};

pub mod accounts;
pub mod common;
pub mod journal;
pub mod reports;
pub mod system;

/// Router for all ledger endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/accounts", accounts::router())
        .nest("/journal-entries", journal::router())
        .route("/trial-balance", get(reports::trial_balance))
        .route("/reconciliation", get(reports::reconciliation))
}
