//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: ledger wiring (journal log, bus, ledger service)
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request DTOs and path helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use forgeledger_infra::LedgerConfig;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router around an existing ledger.
pub fn build_app(ledger: Arc<services::AppLedger>) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router())
        .layer(ServiceBuilder::new().layer(Extension(ledger)))
}

/// Build the router with a fresh in-memory ledger (public entrypoint used by
/// `main.rs`).
pub fn build_default_app(config: LedgerConfig) -> Router {
    build_app(services::build_ledger(config))
}
