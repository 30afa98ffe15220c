use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use forgeledger_accounting::{ErrorCategory, LedgerError};
use forgeledger_infra::ServiceError;

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    let retryable = err.is_retryable();
    let message = err.to_string();
    match err {
        ServiceError::Ledger(e) => {
            let status = ledger_status(&e);
            match e {
                // Submission lists every problem, not just the first.
                LedgerError::Rejected(problems) => (
                    status,
                    axum::Json(json!({
                        "error": "rejected",
                        "message": message,
                        "retryable": false,
                        "problems": problems,
                    })),
                )
                    .into_response(),
                e => json_error(status, e.code(), message, retryable),
            }
        }
        ServiceError::Store(_) | ServiceError::Deserialize(_) => {
            tracing::error!(error = %message, "journal log failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, err.code(), message, false)
        }
    }
}

fn ledger_status(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::UnknownAccount { .. } | LedgerError::UnknownEntry { .. } => {
            StatusCode::NOT_FOUND
        }
        other => match other.category() {
            ErrorCategory::Structural => StatusCode::BAD_REQUEST,
            ErrorCategory::Referential | ErrorCategory::Invariant => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ErrorCategory::StateMachine => StatusCode::CONFLICT,
            ErrorCategory::Concurrency => StatusCode::SERVICE_UNAVAILABLE,
        },
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
    retryable: bool,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
            "retryable": retryable,
        })),
    )
        .into_response()
}

pub fn bad_request(code: &'static str, message: impl Into<String>) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, code, message, false)
}
