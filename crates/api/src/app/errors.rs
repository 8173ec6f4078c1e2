use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;
use serde_json::json;

use loyalty_infra::LedgerStoreError;
use loyalty_points::LedgerError;

/// One rejected request field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
}

impl FieldIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub fn store_error_to_response(err: LedgerStoreError) -> axum::response::Response {
    match err {
        LedgerStoreError::Ledger(LedgerError::InsufficientBalance { balance, requested }) => json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "insufficient_balance",
            format!("insufficient points balance: {balance} available, {requested} requested"),
        ),
        LedgerStoreError::Ledger(LedgerError::Validation(msg)) => {
            let field = field_of(&msg).to_string();
            validation_error(vec![FieldIssue::new(field, msg)])
        }
        LedgerStoreError::Ledger(e @ LedgerError::IdempotencyConflict { .. }) => {
            json_error(StatusCode::CONFLICT, "idempotency_conflict", e.to_string())
        }
        LedgerStoreError::Conflict(msg) => {
            tracing::warn!(error = %msg, "posting lost a concurrent update race");
            json_error(StatusCode::CONFLICT, "conflict", "concurrent update, retry the request")
        }
        // Caller-supplied amounts that leave the points range are bad input.
        LedgerStoreError::Ledger(LedgerError::Overflow) => validation_error(vec![FieldIssue::new(
            "body",
            "amounts exceed the supported points range",
        )]),
        e @ (LedgerStoreError::Storage { .. } | LedgerStoreError::Corrupt(_)) => {
            tracing::error!(error = %e, "ledger operation failed");
            internal_error()
        }
    }
}

/// 400 with every rejected field listed.
pub fn validation_error(issues: Vec<FieldIssue>) -> axum::response::Response {
    (
        StatusCode::BAD_REQUEST,
        axum::Json(json!({
            "error": "validation_error",
            "message": "request validation failed",
            "issues": issues,
        })),
    )
        .into_response()
}

/// Generic 500; details belong in the logs only.
pub fn internal_error() -> axum::response::Response {
    json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error",
        "internal error while processing the request",
    )
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

// Ledger validation messages lead with the offending field name.
fn field_of(msg: &str) -> &str {
    msg.split_whitespace().next().unwrap_or("body")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_errors_map_to_distinct_statuses() {
        let insufficient = store_error_to_response(LedgerStoreError::Ledger(
            LedgerError::InsufficientBalance { balance: 3, requested: 5 },
        ));
        assert_eq!(insufficient.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let invalid = store_error_to_response(LedgerStoreError::Ledger(LedgerError::validation(
            "points must be at least 1",
        )));
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

        let overflow = store_error_to_response(LedgerStoreError::Ledger(LedgerError::Overflow));
        assert_eq!(overflow.status(), StatusCode::BAD_REQUEST);

        let race = store_error_to_response(LedgerStoreError::Conflict("40001".to_string()));
        assert_eq!(race.status(), StatusCode::CONFLICT);

        let storage = store_error_to_response(LedgerStoreError::storage("post", "connection reset"));
        assert_eq!(storage.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn field_name_is_taken_from_the_message() {
        assert_eq!(field_of("pointsSpent must not be negative"), "pointsSpent");
        assert_eq!(field_of(""), "body");
    }
}
