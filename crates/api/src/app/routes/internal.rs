//! Routes called by other backends (shop, financing).

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};

use crate::app::errors::{self, FieldIssue};
use crate::app::services::AppServices;
use crate::app::{dto, routes};

pub fn router() -> Router {
    Router::new().route("/activities", post(record_activity))
}

pub async fn record_activity(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return errors::validation_error(vec![FieldIssue::new("body", rejection.body_text())]);
        }
    };

    let key = match routes::idempotency_key(&headers) {
        Ok(key) => key,
        Err(issue) => return errors::validation_error(vec![issue]),
    };

    let cmd = match dto::parse_record_activity(&body, key) {
        Ok(cmd) => cmd,
        Err(issues) => return errors::validation_error(issues),
    };

    match services.ledger.record_activity(cmd).await {
        Ok(receipt) => {
            let status = if receipt.replayed { StatusCode::OK } else { StatusCode::CREATED };
            (status, Json(dto::activity_receipt_to_json(&receipt))).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}
