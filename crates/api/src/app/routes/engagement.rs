//! Client-facing routes. The user is always the authenticated principal.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crate::app::errors::{self, FieldIssue};
use crate::app::services::AppServices;
use crate::app::{dto, routes};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/me", get(me))
        .route("/me/points", get(my_points))
        .route("/me/transactions", get(my_transactions))
        .route("/points/redeem", post(redeem_points))
}

pub async fn dashboard(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    match services.ledger.dashboard(principal.user_id()).await {
        Ok(d) => (StatusCode::OK, Json(dto::dashboard_to_json(d))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn me(Extension(principal): Extension<PrincipalContext>) -> impl IntoResponse {
    Json(serde_json::json!({
        "userId": principal.user_id().as_str(),
        "role": principal.role().as_str(),
    }))
}

pub async fn my_points(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    match services.ledger.summary(principal.user_id()).await {
        Ok(s) => (StatusCode::OK, Json(dto::summary_to_json(s))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn my_transactions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    match services.ledger.recent_transactions(principal.user_id()).await {
        Ok(items) => {
            let items = items.into_iter().map(dto::transaction_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn redeem_points(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    headers: HeaderMap,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return errors::validation_error(vec![FieldIssue::new("body", rejection.body_text())]);
        }
    };

    // Retries of a redemption must never spend twice.
    let key = match routes::idempotency_key(&headers) {
        Ok(Some(key)) => key,
        Ok(None) => {
            return errors::validation_error(vec![FieldIssue::new("X-Idempotency-Key", "is required")]);
        }
        Err(issue) => return errors::validation_error(vec![issue]),
    };

    let cmd = match dto::parse_redeem(&body, principal.user_id().clone(), Some(key)) {
        Ok(cmd) => cmd,
        Err(issues) => return errors::validation_error(issues),
    };

    match services.ledger.redeem(cmd).await {
        Ok(receipt) => {
            let status = if receipt.replayed { StatusCode::OK } else { StatusCode::CREATED };
            (status, Json(dto::redemption_to_json(&receipt))).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}
