use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use loyalty_auth::{AuthService, AuthzError, Role};

use crate::app::errors::json_error;
use crate::authz;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Shared secret expected from other backends on internal routes.
#[derive(Clone)]
pub struct ApiKeyState {
    pub api_key: Arc<str>,
}

pub async fn api_key_middleware(
    State(state): State<ApiKeyState>,
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let Some(presented) = req.headers().get(API_KEY_HEADER) else {
        return json_error(StatusCode::UNAUTHORIZED, "unauthorized", "missing API key");
    };

    if !constant_time_eq(presented.as_bytes(), state.api_key.as_bytes()) {
        tracing::warn!("internal request rejected: wrong API key");
        return json_error(StatusCode::FORBIDDEN, "forbidden", "invalid API key");
    }

    next.run(req).await
}

#[derive(Clone)]
pub struct AuthState {
    pub auth: Arc<dyn AuthService>,
    pub allowed: Arc<[Role]>,
}

pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let token = match extract_bearer(req.headers()) {
        Ok(token) => token,
        Err(status) => return json_error(status, "unauthorized", "missing bearer token"),
    };

    let decision = match state.auth.validate(token).await {
        Ok(decision) => decision,
        Err(e) => {
            tracing::warn!(error = %e, "token validation failed");
            return json_error(StatusCode::UNAUTHORIZED, "unauthorized", "invalid token");
        }
    };

    let principal = match authz::authorize_principal(&decision, &state.allowed) {
        Ok(principal) => principal,
        Err(AuthzError::MissingUserId) => {
            tracing::warn!("auth service accepted a token without a user id");
            return json_error(StatusCode::UNAUTHORIZED, "unauthorized", "invalid token");
        }
        Err(e) => return json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string()),
    };

    req.extensions_mut().insert(principal);
    next.run(req).await
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, StatusCode> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let header = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;

    let header = header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = header.trim();
    if token.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(token)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_is_trimmed_and_required() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer(&headers), Err(StatusCode::UNAUTHORIZED));

        headers.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_bearer(&headers), Err(StatusCode::UNAUTHORIZED));

        headers.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert_eq!(extract_bearer(&headers), Err(StatusCode::UNAUTHORIZED));

        headers.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_static("Bearer tok-1 "));
        assert_eq!(extract_bearer(&headers), Ok("tok-1"));
    }

    #[test]
    fn key_comparison_needs_exact_match() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secreT"));
        assert!(!constant_time_eq(b"secret", b"secret2"));
    }
}
