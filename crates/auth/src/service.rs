//! External token validation contract.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Role;

/// Answer of the auth service for one bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthDecision {
    pub valid: bool,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
}

impl AuthDecision {
    pub fn rejected() -> Self {
        Self {
            valid: false,
            user_id: None,
            role: None,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthServiceError {
    #[error("auth service unreachable: {0}")]
    Transport(String),

    #[error("auth service answered with status {0}")]
    Status(u16),

    #[error("auth service answered with an unreadable body: {0}")]
    Decode(String),
}

/// Remote authority that decides whether a bearer token is valid and which
/// role it carries.
#[async_trait]
pub trait AuthService: Send + Sync {
    async fn validate(&self, token: &str) -> Result<AuthDecision, AuthServiceError>;
}

/// Fixed token table. Used for local development and tests; any token not in
/// the table is reported as invalid.
#[derive(Debug, Clone, Default)]
pub struct StaticAuthService {
    tokens: HashMap<String, (String, Role)>,
}

impl StaticAuthService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, user_id: impl Into<String>, role: Role) -> Self {
        self.tokens.insert(token.into(), (user_id.into(), role));
        self
    }
}

#[async_trait]
impl AuthService for StaticAuthService {
    async fn validate(&self, token: &str) -> Result<AuthDecision, AuthServiceError> {
        Ok(match self.tokens.get(token) {
            Some((user_id, role)) => AuthDecision {
                valid: true,
                user_id: Some(user_id.clone()),
                role: Some(role.clone()),
            },
            None => {
                tracing::debug!("static auth service: unknown token");
                AuthDecision::rejected()
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_service_knows_only_its_tokens() {
        let svc = StaticAuthService::new().with_token("t-1", "user-1", Role::CLIENT);

        let known = svc.validate("t-1").await.unwrap();
        assert!(known.valid);
        assert_eq!(known.user_id.as_deref(), Some("user-1"));
        assert_eq!(known.role, Some(Role::CLIENT));

        let unknown = svc.validate("t-2").await.unwrap();
        assert_eq!(unknown, AuthDecision::rejected());
    }
}
