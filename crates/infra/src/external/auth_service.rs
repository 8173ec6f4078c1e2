//! HTTP client for the external auth service.
//!
//! Contract: `POST <url>` with `{"token": "<bearer token>"}`, answered by
//! `{"valid": bool, "userId": string, "role": string}`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use loyalty_auth::{AuthDecision, AuthService, AuthServiceError};

#[derive(Serialize)]
struct ValidateRequest<'a> {
    token: &'a str,
}

#[derive(Debug, Clone)]
pub struct HttpAuthService {
    client: reqwest::Client,
    url: String,
}

impl HttpAuthService {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, AuthServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthServiceError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl AuthService for HttpAuthService {
    #[tracing::instrument(skip(self, token), fields(url = %self.url), err)]
    async fn validate(&self, token: &str) -> Result<AuthDecision, AuthServiceError> {
        let response = self
            .client
            .post(&self.url)
            .json(&ValidateRequest { token })
            .send()
            .await
            .map_err(|e| AuthServiceError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthServiceError::Status(status.as_u16()));
        }

        response
            .json::<AuthDecision>()
            .await
            .map_err(|e| AuthServiceError::Decode(e.to_string()))
    }
}
