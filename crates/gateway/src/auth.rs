//! Bearer-token authentication.
//!
//! The identity provider is external: a token is valid when its
//! `/auth/v1/user` endpoint answers 200 with a user object.

use async_trait::async_trait;
use axum::http::HeaderMap;
use serde::Deserialize;
use simulai_config::AuthConfig;
use simulai_core::AuthError;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Resolves a bearer token to a user id.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<String, AuthError>;
}

/// The token of an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingToken)
}

/// Asks the identity provider who owns the token.
pub struct RemoteTokenVerifier {
    user_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct UserResponse {
    id: String,
}

impl RemoteTokenVerifier {
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });
        Self {
            user_url: format!("{}/auth/v1/user", base_url.trim_end_matches('/')),
            api_key,
            client,
        }
    }
}

#[async_trait]
impl TokenVerifier for RemoteTokenVerifier {
    async fn verify(&self, token: &str) -> Result<String, AuthError> {
        let mut request = self.client.get(&self.user_url).bearer_auth(token);
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(AuthError::Unavailable(format!("status {status}")));
        }
        if !status.is_success() {
            debug!(status = %status, "Token rejected by identity provider");
            return Err(AuthError::InvalidToken);
        }

        let user: UserResponse = response
            .json()
            .await
            .map_err(|_| AuthError::InvalidToken)?;
        Ok(user.id)
    }
}

/// Fixed token table, for local development and tests.
#[derive(Default)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, String>,
}

impl StaticTokenVerifier {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self { tokens }
    }

    pub fn with_token(mut self, token: impl Into<String>, user_id: impl Into<String>) -> Self {
        self.tokens.insert(token.into(), user_id.into());
        self
    }
}

#[async_trait]
impl TokenVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> Result<String, AuthError> {
        self.tokens.get(token).cloned().ok_or(AuthError::InvalidToken)
    }
}

/// Remote verification when an identity provider is configured, otherwise
/// the static table.
pub fn verifier_from_config(config: &AuthConfig) -> Arc<dyn TokenVerifier> {
    match &config.url {
        Some(url) => Arc::new(RemoteTokenVerifier::new(url, config.api_key.clone())),
        None => {
            if config.static_tokens.is_empty() {
                warn!("No identity provider and no static tokens configured; every request will be rejected");
            }
            Arc::new(StaticTokenVerifier::new(config.static_tokens.clone()))
        }
    }
}
