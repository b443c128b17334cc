//! Error types for the simulai domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// --- Bounded context errors ---

/// Failure of a single upstream provider call.
///
/// The `Display` strings of the HTTP classifications are part of the
/// observable contract: they end up in `last_error`, in audit rows and in
/// the combined message of an exhausted fallback chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Payment required")]
    PaymentRequired,

    #[error("API error: {status_code}")]
    ApiError { status_code: u16, message: String },

    #[error("Empty response")]
    EmptyResponse,

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Classify a non-2xx HTTP status into the provider error taxonomy.
    pub fn from_status(status_code: u16, body: impl Into<String>) -> Self {
        match status_code {
            429 => Self::RateLimited,
            402 => Self::PaymentRequired,
            401 | 403 => Self::AuthenticationFailed(format!("status {status_code}")),
            _ => Self::ApiError {
                status_code,
                message: body.into(),
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Missing authorization header")]
    MissingToken,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Identity provider unavailable: {0}")]
    Unavailable(String),
}

/// A validation failure on one request field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors surfaced by the unified engine and the chat session layer.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Validation failed ({} field errors)", .0.len())]
    Validation(Vec<FieldError>),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session {0} belongs to another user")]
    SessionForbidden(String),

    #[error("{0}")]
    AllProvidersFailed(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
