//! Mapping of engine and auth errors onto HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use simulai_core::{AuthError, EngineError, FieldError};
use simulai_engine::UNAVAILABLE_MESSAGE;
use tracing::error;

/// Every non-2xx body is `{success: false, error, details?}`.
#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<FieldError>>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    details: Option<Vec<FieldError>>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }

    /// The chat layer hides provider failures behind a friendly message.
    pub fn from_chat(e: EngineError) -> Self {
        match e {
            EngineError::AllProvidersFailed(_) => {
                Self::new(StatusCode::SERVICE_UNAVAILABLE, UNAVAILABLE_MESSAGE)
            }
            other => other.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Validation(details) => Self {
                status: StatusCode::BAD_REQUEST,
                message: "Invalid request".into(),
                details: Some(details),
            },
            EngineError::SessionNotFound(_) => Self::new(StatusCode::NOT_FOUND, "Session not found"),
            EngineError::SessionForbidden(_) => Self::new(StatusCode::FORBIDDEN, "Access denied"),
            EngineError::AllProvidersFailed(message) => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
            }
            EngineError::Store(e) => {
                error!(error = %e, "Store failure while handling request");
                Self::internal()
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        if let AuthError::Unavailable(reason) = &e {
            error!(error = %reason, "Identity provider unavailable");
        }
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            error: self.message,
            details: self.details,
        };
        (self.status, Json(body)).into_response()
    }
}
