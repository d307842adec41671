//! API error handling with structured responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::auth::AuthError;
use crate::session::SessionError;

/// API error type with structured responses.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Unauthorized { kind: &'static str, message: String },

    #[error("{message}")]
    BadRequest { kind: &'static str, message: String },

    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    Upstream { status: Option<u16>, message: String },

    #[error("{0}")]
    Filesystem(String),

    #[error("{0}")]
    SpawnFailed(String),

    #[error("{0}")]
    Timeout(String),

    #[error("{0}")]
    Internal(String),

    /// A dependency needed to answer the request is down.
    #[error("{message}")]
    Unavailable { kind: &'static str, message: String },
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest {
            kind: "bad_request",
            message: msg.into(),
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Upstream { status, .. } => status
                .and_then(|s| StatusCode::from_u16(s).ok())
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Self::Filesystem(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::SpawnFailed(_) => StatusCode::BAD_GATEWAY,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthorized { kind, .. }
            | Self::BadRequest { kind, .. }
            | Self::Unavailable { kind, .. } => *kind,
            Self::NotFound(_) => "not_found",
            Self::Upstream { .. } => "upstream_error",
            Self::Filesystem(_) => "filesystem_error",
            Self::SpawnFailed(_) => "spawn_failed",
            Self::Timeout(_) => "timeout",
            Self::Internal(_) => "internal_error",
        }
    }
}

/// Structured error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub ok: bool,
    pub kind: &'static str,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let kind = self.kind();
        let message = self.to_string();

        match &self {
            ApiError::Filesystem(_)
            | ApiError::Internal(_)
            | ApiError::Upstream { .. }
            | ApiError::Unavailable { .. } => {
                error!(kind, message = %message, "API error");
            }
            ApiError::SpawnFailed(_) | ApiError::Timeout(_) => {
                warn!(kind, message = %message, "Session did not come up");
            }
            _ => {
                tracing::debug!(kind, message = %message, "Client error");
            }
        }

        let body = ErrorResponse {
            ok: false,
            kind,
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let kind = err.kind();
        let message = err.to_string();
        match err {
            // The provider's keys could not be fetched; the credential itself
            // was never judged.
            AuthError::KeySetUnavailable(_) => ApiError::Unavailable { kind, message },
            _ => ApiError::Unauthorized { kind, message },
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        let message = err.to_string();
        match err {
            SessionError::InvalidName(_) => ApiError::BadRequest {
                kind: "invalid_name",
                message,
            },
            SessionError::NotFound(_) => ApiError::NotFound(message),
            SessionError::Upstream { status, .. } => ApiError::Upstream { status, message },
            SessionError::Filesystem(_) => ApiError::Filesystem(message),
            SessionError::SpawnFailed { .. } => ApiError::SpawnFailed(message),
            SessionError::Timeout { .. } => ApiError::Timeout(message),
            SessionError::PortLease(_) => ApiError::Internal(message),
        }
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
