//! Session orchestration errors.

use std::time::Duration;

use thiserror::Error;

use crate::hub::HubError;
use crate::workspace::WorkspaceError;

/// Result type for orchestrator operations.
pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Error)]
pub enum SessionError {
    /// A document or subject name failed validation.
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// The hub returned something the orchestrator cannot act on.
    #[error("hub error ({}): {body}", .status.map_or_else(|| "no response".to_string(), |s| s.to_string()))]
    Upstream { status: Option<u16>, body: String },

    /// Workspace I/O failed.
    #[error("filesystem error: {0}")]
    Filesystem(String),

    /// The hub reported the server as failed while waiting for it.
    #[error("server failed to start: {reason}")]
    SpawnFailed { reason: String },

    /// The server did not become ready in time.
    #[error("server not ready after {}s (pending: {})", .waited.as_secs(), .pending.as_deref().unwrap_or("none"))]
    Timeout {
        pending: Option<String>,
        waited: Duration,
    },

    /// No local port could be leased for the spawner.
    #[error("port lease failed: {0}")]
    PortLease(String),

    /// User, server or document does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<HubError> for SessionError {
    fn from(err: HubError) -> Self {
        match err {
            HubError::Unexpected { status, body } => SessionError::Upstream {
                status: Some(status),
                body,
            },
            other => SessionError::Upstream {
                status: None,
                body: other.to_string(),
            },
        }
    }
}

impl From<WorkspaceError> for SessionError {
    fn from(err: WorkspaceError) -> Self {
        match err {
            WorkspaceError::InvalidName(msg) => SessionError::InvalidName(msg),
            WorkspaceError::NotFound(name) => SessionError::NotFound(name),
            other => SessionError::Filesystem(other.to_string()),
        }
    }
}
