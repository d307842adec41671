//! Hub client error types.

use thiserror::Error;

/// Result type for hub operations.
pub type HubResult<T> = Result<T, HubError>;

/// Errors that can occur while talking to the hub.
#[derive(Debug, Error)]
pub enum HubError {
    /// HTTP request failed before a response arrived.
    #[error("hub request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// The hub answered with a status this client does not map.
    #[error("hub returned {status}: {body}")]
    Unexpected { status: u16, body: String },

    /// Failed to parse a hub response.
    #[error("failed to parse hub response: {0}")]
    ParseError(String),
}

impl HubError {
    /// HTTP status reported by the hub, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            HubError::Unexpected { status, .. } => Some(*status),
            _ => None,
        }
    }
}
