//! Workspace error types.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for workspace operations.
pub type WorkspaceResult<T> = Result<T, WorkspaceError>;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// Document or subject name is unsafe or empty.
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// Document does not exist.
    #[error("document not found: {0}")]
    NotFound(String),

    /// Filesystem operation failed.
    #[error("{action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// OS account lookup failed.
    #[error("account lookup failed for {name}: {message}")]
    Account { name: String, message: String },
}

impl WorkspaceError {
    pub(crate) fn io(
        action: &'static str,
        path: impl Into<PathBuf>,
    ) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| WorkspaceError::Io {
            action,
            path,
            source,
        }
    }
}
