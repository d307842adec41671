//! Document name normalization.

use super::{WorkspaceError, WorkspaceResult};

/// Extension every notebook document carries.
pub const DOCUMENT_EXTENSION: &str = ".py";

/// Normalize a caller-supplied document name into a safe file name.
///
/// Surrounding whitespace is trimmed, inner spaces become underscores and the
/// notebook extension is appended when missing. Names that could escape the
/// apps directory are rejected.
pub fn normalize_document_name(raw: &str) -> WorkspaceResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(WorkspaceError::InvalidName(
            "document name is empty".to_string(),
        ));
    }

    if trimmed.contains(['/', '\\', '\0']) {
        return Err(WorkspaceError::InvalidName(format!(
            "document name contains a path separator: {raw:?}"
        )));
    }

    if trimmed == "." || trimmed == ".." || trimmed.contains("..") {
        return Err(WorkspaceError::InvalidName(format!(
            "document name contains a parent reference: {raw:?}"
        )));
    }

    if trimmed.chars().any(char::is_control) {
        return Err(WorkspaceError::InvalidName(format!(
            "document name contains control characters: {raw:?}"
        )));
    }

    let mut name = trimmed.replace(' ', "_");
    if !name.ends_with(DOCUMENT_EXTENSION) {
        name.push_str(DOCUMENT_EXTENSION);
    }
    Ok(name)
}

/// Check that a subject is usable as a single path component.
pub(crate) fn check_subject(subject: &str) -> WorkspaceResult<()> {
    if subject.is_empty()
        || subject == "."
        || subject == ".."
        || subject.contains(['/', '\\', '\0'])
    {
        return Err(WorkspaceError::InvalidName(format!(
            "subject is not a safe path component: {subject:?}"
        )));
    }
    Ok(())
}
