//! Per-subject workspaces on the shared filesystem.

mod accounts;
mod error;
mod manager;
mod names;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use accounts::{AccountResolver, NoAccounts, OsAccount, PasswdAccounts, chown_tree};
pub use error::{WorkspaceError, WorkspaceResult};
pub use manager::{DocumentContent, DocumentInfo, WELCOME_DOCUMENT, Workspace, WorkspaceManager};
pub(crate) use names::check_subject;
pub use names::{DOCUMENT_EXTENSION, normalize_document_name};

/// Workspace configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Directory holding one workspace per subject.
    pub files_root: PathBuf,
    /// Name of the documents directory inside each workspace.
    pub app_dirname: String,
    /// Document opened when a spawn request names none.
    pub default_document: String,
    /// Transfer workspace ownership to the subject's OS account.
    pub transfer_ownership: bool,
    /// Prefix of OS account names (`{prefix}{subject}`).
    pub os_user_prefix: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            files_root: PathBuf::from("/home"),
            app_dirname: "apps".to_string(),
            default_document: "welcome_app.py".to_string(),
            transfer_ownership: true,
            os_user_prefix: String::new(),
        }
    }
}
