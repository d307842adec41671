//! OS account resolution and ownership transfer.

use std::os::unix::fs::lchown;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, info};
use tokio::process::Command;
use walkdir::WalkDir;

use super::{WorkspaceError, WorkspaceResult};

/// An OS principal that should own a subject's workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsAccount {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
    pub home: PathBuf,
}

/// Maps subjects to OS accounts.
///
/// `Ok(None)` means the account does not exist (yet); callers skip ownership
/// transfer and retry on a later request.
#[async_trait]
pub trait AccountResolver: Send + Sync {
    async fn resolve(&self, subject: &str) -> WorkspaceResult<Option<OsAccount>>;
}

/// Resolver used when ownership transfer is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAccounts;

#[async_trait]
impl AccountResolver for NoAccounts {
    async fn resolve(&self, _subject: &str) -> WorkspaceResult<Option<OsAccount>> {
        Ok(None)
    }
}

/// Resolves `{prefix}{subject}` through the system passwd database.
#[derive(Debug, Clone, Default)]
pub struct PasswdAccounts {
    prefix: String,
}

impl PasswdAccounts {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn account_name(&self, subject: &str) -> String {
        format!("{}{}", self.prefix, subject)
    }
}

#[async_trait]
impl AccountResolver for PasswdAccounts {
    async fn resolve(&self, subject: &str) -> WorkspaceResult<Option<OsAccount>> {
        let name = self.account_name(subject);
        let output = Command::new("getent")
            .args(["passwd", &name])
            .output()
            .await
            .map_err(|e| WorkspaceError::Account {
                name: name.clone(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            debug!("No OS account for {}", name);
            return Ok(None);
        }

        let line = String::from_utf8_lossy(&output.stdout);
        parse_passwd_line(line.trim())
            .map(Some)
            .ok_or_else(|| WorkspaceError::Account {
                name,
                message: format!("unparseable passwd entry: {}", line.trim()),
            })
    }
}

/// Parse one `name:pw:uid:gid:gecos:home:shell` entry.
fn parse_passwd_line(line: &str) -> Option<OsAccount> {
    let parts: Vec<&str> = line.split(':').collect();
    if parts.len() < 6 {
        return None;
    }
    Some(OsAccount {
        name: parts[0].to_string(),
        uid: parts[2].parse().ok()?,
        gid: parts[3].parse().ok()?,
        home: PathBuf::from(parts[5]),
    })
}

/// Hand every entry under `root` (inclusive) to `uid:gid`.
///
/// Symlinks are not followed; the link itself is re-owned. Stops at the first
/// entry that cannot be changed and reports its path.
pub async fn chown_tree(root: &Path, uid: u32, gid: u32) -> WorkspaceResult<()> {
    let root = root.to_path_buf();
    info!("Setting ownership of '{}' to {}:{}", root.display(), uid, gid);

    tokio::task::spawn_blocking(move || chown_tree_blocking(&root, uid, gid))
        .await
        .map_err(|e| WorkspaceError::Io {
            action: "chown",
            path: PathBuf::new(),
            source: std::io::Error::other(e),
        })?
}

fn chown_tree_blocking(root: &Path, uid: u32, gid: u32) -> WorkspaceResult<()> {
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_default();
            WorkspaceError::Io {
                action: "walk",
                path,
                source: e.into(),
            }
        })?;
        lchown(entry.path(), Some(uid), Some(gid))
            .map_err(WorkspaceError::io("chown", entry.path()))?;
    }
    Ok(())
}
