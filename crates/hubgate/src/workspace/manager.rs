//! On-disk workspace layout and document storage.

use std::fs::Permissions;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use base64::Engine;
use log::{debug, info};
use serde::Serialize;
use tokio::io::AsyncWriteExt;

use super::accounts::{OsAccount, chown_tree};
use super::names::{DOCUMENT_EXTENSION, check_subject};
use super::{WorkspaceConfig, WorkspaceError, WorkspaceResult};

const DIR_MODE: u32 = 0o755;
const FILE_MODE: u32 = 0o644;

/// Content written to a new document when the caller supplies none.
pub const WELCOME_DOCUMENT: &str = r##"import marimo as mo

app = mo.App()

@app.cell
def __():
    import marimo as mo
    return mo,

@app.cell
def __(mo):
    mo.md("# Welcome to Marimo!")
    return

if __name__ == "__main__":
    app.run()
"##;

/// A subject's workspace directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    pub root: PathBuf,
    pub apps_dir: PathBuf,
}

/// Listing entry for a stored document.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentInfo {
    pub name: String,
    pub path: String,
    /// Relative to the workspace root (e.g. "apps/notebook.py").
    pub relative_path: String,
    pub size: u64,
    /// Seconds since the Unix epoch.
    pub modified: f64,
}

/// Content of a stored document.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentContent {
    pub name: String,
    pub content: String,
    /// "utf-8" for text, "base64" for anything else.
    pub encoding: &'static str,
    pub path: String,
}

/// Manages per-subject workspaces under a shared files root.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    files_root: PathBuf,
    app_dirname: String,
}

impl WorkspaceManager {
    pub fn new(config: &WorkspaceConfig) -> Self {
        Self {
            files_root: config.files_root.clone(),
            app_dirname: config.app_dirname.clone(),
        }
    }

    pub fn files_root(&self) -> &Path {
        &self.files_root
    }

    pub fn app_dirname(&self) -> &str {
        &self.app_dirname
    }

    /// Directories for a subject, without touching the filesystem.
    pub fn workspace(&self, subject: &str) -> Workspace {
        let root = self.files_root.join(subject);
        let apps_dir = root.join(&self.app_dirname);
        Workspace { root, apps_dir }
    }

    /// Create the subject's directories and, when an owner is known, hand the
    /// tree over to it.
    pub async fn ensure_workspace(
        &self,
        subject: &str,
        owner: Option<&OsAccount>,
    ) -> WorkspaceResult<Workspace> {
        check_subject(subject)?;
        let workspace = self.workspace(subject);

        // create_dir_all succeeds when a concurrent caller created it first.
        tokio::fs::create_dir_all(&workspace.apps_dir)
            .await
            .map_err(WorkspaceError::io("create", &workspace.apps_dir))?;

        for dir in [&workspace.root, &workspace.apps_dir] {
            set_mode(dir, DIR_MODE).await?;
        }

        if let Some(account) = owner {
            chown_tree(&workspace.root, account.uid, account.gid).await?;
        }

        debug!("Workspace ready at {}", workspace.root.display());
        Ok(workspace)
    }

    /// Path of a document in the subject's apps directory.
    ///
    /// `name` must already be normalized.
    pub fn document_path(&self, subject: &str, name: &str) -> PathBuf {
        self.workspace(subject).apps_dir.join(name)
    }

    /// Write a document only if it does not exist yet.
    ///
    /// Returns whether the file was created. Existing files are never touched.
    pub async fn ensure_seed_document(
        &self,
        path: &Path,
        content: Option<&[u8]>,
    ) -> WorkspaceResult<bool> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(WorkspaceError::io("create", parent))?;
        }

        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(WorkspaceError::io("create", path)(e)),
        };

        let body = content.unwrap_or(WELCOME_DOCUMENT.as_bytes());
        file.write_all(body)
            .await
            .map_err(WorkspaceError::io("write", path))?;
        file.flush()
            .await
            .map_err(WorkspaceError::io("write", path))?;
        drop(file);

        set_mode(path, FILE_MODE).await?;
        info!("Created document {}", path.display());
        Ok(true)
    }

    /// Documents in the subject's apps directory, sorted by name.
    ///
    /// A workspace that does not exist yet has no documents.
    pub async fn list_documents(&self, subject: &str) -> WorkspaceResult<Vec<DocumentInfo>> {
        check_subject(subject)?;
        let workspace = self.workspace(subject);

        let mut entries = match tokio::fs::read_dir(&workspace.apps_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(WorkspaceError::io("read", &workspace.apps_dir)(e)),
        };

        let mut documents = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(WorkspaceError::io("read", &workspace.apps_dir))?
        {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.ends_with(DOCUMENT_EXTENSION) {
                continue;
            }

            let metadata = entry
                .metadata()
                .await
                .map_err(WorkspaceError::io("stat", &path))?;
            if !metadata.is_file() {
                continue;
            }

            let modified = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs_f64())
                .unwrap_or_default();
            let relative_path = path
                .strip_prefix(&workspace.root)
                .unwrap_or(&path)
                .to_string_lossy()
                .into_owned();

            documents.push(DocumentInfo {
                name,
                path: path.to_string_lossy().into_owned(),
                relative_path,
                size: metadata.len(),
                modified,
            });
        }

        documents.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(documents)
    }

    /// Read a document; binary content is returned base64-encoded.
    pub async fn read_document(
        &self,
        subject: &str,
        name: &str,
    ) -> WorkspaceResult<DocumentContent> {
        check_subject(subject)?;
        let path = self.document_path(subject, name);

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(WorkspaceError::NotFound(name.to_string()));
            }
            Err(e) => return Err(WorkspaceError::io("read", &path)(e)),
        };

        let (content, encoding) = match String::from_utf8(bytes) {
            Ok(text) => (text, "utf-8"),
            Err(e) => (
                base64::engine::general_purpose::STANDARD.encode(e.into_bytes()),
                "base64",
            ),
        };

        Ok(DocumentContent {
            name: name.to_string(),
            content,
            encoding,
            path: path.to_string_lossy().into_owned(),
        })
    }

    /// Delete a document.
    pub async fn delete_document(&self, subject: &str, name: &str) -> WorkspaceResult<PathBuf> {
        check_subject(subject)?;
        let path = self.document_path(subject, name);

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted document {}", path.display());
                Ok(path)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(WorkspaceError::NotFound(name.to_string()))
            }
            Err(e) => Err(WorkspaceError::io("delete", &path)(e)),
        }
    }

    /// Remove the subject's whole workspace. Returns false when there was none.
    pub async fn remove_workspace(&self, subject: &str) -> WorkspaceResult<bool> {
        check_subject(subject)?;
        let root = self.workspace(subject).root;

        match tokio::fs::remove_dir_all(&root).await {
            Ok(()) => {
                info!("Removed workspace {}", root.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(WorkspaceError::io("remove", &root)(e)),
        }
    }
}

async fn set_mode(path: &Path, mode: u32) -> WorkspaceResult<()> {
    tokio::fs::set_permissions(path, Permissions::from_mode(mode))
        .await
        .map_err(WorkspaceError::io("chmod", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::MetadataExt;

    fn manager(root: &Path) -> WorkspaceManager {
        WorkspaceManager::new(&WorkspaceConfig {
            files_root: root.to_path_buf(),
            ..Default::default()
        })
    }

    fn mode(path: &Path) -> u32 {
        std::fs::metadata(path).unwrap().mode() & 0o777
    }

    #[tokio::test]
    async fn test_ensure_workspace_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());

        let first = manager.ensure_workspace("alice", None).await.unwrap();
        let second = manager.ensure_workspace("alice", None).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.root, dir.path().join("alice"));
        assert_eq!(first.apps_dir, dir.path().join("alice/apps"));
        assert_eq!(mode(&first.root), 0o755);
        assert_eq!(mode(&first.apps_dir), 0o755);
    }

    #[tokio::test]
    async fn test_ensure_workspace_concurrent() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());

        let results = futures::future::join_all(
            (0..8).map(|_| manager.ensure_workspace("alice", None)),
        )
        .await;
        assert!(results.iter().all(Result::is_ok));
    }

    #[tokio::test]
    async fn test_ensure_workspace_rejects_unsafe_subject() {
        let dir = tempfile::tempdir().unwrap();
        let err = manager(dir.path())
            .ensure_workspace("..", None)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkspaceError::InvalidName(_)));
    }

    #[tokio::test]
    async fn test_seed_document_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        let path = manager.document_path("alice", "analysis.py");

        assert!(manager.ensure_seed_document(&path, None).await.unwrap());
        assert_eq!(mode(&path), 0o644);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), WELCOME_DOCUMENT);

        std::fs::write(&path, "edited").unwrap();
        assert!(
            !manager
                .ensure_seed_document(&path, Some(b"other".as_slice()))
                .await
                .unwrap()
        );
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "edited");
    }

    #[tokio::test]
    async fn test_document_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        manager.ensure_workspace("alice", None).await.unwrap();

        let path = manager.document_path("alice", "notes.py");
        manager
            .ensure_seed_document(&path, Some(b"print('hi')\n".as_slice()))
            .await
            .unwrap();

        let listed = manager.list_documents("alice").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "notes.py");
        assert_eq!(listed[0].relative_path, "apps/notes.py");
        assert_eq!(listed[0].size, 12);

        let read = manager.read_document("alice", "notes.py").await.unwrap();
        assert_eq!(read.content, "print('hi')\n");
        assert_eq!(read.encoding, "utf-8");

        manager.delete_document("alice", "notes.py").await.unwrap();
        assert!(manager.list_documents("alice").await.unwrap().is_empty());
        assert!(matches!(
            manager.read_document("alice", "notes.py").await,
            Err(WorkspaceError::NotFound(_))
        ));
        assert!(matches!(
            manager.delete_document("alice", "notes.py").await,
            Err(WorkspaceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_read_binary_document() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        let path = manager.document_path("alice", "blob.py");
        manager
            .ensure_seed_document(&path, Some([0xff, 0xfe, 0x00].as_slice()))
            .await
            .unwrap();

        let read = manager.read_document("alice", "blob.py").await.unwrap();
        assert_eq!(read.encoding, "base64");
        assert_eq!(read.content, "//4A");
    }

    #[tokio::test]
    async fn test_list_documents_without_workspace() {
        let dir = tempfile::tempdir().unwrap();
        assert!(
            manager(dir.path())
                .list_documents("nobody")
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_remove_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        manager.ensure_workspace("alice", None).await.unwrap();

        assert!(manager.remove_workspace("alice").await.unwrap());
        assert!(!dir.path().join("alice").exists());
        assert!(!manager.remove_workspace("alice").await.unwrap());
    }
}
