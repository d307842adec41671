//! Views returned by the session orchestrator.

use serde::Serialize;

use crate::hub::ServerRecord;

/// Result of a spawn-or-attach request.
#[derive(Debug, Clone, Serialize)]
pub struct SpawnOutcome {
    /// Absolute URL routing the caller into the session.
    pub redirect: String,
    pub subject: String,
    pub document: String,
    /// True when no start was issued by this request.
    pub attached: bool,
}

/// A server as exposed to API callers.
#[derive(Debug, Clone, Serialize)]
pub struct ServerView {
    pub user: String,
    pub name: String,
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<String>,
}

impl ServerView {
    pub fn from_record(user: &str, record: ServerRecord) -> Self {
        Self {
            user: user.to_string(),
            name: record.name,
            ready: record.ready,
            pending: record.pending.filter(|p| !p.is_empty()),
            url: record.url,
            progress_url: record.progress_url,
            started: record.started,
            last_activity: record.last_activity,
        }
    }
}

/// Default-session status for one subject.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusView {
    pub exists: bool,
    pub ready: bool,
    pub pending: Option<String>,
    pub url: Option<String>,
    pub started_at: Option<String>,
    pub last_activity: Option<String>,
}

/// Which servers a listing covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionScope {
    Subject(String),
    All,
}

/// Outcome of one step of identity deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum StepOutcome {
    Done,
    /// Nothing to do; the target was already absent.
    Absent,
    Failed(String),
}

impl StepOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, StepOutcome::Failed(_))
    }
}

/// Per-step report of an identity deletion.
#[derive(Debug, Clone, Serialize)]
pub struct DeletionReport {
    pub subject: String,
    pub server_stopped: StepOutcome,
    pub hub_user_deleted: StepOutcome,
    pub workspace_removed: StepOutcome,
}

impl DeletionReport {
    /// True when no step failed.
    pub fn is_complete(&self) -> bool {
        ![
            &self.server_stopped,
            &self.hub_user_deleted,
            &self.workspace_removed,
        ]
        .iter()
        .any(|step| step.is_failed())
    }
}

/// A document stored by the create operation.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedDocument {
    pub name: String,
    pub path: String,
    /// False when the document already existed and was left untouched.
    pub created: bool,
}
