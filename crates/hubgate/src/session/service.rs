//! Session lifecycle orchestration.
//!
//! Drives a subject from "unknown" to "routed into a running notebook server":
//! hub registration, workspace provisioning, at most one start per subject,
//! and a bounded wait for readiness.

use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use log::{debug, info, warn};
use tokio::sync::Mutex;

use super::models::*;
use super::readiness::{WaitPolicy, wait_until_ready, wait_until_stopped};
use super::{SessionConfig, SessionError, SessionResult};
use crate::hub::{
    CreateOutcome, DEFAULT_SERVER, DeleteOutcome, HubApi, ServerRecord, StartOptions,
    StartOutcome, StopOutcome,
};
use crate::workspace::{
    AccountResolver, DocumentContent, DocumentInfo, OsAccount, Workspace, WorkspaceConfig,
    WorkspaceManager, check_subject, chown_tree, normalize_document_name,
};

const PORT_LEASE_ATTEMPTS: usize = 8;

/// Orchestrator settings derived from the session and workspace config.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Public origin the redirect is built on (e.g. "https://notebooks.example.com").
    pub public_base_url: String,
    /// Document opened when the caller names none.
    pub default_document: String,
    /// Path appended to the server URL; `{app_dirname}` and `{document}` are
    /// substituted.
    pub document_route: String,
    pub wait: WaitPolicy,
    /// Hand the spawner a fresh local port on every start.
    pub allocate_port: bool,
}

impl OrchestratorConfig {
    pub fn from_config(session: &SessionConfig, workspace: &WorkspaceConfig) -> Self {
        Self {
            public_base_url: session.public_base_url.clone(),
            default_document: workspace.default_document.clone(),
            document_route: session.document_route.clone(),
            wait: session.wait_policy(),
            allocate_port: session.allocate_port,
        }
    }
}

/// What the provisioning step produced.
struct Provisioned {
    workspace: Workspace,
    owner: Option<OsAccount>,
}

/// What the guarded check-then-start decided.
enum StartDecision {
    /// The server is already ready.
    Ready(ServerRecord),
    /// Another request's start is in flight.
    Joined,
    /// This request issued the start.
    Started,
}

/// Coordinates the hub, workspaces and OS accounts for every subject.
pub struct SessionOrchestrator {
    hub: Arc<dyn HubApi>,
    workspaces: WorkspaceManager,
    accounts: Arc<dyn AccountResolver>,
    config: OrchestratorConfig,
    /// Per-subject guard around check-then-start.
    spawn_guards: DashMap<String, Arc<Mutex<()>>>,
    /// Every port ever handed to the hub. Never shrinks, so a long-lived
    /// process eventually exhausts the ephemeral range and starts fail with
    /// `PortLease`.
    leased_ports: DashSet<u16>,
}

impl SessionOrchestrator {
    pub fn new(
        hub: Arc<dyn HubApi>,
        workspaces: WorkspaceManager,
        accounts: Arc<dyn AccountResolver>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            hub,
            workspaces,
            accounts,
            config,
            spawn_guards: DashMap::new(),
            leased_ports: DashSet::new(),
        }
    }

    pub fn workspaces(&self) -> &WorkspaceManager {
        &self.workspaces
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Make sure the hub knows the subject and its workspace exists.
    ///
    /// Safe to call any number of times, concurrently.
    pub async fn ensure_identity_and_workspace(&self, subject: &str) -> SessionResult<Workspace> {
        Ok(self.provision(subject).await?.workspace)
    }

    async fn provision(&self, subject: &str) -> SessionResult<Provisioned> {
        check_subject(subject)?;

        if self.hub.get_user(subject).await?.is_none() {
            match self.hub.create_user(subject).await? {
                CreateOutcome::Created => info!("Registered {} with the hub", subject),
                CreateOutcome::Conflict => debug!("{} registered concurrently", subject),
            }
        }

        let owner = match self.accounts.resolve(subject).await {
            Ok(owner) => owner,
            Err(e) => {
                warn!("Skipping ownership transfer for {}: {}", subject, e);
                None
            }
        };

        let workspace = self
            .workspaces
            .ensure_workspace(subject, owner.as_ref())
            .await?;
        Ok(Provisioned { workspace, owner })
    }

    /// Create a document (if absent) in the subject's workspace.
    pub async fn create_document(
        &self,
        subject: &str,
        raw_name: &str,
        content: Option<&[u8]>,
    ) -> SessionResult<CreatedDocument> {
        let name = normalize_document_name(raw_name)?;
        let provisioned = self.provision(subject).await?;
        let path = provisioned.workspace.apps_dir.join(&name);
        let created = self.seed(&path, content, provisioned.owner.as_ref()).await?;

        Ok(CreatedDocument {
            name,
            path: path.to_string_lossy().into_owned(),
            created,
        })
    }

    async fn seed(
        &self,
        path: &std::path::Path,
        content: Option<&[u8]>,
        owner: Option<&OsAccount>,
    ) -> SessionResult<bool> {
        let created = self.workspaces.ensure_seed_document(path, content).await?;
        if let (true, Some(account)) = (created, owner) {
            chown_tree(path, account.uid, account.gid).await?;
        }
        Ok(created)
    }

    pub async fn list_documents(&self, subject: &str) -> SessionResult<Vec<DocumentInfo>> {
        Ok(self.workspaces.list_documents(subject).await?)
    }

    pub async fn read_document(
        &self,
        subject: &str,
        raw_name: &str,
    ) -> SessionResult<DocumentContent> {
        let name = normalize_document_name(raw_name)?;
        Ok(self.workspaces.read_document(subject, &name).await?)
    }

    /// Delete a document; returns the normalized name.
    pub async fn delete_document(&self, subject: &str, raw_name: &str) -> SessionResult<String> {
        let name = normalize_document_name(raw_name)?;
        self.workspaces.delete_document(subject, &name).await?;
        Ok(name)
    }

    /// Bring the subject's session up (or join the running one) and return
    /// where to send the caller.
    pub async fn spawn_or_attach(
        &self,
        subject: &str,
        document: Option<&str>,
    ) -> SessionResult<SpawnOutcome> {
        let document = normalize_document_name(
            document
                .filter(|d| !d.trim().is_empty())
                .unwrap_or(&self.config.default_document),
        )?;

        let provisioned = self.provision(subject).await?;
        let path = provisioned.workspace.apps_dir.join(&document);
        self.seed(&path, None, provisioned.owner.as_ref()).await?;

        let attached = match self.start_if_needed(subject, &path).await? {
            StartDecision::Ready(record) => {
                info!("Attached {} to running server", subject);
                return Ok(self.outcome(subject, document, &record, true));
            }
            StartDecision::Joined => true,
            StartDecision::Started => false,
        };

        let record =
            wait_until_ready(self.hub.as_ref(), subject, DEFAULT_SERVER, self.config.wait)
                .await?;
        info!("Server for {} is ready", subject);
        Ok(self.outcome(subject, document, &record, attached))
    }

    /// Under the subject's guard: report a ready server, or make sure a start
    /// is in flight. The guard is released before any waiting.
    async fn start_if_needed(
        &self,
        subject: &str,
        document_path: &std::path::Path,
    ) -> SessionResult<StartDecision> {
        let guard = self
            .spawn_guards
            .entry(subject.to_string())
            .or_default()
            .clone();
        let _held = guard.lock().await;

        let existing = self
            .hub
            .get_user(subject)
            .await?
            .and_then(|u| u.default_server());

        match existing {
            Some(record) if record.ready && record.failure().is_none() => {
                return Ok(StartDecision::Ready(record));
            }
            Some(record) if record.is_pending() && record.failure().is_none() => {
                debug!("Start already in flight for {}", subject);
                return Ok(StartDecision::Joined);
            }
            Some(record) => {
                debug!(
                    "Clearing stale server for {} (failure: {:?})",
                    subject,
                    record.failure()
                );
                if self.hub.stop_server(subject, DEFAULT_SERVER).await? == StopOutcome::Accepted {
                    let hub = self.hub.as_ref();
                    wait_until_stopped(hub, subject, DEFAULT_SERVER, self.config.wait).await?;
                }
            }
            None => {}
        }

        let options = StartOptions {
            document: Some(document_path.to_string_lossy().into_owned()),
            port: if self.config.allocate_port {
                Some(self.lease_port().await?)
            } else {
                None
            },
        };

        match self
            .hub
            .start_server(subject, DEFAULT_SERVER, &options)
            .await?
        {
            StartOutcome::Accepted => {
                info!("Started server for {}", subject);
                Ok(StartDecision::Started)
            }
            StartOutcome::Conflict => {
                debug!("Server for {} was started elsewhere", subject);
                Ok(StartDecision::Joined)
            }
        }
    }

    fn outcome(
        &self,
        subject: &str,
        document: String,
        record: &ServerRecord,
        attached: bool,
    ) -> SpawnOutcome {
        SpawnOutcome {
            redirect: self.redirect_url(subject, &document, record),
            subject: subject.to_string(),
            document,
            attached,
        }
    }

    /// Public URL of a document inside a running server.
    pub fn redirect_url(&self, subject: &str, document: &str, record: &ServerRecord) -> String {
        let mut server_path = record
            .url
            .clone()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| format!("/user/{}/", urlencoding::encode(subject)));
        if !server_path.ends_with('/') {
            server_path.push('/');
        }

        let route = self
            .config
            .document_route
            .replace("{app_dirname}", self.workspaces.app_dirname())
            .replace("{document}", &urlencoding::encode(document));
        let route = route.trim_start_matches('/');

        if server_path.starts_with("http://") || server_path.starts_with("https://") {
            return format!("{server_path}{route}");
        }
        format!(
            "{}{}{}",
            self.config.public_base_url.trim_end_matches('/'),
            server_path,
            route
        )
    }

    /// Ask the OS for an ephemeral port that was never handed out before.
    async fn lease_port(&self) -> SessionResult<u16> {
        for _ in 0..PORT_LEASE_ATTEMPTS {
            let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0))
                .await
                .map_err(|e| SessionError::PortLease(e.to_string()))?;
            let port = listener
                .local_addr()
                .map_err(|e| SessionError::PortLease(e.to_string()))?
                .port();
            if self.leased_ports.insert(port) {
                return Ok(port);
            }
        }
        Err(SessionError::PortLease(
            "no unused port after repeated attempts".to_string(),
        ))
    }

    /// Default-session status. Never starts anything.
    pub async fn status(&self, subject: &str) -> SessionResult<StatusView> {
        let Some(user) = self.hub.get_user(subject).await? else {
            return Ok(StatusView::default());
        };
        let Some(record) = user.default_server() else {
            return Ok(StatusView::default());
        };

        Ok(StatusView {
            exists: true,
            ready: record.ready,
            pending: record.pending.filter(|p| !p.is_empty()),
            url: record.url,
            started_at: record.started,
            last_activity: record.last_activity.or(user.last_activity),
        })
    }

    /// Servers visible in `scope`.
    ///
    /// A subject the hub does not know yields `NotFound`.
    pub async fn list_sessions(&self, scope: SessionScope) -> SessionResult<Vec<ServerView>> {
        let users = match scope {
            SessionScope::Subject(subject) => {
                let user = self
                    .hub
                    .get_user(&subject)
                    .await?
                    .ok_or(SessionError::NotFound(subject))?;
                vec![user]
            }
            SessionScope::All => self.hub.list_users().await?,
        };

        let mut views = Vec::new();
        for user in users {
            let mut names: Vec<&String> = user.servers.keys().collect();
            names.sort();
            if names.is_empty() {
                if let Some(record) = user.default_server() {
                    views.push(ServerView::from_record(&user.name, record));
                }
                continue;
            }
            for name in names {
                if let Some(record) = user.server_named(name) {
                    views.push(ServerView::from_record(&user.name, record));
                }
            }
        }
        Ok(views)
    }

    /// One named server of a subject.
    pub async fn server(&self, subject: &str, server: &str) -> SessionResult<ServerView> {
        let user = self
            .hub
            .get_user(subject)
            .await?
            .ok_or_else(|| SessionError::NotFound(subject.to_string()))?;
        user.server_named(server)
            .map(|record| ServerView::from_record(subject, record))
            .ok_or_else(|| SessionError::NotFound(format!("{subject}/{server}")))
    }

    /// Names of every hub user.
    pub async fn list_users(&self) -> SessionResult<Vec<String>> {
        let mut names: Vec<String> = self
            .hub
            .list_users()
            .await?
            .into_iter()
            .map(|u| u.name)
            .collect();
        names.sort();
        Ok(names)
    }

    /// Stop the default server. Returns false when none was running.
    pub async fn stop_session(&self, subject: &str) -> SessionResult<bool> {
        match self.hub.stop_server(subject, DEFAULT_SERVER).await? {
            StopOutcome::Accepted => {
                info!("Stopped server for {}", subject);
                Ok(true)
            }
            StopOutcome::NotFound => Ok(false),
        }
    }

    /// Stop the server, remove the hub user and delete the workspace.
    ///
    /// Every step is attempted; failures are recorded in the report.
    pub async fn delete_identity(&self, subject: &str) -> SessionResult<DeletionReport> {
        check_subject(subject)?;

        let server_stopped = match self.hub.stop_server(subject, DEFAULT_SERVER).await {
            Ok(StopOutcome::Accepted) => StepOutcome::Done,
            Ok(StopOutcome::NotFound) => StepOutcome::Absent,
            Err(e) => StepOutcome::Failed(e.to_string()),
        };

        let hub_user_deleted = match self.hub.delete_user(subject).await {
            Ok(DeleteOutcome::Deleted) => StepOutcome::Done,
            Ok(DeleteOutcome::NotFound) => StepOutcome::Absent,
            Err(e) => StepOutcome::Failed(e.to_string()),
        };

        let workspace_removed = match self.workspaces.remove_workspace(subject).await {
            Ok(true) => StepOutcome::Done,
            Ok(false) => StepOutcome::Absent,
            Err(e) => StepOutcome::Failed(e.to_string()),
        };

        self.spawn_guards.remove(subject);

        let report = DeletionReport {
            subject: subject.to_string(),
            server_stopped,
            hub_user_deleted,
            workspace_removed,
        };
        if report.is_complete() {
            info!("Deleted identity {}", subject);
        } else {
            warn!("Partial deletion of {}: {:?}", subject, report);
        }
        Ok(report)
    }
}
