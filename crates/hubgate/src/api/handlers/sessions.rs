//! Session handlers for the calling identity.

use axum::Json;
use axum::extract::rejection::FormRejection;
use axum::extract::{Form, Query, State};
use serde::Serialize;

use super::DocumentParams;
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::auth::CurrentIdentity;
use crate::session::{ServerView, SessionError, SessionScope, StatusView};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpawnResponse {
    pub ok: bool,
    pub user: String,
    pub next_url: String,
    pub document: String,
    pub attached: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ServerStatusResponse {
    pub ok: bool,
    pub server_exists: bool,
    #[serde(flatten)]
    pub status: StatusView,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct UserServersResponse {
    pub ok: bool,
    pub user_exists: bool,
    pub username: String,
    pub server_count: usize,
    pub servers: Vec<ServerView>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct RunningServer {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MyServersStatusResponse {
    pub ok: bool,
    pub has_servers: bool,
    pub has_running_servers: bool,
    pub total_servers: usize,
    pub running_servers_count: usize,
    pub running_servers: Vec<RunningServer>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct StopServerResponse {
    pub ok: bool,
    pub stopped: bool,
    pub message: String,
}

/// Ensure identity and workspace, start or join the caller's server and
/// wait for it to become ready.
pub async fn spawn(
    State(state): State<AppState>,
    identity: CurrentIdentity,
    Query(query): Query<DocumentParams>,
    form: Result<Form<DocumentParams>, FormRejection>,
) -> ApiResult<Json<SpawnResponse>> {
    let params = DocumentParams::merge(query, form);
    let outcome = state
        .orchestrator
        .spawn_or_attach(identity.subject(), params.document_name.as_deref())
        .await?;

    Ok(Json(SpawnResponse {
        ok: true,
        message: format!("Server ready for user {}", outcome.subject),
        user: outcome.subject,
        next_url: outcome.redirect,
        document: outcome.document,
        attached: outcome.attached,
    }))
}

/// Status of the caller's default server.
pub async fn server_status(
    State(state): State<AppState>,
    identity: CurrentIdentity,
) -> ApiResult<Json<ServerStatusResponse>> {
    let status = state.orchestrator.status(identity.subject()).await?;
    let message = match (status.exists, status.ready) {
        (false, _) => "No server found".to_string(),
        (true, true) => "Server is ready".to_string(),
        (true, false) => "Server is starting".to_string(),
    };

    Ok(Json(ServerStatusResponse {
        ok: true,
        server_exists: status.exists,
        status,
        message,
    }))
}

/// Servers of a subject; an unknown subject is reported, not an error.
pub(super) async fn servers_of(state: &AppState, subject: &str) -> ApiResult<UserServersResponse> {
    let (user_exists, servers) = match state
        .orchestrator
        .list_sessions(SessionScope::Subject(subject.to_string()))
        .await
    {
        Ok(servers) => (true, servers),
        Err(SessionError::NotFound(_)) => (false, Vec::new()),
        Err(e) => return Err(ApiError::from(e)),
    };

    let message = if user_exists {
        format!("Found {} servers for user {}", servers.len(), subject)
    } else {
        format!("User {} not found", subject)
    };

    Ok(UserServersResponse {
        ok: true,
        user_exists,
        username: subject.to_string(),
        server_count: servers.len(),
        servers,
        message,
    })
}

/// The caller's servers.
pub async fn my_servers(
    State(state): State<AppState>,
    identity: CurrentIdentity,
) -> ApiResult<Json<UserServersResponse>> {
    Ok(Json(servers_of(&state, identity.subject()).await?))
}

/// Summary of the caller's running servers.
pub async fn my_servers_status(
    State(state): State<AppState>,
    identity: CurrentIdentity,
) -> ApiResult<Json<MyServersStatusResponse>> {
    let servers = servers_of(&state, identity.subject()).await?.servers;
    let total_servers = servers.len();
    let running_servers: Vec<RunningServer> = servers
        .into_iter()
        .filter(|s| s.ready)
        .map(|s| RunningServer {
            name: s.name,
            url: s.url,
            started: s.started,
        })
        .collect();

    Ok(Json(MyServersStatusResponse {
        ok: true,
        has_servers: total_servers > 0,
        has_running_servers: !running_servers.is_empty(),
        total_servers,
        running_servers_count: running_servers.len(),
        message: format!("{} of {} servers running", running_servers.len(), total_servers),
        running_servers,
    }))
}

/// Stop the caller's default server.
pub async fn stop_my_server(
    State(state): State<AppState>,
    identity: CurrentIdentity,
) -> ApiResult<Json<StopServerResponse>> {
    let stopped = state.orchestrator.stop_session(identity.subject()).await?;
    Ok(Json(StopServerResponse {
        ok: true,
        stopped,
        message: if stopped {
            "Server stop requested".to_string()
        } else {
            "No server running".to_string()
        },
    }))
}
