//! Identity provisioning and service-tier user handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use super::sessions::{UserServersResponse, servers_of};
use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::auth::{CurrentIdentity, ServiceCaller};
use crate::session::{DeletionReport, ServerView, SessionScope};

#[derive(Debug, Serialize)]
pub struct CreateUserResponse {
    pub ok: bool,
    pub user: String,
    pub workspace: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ListUsersResponse {
    pub ok: bool,
    pub users: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteUserResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
    pub report: DeletionReport,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ServerResponse {
    pub ok: bool,
    pub server_exists: bool,
    pub server: ServerView,
}

#[derive(Debug, Serialize)]
pub struct AllServersResponse {
    pub ok: bool,
    pub server_count: usize,
    pub servers: Vec<ServerView>,
}

/// Register the caller with the hub and provision the workspace.
pub async fn create_user(
    State(state): State<AppState>,
    identity: CurrentIdentity,
) -> ApiResult<Json<CreateUserResponse>> {
    let workspace = state
        .orchestrator
        .ensure_identity_and_workspace(identity.subject())
        .await?;

    Ok(Json(CreateUserResponse {
        ok: true,
        user: identity.subject().to_string(),
        workspace: workspace.root.to_string_lossy().into_owned(),
        message: format!("User {} created successfully", identity.subject()),
    }))
}

/// Every user the hub knows.
pub async fn list_users(
    State(state): State<AppState>,
    _service: ServiceCaller,
) -> ApiResult<Json<ListUsersResponse>> {
    let users = state.orchestrator.list_users().await?;
    Ok(Json(ListUsersResponse { ok: true, users }))
}

/// Stop, unregister and remove a user's workspace.
///
/// Responds 502 with the per-step report when any step failed.
pub async fn delete_user(
    State(state): State<AppState>,
    _service: ServiceCaller,
    Path(name): Path<String>,
) -> ApiResult<Response> {
    let report = state.orchestrator.delete_identity(&name).await?;

    let response = if report.is_complete() {
        (
            StatusCode::OK,
            Json(DeleteUserResponse {
                ok: true,
                kind: None,
                message: format!("User {} deleted", name),
                report,
            }),
        )
    } else {
        (
            StatusCode::BAD_GATEWAY,
            Json(DeleteUserResponse {
                ok: false,
                kind: Some("partial_deletion"),
                message: format!("User {} was only partially deleted", name),
                report,
            }),
        )
    };
    Ok(response.into_response())
}

/// Admin view of a user's servers.
pub async fn user_servers(
    State(state): State<AppState>,
    _service: ServiceCaller,
    Path(name): Path<String>,
) -> ApiResult<Json<UserServersResponse>> {
    Ok(Json(servers_of(&state, &name).await?))
}

/// Admin view of one named server.
pub async fn user_server(
    State(state): State<AppState>,
    _service: ServiceCaller,
    Path((name, server)): Path<(String, String)>,
) -> ApiResult<Json<ServerResponse>> {
    let server = state.orchestrator.server(&name, &server).await?;
    Ok(Json(ServerResponse {
        ok: true,
        server_exists: true,
        server,
    }))
}

/// Every server of every user.
pub async fn all_servers(
    State(state): State<AppState>,
    _service: ServiceCaller,
) -> ApiResult<Json<AllServersResponse>> {
    let servers = state.orchestrator.list_sessions(SessionScope::All).await?;
    Ok(Json(AllServersResponse {
        ok: true,
        server_count: servers.len(),
        servers,
    }))
}
