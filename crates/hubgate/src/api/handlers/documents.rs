//! Document handlers.

use axum::extract::rejection::FormRejection;
use axum::extract::{Form, Path, Query, State};
use axum::{Json, http::StatusCode};
use serde::Serialize;

use super::DocumentParams;
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::auth::CurrentIdentity;
use crate::workspace::DocumentInfo;

#[derive(Debug, Serialize)]
pub struct CreateDocumentResponse {
    pub ok: bool,
    pub name: String,
    pub path: String,
    pub created: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ListDocumentsResponse {
    pub ok: bool,
    pub documents: Vec<DocumentInfo>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct GetDocumentResponse {
    pub ok: bool,
    pub name: String,
    pub content: String,
    pub encoding: &'static str,
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteDocumentResponse {
    pub ok: bool,
    pub name: String,
    pub message: String,
}

fn required_name(params: &DocumentParams) -> ApiResult<&str> {
    params
        .document_name
        .as_deref()
        .ok_or_else(|| ApiError::bad_request("document_name is required"))
}

/// Create a document in the caller's workspace (existing documents are kept).
pub async fn create_document(
    State(state): State<AppState>,
    identity: CurrentIdentity,
    Query(query): Query<DocumentParams>,
    form: Result<Form<DocumentParams>, FormRejection>,
) -> ApiResult<(StatusCode, Json<CreateDocumentResponse>)> {
    let params = DocumentParams::merge(query, form);
    let name = required_name(&params)?;

    let document = state
        .orchestrator
        .create_document(
            identity.subject(),
            name,
            params.content.as_deref().map(str::as_bytes),
        )
        .await?;

    let (status, message) = if document.created {
        (
            StatusCode::CREATED,
            format!("Document {} created for user {}", document.name, identity.subject()),
        )
    } else {
        (
            StatusCode::OK,
            format!("Document {} already exists", document.name),
        )
    };

    Ok((
        status,
        Json(CreateDocumentResponse {
            ok: true,
            name: document.name,
            path: document.path,
            created: document.created,
            message,
        }),
    ))
}

/// List the caller's documents.
pub async fn list_documents(
    State(state): State<AppState>,
    identity: CurrentIdentity,
) -> ApiResult<Json<ListDocumentsResponse>> {
    let documents = state
        .orchestrator
        .list_documents(identity.subject())
        .await?;

    Ok(Json(ListDocumentsResponse {
        ok: true,
        message: format!("Found {} documents", documents.len()),
        documents,
    }))
}

/// Read one of the caller's documents.
pub async fn read_document(
    State(state): State<AppState>,
    identity: CurrentIdentity,
    Path(name): Path<String>,
) -> ApiResult<Json<GetDocumentResponse>> {
    let document = state
        .orchestrator
        .read_document(identity.subject(), &name)
        .await?;

    Ok(Json(GetDocumentResponse {
        ok: true,
        name: document.name,
        content: document.content,
        encoding: document.encoding,
        path: document.path,
    }))
}

/// Delete a document named by form field or query parameter.
pub async fn delete_document(
    State(state): State<AppState>,
    identity: CurrentIdentity,
    Query(query): Query<DocumentParams>,
    form: Result<Form<DocumentParams>, FormRejection>,
) -> ApiResult<Json<DeleteDocumentResponse>> {
    let params = DocumentParams::merge(query, form);
    let name = required_name(&params)?;
    delete(&state, &identity, name).await
}

/// Delete a document named in the path.
pub async fn delete_document_by_path(
    State(state): State<AppState>,
    identity: CurrentIdentity,
    Path(name): Path<String>,
) -> ApiResult<Json<DeleteDocumentResponse>> {
    delete(&state, &identity, &name).await
}

async fn delete(
    state: &AppState,
    identity: &CurrentIdentity,
    name: &str,
) -> ApiResult<Json<DeleteDocumentResponse>> {
    let name = state
        .orchestrator
        .delete_document(identity.subject(), name)
        .await?;

    Ok(Json(DeleteDocumentResponse {
        ok: true,
        message: format!("Document {} deleted", name),
        name,
    }))
}
