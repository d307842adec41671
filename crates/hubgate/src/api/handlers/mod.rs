//! HTTP handlers.

pub mod documents;
pub mod sessions;
pub mod users;

use axum::Json;
use axum::extract::rejection::FormRejection;
use axum::extract::Form;
use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub version: &'static str,
}

/// Liveness check.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Document parameters accepted from a form body or the query string.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct DocumentParams {
    pub document_name: Option<String>,
    pub content: Option<String>,
}

impl DocumentParams {
    /// Merge form fields over query fields. A missing or non-form body is
    /// treated as empty.
    pub fn merge(
        query: DocumentParams,
        form: Result<Form<DocumentParams>, FormRejection>,
    ) -> Self {
        let form = form.map(|Form(f)| f).unwrap_or_default();
        Self {
            document_name: form.document_name.or(query.document_name),
            content: form.content.or(query.content),
        }
    }
}
