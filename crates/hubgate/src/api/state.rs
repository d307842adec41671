//! Application state shared across handlers.

use std::sync::Arc;

use axum::extract::FromRef;

use crate::auth::AuthState;
use crate::session::SessionOrchestrator;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<SessionOrchestrator>,
    pub auth: AuthState,
    /// Origins allowed by CORS; empty allows none.
    pub allowed_origins: Vec<String>,
}

impl AppState {
    pub fn new(orchestrator: Arc<SessionOrchestrator>, auth: AuthState) -> Self {
        Self {
            orchestrator,
            auth,
            allowed_origins: Vec::new(),
        }
    }

    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.allowed_origins = origins;
        self
    }
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}
