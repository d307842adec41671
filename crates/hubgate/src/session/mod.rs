//! Session lifecycle: provisioning, spawn-or-attach and readiness.

mod error;
mod models;
mod readiness;
mod service;
#[cfg(test)]
pub(crate) mod testing;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use error::{SessionError, SessionResult};
pub use models::*;
pub use readiness::{WaitPolicy, wait_until_ready, wait_until_stopped};
pub use service::{OrchestratorConfig, SessionOrchestrator};

/// Session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Public origin of the hub proxy; redirects are built on it.
    pub public_base_url: String,
    /// Seconds between readiness polls.
    pub poll_interval_secs: u64,
    /// Seconds to wait for a started server before giving up.
    pub spawn_timeout_secs: u64,
    /// Route appended to the server URL (`{app_dirname}`, `{document}`).
    pub document_route: String,
    /// Lease a fresh local port for every start. Leased ports are never
    /// handed out twice, so the ephemeral range bounds the number of starts
    /// a single process can issue.
    pub allocate_port: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            public_base_url: "http://localhost:8000".to_string(),
            poll_interval_secs: 2,
            spawn_timeout_secs: 300,
            document_route: "lab/tree/{app_dirname}/{document}".to_string(),
            allocate_port: false,
        }
    }
}

impl SessionConfig {
    pub fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy {
            poll_interval: Duration::from_secs(self.poll_interval_secs.max(1)),
            timeout: Duration::from_secs(self.spawn_timeout_secs),
        }
    }
}
