//! Hub API types.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

use super::DEFAULT_SERVER;

/// Treat an explicit `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A user as reported by the hub.
///
/// Unknown fields are ignored and missing fields default, so newer or older
/// hub versions parse without error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserRecord {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub admin: bool,
    /// URL prefix of the default server when it is running.
    pub server: Option<String>,
    /// Pending action on the default server ("spawn", "stop").
    pub pending: Option<String>,
    pub last_activity: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub servers: HashMap<String, ServerRecord>,
}

impl UserRecord {
    /// The default server record.
    ///
    /// Older hubs omit `servers` unless asked; fall back to the flat
    /// `server`/`pending` fields in that case.
    pub fn default_server(&self) -> Option<ServerRecord> {
        self.server_named(DEFAULT_SERVER)
    }

    /// A named server record (`""` is the default server).
    pub fn server_named(&self, server: &str) -> Option<ServerRecord> {
        if let Some(record) = self.servers.get(server) {
            return Some(record.clone());
        }
        if server != DEFAULT_SERVER || (self.server.is_none() && self.pending.is_none()) {
            return None;
        }
        Some(ServerRecord {
            name: String::new(),
            ready: self.server.is_some() && self.pending.is_none(),
            pending: self.pending.clone(),
            url: self.server.clone(),
            last_activity: self.last_activity.clone(),
            ..Default::default()
        })
    }
}

/// A server (spawned notebook process) as reported by the hub.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerRecord {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub ready: bool,
    pub pending: Option<String>,
    pub url: Option<String>,
    pub started: Option<String>,
    pub last_activity: Option<String>,
    pub progress_url: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub failed: bool,
    pub status: Option<String>,
    pub message: Option<String>,
    pub exit_code: Option<i32>,
}

/// Failure signal extracted from a server record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureState {
    pub status: Option<String>,
    pub message: Option<String>,
    pub exit_code: Option<i32>,
}

impl FailureState {
    /// Human-readable reason.
    pub fn reason(&self) -> String {
        let mut parts = Vec::new();
        if let Some(ref status) = self.status {
            parts.push(format!("status {status}"));
        }
        if let Some(code) = self.exit_code {
            parts.push(format!("exit code {code}"));
        }
        if let Some(ref message) = self.message {
            parts.push(message.clone());
        }
        if parts.is_empty() {
            "server failed to start".to_string()
        } else {
            parts.join(": ")
        }
    }
}

impl ServerRecord {
    /// Whether a start or stop is in flight.
    pub fn is_pending(&self) -> bool {
        self.pending.as_deref().is_some_and(|p| !p.is_empty())
    }

    /// Failure signal, if the hub reports one.
    pub fn failure(&self) -> Option<FailureState> {
        let failed_status = self
            .status
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("failed") || s.eq_ignore_ascii_case("error"));
        let bad_exit = self.exit_code.is_some_and(|code| code != 0);

        if self.failed || failed_status || bad_exit {
            Some(FailureState {
                status: self.status.clone(),
                message: self.message.clone(),
                exit_code: self.exit_code,
            })
        } else {
            None
        }
    }
}

/// Options passed to the hub when starting a server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StartOptions {
    /// Document the notebook process opens first.
    #[serde(rename = "marimo_file", skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
    /// Port lease handed to the spawner.
    #[serde(rename = "marimo_port", skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

/// Outcome of creating a hub user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    Conflict,
}

/// Outcome of a start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Accepted,
    /// Already running or starting.
    Conflict,
}

/// Outcome of a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Accepted,
    NotFound,
}

/// Outcome of deleting a hub user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}
