//! Hub connection configuration.

use serde::{Deserialize, Serialize};

/// Hub configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Hub base URL (e.g. "http://127.0.0.1:8000"); the REST API lives
    /// under `/hub/api`.
    pub url: String,

    /// Service token presented to the hub, and accepted from admin callers.
    /// Supports `env:VAR_NAME` indirection.
    pub service_token: Option<String>,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8000".to_string(),
            service_token: None,
            request_timeout_secs: 30,
        }
    }
}

impl HubConfig {
    /// Resolve the service token, expanding `env:VAR_NAME` syntax.
    pub fn resolve_service_token(&self) -> Result<String, HubConfigError> {
        let value = self
            .service_token
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or(HubConfigError::MissingServiceToken)?;

        match value.strip_prefix("env:") {
            Some(var_name) => match std::env::var(var_name) {
                Ok(token) if !token.is_empty() => Ok(token),
                Ok(_) => Err(HubConfigError::EnvVarEmpty(var_name.to_string())),
                Err(_) => Err(HubConfigError::EnvVarNotFound(var_name.to_string())),
            },
            None => Ok(value.to_string()),
        }
    }

    /// Base URL of the REST API.
    pub fn api_url(&self) -> String {
        format!("{}/hub/api", self.url.trim_end_matches('/'))
    }
}

/// Hub configuration errors; all are fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubConfigError {
    /// No service token configured.
    MissingServiceToken,
    /// Environment variable not found (for `env:VAR_NAME` syntax).
    EnvVarNotFound(String),
    /// Environment variable is empty (for `env:VAR_NAME` syntax).
    EnvVarEmpty(String),
}

impl std::fmt::Display for HubConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingServiceToken => write!(
                f,
                "Hub service token is required. Set HUB_API_TOKEN or hub.service_token in config."
            ),
            Self::EnvVarNotFound(var) => write!(
                f,
                "Environment variable '{}' not found (referenced via env:{} in config).",
                var, var
            ),
            Self::EnvVarEmpty(var) => write!(
                f,
                "Environment variable '{}' is empty (referenced via env:{} in config).",
                var, var
            ),
        }
    }
}

impl std::error::Error for HubConfigError {}
