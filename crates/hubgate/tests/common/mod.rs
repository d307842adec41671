//! Test utilities and common setup.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use base64::Engine;
use chrono::Utc;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use tempfile::TempDir;

use hubgate::api;
use hubgate::auth::{AuthState, IdentityVerifier, StaticKeySet};
use hubgate::hub::*;
use hubgate::session::{OrchestratorConfig, SessionOrchestrator, WaitPolicy};
use hubgate::workspace::{NoAccounts, WorkspaceConfig, WorkspaceManager};

pub const SERVICE_TOKEN: &str = "test-service-token";
pub const PUBLIC_BASE_URL: &str = "https://hub.example";

const SECRET: &[u8] = b"test-secret-for-integration-tests-minimum-32-chars";
const KID: &str = "test-key";
const ISSUER: &str = "https://tenant.example/";

/// Hub double: started servers report ready on the next poll.
#[derive(Default)]
pub struct TestHub {
    /// user -> running server (`Some(ready)`) or none.
    users: Mutex<HashMap<String, Option<bool>>>,
    /// Make `delete_user` fail with a 500.
    pub fail_deletes: bool,
}

impl TestHub {
    pub fn failing_deletes() -> Self {
        Self {
            fail_deletes: true,
            ..Default::default()
        }
    }

    pub fn has_user(&self, name: &str) -> bool {
        self.users.lock().unwrap().contains_key(name)
    }

    pub fn is_running(&self, name: &str) -> bool {
        matches!(self.users.lock().unwrap().get(name), Some(Some(_)))
    }

    fn record(name: &str, ready: bool) -> ServerRecord {
        ServerRecord {
            ready,
            pending: (!ready).then(|| "spawn".to_string()),
            url: Some(format!("/user/{name}/")),
            started: Some("2024-01-01T00:00:00Z".to_string()),
            ..Default::default()
        }
    }
}

#[async_trait]
impl HubApi for TestHub {
    async fn get_user(&self, name: &str) -> HubResult<Option<UserRecord>> {
        let mut users = self.users.lock().unwrap();
        let Some(slot) = users.get_mut(name) else {
            return Ok(None);
        };
        let mut servers = HashMap::new();
        if let Some(ready) = slot.as_mut() {
            servers.insert(DEFAULT_SERVER.to_string(), Self::record(name, *ready));
            *ready = true;
        }
        Ok(Some(UserRecord {
            name: name.to_string(),
            servers,
            ..Default::default()
        }))
    }

    async fn create_user(&self, name: &str) -> HubResult<CreateOutcome> {
        let mut users = self.users.lock().unwrap();
        if users.contains_key(name) {
            return Ok(CreateOutcome::Conflict);
        }
        users.insert(name.to_string(), None);
        Ok(CreateOutcome::Created)
    }

    async fn delete_user(&self, name: &str) -> HubResult<DeleteOutcome> {
        if self.fail_deletes {
            return Err(HubError::Unexpected {
                status: 500,
                body: "hub unavailable".to_string(),
            });
        }
        match self.users.lock().unwrap().remove(name) {
            Some(_) => Ok(DeleteOutcome::Deleted),
            None => Ok(DeleteOutcome::NotFound),
        }
    }

    async fn list_users(&self) -> HubResult<Vec<UserRecord>> {
        let users = self.users.lock().unwrap();
        Ok(users
            .iter()
            .map(|(name, server)| {
                let mut servers = HashMap::new();
                if let Some(ready) = server {
                    servers.insert(DEFAULT_SERVER.to_string(), Self::record(name, *ready));
                }
                UserRecord {
                    name: name.clone(),
                    servers,
                    ..Default::default()
                }
            })
            .collect())
    }

    async fn start_server(
        &self,
        name: &str,
        _server: &str,
        _options: &StartOptions,
    ) -> HubResult<StartOutcome> {
        let mut users = self.users.lock().unwrap();
        match users.get_mut(name) {
            Some(slot) if slot.is_some() => Ok(StartOutcome::Conflict),
            Some(slot) => {
                *slot = Some(false);
                Ok(StartOutcome::Accepted)
            }
            None => Err(HubError::Unexpected {
                status: 404,
                body: "no such user".to_string(),
            }),
        }
    }

    async fn stop_server(&self, name: &str, _server: &str) -> HubResult<StopOutcome> {
        let mut users = self.users.lock().unwrap();
        match users.get_mut(name) {
            Some(slot) if slot.is_some() => {
                *slot = None;
                Ok(StopOutcome::Accepted)
            }
            _ => Ok(StopOutcome::NotFound),
        }
    }
}

/// A running test application.
pub struct TestApp {
    pub router: Router,
    pub hub: Arc<TestHub>,
    pub files_root: TempDir,
}

fn verifier() -> IdentityVerifier {
    let k = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(SECRET);
    let keys: JwkSet = serde_json::from_value(serde_json::json!({
        "keys": [{ "kty": "oct", "kid": KID, "k": k }]
    }))
    .unwrap();

    IdentityVerifier::new(Arc::new(StaticKeySet::new(keys)), vec![Algorithm::HS256])
        .with_issuer(Some(ISSUER.to_string()))
}

/// Create a test application backed by `hub`.
pub fn test_app_with_hub(hub: TestHub) -> TestApp {
    test_app_with_verifier(hub, verifier())
}

/// Create a test application verifying tokens with `verifier`.
pub fn test_app_with_verifier(hub: TestHub, verifier: IdentityVerifier) -> TestApp {
    let files_root = TempDir::new().unwrap();
    let workspace_config = WorkspaceConfig {
        files_root: files_root.path().to_path_buf(),
        transfer_ownership: false,
        ..Default::default()
    };

    let hub = Arc::new(hub);
    let orchestrator = SessionOrchestrator::new(
        hub.clone(),
        WorkspaceManager::new(&workspace_config),
        Arc::new(NoAccounts),
        OrchestratorConfig {
            public_base_url: PUBLIC_BASE_URL.to_string(),
            default_document: workspace_config.default_document.clone(),
            document_route: "lab/tree/{app_dirname}/{document}".to_string(),
            wait: WaitPolicy {
                poll_interval: Duration::from_millis(10),
                timeout: Duration::from_secs(5),
            },
            allocate_port: false,
        },
    );

    let auth = AuthState::new(verifier, Some(SERVICE_TOKEN));
    let state = api::AppState::new(Arc::new(orchestrator), auth);

    TestApp {
        router: api::create_router(state),
        hub,
        files_root,
    }
}

/// Create a test application with an empty hub.
pub fn test_app() -> TestApp {
    test_app_with_hub(TestHub::default())
}

/// Sign an access token for `email`.
pub fn token_for(email: &str) -> String {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(KID.to_string());
    let claims = serde_json::json!({
        "sub": format!("auth0|{email}"),
        "email": email,
        "iss": ISSUER,
        "exp": Utc::now().timestamp() + 3600,
    });
    encode(&header, &claims, &EncodingKey::from_secret(SECRET)).unwrap()
}
