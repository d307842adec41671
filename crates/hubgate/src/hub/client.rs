//! Hub HTTP client.

use std::time::Duration;

use log::debug;
use reqwest::{Client, RequestBuilder, Response, StatusCode};

use super::DEFAULT_SERVER;
use super::error::{HubError, HubResult};
use super::types::*;

/// Client for the hub REST API.
#[derive(Debug, Clone)]
pub struct HubClient {
    /// HTTP client.
    client: Client,
    /// API base URL (e.g., "http://127.0.0.1:8000/hub/api").
    api_url: String,
    /// Service token presented on every call.
    service_token: String,
}

impl HubClient {
    /// Create a new hub client.
    pub fn new(
        api_url: impl Into<String>,
        service_token: impl Into<String>,
        timeout: Duration,
    ) -> HubResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            service_token: service_token.into(),
        })
    }

    fn user_url(&self, name: &str) -> String {
        format!("{}/users/{}", self.api_url, urlencoding::encode(name))
    }

    fn server_url(&self, name: &str, server: &str) -> String {
        if server == DEFAULT_SERVER {
            format!("{}/server", self.user_url(name))
        } else {
            format!(
                "{}/servers/{}",
                self.user_url(name),
                urlencoding::encode(server)
            )
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("Authorization", format!("Bearer {}", self.service_token))
    }

    /// Fetch a user record; `None` when the hub does not know the user.
    pub async fn get_user(&self, name: &str) -> HubResult<Option<UserRecord>> {
        let response = self
            .authorized(self.client.get(self.user_url(name)))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Self::parse(response).await.map(Some),
            _ => Err(Self::unexpected(response).await),
        }
    }

    /// Register a user with the hub.
    pub async fn create_user(&self, name: &str) -> HubResult<CreateOutcome> {
        let response = self
            .authorized(self.client.post(self.user_url(name)))
            .send()
            .await?;

        match response.status() {
            StatusCode::CREATED | StatusCode::OK => Ok(CreateOutcome::Created),
            StatusCode::CONFLICT => Ok(CreateOutcome::Conflict),
            _ => Err(Self::unexpected(response).await),
        }
    }

    /// Remove a user from the hub.
    pub async fn delete_user(&self, name: &str) -> HubResult<DeleteOutcome> {
        let response = self
            .authorized(self.client.delete(self.user_url(name)))
            .send()
            .await?;

        match response.status() {
            StatusCode::NO_CONTENT | StatusCode::OK => Ok(DeleteOutcome::Deleted),
            StatusCode::NOT_FOUND => Ok(DeleteOutcome::NotFound),
            _ => Err(Self::unexpected(response).await),
        }
    }

    /// List every user the hub knows about.
    pub async fn list_users(&self) -> HubResult<Vec<UserRecord>> {
        let url = format!("{}/users", self.api_url);
        let response = self.authorized(self.client.get(&url)).send().await?;

        if response.status().is_success() {
            Self::parse(response).await
        } else {
            Err(Self::unexpected(response).await)
        }
    }

    /// Ask the hub to start a server for a user.
    pub async fn start_server(
        &self,
        name: &str,
        server: &str,
        options: &StartOptions,
    ) -> HubResult<StartOutcome> {
        let url = self.server_url(name, server);
        debug!("Starting hub server {:?} for {}", server, name);
        let response = self
            .authorized(self.client.post(&url))
            .json(options)
            .send()
            .await?;

        match response.status() {
            StatusCode::CREATED | StatusCode::ACCEPTED => Ok(StartOutcome::Accepted),
            StatusCode::CONFLICT => Ok(StartOutcome::Conflict),
            StatusCode::BAD_REQUEST => {
                let body = response.text().await.unwrap_or_default();
                if body.to_ascii_lowercase().contains("already") {
                    Ok(StartOutcome::Conflict)
                } else {
                    Err(HubError::Unexpected { status: 400, body })
                }
            }
            _ => Err(Self::unexpected(response).await),
        }
    }

    /// Ask the hub to stop a user's server.
    pub async fn stop_server(&self, name: &str, server: &str) -> HubResult<StopOutcome> {
        let url = self.server_url(name, server);
        debug!("Stopping hub server {:?} for {}", server, name);
        let response = self.authorized(self.client.delete(&url)).send().await?;

        match response.status() {
            StatusCode::ACCEPTED | StatusCode::NO_CONTENT | StatusCode::OK => {
                Ok(StopOutcome::Accepted)
            }
            StatusCode::NOT_FOUND => Ok(StopOutcome::NotFound),
            StatusCode::BAD_REQUEST => {
                let body = response.text().await.unwrap_or_default();
                if body.to_ascii_lowercase().contains("not running") {
                    Ok(StopOutcome::NotFound)
                } else {
                    Err(HubError::Unexpected { status: 400, body })
                }
            }
            _ => Err(Self::unexpected(response).await),
        }
    }

    async fn parse<T: serde::de::DeserializeOwned>(response: Response) -> HubResult<T> {
        response
            .json()
            .await
            .map_err(|e| HubError::ParseError(format!("Failed to parse response: {}", e)))
    }

    async fn unexpected(response: Response) -> HubError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        HubError::Unexpected { status, body }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, Request};
    use axum::http::{StatusCode as Status, header};
    use axum::middleware::{self, Next};
    use axum::response::{IntoResponse, Response as AxumResponse};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{Value, json};

    const TOKEN: &str = "svc-token";

    /// Minimal hub answering with canned statuses keyed by user name.
    fn stub_router() -> Router {
        Router::new()
            .route("/hub/api/users", get(|| async { Json(json!([{ "name": "alice" }, { "name": "bob" }])) }))
            .route(
                "/hub/api/users/{name}",
                get(stub_get_user).post(stub_create_user).delete(stub_delete_user),
            )
            .route(
                "/hub/api/users/{name}/server",
                post(stub_start_server).delete(stub_stop_server),
            )
            .route(
                "/hub/api/users/{name}/servers/{server}",
                post(|Path((_, server)): Path<(String, String)>| async move {
                    if server == "lab 2" { Status::ACCEPTED } else { Status::NOT_FOUND }
                }),
            )
            .layer(middleware::from_fn(require_token))
    }

    async fn require_token(request: Request, next: Next) -> AxumResponse {
        let bearer = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        if bearer != Some("Bearer svc-token") {
            return (Status::FORBIDDEN, "invalid token").into_response();
        }
        next.run(request).await
    }

    async fn stub_get_user(Path(name): Path<String>) -> AxumResponse {
        match name.as_str() {
            "alice" => Json(json!({
                "name": "alice",
                "admin": null,
                "servers": { "": { "ready": true, "url": "/user/alice/" } },
                "unknown_field": 1
            }))
            .into_response(),
            "garbled" => (Status::OK, "not json").into_response(),
            "ghost" => Status::NOT_FOUND.into_response(),
            _ => (Status::INTERNAL_SERVER_ERROR, "boom").into_response(),
        }
    }

    async fn stub_create_user(Path(name): Path<String>) -> AxumResponse {
        match name.as_str() {
            "new" => Status::CREATED.into_response(),
            "taken" => Status::CONFLICT.into_response(),
            _ => (Status::SERVICE_UNAVAILABLE, "hub busy").into_response(),
        }
    }

    async fn stub_delete_user(Path(name): Path<String>) -> AxumResponse {
        match name.as_str() {
            "alice" => Status::NO_CONTENT.into_response(),
            "ghost" => Status::NOT_FOUND.into_response(),
            _ => (Status::INTERNAL_SERVER_ERROR, "boom").into_response(),
        }
    }

    async fn stub_start_server(Path(name): Path<String>, Json(body): Json<Value>) -> AxumResponse {
        match name.as_str() {
            "fresh" if body["marimo_file"] == "/home/fresh/apps/a.py" => {
                Status::ACCEPTED.into_response()
            }
            "quick" => Status::CREATED.into_response(),
            "running" => (Status::BAD_REQUEST, "running is already running").into_response(),
            "dup" => Status::CONFLICT.into_response(),
            "stopping" => (Status::BAD_REQUEST, "stopping's server is pending stop").into_response(),
            _ => (Status::UNPROCESSABLE_ENTITY, "bad request").into_response(),
        }
    }

    async fn stub_stop_server(Path(name): Path<String>) -> AxumResponse {
        match name.as_str() {
            "alice" => Status::NO_CONTENT.into_response(),
            "slow" => Status::ACCEPTED.into_response(),
            "ghost" => Status::NOT_FOUND.into_response(),
            "idle" => (Status::BAD_REQUEST, "Server is not running").into_response(),
            "pending" => (Status::BAD_REQUEST, "server is pending spawn").into_response(),
            _ => (Status::INTERNAL_SERVER_ERROR, "boom").into_response(),
        }
    }

    async fn stub_hub(token: &str) -> HubClient {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, stub_router()).await.unwrap();
        });
        HubClient::new(format!("http://{addr}/hub/api"), token, Duration::from_secs(5)).unwrap()
    }

    fn unexpected_status(err: HubError) -> u16 {
        match err {
            HubError::Unexpected { status, .. } => status,
            other => panic!("expected unexpected-status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_user_mapping() {
        let hub = stub_hub(TOKEN).await;

        let alice = hub.get_user("alice").await.unwrap().unwrap();
        assert_eq!(alice.name, "alice");
        assert!(!alice.admin);
        assert!(alice.default_server().is_some_and(|s| s.ready));

        assert!(hub.get_user("ghost").await.unwrap().is_none());
        assert_eq!(unexpected_status(hub.get_user("broken").await.unwrap_err()), 500);
        assert!(matches!(
            hub.get_user("garbled").await.unwrap_err(),
            HubError::ParseError(_)
        ));
    }

    #[tokio::test]
    async fn test_create_and_delete_user_mapping() {
        let hub = stub_hub(TOKEN).await;

        assert_eq!(hub.create_user("new").await.unwrap(), CreateOutcome::Created);
        assert_eq!(hub.create_user("taken").await.unwrap(), CreateOutcome::Conflict);
        match hub.create_user("other").await.unwrap_err() {
            HubError::Unexpected { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "hub busy");
            }
            other => panic!("unexpected error {other:?}"),
        }

        assert_eq!(hub.delete_user("alice").await.unwrap(), DeleteOutcome::Deleted);
        assert_eq!(hub.delete_user("ghost").await.unwrap(), DeleteOutcome::NotFound);
        assert_eq!(unexpected_status(hub.delete_user("other").await.unwrap_err()), 500);
    }

    #[tokio::test]
    async fn test_list_users() {
        let hub = stub_hub(TOKEN).await;
        let names: Vec<String> = hub
            .list_users()
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.name)
            .collect();
        assert_eq!(names, ["alice", "bob"]);
    }

    #[tokio::test]
    async fn test_start_server_mapping() {
        let hub = stub_hub(TOKEN).await;
        let options = StartOptions {
            document: Some("/home/fresh/apps/a.py".to_string()),
            port: None,
        };

        assert_eq!(
            hub.start_server("fresh", DEFAULT_SERVER, &options).await.unwrap(),
            StartOutcome::Accepted
        );
        assert_eq!(
            hub.start_server("quick", DEFAULT_SERVER, &options).await.unwrap(),
            StartOutcome::Accepted
        );
        assert_eq!(
            hub.start_server("running", DEFAULT_SERVER, &options).await.unwrap(),
            StartOutcome::Conflict
        );
        assert_eq!(
            hub.start_server("dup", DEFAULT_SERVER, &options).await.unwrap(),
            StartOutcome::Conflict
        );
        assert_eq!(
            hub.start_server("alice", "lab 2", &options).await.unwrap(),
            StartOutcome::Accepted
        );
        assert_eq!(
            unexpected_status(
                hub.start_server("stopping", DEFAULT_SERVER, &options)
                    .await
                    .unwrap_err()
            ),
            400
        );
        assert_eq!(
            unexpected_status(
                hub.start_server("other", DEFAULT_SERVER, &options)
                    .await
                    .unwrap_err()
            ),
            422
        );
    }

    #[tokio::test]
    async fn test_stop_server_mapping() {
        let hub = stub_hub(TOKEN).await;

        for (name, expected) in [
            ("alice", StopOutcome::Accepted),
            ("slow", StopOutcome::Accepted),
            ("ghost", StopOutcome::NotFound),
            ("idle", StopOutcome::NotFound),
        ] {
            assert_eq!(
                hub.stop_server(name, DEFAULT_SERVER).await.unwrap(),
                expected,
                "{name}"
            );
        }
        assert_eq!(
            unexpected_status(hub.stop_server("pending", DEFAULT_SERVER).await.unwrap_err()),
            400
        );
    }

    #[tokio::test]
    async fn test_every_call_carries_service_token() {
        let hub = stub_hub("wrong-token").await;

        assert_eq!(unexpected_status(hub.get_user("alice").await.unwrap_err()), 403);
        assert_eq!(unexpected_status(hub.create_user("new").await.unwrap_err()), 403);
        assert_eq!(unexpected_status(hub.list_users().await.unwrap_err()), 403);
        assert_eq!(
            unexpected_status(hub.stop_server("alice", DEFAULT_SERVER).await.unwrap_err()),
            403
        );
    }

    fn client() -> HubClient {
        HubClient::new(
            "http://hub:8000/hub/api/",
            "svc-token",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_client_creation() {
        assert_eq!(client().api_url, "http://hub:8000/hub/api");
    }

    #[test]
    fn test_urls() {
        let client = client();
        assert_eq!(
            client.user_url("alice"),
            "http://hub:8000/hub/api/users/alice"
        );
        assert_eq!(
            client.server_url("alice", DEFAULT_SERVER),
            "http://hub:8000/hub/api/users/alice/server"
        );
        assert_eq!(
            client.server_url("alice", "lab 2"),
            "http://hub:8000/hub/api/users/alice/servers/lab%202"
        );
    }
}
